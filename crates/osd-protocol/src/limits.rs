//! Wire limits -- the fixed parameter set every OSD component agrees on.
//!
//! Frame sizing constants are dictated by RFC 1459 line length. Flood
//! parameters are the defaults a sender uses unless its config overrides
//! them; they are not negotiated with the server.

use std::time::Duration;

/// A named set of frame-sizing and flood-control parameters.
///
/// Durations are stored as milliseconds so the whole set can stay `const`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLimits {
    // -- Frame sizing --
    /// Total bytes in one protocol line, CRLF included.
    pub frame_bytes: usize,
    /// Bytes reserved for the command keyword, separators and a small buffer.
    pub reserved_overhead: usize,
    /// Username and separator allowance used when our hostmask is unknown.
    pub username_budget: usize,
    /// Maximum host field length used when our hostmask is unknown.
    pub max_host_len: usize,
    /// Targets per frame when the server does not advertise TARGMAX.
    pub default_max_targets: usize,

    // -- Allowance --
    /// Frames a target may receive back to back before cooldown applies.
    pub burst_capacity: u32,
    /// Tokens regained per whole second of quiet.
    pub refill_per_sec: u32,

    // -- Cooldown --
    /// Base wait once the allowance is spent.
    pub base_wait_ms: u64,
    /// Ceiling on base wait plus length penalty.
    pub max_wait_ms: u64,
    /// Characters a line may carry before the length penalty starts.
    pub penalty_free_chars: usize,
    /// Characters per extra second of penalty.
    pub penalty_chars_per_sec: usize,

    // -- Loop detection --
    /// Most recent history entries inspected for repeats.
    pub loop_window: usize,
    /// Occurrences within the window that count as a repeat.
    pub loop_threshold: usize,
    /// Age of the newest entry past which repeats are ignored.
    pub loop_recency_secs: u64,
    /// Consecutive repeats after which frames are dropped entirely.
    pub suppress_streak: u32,
    /// History entries retained per target.
    pub history_len: usize,
}

impl WireLimits {
    pub const fn base_wait(&self) -> Duration {
        Duration::from_millis(self.base_wait_ms)
    }

    pub const fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub const fn loop_recency(&self) -> Duration {
        Duration::from_secs(self.loop_recency_secs)
    }

    /// Estimated length of `nick!user@host` when the registry has no entry.
    pub const fn estimated_address_len(&self, nick_len: usize) -> usize {
        nick_len + self.username_budget + self.max_host_len
    }
}

/// RFC 1459 limits with the flood defaults used by most bot frameworks.
pub const LIMITS: WireLimits = WireLimits {
    // Frame sizing
    frame_bytes: 512,
    reserved_overhead: 15,
    username_budget: 12,
    max_host_len: 63,
    default_max_targets: 4,

    // Allowance
    burst_capacity: 4,
    refill_per_sec: 1,

    // Cooldown: min(0.7s + penalty, 2s)
    base_wait_ms: 700,
    max_wait_ms: 2000,
    penalty_free_chars: 50,
    penalty_chars_per_sec: 70,

    // Loop detection: 5 of the last 8 within 2 minutes
    loop_window: 8,
    loop_threshold: 5,
    loop_recency_secs: 120,
    suppress_streak: 3,
    history_len: 10,
};

/// The ACTION control byte (CTCP delimiter).
pub const CTCP_DELIM: char = '\u{1}';
