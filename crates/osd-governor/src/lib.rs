//! OSD Governor -- per-target flood control.
//!
//! One `RecipientState` per destination group, created on first use and kept
//! for the life of the process. Each frame passes through `admit`:
//!   1. Refill the allowance from whole seconds of quiet
//!   2. Allowance spent: block for the cooldown, then check for a repeat loop
//!   3. Loop streak at the limit: drop the frame
//!   4. Otherwise record it, replacing the text with "..." while looping

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use osd_protocol::{Identifier, MessageKind, LIMITS};

/// Text sent in place of a frame judged to be part of a repeat loop.
pub const LOOP_PLACEHOLDER: &str = "...";

/// Tunables for the flood state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodPolicy {
    pub burst_capacity: u32,
    pub refill_per_sec: u32,
    pub base_wait: Duration,
    pub max_wait: Duration,
    pub penalty_free_chars: usize,
    pub penalty_chars_per_sec: usize,
    pub loop_window: usize,
    pub loop_threshold: usize,
    pub loop_recency: Duration,
    pub suppress_streak: u32,
    pub history_len: usize,
}

impl Default for FloodPolicy {
    fn default() -> Self {
        Self {
            burst_capacity: LIMITS.burst_capacity,
            refill_per_sec: LIMITS.refill_per_sec,
            base_wait: LIMITS.base_wait(),
            max_wait: LIMITS.max_wait(),
            penalty_free_chars: LIMITS.penalty_free_chars,
            penalty_chars_per_sec: LIMITS.penalty_chars_per_sec,
            loop_window: LIMITS.loop_window,
            loop_threshold: LIMITS.loop_threshold,
            loop_recency: LIMITS.loop_recency(),
            suppress_streak: LIMITS.suppress_streak,
            history_len: LIMITS.history_len,
        }
    }
}

impl FloodPolicy {
    /// Cooldown for `text` once the allowance is spent: base wait plus one
    /// second per `penalty_chars_per_sec` characters beyond the free length,
    /// capped at `max_wait`. Counts characters, not bytes.
    pub fn cooldown(&self, text: &str) -> Duration {
        let excess = text.chars().count().saturating_sub(self.penalty_free_chars);
        let penalty = if self.penalty_chars_per_sec == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(excess as f64 / self.penalty_chars_per_sec as f64)
        };
        (self.base_wait + penalty).min(self.max_wait)
    }
}

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub at: Instant,
    pub text: String,
}

/// What to put on the wire for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub text: String,
    pub kind: MessageKind,
    /// Text was swapped for [`LOOP_PLACEHOLDER`].
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Emit(Emission),
    /// Dropped: the loop streak reached the suppression limit.
    Suppressed { streak: u32 },
}

impl Verdict {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Verdict::Suppressed { .. })
    }
}

/// Flood state for one destination group.
#[derive(Debug, Clone)]
pub struct RecipientState {
    history: VecDeque<HistoryEntry>,
    allowance: u32,
    loop_streak: u32,
}

impl RecipientState {
    pub fn new(policy: &FloodPolicy) -> Self {
        Self {
            history: VecDeque::with_capacity(policy.history_len),
            allowance: policy.burst_capacity,
            loop_streak: 0,
        }
    }

    pub fn allowance(&self) -> u32 {
        self.allowance
    }

    pub fn loop_streak(&self) -> u32 {
        self.loop_streak
    }

    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Start a new burst of frames to this target.
    pub fn reset_streak(&mut self) {
        self.loop_streak = 0;
    }

    /// Time since the newest history entry; unbounded if there is none.
    fn since_last(&self, now: Instant) -> Duration {
        self.history
            .back()
            .map(|last| now.saturating_duration_since(last.at))
            .unwrap_or(Duration::MAX)
    }

    fn is_repeat(&self, text: &str, elapsed: Duration, policy: &FloodPolicy) -> bool {
        let skip = self.history.len().saturating_sub(policy.loop_window);
        let copies = self
            .history
            .iter()
            .skip(skip)
            .filter(|entry| entry.text == text)
            .count();
        copies >= policy.loop_threshold && elapsed < policy.loop_recency
    }

    /// Decide what happens to `text`, blocking for the cooldown if needed.
    pub fn admit(
        &mut self,
        text: &str,
        kind: MessageKind,
        policy: &FloodPolicy,
        clock: &dyn Clock,
    ) -> Verdict {
        if self.allowance == 0 {
            let whole_secs = self.since_last(clock.now()).as_secs();
            let refill = whole_secs.saturating_mul(u64::from(policy.refill_per_sec));
            self.allowance = refill.min(u64::from(policy.burst_capacity)) as u32;
        }

        // Loop detection only runs on the throttled path
        if self.allowance == 0 {
            let elapsed = self.since_last(clock.now());
            let wait = policy.cooldown(text);
            if elapsed < wait {
                let pause = wait - elapsed;
                tracing::trace!(wait_ms = pause.as_millis() as u64, "flood: cooling down");
                clock.sleep(pause);
            }

            if self.is_repeat(text, elapsed, policy) {
                self.loop_streak += 1;
            } else {
                self.loop_streak = 0;
            }
        }

        if self.loop_streak >= policy.suppress_streak {
            return Verdict::Suppressed {
                streak: self.loop_streak,
            };
        }

        self.allowance = self.allowance.saturating_sub(1);
        self.history.push_back(HistoryEntry {
            at: clock.now(),
            text: text.to_string(),
        });
        while self.history.len() > policy.history_len {
            self.history.pop_front();
        }

        if self.loop_streak > 0 {
            let kind = match kind {
                MessageKind::Action => MessageKind::Plain,
                other => other,
            };
            Verdict::Emit(Emission {
                text: LOOP_PLACEHOLDER.to_string(),
                kind,
                replaced: true,
            })
        } else {
            Verdict::Emit(Emission {
                text: text.to_string(),
                kind,
                replaced: false,
            })
        }
    }
}

type SharedState = Arc<Mutex<RecipientState>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry of per-target flood state.
pub struct FloodGovernor {
    policy: FloodPolicy,
    clock: Arc<dyn Clock>,
    targets: Mutex<HashMap<Identifier, SharedState>>,
}

impl FloodGovernor {
    pub fn new(policy: FloodPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            targets: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(policy: FloodPolicy) -> Self {
        Self::new(policy, Arc::new(SystemClock))
    }

    pub fn policy(&self) -> &FloodPolicy {
        &self.policy
    }

    /// State for `target`, created with a full allowance if absent.
    pub fn state(&self, target: &Identifier) -> SharedState {
        let mut targets = lock(&self.targets);
        targets
            .entry(target.clone())
            .or_insert_with(|| Arc::new(Mutex::new(RecipientState::new(&self.policy))))
            .clone()
    }

    /// Reset the loop streak before a new group of frames to `target`.
    pub fn begin_burst(&self, target: &Identifier) {
        lock(&self.state(target)).reset_streak();
    }

    /// Run one frame through flood control and hand the result to `emit`
    /// while the target's state is still locked, so history order and wire
    /// order agree.
    pub fn gate<F>(&self, target: &Identifier, text: &str, kind: MessageKind, emit: F) -> Verdict
    where
        F: FnOnce(&Emission),
    {
        let state = self.state(target);
        let mut state = lock(&state);
        let verdict = state.admit(text, kind, &self.policy, &*self.clock);

        match &verdict {
            Verdict::Emit(emission) => {
                if emission.replaced {
                    tracing::debug!(
                        recipient = %target,
                        streak = state.loop_streak(),
                        "flood: repeat loop, sending placeholder"
                    );
                }
                emit(emission);
            }
            Verdict::Suppressed { streak } => {
                tracing::info!(recipient = %target, streak, "flood: repeat loop, frame dropped");
            }
        }
        verdict
    }

    /// Copy of the current state for `target`, if any frame was ever sent.
    pub fn snapshot(&self, target: &Identifier) -> Option<RecipientState> {
        let targets = lock(&self.targets);
        targets.get(target).map(|s| lock(s).clone())
    }

    pub fn target_count(&self) -> usize {
        lock(&self.targets).len()
    }
}
