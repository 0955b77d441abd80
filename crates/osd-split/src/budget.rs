//! Frame byte budget.
//!
//! The server relays our line as `:nick!user@host PRIVMSG targets :text\r\n`
//! and the whole thing must fit in 512 bytes, so the payload gets what is
//! left after the command overhead, our hostmask and the target list.

use std::fmt;

use osd_protocol::LIMITS;

use crate::group::DestinationGroup;
use crate::{Result, SplitError};

/// Payload bytes available per frame. May be zero or negative when the
/// hostmask and target list eat the whole line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrameBudget(i64);

impl FrameBudget {
    /// Budget from raw lengths. Only the longest group counts, so every
    /// group in a request shares one budget.
    pub fn compute(
        own_address_len: usize,
        reserved_overhead: usize,
        group_lens: impl IntoIterator<Item = usize>,
    ) -> Self {
        let longest = group_lens.into_iter().max().unwrap_or(0);
        let available = LIMITS.frame_bytes as i64
            - reserved_overhead as i64
            - own_address_len as i64
            - longest as i64;
        Self(available)
    }

    /// Budget for sending to all of `groups` with the standard overhead.
    pub fn for_groups(own_address_len: usize, groups: &[DestinationGroup]) -> Self {
        Self::compute(
            own_address_len,
            LIMITS.reserved_overhead,
            groups.iter().map(DestinationGroup::byte_len),
        )
    }

    /// Fixed budget, mostly for tests and callers that size frames themselves.
    pub const fn from_bytes(bytes: i64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> i64 {
        self.0
    }

    /// Byte count usable for segmentation; non-positive budgets are refused.
    pub fn usable(self) -> Result<usize> {
        if self.0 <= 0 {
            return Err(SplitError::BudgetExhausted { budget: self.0 });
        }
        Ok(self.0 as usize)
    }
}

impl fmt::Display for FrameBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

/// Length of our `nick!user@host` as the server will render it. Falls back
/// to a worst-case estimate when the registry has not seen us yet.
pub fn sender_address_len(nick: &str, full_address: Option<&str>) -> usize {
    match full_address {
        Some(mask) => mask.len(),
        None => LIMITS.estimated_address_len(nick.len()),
    }
}
