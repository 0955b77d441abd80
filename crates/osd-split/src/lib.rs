//! OSD Split -- turns a send request into frame-sized pieces.
//!
//! Three pure steps, run once per request:
//!   1. group: flat target list -> destination groups of at most N targets
//!   2. budget: payload bytes left once overhead, our hostmask and the
//!      longest group are accounted for
//!   3. segment: messages -> chunks that each fit the budget

pub mod budget;
pub mod group;
pub mod segment;

pub use budget::{sender_address_len, FrameBudget};
pub use group::{group, DestinationGroup, Destinations};
pub use segment::{segment, Chunk, MESSAGE_PADDING};

pub type Result<T> = std::result::Result<T, SplitError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("destination list is empty")]
    InvalidDestinations,
    #[error("frame budget exhausted: {budget} bytes available for payload")]
    BudgetExhausted { budget: i64 },
    #[error("a {width}-byte character cannot fit a {budget}-byte frame")]
    CharacterExceedsBudget { width: usize, budget: usize },
}
