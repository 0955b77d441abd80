//! OSD Protocol -- IRC wire types, line codec, protocol limits.
//!
//! Plain TCP to the server, one CRLF-terminated message per line, 512 bytes
//! per line including the server-added source prefix.

pub mod codec;
pub mod identifier;
pub mod isupport;
pub mod limits;
pub mod messages;

pub use codec::IrcCodec;
pub use identifier::Identifier;
pub use isupport::{TargetLimits, DEFAULT_MAX_TARGETS, RPL_ISUPPORT};
pub use limits::{WireLimits, LIMITS};
pub use messages::*;

/// RPL_WELCOME: registration complete.
pub const RPL_WELCOME: &str = "001";

/// RPL_ENDOFMOTD.
pub const RPL_ENDOFMOTD: &str = "376";

/// ERR_NOMOTD. Ends registration just like RPL_ENDOFMOTD.
pub const ERR_NOMOTD: &str = "422";

/// ERR_NICKNAMEINUSE.
pub const ERR_NICKNAMEINUSE: &str = "433";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("line too long: {size} bytes (max {max})")]
    LineTooLong { size: usize, max: usize },
    #[error("malformed line: {0:?}")]
    Malformed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
