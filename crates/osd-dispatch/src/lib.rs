//! OSD Dispatch -- composes grouping, budgeting, segmentation and flood
//! control into one `send` call.
//!
//! The host supplies three collaborators:
//!   - `Transport`: writes a frame to the wire
//!   - `AddressRegistry`: our nick and, if seen, our full hostmask
//!   - `Capabilities`: server-advertised max targets per frame

pub mod dispatcher;
pub mod responder;

pub use dispatcher::{Dispatcher, LockScope, SendReport};
pub use responder::{MessageDispatcher, Responder, Trigger};

pub use osd_split::Destinations;

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use osd_protocol::{Identifier, MessageKind, OutboundFrame, TargetLimits};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Split(#[from] osd_split::SplitError),

    #[error("transport closed after {emitted} frame(s)")]
    TransportClosed { emitted: usize },
}

/// Writes frames to the server. Delivery failures are the transport's
/// problem; the dispatcher treats a write as done once handed over.
pub trait Transport: Send + Sync {
    fn write_frame(&self, frame: OutboundFrame);

    /// True once nothing written will reach the server. Checked between
    /// chunks so an abandoned send stops instead of cooling down for a
    /// connection that is gone.
    fn is_closed(&self) -> bool {
        false
    }
}

pub trait AddressRegistry: Send + Sync {
    fn own_nick(&self) -> String;

    /// `nick!user@host` for `nick`, if known.
    fn full_address(&self, nick: &str) -> Option<String>;
}

pub trait Capabilities: Send + Sync {
    /// Server limit on targets per frame for `kind`, if advertised.
    fn max_targets(&self, kind: MessageKind) -> Option<NonZeroUsize>;
}

impl Capabilities for TargetLimits {
    fn max_targets(&self, kind: MessageKind) -> Option<NonZeroUsize> {
        self.for_kind(kind)
    }
}

/// Fixed identity, for dry runs and tests.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    pub nick: String,
    pub address: Option<String>,
}

impl StaticRegistry {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl AddressRegistry for StaticRegistry {
    fn own_nick(&self) -> String {
        self.nick.clone()
    }

    fn full_address(&self, nick: &str) -> Option<String> {
        if Identifier::new(nick) == Identifier::new(self.nick.as_str()) {
            self.address.clone()
        } else {
            None
        }
    }
}

/// Transport that keeps every frame in memory.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<OutboundFrame>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return everything recorded so far.
    pub fn take(&self) -> Vec<OutboundFrame> {
        std::mem::take(&mut *self.frames.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Transport for RecordingTransport {
    fn write_frame(&self, frame: OutboundFrame) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_address_matches_case_folded_nick() {
        let registry = StaticRegistry::new("Bob[away]").with_address("Bob[away]!b@h");
        assert_eq!(registry.full_address("bob{AWAY}").as_deref(), Some("Bob[away]!b@h"));
        assert!(registry.full_address("alice").is_none());
        assert!(StaticRegistry::new("bob").full_address("BOB").is_none());
    }

    #[test]
    fn test_recording_transport_never_closes() {
        let transport = RecordingTransport::new();
        transport.write_frame(OutboundFrame::new(MessageKind::Plain, "#a", "x"));
        assert!(!transport.is_closed());
        assert_eq!(transport.take().len(), 1);
        assert!(transport.frames().is_empty());
    }
}
