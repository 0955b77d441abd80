//! Bridge from the blocking dispatcher to the async connection task.

use osd_dispatch::Transport;
use osd_protocol::OutboundFrame;
use tokio::sync::mpsc;

/// Hands frames to the connection task, which owns the socket. Unbounded so
/// a blocking dispatcher thread never waits on the runtime; the flood
/// governor already bounds the rate.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Transport for ChannelTransport {
    fn write_frame(&self, frame: OutboundFrame) {
        if let Err(e) = self.tx.send(frame) {
            tracing::warn!(frame = %e.0, "transport: connection task gone, frame dropped");
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
