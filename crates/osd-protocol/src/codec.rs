//! CRLF-delimited IRC line codec for TCP streams.
//!
//! Wire format: one message per line, terminated by `\r\n` (bare `\n`
//! accepted on input). Outbound lines are capped at the RFC 1459 frame size.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::limits::LIMITS;
use crate::messages::{IrcMessage, OutboundFrame};
use crate::ProtocolError;

/// Maximum inbound line: 8191 bytes of IRCv3 tags plus a 512-byte body.
const MAX_INBOUND_LINE: usize = 8191 + 512;

/// Codec for framing IrcMessage values over a byte stream.
#[derive(Debug, Default)]
pub struct IrcCodec {
    /// Bytes already scanned for a newline in the current buffer.
    next_index: usize,
}

impl IrcCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for IrcCodec {
    type Item = IrcMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if src.len() > MAX_INBOUND_LINE {
                    return Err(ProtocolError::LineTooLong {
                        size: src.len(),
                        max: MAX_INBOUND_LINE,
                    });
                }
                return Ok(None);
            };

            let end = self.next_index + offset;
            self.next_index = 0;
            let line = src.split_to(end + 1);
            if end > MAX_INBOUND_LINE {
                return Err(ProtocolError::LineTooLong {
                    size: end,
                    max: MAX_INBOUND_LINE,
                });
            }

            let text = String::from_utf8_lossy(&line[..end]);
            let text = text.trim_end_matches('\r');
            // Servers occasionally send blank keep-alive lines
            if text.trim().is_empty() {
                continue;
            }
            return IrcMessage::parse(text).map(Some);
        }
    }
}

impl Encoder<IrcMessage> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: IrcMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = item.to_string();
        if line.contains(['\r', '\n']) {
            return Err(ProtocolError::Malformed(line));
        }

        let size = line.len() + 2;
        if size > LIMITS.frame_bytes {
            return Err(ProtocolError::LineTooLong {
                size,
                max: LIMITS.frame_bytes,
            });
        }

        dst.reserve(size);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<OutboundFrame> for IrcCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<IrcMessage>::encode(self, item.into(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageKind;

    #[test]
    fn test_encode_decode_line() {
        let mut codec = IrcCodec::new();
        let frame = OutboundFrame::new(MessageKind::Plain, "#chan", "hello world");

        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        assert_eq!(&buf[..], b"PRIVMSG #chan :hello world\r\n");

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.command, "PRIVMSG");
        assert_eq!(decoded.params, vec!["#chan", "hello world"]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b"PING :serv"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b"er.example\r\n");
        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["server.example"]);
    }

    #[test]
    fn test_multiple_lines_and_blank() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(&b":s 001 me :hi\r\n\r\n:s 376 me :End\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().command, "001");
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().command, "376");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_oversized_outbound_rejected() {
        let mut codec = IrcCodec::new();
        let frame = OutboundFrame::new(MessageKind::Plain, "#chan", &"x".repeat(600));
        let mut buf = BytesMut::new();
        assert!(matches!(
            codec.encode(frame, &mut buf),
            Err(ProtocolError::LineTooLong { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_embedded_newline_rejected() {
        let mut codec = IrcCodec::new();
        let frame = OutboundFrame::new(MessageKind::Plain, "#chan", "a\r\nQUIT");
        let mut buf = BytesMut::new();
        assert!(codec.encode(frame, &mut buf).is_err());
    }

    #[test]
    fn test_oversized_inbound_rejected() {
        let mut codec = IrcCodec::new();
        let mut buf = BytesMut::from(vec![b'a'; MAX_INBOUND_LINE + 10].as_slice());
        assert!(codec.decode(&mut buf).is_err());
    }
}
