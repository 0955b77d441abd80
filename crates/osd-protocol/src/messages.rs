//! IRC message types.
//!
//! `IrcMessage` is the generic parsed/rendered line. `OutboundFrame` is the
//! narrower PRIVMSG/NOTICE shape the dispatcher hands to a transport.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::limits::CTCP_DELIM;
use crate::ProtocolError;

// ============================================================================
// Delivery kind
// ============================================================================

/// How a piece of text should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Plain,
    Action,
    Notice,
}

impl MessageKind {
    /// Normalize a free-form kind name. Anything unrecognized is `Plain`.
    pub fn normalize(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "ACTION" => MessageKind::Action,
            "NOTICE" => MessageKind::Notice,
            _ => MessageKind::Plain,
        }
    }

    /// Wire command used to carry this kind.
    pub fn command(self) -> Command {
        match self {
            MessageKind::Notice => Command::Notice,
            MessageKind::Plain | MessageKind::Action => Command::Privmsg,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Plain => "plain",
            MessageKind::Action => "action",
            MessageKind::Notice => "notice",
        }
    }
}

impl FromStr for MessageKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalize(s))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text-carrying wire commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Privmsg,
    Notice,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Privmsg => "PRIVMSG",
            Command::Notice => "NOTICE",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Outbound frame
// ============================================================================

/// One PRIVMSG/NOTICE line ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub command: Command,
    /// Comma-joined destination group.
    pub target: String,
    pub text: String,
}

impl OutboundFrame {
    /// Build the frame for `text` delivered as `kind`. ACTION text is wrapped
    /// in CTCP delimiters and carried by PRIVMSG.
    pub fn new(kind: MessageKind, target: impl Into<String>, text: &str) -> Self {
        let text = match kind {
            MessageKind::Action => format!("{CTCP_DELIM}ACTION {text}{CTCP_DELIM}"),
            MessageKind::Plain | MessageKind::Notice => text.to_string(),
        };
        Self {
            command: kind.command(),
            target: target.into(),
            text,
        }
    }
}

impl From<OutboundFrame> for IrcMessage {
    fn from(frame: OutboundFrame) -> Self {
        IrcMessage::new(frame.command.as_str(), vec![frame.target, frame.text])
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} :{}", self.command, self.target, self.text)
    }
}

/// Strip characters that would terminate or corrupt a protocol line.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\0'))
        .collect()
}

// ============================================================================
// Generic line
// ============================================================================

/// A parsed IRC line: `[:prefix] COMMAND params... [:trailing]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    /// Parse one line without its CRLF. IRCv3 message tags are skipped.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if rest.starts_with('@') {
            rest = rest
                .split_once(' ')
                .map(|(_, r)| r)
                .ok_or_else(|| ProtocolError::Malformed(line.to_string()))?;
        }
        rest = rest.trim_start_matches(' ');

        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (prefix, r) = stripped
                .split_once(' ')
                .ok_or_else(|| ProtocolError::Malformed(line.to_string()))?;
            rest = r.trim_start_matches(' ');
            Some(prefix.to_string())
        } else {
            None
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words
            .next()
            .ok_or_else(|| ProtocolError::Malformed(line.to_string()))?
            .to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        }

        Ok(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nick part of the prefix, if the prefix is a user mask.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        Some(prefix.split(['!', '@']).next().unwrap_or(prefix))
    }

    /// Full prefix when it is a `nick!user@host` mask.
    pub fn source_mask(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .filter(|p| p.contains('!') && p.contains('@'))
    }
}

impl fmt::Display for IrcMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;
        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}
