//! RPL_ISUPPORT (005) target limits.
//!
//! Servers advertise how many targets one PRIVMSG/NOTICE may carry, either
//! per command (`TARGMAX=PRIVMSG:4,NOTICE:3`) or globally (`MAXTARGETS=4`).
//! An empty value means "no limit" and leaves the current setting alone.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::limits::LIMITS;
use crate::messages::MessageKind;

/// Numeric for RPL_ISUPPORT.
pub const RPL_ISUPPORT: &str = "005";

/// Max targets per frame, by command. `None` falls back to the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetLimits {
    pub privmsg: Option<NonZeroUsize>,
    pub notice: Option<NonZeroUsize>,
}

impl TargetLimits {
    /// Limit that applies to frames of the given kind.
    pub fn for_kind(&self, kind: MessageKind) -> Option<NonZeroUsize> {
        match kind {
            MessageKind::Notice => self.notice,
            MessageKind::Plain | MessageKind::Action => self.privmsg,
        }
    }

    /// Limit for `kind`, or the protocol default of 4.
    pub fn resolve(&self, kind: MessageKind) -> NonZeroUsize {
        self.for_kind(kind).unwrap_or(DEFAULT_MAX_TARGETS)
    }

    /// Apply the tokens of one 005 line. `params` excludes our nick and the
    /// trailing "are supported by this server" text. Returns true if any
    /// limit changed.
    pub fn apply_isupport<S: AsRef<str>>(&mut self, params: &[S]) -> bool {
        let before = *self;
        for token in params {
            let Some((key, value)) = token.as_ref().split_once('=') else {
                continue;
            };
            match key {
                "TARGMAX" => {
                    for setting in value.split(',') {
                        let Some((command, limit)) = setting.split_once(':') else {
                            continue;
                        };
                        let Some(limit) = parse_limit(limit) else {
                            continue;
                        };
                        match command.to_ascii_uppercase().as_str() {
                            "PRIVMSG" => self.privmsg = Some(limit),
                            "NOTICE" => self.notice = Some(limit),
                            _ => {}
                        }
                    }
                }
                "MAXTARGETS" => {
                    if let Some(limit) = parse_limit(value) {
                        self.privmsg = Some(limit);
                        self.notice = Some(limit);
                    }
                }
                _ => {}
            }
        }
        *self != before
    }
}

fn parse_limit(value: &str) -> Option<NonZeroUsize> {
    match value.trim().parse::<usize>() {
        Ok(n) => NonZeroUsize::new(n),
        Err(_) => {
            if !value.is_empty() {
                tracing::warn!(value, "isupport: ignoring unparsable target limit");
            }
            None
        }
    }
}

/// Default max targets per frame.
pub const DEFAULT_MAX_TARGETS: NonZeroUsize = match NonZeroUsize::new(LIMITS.default_max_targets) {
    Some(n) => n,
    None => panic!("default_max_targets must be non-zero"),
};

#[cfg(test)]
mod tests {
    use super::*;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_targmax_per_command() {
        let mut limits = TargetLimits::default();
        let changed = limits.apply_isupport(&[
            "CHANTYPES=#",
            "TARGMAX=NAMES:1,LIST:1,KICK:1,WHOIS:1,PRIVMSG:4,NOTICE:3,ACCEPT:,MONITOR:",
            "EXCEPTS",
        ]);
        assert!(changed);
        assert_eq!(limits.privmsg, Some(nz(4)));
        assert_eq!(limits.notice, Some(nz(3)));
        assert_eq!(limits.resolve(MessageKind::Notice), nz(3));
        assert_eq!(limits.resolve(MessageKind::Action), nz(4));
    }

    #[test]
    fn test_maxtargets_applies_to_both() {
        let mut limits = TargetLimits::default();
        limits.apply_isupport(&["MAXTARGETS=6"]);
        assert_eq!(limits.privmsg, Some(nz(6)));
        assert_eq!(limits.notice, Some(nz(6)));
    }

    #[test]
    fn test_empty_value_keeps_current() {
        let mut limits = TargetLimits {
            privmsg: Some(nz(2)),
            notice: None,
        };
        let changed = limits.apply_isupport(&["TARGMAX=PRIVMSG:,NOTICE:0"]);
        assert!(!changed);
        assert_eq!(limits.privmsg, Some(nz(2)));
        assert_eq!(limits.notice, None);
    }

    #[test]
    fn test_default_is_four() {
        let limits = TargetLimits::default();
        assert_eq!(limits.resolve(MessageKind::Plain), nz(4));
        assert_eq!(limits.resolve(MessageKind::Notice), nz(4));
    }
}
