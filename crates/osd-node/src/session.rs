//! What the connection has learned about itself and the server.
//!
//! Fed every inbound message; answers the dispatcher's questions about our
//! nick, our hostmask and the server's target limits.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use osd_dispatch::{AddressRegistry, Capabilities};
use osd_protocol::{Identifier, IrcMessage, MessageKind, TargetLimits, RPL_ISUPPORT, RPL_WELCOME};

#[derive(Debug)]
struct SessionState {
    nick: String,
    hostmasks: HashMap<Identifier, String>,
    configured: TargetLimits,
    advertised: TargetLimits,
}

#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
}

impl Session {
    /// `configured` limits apply until the server advertises its own.
    pub fn new(nick: impl Into<String>, configured: TargetLimits) -> Self {
        Self {
            state: RwLock::new(SessionState {
                nick: nick.into(),
                hostmasks: HashMap::new(),
                configured,
                advertised: TargetLimits::default(),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn nick(&self) -> String {
        self.read().nick.clone()
    }

    pub fn hostmask(&self, nick: &str) -> Option<String> {
        self.read().hostmasks.get(&Identifier::new(nick)).cloned()
    }

    pub fn advertised_limits(&self) -> TargetLimits {
        self.read().advertised
    }

    pub fn observe(&self, msg: &IrcMessage) {
        let mut state = self.write();

        if let (Some(nick), Some(mask)) = (msg.source_nick(), msg.source_mask()) {
            state.hostmasks.insert(Identifier::new(nick), mask.to_string());
        }

        match msg.command.as_str() {
            RPL_WELCOME => {
                if let Some(nick) = msg.params.first() {
                    if *nick != state.nick {
                        tracing::info!(requested = %state.nick, assigned = %nick, "session: nick assigned");
                        state.nick = nick.clone();
                    }
                }
                // Many servers end the welcome text with our full mask
                let mask = msg
                    .params
                    .last()
                    .and_then(|text| text.split_whitespace().last())
                    .filter(|word| word.contains('!') && word.contains('@'));
                if let Some(mask) = mask {
                    let own = Identifier::new(state.nick.as_str());
                    let matches_nick = mask
                        .split('!')
                        .next()
                        .is_some_and(|n| Identifier::new(n) == own);
                    if matches_nick {
                        state.hostmasks.insert(own, mask.to_string());
                    }
                }
            }
            RPL_ISUPPORT if msg.params.len() > 2 => {
                // params: our nick, tokens..., trailing "are supported" text
                let tokens = &msg.params[1..msg.params.len() - 1];
                if state.advertised.apply_isupport(tokens) {
                    tracing::debug!(limits = ?state.advertised, "session: target limits advertised");
                }
            }
            "NICK" => {
                let (Some(old), Some(new)) = (msg.source_nick(), msg.params.first()) else {
                    return;
                };
                let old_id = Identifier::new(old);
                if let Some(mask) = state.hostmasks.remove(&old_id) {
                    let rest = mask.split_once('!').map_or("", |(_, rest)| rest);
                    state
                        .hostmasks
                        .insert(Identifier::new(new.as_str()), format!("{new}!{rest}"));
                }
                if old_id == Identifier::new(state.nick.as_str()) {
                    tracing::info!(old = %old, new = %new, "session: own nick changed");
                    state.nick = new.clone();
                }
            }
            "QUIT" => {
                if let Some(nick) = msg.source_nick() {
                    let id = Identifier::new(nick);
                    if id != Identifier::new(state.nick.as_str()) {
                        state.hostmasks.remove(&id);
                    }
                }
            }
            _ => {}
        }
    }
}

impl AddressRegistry for Session {
    fn own_nick(&self) -> String {
        self.nick()
    }

    fn full_address(&self, nick: &str) -> Option<String> {
        self.hostmask(nick)
    }
}

impl Capabilities for Session {
    fn max_targets(&self, kind: MessageKind) -> Option<NonZeroUsize> {
        let state = self.read();
        state
            .advertised
            .for_kind(kind)
            .or_else(|| state.configured.for_kind(kind))
    }
}
