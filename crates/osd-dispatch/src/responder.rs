//! Reply helpers for code reacting to an inbound message.

use std::num::NonZeroUsize;

use osd_protocol::{Identifier, IrcMessage, MessageKind};
use osd_split::Destinations;

use crate::{DispatchError, Dispatcher, SendReport};

/// Object-safe view of a dispatcher, so hosts and plugins can hold any
/// sending pipeline behind `dyn`.
pub trait MessageDispatcher: Send + Sync {
    fn dispatch(
        &self,
        messages: &[String],
        destinations: Destinations,
        kind: MessageKind,
        max_frames: Option<NonZeroUsize>,
    ) -> Result<SendReport, DispatchError>;
}

impl MessageDispatcher for Dispatcher {
    fn dispatch(
        &self,
        messages: &[String],
        destinations: Destinations,
        kind: MessageKind,
        max_frames: Option<NonZeroUsize>,
    ) -> Result<SendReport, DispatchError> {
        self.send(messages, destinations, kind, max_frames)
    }
}

/// Where an inbound message came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    /// Channel it was said in, or the speaker's nick for a private message.
    pub sender: String,
    /// Who said it.
    pub nick: String,
}

impl Trigger {
    pub fn new(sender: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            nick: nick.into(),
        }
    }

    /// Build from an inbound `PRIVMSG` or `NOTICE`. Anything else, or a
    /// message without a source nick, yields `None`.
    pub fn from_message(msg: &IrcMessage) -> Option<Self> {
        if msg.command != "PRIVMSG" && msg.command != "NOTICE" {
            return None;
        }
        let nick = msg.source_nick()?;
        let target = msg.params.first()?;
        let sender = if Identifier::new(target.as_str()).is_channel() {
            target.clone()
        } else {
            nick.to_string()
        };
        Some(Self::new(sender, nick))
    }
}

/// Sends on behalf of a [`Trigger`]. The single-message helpers send at
/// most one frame; [`Responder::osd`] sends everything.
pub struct Responder<'a> {
    dispatcher: &'a dyn MessageDispatcher,
    trigger: &'a Trigger,
}

impl<'a> Responder<'a> {
    pub fn new(dispatcher: &'a dyn MessageDispatcher, trigger: &'a Trigger) -> Self {
        Self {
            dispatcher,
            trigger,
        }
    }

    pub fn trigger(&self) -> &Trigger {
        self.trigger
    }

    fn destination(&self, destination: Option<&str>) -> Destinations {
        Destinations::from(destination.unwrap_or(&self.trigger.sender))
    }

    /// Send every message in full, defaulting to the trigger's sender.
    pub fn osd(
        &self,
        messages: &[String],
        destinations: Option<Destinations>,
        kind: MessageKind,
    ) -> Result<SendReport, DispatchError> {
        let destinations =
            destinations.unwrap_or_else(|| Destinations::from(self.trigger.sender.as_str()));
        self.dispatcher.dispatch(messages, destinations, kind, None)
    }

    fn one_frame(
        &self,
        message: String,
        destination: Option<&str>,
        kind: MessageKind,
    ) -> Result<SendReport, DispatchError> {
        self.dispatcher.dispatch(
            &[message],
            self.destination(destination),
            kind,
            Some(NonZeroUsize::MIN),
        )
    }

    pub fn say(&self, message: &str, destination: Option<&str>) -> Result<SendReport, DispatchError> {
        self.one_frame(message.to_string(), destination, MessageKind::Plain)
    }

    pub fn action(
        &self,
        message: &str,
        destination: Option<&str>,
    ) -> Result<SendReport, DispatchError> {
        self.one_frame(message.to_string(), destination, MessageKind::Action)
    }

    pub fn notice(
        &self,
        message: &str,
        destination: Option<&str>,
    ) -> Result<SendReport, DispatchError> {
        self.one_frame(message.to_string(), destination, MessageKind::Notice)
    }

    /// Address `reply_to` (default: the trigger's nick) by name.
    pub fn reply(
        &self,
        message: &str,
        destination: Option<&str>,
        reply_to: Option<&str>,
        notice: bool,
    ) -> Result<SendReport, DispatchError> {
        let reply_to = reply_to.unwrap_or(&self.trigger.nick);
        let kind = if notice {
            MessageKind::Notice
        } else {
            MessageKind::Plain
        };
        self.one_frame(format!("{reply_to}: {message}"), destination, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RecordingTransport, StaticRegistry};
    use osd_governor::{FloodGovernor, FloodPolicy, ManualClock};
    use osd_protocol::TargetLimits;
    use std::sync::Arc;

    fn setup() -> (Dispatcher, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let dispatcher = Dispatcher::new(
            FloodGovernor::new(FloodPolicy::default(), Arc::new(ManualClock::new())),
            transport.clone(),
            Arc::new(StaticRegistry::new("osdbot")),
            Arc::new(TargetLimits::default()),
        );
        (dispatcher, transport)
    }

    fn lines(transport: &RecordingTransport) -> Vec<String> {
        transport.take().into_iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_trigger_from_channel_message() {
        let msg = IrcMessage::parse(":alice!a@host PRIVMSG #rust :hi").unwrap();
        let trigger = Trigger::from_message(&msg).unwrap();
        assert_eq!(trigger, Trigger::new("#rust", "alice"));
    }

    #[test]
    fn test_trigger_from_private_message() {
        let msg = IrcMessage::parse(":alice!a@host PRIVMSG osdbot :hi").unwrap();
        let trigger = Trigger::from_message(&msg).unwrap();
        assert_eq!(trigger, Trigger::new("alice", "alice"));
    }

    #[test]
    fn test_trigger_ignores_other_commands() {
        let msg = IrcMessage::parse(":alice!a@host JOIN #rust").unwrap();
        assert!(Trigger::from_message(&msg).is_none());
        let msg = IrcMessage::parse("PRIVMSG #rust :no prefix").unwrap();
        assert!(Trigger::from_message(&msg).is_none());
    }

    #[test]
    fn test_say_defaults_to_sender() {
        let (dispatcher, transport) = setup();
        let trigger = Trigger::new("#rust", "alice");
        let responder = Responder::new(&dispatcher, &trigger);

        responder.say("hello", None).unwrap();
        responder.say("psst", Some("bob")).unwrap();
        assert_eq!(
            lines(&transport),
            vec!["PRIVMSG #rust :hello", "PRIVMSG bob :psst"]
        );
    }

    #[test]
    fn test_single_frame_helpers_truncate() {
        let (dispatcher, transport) = setup();
        let trigger = Trigger::new("#rust", "alice");
        let responder = Responder::new(&dispatcher, &trigger);

        let long = "z".repeat(1200);
        let report = responder.say(&long, None).unwrap();
        assert_eq!(report.chunks, 1);
        assert_eq!(transport.take().len(), 1);

        let report = responder
            .osd(&[long.clone()], None, MessageKind::Plain)
            .unwrap();
        assert!(report.chunks > 1);
        assert_eq!(transport.take().len(), report.chunks);
    }

    #[test]
    fn test_action_and_notice() {
        let (dispatcher, transport) = setup();
        let trigger = Trigger::new("#rust", "alice");
        let responder = Responder::new(&dispatcher, &trigger);

        responder.action("waves", None).unwrap();
        responder.notice("heads up", None).unwrap();
        assert_eq!(
            lines(&transport),
            vec![
                "PRIVMSG #rust :\u{1}ACTION waves\u{1}",
                "NOTICE #rust :heads up"
            ]
        );
    }

    #[test]
    fn test_reply_prefixes_nick() {
        let (dispatcher, transport) = setup();
        let trigger = Trigger::new("#rust", "alice");
        let responder = Responder::new(&dispatcher, &trigger);

        responder.reply("done", None, None, false).unwrap();
        responder.reply("done", None, Some("carol"), true).unwrap();
        assert_eq!(
            lines(&transport),
            vec!["PRIVMSG #rust :alice: done", "NOTICE #rust :carol: done"]
        );
    }

    #[test]
    fn test_responder_over_trait_object() {
        let (dispatcher, transport) = setup();
        let shared: Arc<dyn MessageDispatcher> = Arc::new(dispatcher);
        let trigger = Trigger::new("alice", "alice");
        let responder = Responder::new(shared.as_ref(), &trigger);

        responder
            .osd(
                &["one".to_string(), "two".to_string()],
                Some(Destinations::from("#a,#b")),
                MessageKind::Plain,
            )
            .unwrap();
        assert_eq!(lines(&transport), vec!["PRIVMSG #a,#b :one    two"]);
    }
}
