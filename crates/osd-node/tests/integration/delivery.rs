//! End-to-end delivery through a fake IRC server.

use std::sync::Arc;
use std::time::Duration;

use osd_dispatch::{DispatchError, Destinations, StaticRegistry};
use osd_governor::SystemClock;
use osd_node::client::{self, SendRequest};
use osd_node::config::OsdConfig;
use osd_node::transport::ChannelTransport;
use osd_protocol::{MessageKind, TargetLimits};

use crate::harness::{payloads, FakeServer, Script};

fn request(messages: &[&str], to: &str, kind: MessageKind) -> SendRequest {
    SendRequest {
        messages: messages.iter().map(|m| m.to_string()).collect(),
        destinations: Destinations::from(to),
        kind,
        max_frames: None,
    }
}

fn pair(target: &str, text: &str) -> (String, String) {
    (target.to_string(), text.to_string())
}

#[tokio::test]
async fn test_targmax_from_server_splits_groups() {
    let server = FakeServer::start(Script::default().isupport("TARGMAX=PRIVMSG:2,NOTICE:"))
        .await
        .unwrap();
    let cfg = server.config(&[]);

    let report = client::send(&cfg, request(&["hi"], "#a,#b,#c", MessageKind::Plain))
        .await
        .unwrap();
    assert_eq!(report.groups, 2);

    let received = server.received().await.unwrap();
    assert_eq!(
        payloads(&received, "PRIVMSG"),
        vec![pair("#b,#c", "hi"), pair("#a", "hi")]
    );
    assert_eq!(received.last().map(|m| m.command.as_str()), Some("QUIT"));
}

#[tokio::test]
async fn test_join_echo_tightens_budget() {
    let server = FakeServer::start(Script::default()).await.unwrap();
    let cfg = server.config(&["#chan"]);
    let long = "A".repeat(1000);

    let report = client::send(&cfg, request(&[long.as_str()], "#chan", MessageKind::Plain))
        .await
        .unwrap();
    // ":osdbot!osd@h" is 12 bytes of mask instead of the 81-byte estimate
    assert_eq!(report.budget, 512 - 15 - 12 - 5);

    let received = server.received().await.unwrap();
    let lens: Vec<usize> = payloads(&received, "PRIVMSG")
        .iter()
        .map(|(_, text)| text.len())
        .collect();
    assert_eq!(lens, vec![480, 480, 40]);
}

#[tokio::test]
async fn test_notice_and_action_on_the_wire() {
    let server = FakeServer::start(Script::default()).await.unwrap();
    let cfg = server.config(&[]);

    let mut req = request(&["waves"], "#chan", MessageKind::normalize("action"));
    client::send(&cfg, req.clone()).await.unwrap();
    let received = server.received().await.unwrap();
    assert_eq!(
        payloads(&received, "PRIVMSG"),
        vec![pair("#chan", "\u{1}ACTION waves\u{1}")]
    );

    let server = FakeServer::start(Script::default()).await.unwrap();
    let cfg = server.config(&[]);
    req.kind = MessageKind::normalize("NOTICE");
    client::send(&cfg, req).await.unwrap();
    let received = server.received().await.unwrap();
    assert_eq!(payloads(&received, "NOTICE"), vec![pair("#chan", "waves")]);
}

#[tokio::test]
async fn test_ping_answered_during_registration() {
    let server = FakeServer::start(Script::default().ping_first())
        .await
        .unwrap();
    let cfg = server.config(&[]);

    client::send(&cfg, request(&["hi"], "alice", MessageKind::Plain))
        .await
        .unwrap();

    let received = server.received().await.unwrap();
    let pong = received.iter().find(|m| m.command == "PONG").unwrap();
    assert_eq!(pong.params, vec!["fake.server"]);
    assert_eq!(payloads(&received, "PRIVMSG"), vec![pair("alice", "hi")]);
}

#[tokio::test]
async fn test_nick_in_use_aborts_before_sending() {
    let server = FakeServer::start(Script::default().nick_in_use())
        .await
        .unwrap();
    let cfg = server.config(&["#chan"]);

    let err = client::send(&cfg, request(&["hi"], "#chan", MessageKind::Plain))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already in use"), "{err}");

    let received = server.received().await.unwrap();
    assert!(payloads(&received, "PRIVMSG").is_empty());
    assert!(received.iter().all(|m| m.command != "JOIN"));
}

#[tokio::test]
async fn test_bad_destinations_still_quit() {
    let server = FakeServer::start(Script::default()).await.unwrap();
    let cfg = server.config(&[]);

    let err = client::send(&cfg, request(&["hi"], " , ", MessageKind::Plain))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("destination"), "{err}");

    let received = server.received().await.unwrap();
    assert!(payloads(&received, "PRIVMSG").is_empty());
    assert_eq!(received.last().map(|m| m.command.as_str()), Some("QUIT"));
}

#[tokio::test]
async fn test_max_frames_per_group() {
    let server = FakeServer::start(Script::default()).await.unwrap();
    let cfg = server.config(&[]);
    let mut req = request(&["word ".repeat(300).as_str()], "#a,#b,#c,#d,#e", MessageKind::Plain);
    req.max_frames = std::num::NonZeroUsize::new(1);

    let report = client::send(&cfg, req).await.unwrap();
    assert_eq!(report.chunks, 1);

    let received = server.received().await.unwrap();
    let targets: Vec<String> = payloads(&received, "PRIVMSG")
        .into_iter()
        .map(|(target, _)| target)
        .collect();
    assert_eq!(targets, vec!["#b,#c,#d,#e", "#a"]);
}

#[tokio::test]
async fn test_abandoned_send_stops_worker() {
    let cfg = OsdConfig::default();
    let (transport, mut frames) = ChannelTransport::channel();
    let dispatcher = osd_node::build_dispatcher(
        &cfg,
        Arc::new(SystemClock),
        Arc::new(transport),
        Arc::new(StaticRegistry::new("osdbot")),
        Arc::new(TargetLimits::default()),
    );
    // distinct and unpackable: eight frames, four of them past the burst
    let messages: Vec<String> = (0..8).map(|i| format!("{i}{}", "y".repeat(300))).collect();

    let worker = tokio::task::spawn_blocking(move || {
        dispatcher.send(&messages, "#chan", MessageKind::Plain, None)
    });

    assert!(frames.recv().await.is_some());
    drop(frames);

    let result = tokio::time::timeout(Duration::from_secs(5), worker)
        .await
        .expect("worker kept cooling down after the connection went away")
        .unwrap();
    assert!(matches!(result, Err(DispatchError::TransportClosed { .. })));
}
