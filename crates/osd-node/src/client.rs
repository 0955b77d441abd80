//! One-shot IRC connection: connect, register, join, deliver, quit.
//!
//! The dispatcher blocks during flood cooldowns, so it runs on a
//! `spawn_blocking` worker and hands frames back over a channel. The
//! connection task keeps answering PINGs while frames trickle in.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use osd_dispatch::{Dispatcher, SendReport};
use osd_governor::SystemClock;
use osd_protocol::{
    Identifier, IrcCodec, IrcMessage, MessageKind, OutboundFrame, ProtocolError, ERR_NICKNAMEINUSE,
    ERR_NOMOTD, RPL_ENDOFMOTD,
};
use osd_split::Destinations;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::config::{OsdConfig, ServerSection};
use crate::session::Session;
use crate::transport::ChannelTransport;

/// Give up if the server has not finished registration by then.
pub const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for JOIN confirmations before sending anyway.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Numerics that refuse a JOIN: no such channel, too many channels, full,
/// invite only, banned, bad key.
const JOIN_REFUSALS: [&str; 6] = ["403", "405", "471", "473", "474", "475"];

/// One batch of text to deliver.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub messages: Vec<String>,
    pub destinations: Destinations,
    pub kind: MessageKind,
    pub max_frames: Option<NonZeroUsize>,
}

type IrcFramed = Framed<TcpStream, IrcCodec>;

pub struct Connection {
    sink: SplitSink<IrcFramed, IrcMessage>,
    stream: SplitStream<IrcFramed>,
    session: Arc<Session>,
}

impl Connection {
    pub async fn connect(cfg: &OsdConfig) -> Result<Self> {
        let addr = cfg.server_addr();
        let tcp = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("connecting to {addr}"))?;
        tracing::info!(server = %addr, "connected");

        let (sink, stream) = Framed::new(tcp, IrcCodec::new()).split::<IrcMessage>();
        Ok(Self {
            sink,
            stream,
            session: Arc::new(Session::new(&cfg.server.nick, cfg.targmax.limits())),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    async fn write(&mut self, msg: IrcMessage) -> Result<()> {
        tracing::trace!(line = %msg, "send");
        self.sink.send(msg).await?;
        Ok(())
    }

    /// Record what `inbound` teaches us and answer keep-alives.
    async fn on_inbound(
        &mut self,
        inbound: Option<Result<IrcMessage, ProtocolError>>,
    ) -> Result<IrcMessage> {
        let msg = match inbound {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => return Err(e).context("reading from server"),
            None => bail!("server closed the connection"),
        };
        tracing::trace!(line = %msg, "recv");
        self.session.observe(&msg);

        match msg.command.as_str() {
            "PING" => self.write(IrcMessage::new("PONG", msg.params.clone())).await?,
            "ERROR" => bail!(
                "server error: {}",
                msg.params.last().map(String::as_str).unwrap_or_default()
            ),
            _ => {}
        }
        Ok(msg)
    }

    async fn next_message(&mut self) -> Result<IrcMessage> {
        let inbound = self.stream.next().await;
        self.on_inbound(inbound).await
    }

    /// Send NICK/USER and wait for the end of the MOTD.
    pub async fn register(&mut self, server: &ServerSection) -> Result<()> {
        self.write(IrcMessage::new("NICK", vec![server.nick.clone()]))
            .await?;
        self.write(IrcMessage::new(
            "USER",
            vec![
                server.username.clone(),
                "0".into(),
                "*".into(),
                server.realname.clone(),
            ],
        ))
        .await?;

        let handshake = async {
            loop {
                let msg = self.next_message().await?;
                match msg.command.as_str() {
                    RPL_ENDOFMOTD | ERR_NOMOTD => return Ok::<_, anyhow::Error>(()),
                    ERR_NICKNAMEINUSE => bail!("nick {} is already in use", server.nick),
                    _ => {}
                }
            }
        };
        tokio::time::timeout(REGISTRATION_TIMEOUT, handshake)
            .await
            .context("timed out waiting for registration")??;

        tracing::info!(nick = %self.session.nick(), "registered");
        Ok(())
    }

    /// Join `channels` and wait (bounded) for the server to confirm. The
    /// echoed JOIN carries our full hostmask, which tightens the budget.
    pub async fn join(&mut self, channels: &[String]) -> Result<()> {
        if channels.is_empty() {
            return Ok(());
        }
        for channel in channels {
            self.write(IrcMessage::new("JOIN", vec![channel.clone()]))
                .await?;
        }

        let mut pending: HashSet<Identifier> =
            channels.iter().map(|c| Identifier::new(c.as_str())).collect();
        let confirm = async {
            while !pending.is_empty() {
                let msg = self.next_message().await?;
                let own = Identifier::new(self.session.nick());
                if msg.command == "JOIN" {
                    let from_us = msg.source_nick().map(Identifier::new).as_ref() == Some(&own);
                    if let (true, Some(channel)) = (from_us, msg.params.first()) {
                        pending.remove(&Identifier::new(channel.as_str()));
                    }
                } else if JOIN_REFUSALS.contains(&msg.command.as_str()) {
                    if let Some(channel) = msg.params.get(1) {
                        tracing::warn!(%channel, numeric = %msg.command, "join refused");
                        pending.remove(&Identifier::new(channel.as_str()));
                    }
                }
            }
            Ok::<_, anyhow::Error>(())
        };

        match tokio::time::timeout(JOIN_TIMEOUT, confirm).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!("join not confirmed in time, sending anyway"),
        }
        Ok(())
    }

    /// Run `dispatcher` on a blocking worker and write its frames as they
    /// arrive on `frames`. Returns once the worker is done and every frame
    /// has been written.
    pub async fn deliver(
        &mut self,
        dispatcher: Dispatcher,
        mut frames: mpsc::UnboundedReceiver<OutboundFrame>,
        request: SendRequest,
    ) -> Result<SendReport> {
        let worker = tokio::task::spawn_blocking(move || {
            dispatcher.send(
                &request.messages,
                request.destinations,
                request.kind,
                request.max_frames,
            )
        });

        loop {
            tokio::select! {
                frame = frames.recv() => match frame {
                    Some(frame) => self.write(IrcMessage::from(frame)).await?,
                    // worker finished and dropped its transport
                    None => break,
                },
                inbound = self.stream.next() => {
                    self.on_inbound(inbound).await?;
                }
            }
        }

        let report = worker.await.context("dispatch worker panicked")??;
        tracing::info!(
            emitted = report.emitted,
            suppressed = report.suppressed,
            groups = report.groups,
            "delivered"
        );
        Ok(report)
    }

    pub async fn quit(mut self, reason: &str) -> Result<()> {
        self.write(IrcMessage::new("QUIT", vec![reason.to_string()]))
            .await?;
        self.sink.close().await?;
        Ok(())
    }
}

/// Connect with `cfg`, deliver `request`, and disconnect.
pub async fn send(cfg: &OsdConfig, request: SendRequest) -> Result<SendReport> {
    let mut conn = Connection::connect(cfg).await?;
    conn.register(&cfg.server).await?;
    conn.join(&cfg.server.channels).await?;

    let (transport, frames) = ChannelTransport::channel();
    let session = conn.session().clone();
    let dispatcher = crate::build_dispatcher(
        cfg,
        Arc::new(SystemClock),
        Arc::new(transport),
        session.clone(),
        session,
    );

    let result = conn.deliver(dispatcher, frames, request).await;
    match conn.quit("osd: done").await {
        Err(e) if result.is_ok() => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "quit after failed delivery");
            result
        }
        Ok(()) => result,
    }
}
