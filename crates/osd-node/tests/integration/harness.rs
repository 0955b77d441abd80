//! Test harness for in-process osd-node integration tests.
//!
//! Provides FakeServer: a single-connection IRC server on a loopback port
//! that registers the client, echoes JOINs with a fixed hostmask, and
//! records every line it receives until QUIT or disconnect.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use osd_node::config::OsdConfig;
use osd_protocol::{IrcCodec, IrcMessage};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

const SERVER_NAME: &str = "fake.server";

/// How the fake server behaves.
#[derive(Debug, Clone)]
pub struct Script {
    /// 005 tokens sent after the welcome, e.g. `TARGMAX=PRIVMSG:2`.
    pub isupport: Vec<String>,
    /// Host part of the mask echoed in JOINs.
    pub host: String,
    /// Send a PING before anything else.
    pub ping_first: bool,
    /// Refuse the nick with 433 instead of registering.
    pub nick_in_use: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            isupport: Vec::new(),
            host: "h".into(),
            ping_first: false,
            nick_in_use: false,
        }
    }
}

#[allow(dead_code)]
impl Script {
    pub fn isupport(mut self, token: &str) -> Self {
        self.isupport.push(token.to_string());
        self
    }

    pub fn ping_first(mut self) -> Self {
        self.ping_first = true;
        self
    }

    pub fn nick_in_use(mut self) -> Self {
        self.nick_in_use = true;
        self
    }
}

pub struct FakeServer {
    pub addr: SocketAddr,
    handle: JoinHandle<anyhow::Result<Vec<IrcMessage>>>,
}

impl FakeServer {
    pub async fn start(script: Script) -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await?;
            serve(tcp, script).await
        });
        Ok(Self { addr, handle })
    }

    /// Config pointing at this server, joining `channels`.
    pub fn config(&self, channels: &[&str]) -> OsdConfig {
        let mut cfg = OsdConfig::default();
        cfg.server.host = self.addr.ip().to_string();
        cfg.server.port = self.addr.port();
        cfg.server.channels = channels.iter().map(|c| c.to_string()).collect();
        cfg
    }

    /// Everything the client sent, once it has disconnected.
    pub async fn received(self) -> anyhow::Result<Vec<IrcMessage>> {
        tokio::time::timeout(Duration::from_secs(10), self.handle).await??
    }
}

/// `(target, text)` of every received line with the given command.
#[allow(dead_code)]
pub fn payloads(received: &[IrcMessage], command: &str) -> Vec<(String, String)> {
    received
        .iter()
        .filter(|m| m.command == command && m.params.len() >= 2)
        .map(|m| (m.params[0].clone(), m.params[1].clone()))
        .collect()
}

async fn reply(framed: &mut Framed<TcpStream, IrcCodec>, line: &str) -> anyhow::Result<()> {
    framed.send(IrcMessage::parse(line)?).await?;
    Ok(())
}

async fn serve(tcp: TcpStream, script: Script) -> anyhow::Result<Vec<IrcMessage>> {
    let mut framed = Framed::new(tcp, IrcCodec::new());
    let mut received = Vec::new();
    let mut nick = String::from("*");
    let mut user = String::from("user");

    if script.ping_first {
        reply(&mut framed, &format!("PING :{SERVER_NAME}")).await?;
    }

    while let Some(msg) = framed.next().await {
        let msg = msg?;
        received.push(msg.clone());

        match msg.command.as_str() {
            "NICK" => {
                if let Some(n) = msg.params.first() {
                    nick = n.clone();
                }
            }
            "USER" => {
                if let Some(u) = msg.params.first() {
                    user = u.clone();
                }
                if script.nick_in_use {
                    reply(
                        &mut framed,
                        &format!(":{SERVER_NAME} 433 * {nick} :Nickname is already in use"),
                    )
                    .await?;
                    continue;
                }
                reply(
                    &mut framed,
                    &format!(":{SERVER_NAME} 001 {nick} :Welcome to the fake network {nick}"),
                )
                .await?;
                if !script.isupport.is_empty() {
                    let tokens = script.isupport.join(" ");
                    reply(
                        &mut framed,
                        &format!(":{SERVER_NAME} 005 {nick} {tokens} :are supported by this server"),
                    )
                    .await?;
                }
                reply(&mut framed, &format!(":{SERVER_NAME} 376 {nick} :End of /MOTD command."))
                    .await?;
            }
            "JOIN" => {
                if let Some(channel) = msg.params.first() {
                    let host = &script.host;
                    reply(&mut framed, &format!(":{nick}!{user}@{host} JOIN {channel}")).await?;
                }
            }
            "QUIT" => break,
            _ => {}
        }
    }

    Ok(received)
}
