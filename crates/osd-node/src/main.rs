//! osd -- deliver text to IRC targets without flooding or overlong lines.
//!
//! Usage:
//!   osd send -t '#chan,alice' "hello" "world"   # connect, deliver, quit
//!   osd plan -t '#a,#b,#c' --json < notes.txt   # dry run, no network
//!   osd config                                  # print effective config

use std::io::{BufRead, IsTerminal};
use std::num::NonZeroUsize;

use clap::{Args, Parser, Subcommand};

use osd_dispatch::Destinations;
use osd_node::client::{self, SendRequest};
use osd_node::config::OsdConfig;
use osd_node::expand_tilde;
use osd_node::plan;
use osd_protocol::MessageKind;

#[derive(Parser)]
#[command(name = "osd", about = "Flood-safe IRC message dispatcher")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "~/.osd/config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the configured server and deliver the messages
    Send {
        #[command(flatten)]
        message: MessageArgs,
        /// Override the configured server host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured server port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured nick
        #[arg(long)]
        nick: Option<String>,
    },
    /// Show the frames a send would produce, without connecting
    Plan {
        #[command(flatten)]
        message: MessageArgs,
        /// Assume this nick!user@host instead of the worst case
        #[arg(long)]
        address: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
struct MessageArgs {
    /// Comma-separated targets
    #[arg(short, long)]
    to: String,
    /// privmsg, action or notice
    #[arg(short, long, default_value = "privmsg")]
    kind: String,
    /// Send at most this many frames per target group
    #[arg(long)]
    max_frames: Option<NonZeroUsize>,
    /// Messages to send; read from stdin, one per line, if none given
    messages: Vec<String>,
}

impl MessageArgs {
    fn into_request(self) -> anyhow::Result<SendRequest> {
        let messages = if self.messages.is_empty() {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                anyhow::bail!("no messages given and stdin is a terminal");
            }
            stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
        } else {
            self.messages
        };
        Ok(SendRequest {
            messages,
            destinations: Destinations::from(self.to),
            kind: MessageKind::normalize(&self.kind),
            max_frames: self.max_frames,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osd_node=info,osd_dispatch=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let mut cfg = OsdConfig::load_or_default(&config_path)?;

    match cli.command {
        Commands::Send {
            message,
            host,
            port,
            nick,
        } => {
            if let Some(host) = host {
                cfg.server.host = host;
            }
            if let Some(port) = port {
                cfg.server.port = port;
            }
            if let Some(nick) = nick {
                cfg.server.nick = nick;
            }
            let request = message.into_request()?;

            tokio::select! {
                report = client::send(&cfg, request) => {
                    let report = report?;
                    if report.suppressed > 0 {
                        eprintln!("{} frame(s) suppressed as a repeat loop", report.suppressed);
                    }
                }
                // dropping the send closes the frame channel; the worker
                // stops before its next chunk
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("interrupted");
                }
            }
        }
        Commands::Plan {
            message,
            address,
            json,
        } => {
            let request = message.into_request()?;
            let plan = plan::plan(&cfg, &request, address.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for line in &plan.lines {
                    println!("{line}");
                }
                eprintln!(
                    "{} frame(s), {} suppressed, budget {} bytes, ~{} ms cooldown",
                    plan.report.emitted,
                    plan.report.suppressed,
                    plan.report.budget,
                    plan.simulated_wait_ms
                );
            }
        }
        Commands::Config => {
            println!("# {}", config_path.display());
            print!("{}", toml::to_string_pretty(&cfg)?);
        }
    }

    Ok(())
}
