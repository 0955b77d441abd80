//! Configuration types for the osd binary.
//! Parsed from ~/.osd/config.toml.

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use osd_dispatch::LockScope;
use osd_governor::FloodPolicy;
use osd_protocol::{TargetLimits, LIMITS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OsdConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub flood: FloodSection,
    #[serde(default)]
    pub targmax: TargmaxSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_nick")]
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nick: default_nick(),
            username: default_username(),
            realname: default_realname(),
            channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloodSection {
    #[serde(default = "default_burst")]
    pub burst_capacity: u32,
    #[serde(default = "default_refill")]
    pub refill_per_sec: u32,
    #[serde(default = "default_base_wait_ms")]
    pub base_wait_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,
    #[serde(default = "default_loop_threshold")]
    pub loop_threshold: usize,
    #[serde(default = "default_loop_recency_secs")]
    pub loop_recency_secs: u64,
    #[serde(default = "default_suppress_streak")]
    pub suppress_streak: u32,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
}

impl Default for FloodSection {
    fn default() -> Self {
        Self {
            burst_capacity: default_burst(),
            refill_per_sec: default_refill(),
            base_wait_ms: default_base_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            loop_window: default_loop_window(),
            loop_threshold: default_loop_threshold(),
            loop_recency_secs: default_loop_recency_secs(),
            suppress_streak: default_suppress_streak(),
            history_len: default_history_len(),
        }
    }
}

impl FloodSection {
    pub fn policy(&self) -> FloodPolicy {
        FloodPolicy {
            burst_capacity: self.burst_capacity,
            refill_per_sec: self.refill_per_sec,
            base_wait: Duration::from_millis(self.base_wait_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            loop_window: self.loop_window,
            loop_threshold: self.loop_threshold,
            loop_recency: Duration::from_secs(self.loop_recency_secs),
            suppress_streak: self.suppress_streak,
            history_len: self.history_len,
            ..FloodPolicy::default()
        }
    }
}

/// Max-targets overrides used until the server announces its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargmaxSection {
    pub notice: Option<NonZeroUsize>,
    pub privmsg: Option<NonZeroUsize>,
}

impl TargmaxSection {
    pub fn limits(&self) -> TargetLimits {
        TargetLimits {
            privmsg: self.privmsg,
            notice: self.notice,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSection {
    #[serde(default)]
    pub lock_scope: LockScope,
}

// Default value functions
fn default_host() -> String {
    "irc.libera.chat".into()
}
fn default_port() -> u16 {
    6667
}
fn default_nick() -> String {
    "osdbot".into()
}
fn default_username() -> String {
    "osd".into()
}
fn default_realname() -> String {
    "osd message dispatcher".into()
}
fn default_burst() -> u32 {
    LIMITS.burst_capacity
}
fn default_refill() -> u32 {
    LIMITS.refill_per_sec
}
fn default_base_wait_ms() -> u64 {
    LIMITS.base_wait_ms
}
fn default_max_wait_ms() -> u64 {
    LIMITS.max_wait_ms
}
fn default_loop_window() -> usize {
    LIMITS.loop_window
}
fn default_loop_threshold() -> usize {
    LIMITS.loop_threshold
}
fn default_loop_recency_secs() -> u64 {
    LIMITS.loop_recency_secs
}
fn default_suppress_streak() -> u32 {
    LIMITS.suppress_streak
}
fn default_history_len() -> usize {
    LIMITS.history_len
}

impl OsdConfig {
    /// Load config from file, or fall back to defaults if missing.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: OsdConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// `host:port` to dial.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
