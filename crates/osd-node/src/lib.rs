//! OSD Node -- library crate behind the `osd` binary.
//!
//! Exposes config, session tracking, the IRC client and the dry-run planner
//! so integration tests can drive them without the CLI.

pub mod client;
pub mod config;
pub mod plan;
pub mod session;
pub mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use osd_dispatch::{AddressRegistry, Capabilities, Dispatcher, Transport};
use osd_governor::{Clock, FloodGovernor};

use crate::config::OsdConfig;

/// Wire a dispatcher from config and the host's collaborators.
pub fn build_dispatcher(
    cfg: &OsdConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn AddressRegistry>,
    capabilities: Arc<dyn Capabilities>,
) -> Dispatcher {
    let governor = FloodGovernor::new(cfg.flood.policy(), clock);
    Dispatcher::new(governor, transport, registry, capabilities)
        .with_lock_scope(cfg.dispatch.lock_scope)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_or_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
