//! Dry run of the send pipeline.
//!
//! Same grouping, budgeting, segmentation and flood decisions as a live
//! send, but frames go to memory and cooldowns advance a manual clock
//! instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use osd_dispatch::{DispatchError, RecordingTransport, SendReport, StaticRegistry};
use osd_governor::ManualClock;
use serde::Serialize;

use crate::client::SendRequest;
use crate::config::OsdConfig;

#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Lines as they would be written, without CRLF.
    pub lines: Vec<String>,
    pub report: SendReport,
    /// Total cooldown a live send would have spent waiting.
    pub simulated_wait_ms: u64,
}

/// Plan `request` as the configured nick. `address` stands in for the
/// hostmask a live session would learn; without it the worst case is
/// assumed.
pub fn plan(
    cfg: &OsdConfig,
    request: &SendRequest,
    address: Option<&str>,
) -> Result<Plan, DispatchError> {
    let mut registry = StaticRegistry::new(cfg.server.nick.clone());
    if let Some(address) = address {
        registry = registry.with_address(address);
    }
    let clock = Arc::new(ManualClock::new());
    let transport = Arc::new(RecordingTransport::new());
    let dispatcher = crate::build_dispatcher(
        cfg,
        clock.clone(),
        transport.clone(),
        Arc::new(registry),
        Arc::new(cfg.targmax.limits()),
    );

    let report = dispatcher.send(
        &request.messages,
        request.destinations.clone(),
        request.kind,
        request.max_frames,
    )?;
    let waited: Duration = clock.sleeps().iter().sum();

    Ok(Plan {
        lines: transport
            .take()
            .into_iter()
            .map(|frame| frame.to_string())
            .collect(),
        report,
        simulated_wait_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
    })
}
