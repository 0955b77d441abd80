//! Dispatcher -- one `send` call from text to flood-gated frames.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use osd_governor::{FloodGovernor, Verdict};
use osd_protocol::{sanitize, MessageKind, OutboundFrame, DEFAULT_MAX_TARGETS};
use osd_split::{group, segment, sender_address_len, Destinations, FrameBudget};
use serde::{Deserialize, Serialize};

use crate::{AddressRegistry, Capabilities, DispatchError, Transport};

/// How widely the check-and-emit step is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    /// One critical section for every target and caller. A cooldown on one
    /// target stalls frames to all others.
    #[default]
    Global,
    /// One critical section per destination group. Cooldowns only stall
    /// frames to the same group, and frames to different groups from
    /// concurrent callers may interleave.
    PerTarget,
}

/// Outcome of one `send` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    /// Destination groups addressed.
    pub groups: usize,
    /// Chunks per group after truncation.
    pub chunks: usize,
    /// Payload bytes available per frame.
    pub budget: i64,
    /// Frames written to the transport.
    pub emitted: usize,
    /// Frames written with their text replaced by the loop placeholder.
    pub replaced: usize,
    /// Frames dropped by loop suppression.
    pub suppressed: usize,
}

/// The send pipeline: group -> budget -> segment -> flood gate -> transport.
pub struct Dispatcher {
    governor: FloodGovernor,
    transport: Arc<dyn Transport>,
    registry: Arc<dyn AddressRegistry>,
    capabilities: Arc<dyn Capabilities>,
    lock_scope: LockScope,
    send_lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        governor: FloodGovernor,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn AddressRegistry>,
        capabilities: Arc<dyn Capabilities>,
    ) -> Self {
        Self {
            governor,
            transport,
            registry,
            capabilities,
            lock_scope: LockScope::Global,
            send_lock: Mutex::new(()),
        }
    }

    pub fn with_lock_scope(mut self, lock_scope: LockScope) -> Self {
        self.lock_scope = lock_scope;
        self
    }

    pub fn governor(&self) -> &FloodGovernor {
        &self.governor
    }

    pub fn lock_scope(&self) -> LockScope {
        self.lock_scope
    }

    fn critical_section(&self) -> Option<MutexGuard<'_, ()>> {
        match self.lock_scope {
            LockScope::Global => Some(
                self.send_lock
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            ),
            LockScope::PerTarget => None,
        }
    }

    /// Deliver `messages` to `destinations`.
    ///
    /// Everything that can fail is checked before any flood state is
    /// touched. With `max_frames`, only the first that many chunks are sent
    /// to each group. Blocks while a target is cooling down. Stops between
    /// chunks once the transport reports itself closed.
    pub fn send<S: AsRef<str>>(
        &self,
        messages: &[S],
        destinations: impl Into<Destinations>,
        kind: MessageKind,
        max_frames: Option<NonZeroUsize>,
    ) -> Result<SendReport, DispatchError> {
        let max_targets = self
            .capabilities
            .max_targets(kind)
            .unwrap_or(DEFAULT_MAX_TARGETS);
        let groups = group(destinations, max_targets)?;

        let nick = self.registry.own_nick();
        let address = self.registry.full_address(&nick);
        let budget =
            FrameBudget::for_groups(sender_address_len(&nick, address.as_deref()), &groups);

        let messages: Vec<String> = messages.iter().map(|m| sanitize(m.as_ref())).collect();
        let mut chunks = segment(&messages, budget)?;
        if let Some(max) = max_frames {
            chunks.truncate(max.get());
        }

        tracing::debug!(
            %kind,
            groups = groups.len(),
            chunks = chunks.len(),
            budget = budget.bytes(),
            address_known = address.is_some(),
            "dispatch: sending"
        );

        let mut report = SendReport {
            groups: groups.len(),
            chunks: chunks.len(),
            budget: budget.bytes(),
            ..Default::default()
        };

        for group in &groups {
            let target = group.identifier();
            self.governor.begin_burst(&target);

            for chunk in &chunks {
                if self.transport.is_closed() {
                    tracing::info!(
                        emitted = report.emitted,
                        "dispatch: transport closed, abandoning send"
                    );
                    return Err(DispatchError::TransportClosed {
                        emitted: report.emitted,
                    });
                }
                let _section = self.critical_section();
                let verdict = self.governor.gate(&target, chunk, kind, |emission| {
                    self.transport.write_frame(OutboundFrame::new(
                        emission.kind,
                        group.as_str(),
                        &emission.text,
                    ));
                });

                match verdict {
                    Verdict::Emit(emission) => {
                        report.emitted += 1;
                        if emission.replaced {
                            report.replaced += 1;
                        }
                    }
                    Verdict::Suppressed { .. } => report.suppressed += 1,
                }
            }
        }

        if report.suppressed > 0 {
            tracing::info!(
                suppressed = report.suppressed,
                emitted = report.emitted,
                "dispatch: repeat loop suppressed frames"
            );
        }
        Ok(report)
    }
}
