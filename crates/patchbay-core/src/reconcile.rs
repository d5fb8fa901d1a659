//! Diff/apply: bring the live connection state in line with a [`RouteGraph`].
//!
//! For each destination in the graph:
//! - live sources that are not required are disconnected, but only when the ledger
//!   says this engine made that connection;
//! - required sources that are not connected are connected and recorded.
//!
//! Every server call is best effort. A failure is logged at debug level and the pass
//! continues; the next pass naturally retries.

use crate::error::RouteError;
use crate::graph::RouteGraph;
use crate::ledger::OwnershipLedger;
use crate::server::RoutingServer;
use serde::{Deserialize, Serialize};

/// Outcome of a single reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub connected: usize,
    pub disconnected: usize,
    /// Connect/disconnect/enumerate calls that failed and were skipped.
    pub failed: usize,
    /// Unrequired live connections left alone because someone else made them.
    pub external: usize,
}

impl ReconcileReport {
    /// True when the pass issued no connect or disconnect call.
    pub fn is_noop(&self) -> bool {
        self.connected == 0 && self.disconnected == 0 && self.failed == 0
    }

    pub fn merge(&mut self, other: ReconcileReport) {
        self.connected += other.connected;
        self.disconnected += other.disconnected;
        self.failed += other.failed;
        self.external += other.external;
    }
}

pub fn reconcile<S>(
    server: &mut S,
    graph: &RouteGraph,
    ledger: &mut OwnershipLedger,
) -> ReconcileReport
where
    S: RoutingServer + ?Sized,
{
    let mut report = ReconcileReport::default();

    // Destinations that vanished (or are no longer managed) take their entries with them
    ledger.retain_destinations(|dest| graph.has_destination(dest));

    for (dest, required) in graph.iter() {
        let live = match server.connections(dest) {
            Ok(live) => live,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", dest, e);
                report.failed += 1;
                continue;
            }
        };
        ledger.retain_live(dest, &live);

        for src in live.iter().filter(|s| !required.contains(*s)) {
            if !ledger.owns(dest, src) {
                report.external += 1;
                continue;
            }
            match server.disconnect(src, dest) {
                Ok(()) => {
                    tracing::debug!("Disconnected {} -> {}", src, dest);
                    ledger.release(dest, src);
                    report.disconnected += 1;
                }
                Err(RouteError::NotConnected { .. }) => {
                    // Gone already, nothing left to own
                    ledger.release(dest, src);
                    report.failed += 1;
                }
                Err(e) => {
                    tracing::debug!("Disconnect {} -> {} failed: {}", src, dest, e);
                    report.failed += 1;
                }
            }
        }

        for src in required.iter().filter(|s| !live.contains(*s)) {
            match server.connect(src, dest) {
                Ok(()) => {
                    tracing::debug!("Connected {} -> {}", src, dest);
                    ledger.record(dest, src);
                    report.connected += 1;
                }
                Err(e) => {
                    tracing::debug!("Connect {} -> {} failed: {}", src, dest, e);
                    report.failed += 1;
                }
            }
        }
    }

    report
}
