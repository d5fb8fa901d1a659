//! Routing-server health figures for status collaborators.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Server stats snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    /// DSP load in percent.
    pub cpu_load: f32,
    pub sample_rate: u32,
    pub block_size: u32,
    /// Buffer underruns since the engine started.
    pub xruns: u64,
}

/// Counters updated from server callbacks, read from any thread.
#[derive(Debug, Default)]
pub struct ServerTelemetry {
    xruns: AtomicU64,
    /// f32 bits of the last reported load.
    cpu_load: AtomicU32,
}

impl ServerTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called from the server's xrun notification.
    pub fn record_xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn xruns(&self) -> u64 {
        self.xruns.load(Ordering::Relaxed)
    }

    pub fn set_cpu_load(&self, load: f32) {
        self.cpu_load.store(load.to_bits(), Ordering::Relaxed);
    }

    pub fn cpu_load(&self) -> f32 {
        f32::from_bits(self.cpu_load.load(Ordering::Relaxed))
    }

    /// Fill the live counters into a stats snapshot from the server.
    pub fn merge(&self, mut stats: ServerStats) -> ServerStats {
        self.set_cpu_load(stats.cpu_load);
        stats.xruns = self.xruns();
        stats
    }
}
