//! Test fixtures for patchbay integration tests.
//!
//! Everything runs against [`MemoryServer`]. The fixture server carries the router,
//! sequencer and mixer ports of a typical system, two physical MIDI inputs, one
//! physical MIDI output and a stereo playback pair.

#![allow(dead_code)]

use parking_lot::Mutex;
use patchbay::devices::{NoRouterControl, StaticLinkProbe};
use patchbay::prelude::*;
use patchbay::RouterControl;
use std::time::{Duration, Instant};

pub const CAPTURE_1: &str = "system:midi_capture_1";
pub const CAPTURE_2: &str = "system:midi_capture_2";
pub const PLAYBACK: &str = "system:midi_playback_1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Short ticks and no sysfs, so identities fall back to port names.
pub fn test_config() -> AutoconnectConfig {
    AutoconnectConfig {
        tick_ms: 5,
        hotplug_interval_ms: 20,
        sysfs_root: "/nonexistent".into(),
        ..AutoconnectConfig::default()
    }
}

pub fn system() -> MemoryServer {
    let server = MemoryServer::new();
    for name in [
        "router:midi_out",
        "router:ctrl_out",
        "router:ch1_out",
        "router:ch2_out",
        "router:main_out",
        "router:step_out",
        "sequencer:output",
        "smf:midi_out",
        "arp:out",
        "x:out",
        "y:out",
        "z:out",
    ] {
        server.add_endpoint(Endpoint::midi_source(name));
    }
    for name in [
        "router:dev0_in",
        "router:dev1_in",
        "router:dev2_in",
        "router:ctrl_in",
        "router:step_in",
        "router:seq_in",
        "sequencer:input",
        "smf:midi_in",
        "synth:in",
        "arp:in",
    ] {
        server.add_endpoint(Endpoint::midi_sink(name));
    }
    server.add_endpoint(Endpoint::midi_source(CAPTURE_1).physical());
    server.add_endpoint(Endpoint::midi_source(CAPTURE_2).physical());
    server.add_endpoint(Endpoint::midi_sink(PLAYBACK).physical());

    for name in ["mono:out_1", "mixer:output_a", "mixer:output_b"] {
        server.add_endpoint(Endpoint::audio_source(name));
    }
    for name in ["fx:in_1", "fx:in_2", "mixer:return_a", "mixer:return_b"] {
        server.add_endpoint(Endpoint::audio_sink(name));
    }
    for name in ["system:playback_1", "system:playback_2"] {
        server.add_endpoint(Endpoint::audio_sink(name).physical());
    }
    server
}

pub fn builder(server: &MemoryServer, chains: &Arc<StaticChainModel>) -> AutoconnectorBuilder {
    Autoconnector::builder()
        .config(test_config())
        .server(server.clone())
        .chains(chains.clone())
        .host_link(Arc::new(StaticLinkProbe::new(false)))
        .router_control(NoRouterControl)
}

pub fn autoconnector(server: &MemoryServer, chains: &Arc<StaticChainModel>) -> Autoconnector {
    builder(server, chains).build().unwrap()
}

/// Poll `condition` for up to two seconds.
pub fn wait_for(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Records passthrough switches.
#[derive(Clone, Default)]
pub struct RecordingRouter {
    pub calls: Arc<Mutex<Vec<(usize, bool)>>>,
}

impl RouterControl for RecordingRouter {
    fn set_device_passthrough(&mut self, slot: usize, enabled: bool) {
        self.calls.lock().push((slot, enabled));
    }
}
