//! End-to-end autoconnect tests against the in-memory routing server.
//!
//! Run with:
//! ```bash
//! cargo test -p patchbay --test autoconnect
//! ```

mod helpers;

use helpers::*;
use patchbay::devices::StaticLinkProbe;
use patchbay::prelude::*;
use patchbay::{ControlSurfaceDriver, DeviceInfo, DeviceMatch, DriverRegistry, ServerTelemetry};
use std::time::Duration;

fn ran(dispatch: Dispatch) -> patchbay::ReconcileReport {
    match dispatch {
        Dispatch::Ran(report) => report,
        Dispatch::Deferred => panic!("expected the pass to run"),
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[test]
fn second_pass_changes_nothing() {
    init_tracing();
    let server = system();
    let chains = Arc::new(StaticChainModel::new(vec![ChainRouting::new(1)
        .midi_channel(0)
        .midi_input("synth:in")
        .midi_route("arp:in", "x:out")]));
    let autoconnector = autoconnector(&server, &chains);

    let first = ran(autoconnector.request_midi_connect(true));
    assert!(first.connected > 0);
    assert!(server.is_connected("router:ch1_out", "synth:in"));
    assert!(server.is_connected("x:out", "arp:in"));

    server.reset_counters();
    let second = ran(autoconnector.request_midi_connect(true));
    assert!(second.is_noop());
    assert_eq!(server.connect_calls(), 0);
    assert_eq!(server.disconnect_calls(), 0);
    assert_eq!(server.alias_writes(), 0);
}

#[test]
fn owned_and_external_connections_on_one_destination() {
    let server = system();
    let chains = Arc::new(StaticChainModel::new(vec![
        ChainRouting::new(1).midi_route("synth:in", "z:out")
    ]));
    let autoconnector = autoconnector(&server, &chains);
    ran(autoconnector.request_midi_connect(true));
    assert!(server.is_connected("z:out", "synth:in"));

    // Someone else patches x into the same destination
    server.connect_external("x:out", "synth:in");
    chains.set(vec![ChainRouting::new(1)
        .midi_route("synth:in", "x:out")
        .midi_route("synth:in", "y:out")]);

    let report = ran(autoconnector.request_midi_connect(true));
    assert_eq!(report.connected, 1);
    assert_eq!(report.disconnected, 1);
    assert!(!server.is_connected("z:out", "synth:in"));
    assert!(server.is_connected("y:out", "synth:in"));
    assert!(server.is_connected("x:out", "synth:in"));

    // Only y is ours: dropping both routes tears down y and leaves x alone
    chains.set(vec![ChainRouting::new(1)]);
    let report = ran(autoconnector.request_midi_connect(true));
    assert_eq!(report.disconnected, 1);
    assert!(!server.is_connected("y:out", "synth:in"));
    assert!(server.is_connected("x:out", "synth:in"));
}

#[test]
fn unrequired_external_connection_survives() {
    let server = system();
    let chains = Arc::new(StaticChainModel::default());
    server.connect_external("arp:out", "synth:in");
    let autoconnector = autoconnector(&server, &chains);

    let report = ran(autoconnector.request_midi_connect(true));
    assert_eq!(report.external, 1);
    assert!(server.is_connected("arp:out", "synth:in"));
}

#[test]
fn fixed_system_routes() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));
    ran(autoconnector.request_midi_connect(true));

    assert!(server.is_connected("sequencer:output", "router:step_in"));
    assert!(server.is_connected("router:step_out", "sequencer:input"));
    assert!(server.is_connected("router:main_out", "smf:midi_in"));
    assert!(server.is_connected("smf:midi_out", "router:seq_in"));
}

#[test]
fn midi_output_follows_policy() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));
    ran(autoconnector.request_midi_connect(true));
    assert!(!server.is_connected("router:midi_out", PLAYBACK));

    autoconnector.set_midi_output_enabled("midi_playback_1", true);
    autoconnector.set_controller_feedback_enabled("midi_playback_1", true);
    ran(autoconnector.request_midi_connect(true));
    assert!(autoconnector.is_midi_output_enabled("midi_playback_1"));
    assert!(server.is_connected("router:midi_out", PLAYBACK));
    assert!(server.is_connected("router:ctrl_out", PLAYBACK));

    autoconnector.set_midi_output_enabled("midi_playback_1", false);
    ran(autoconnector.request_midi_connect(true));
    assert!(!server.is_connected("router:midi_out", PLAYBACK));
    assert!(server.is_connected("router:ctrl_out", PLAYBACK));
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[test]
fn mono_source_fans_out_to_stereo_input() {
    let server = system();
    let chains = Arc::new(StaticChainModel::new(vec![
        ChainRouting::new(1).audio_route("fx", "mono")
    ]));
    let autoconnector = autoconnector(&server, &chains);

    let report = ran(autoconnector.request_audio_connect(true));
    assert!(server.is_connected("mono:out_1", "fx:in_1"));
    assert!(server.is_connected("mono:out_1", "fx:in_2"));
    assert!(server.is_connected("mixer:output_a", "system:playback_1"));
    assert!(server.is_connected("mixer:output_b", "system:playback_2"));
    assert!(report.connected >= 4);

    assert!(ran(autoconnector.request_audio_connect(true)).is_noop());
}

#[test]
fn player_outputs_feed_mixer_returns() {
    let server = system();
    server.add_endpoint(Endpoint::audio_source("player:out_l"));
    server.add_endpoint(Endpoint::audio_source("player:out_r"));
    let player = Arc::new(StaticAudioPlayer::new());
    let chains = Arc::new(StaticChainModel::default());
    let autoconnector = builder(&server, &chains)
        .audio_player(player.clone())
        .build()
        .unwrap();

    ran(autoconnector.request_audio_connect(true));
    assert!(!server.is_connected("player:out_l", "mixer:return_a"));

    player.set(Some(vec!["player:out_l".into(), "player:out_r".into()]));
    ran(autoconnector.request_audio_connect(true));
    assert!(server.is_connected("player:out_l", "mixer:return_a"));
    assert!(server.is_connected("player:out_r", "mixer:return_b"));

    player.set(None);
    ran(autoconnector.request_audio_connect(true));
    assert!(!server.is_connected("player:out_l", "mixer:return_a"));
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[test]
fn slots_survive_unplug_of_another_device() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));
    ran(autoconnector.request_midi_connect(true));

    assert_eq!(autoconnector.device_slot(Direction::Source, "midi_capture_1"), Some(0));
    assert_eq!(autoconnector.device_slot(Direction::Source, "midi_capture_2"), Some(1));
    assert!(server.is_connected(CAPTURE_1, "router:dev0_in"));
    assert!(server.is_connected(CAPTURE_2, "router:dev1_in"));

    server.remove_endpoint(CAPTURE_1);
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(autoconnector.device_slot(Direction::Source, "midi_capture_1"), None);
    assert_eq!(autoconnector.device_slot(Direction::Source, "midi_capture_2"), Some(1));
    assert!(server.is_connected(CAPTURE_2, "router:dev1_in"));

    server.add_endpoint(Endpoint::midi_source(CAPTURE_1).physical());
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(autoconnector.device_slot(Direction::Source, "midi_capture_1"), Some(0));
    assert_eq!(
        autoconnector.stable_uid(Direction::Source, 0).as_deref(),
        Some("midi_capture_1")
    );
}

#[test]
fn seventeenth_device_waits_for_a_free_slot() {
    let server = system();
    for i in 3..=17 {
        server.add_endpoint(Endpoint::midi_source(format!("system:midi_capture_{}", i)).physical());
    }
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));

    let report = ran(autoconnector.request_midi_connect(true));
    assert_eq!(report.failed, 0);
    assert_eq!(autoconnector.devices(Direction::Source).len(), 16);

    let unslotted: Vec<String> = (1..=17)
        .map(|i| format!("midi_capture_{}", i))
        .filter(|uid| autoconnector.device_slot(Direction::Source, uid).is_none())
        .collect();
    assert_eq!(unslotted.len(), 1);

    let freed = autoconnector.stable_uid(Direction::Source, 4).unwrap();
    server.remove_endpoint(&format!("system:{}", freed));
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(autoconnector.device_slot(Direction::Source, &unslotted[0]), Some(4));
}

#[test]
fn friendly_name_labels_endpoint() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(server.aliases_of(CAPTURE_1)[0], "midi_capture_1");

    autoconnector
        .set_friendly_name("midi_capture_1", "Stage keys")
        .unwrap();
    assert_eq!(server.aliases_of(CAPTURE_1), vec!["midi_capture_1", "Stage keys"]);
    assert_eq!(
        autoconnector.friendly_name("midi_capture_1").as_deref(),
        Some("Stage keys")
    );
    assert_eq!(autoconnector.alias_table().get("midi_capture_1"), Some("Stage keys"));

    server.reset_counters();
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(server.alias_writes(), 0);

    let summary = &autoconnector.devices(Direction::Source)[0];
    assert_eq!(summary.friendly_name, "Stage keys");
    assert_eq!(summary.endpoint, CAPTURE_1);
}

#[test]
fn restored_names_apply_on_next_pass() {
    let server = system();
    let mut table = AliasTable::new();
    table.set("midi_capture_2", "Pads");
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .aliases(table)
        .build()
        .unwrap();

    ran(autoconnector.request_midi_connect(true));
    assert_eq!(server.aliases_of(CAPTURE_2)[1], "Pads");
}

#[test]
fn host_link_ports_follow_link_state() {
    let server = system();
    server.add_endpoint(Endpoint::midi_source("f_midi:out").physical());
    let probe = Arc::new(StaticLinkProbe::new(false));
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .host_link(probe.clone())
        .build()
        .unwrap();

    let endpoints = |ac: &Autoconnector| -> Vec<String> {
        ac.devices(Direction::Source)
            .into_iter()
            .map(|d| d.endpoint)
            .collect()
    };

    ran(autoconnector.request_midi_connect(true));
    assert!(!autoconnector.is_host_link_connected());
    assert!(!endpoints(&autoconnector).contains(&"f_midi:out".to_string()));

    probe.set(true);
    ran(autoconnector.request_midi_connect(true));
    assert!(autoconnector.is_host_link_connected());
    assert!(endpoints(&autoconnector).contains(&"f_midi:out".to_string()));
}

// ---------------------------------------------------------------------------
// Control-surface drivers
// ---------------------------------------------------------------------------

struct NoteDriver;

impl ControlSurfaceDriver for NoteDriver {
    fn init(&mut self, _device: &DeviceInfo) -> patchbay::devices::Result<()> {
        Ok(())
    }

    fn on_midi_event(&mut self, event: &[u8]) -> bool {
        event.first().is_some_and(|status| status & 0xF0 == 0x90)
    }
}

#[test]
fn driver_binds_to_matching_device() {
    let server = system();
    let drivers = DriverRegistry::new();
    drivers.register("pads", DeviceMatch::NameContains("capture_2".into()), |_| {
        Box::new(NoteDriver)
    });
    let router = RecordingRouter::default();
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .drivers(drivers)
        .router_control(router.clone())
        .build()
        .unwrap();

    ran(autoconnector.request_midi_connect(true));
    assert_eq!(*router.calls.lock(), vec![(0, true), (1, false)]);
    let devices = autoconnector.devices(Direction::Source);
    assert_eq!(devices[0].driver, None);
    assert_eq!(devices[1].driver.as_deref(), Some("pads"));

    assert!(autoconnector.dispatch_midi_event(1, &[0x90, 60, 100]));
    assert!(!autoconnector.dispatch_midi_event(1, &[0xB0, 7, 100]));
    assert!(!autoconnector.dispatch_midi_event(0, &[0x90, 60, 100]));

    server.remove_endpoint(CAPTURE_2);
    ran(autoconnector.request_midi_connect(true));
    assert_eq!(router.calls.lock()[2..], [(1usize, false), (1, true)]);
    assert!(autoconnector.release_driver(1).is_err());
}

#[test]
fn explicit_release_restores_passthrough() {
    let server = system();
    let drivers = DriverRegistry::new();
    drivers.register("keys", DeviceMatch::Uid("midi_capture_1".into()), |_| {
        Box::new(NoteDriver)
    });
    let router = RecordingRouter::default();
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .drivers(drivers)
        .router_control(router.clone())
        .build()
        .unwrap();

    ran(autoconnector.request_midi_connect(true));
    autoconnector.release_driver(0).unwrap();
    assert_eq!(router.calls.lock().last(), Some(&(0, true)));
    assert_eq!(autoconnector.devices(Direction::Source)[0].driver, None);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn deferred_request_runs_on_watchdog() {
    let server = system();
    let chains = Arc::new(StaticChainModel::new(vec![
        ChainRouting::new(1).midi_route("synth:in", "x:out")
    ]));
    let autoconnector = autoconnector(&server, &chains);

    assert_eq!(autoconnector.request_midi_connect(false), Dispatch::Deferred);
    assert!(!server.is_connected("x:out", "synth:in"));

    autoconnector.start().unwrap();
    assert!(autoconnector.is_running());
    assert!(wait_for(|| server.is_connected("x:out", "synth:in")));
    autoconnector.stop();
    assert!(!autoconnector.is_running());
}

#[test]
fn watchdog_picks_up_hotplug() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));
    autoconnector.start().unwrap();
    assert!(wait_for(|| server.is_connected(CAPTURE_1, "router:dev0_in")));

    server.add_endpoint(Endpoint::midi_source("system:midi_capture_3").physical());
    assert!(wait_for(|| server.is_connected("system:midi_capture_3", "router:dev2_in")));
    autoconnector.stop();
}

#[test]
fn watchdog_follows_host_link_state() {
    let server = system();
    server.add_endpoint(Endpoint::midi_source("f_midi:out").physical());
    let probe = Arc::new(StaticLinkProbe::new(false));
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .host_link(probe.clone())
        .build()
        .unwrap();
    autoconnector.start().unwrap();
    assert!(wait_for(|| server.is_connected(CAPTURE_1, "router:dev0_in")));

    let host_slot = |ac: &Autoconnector| {
        ac.devices(Direction::Source)
            .into_iter()
            .find(|d| d.endpoint == "f_midi:out")
            .map(|d| d.slot)
    };
    assert_eq!(host_slot(&autoconnector), None);

    // Link comes up: no request, the hot-plug check alone connects the port
    probe.set(true);
    assert!(wait_for(|| autoconnector.is_host_link_connected()));
    assert!(wait_for(|| host_slot(&autoconnector).is_some_and(|slot| {
        server.is_connected("f_midi:out", &format!("router:dev{}_in", slot))
    })));
    let slot = host_slot(&autoconnector).unwrap();
    let router_in = format!("router:dev{}_in", slot);

    probe.set(false);
    assert!(wait_for(|| !server.is_connected("f_midi:out", &router_in)));
    assert!(!autoconnector.is_host_link_connected());
    assert_eq!(host_slot(&autoconnector), None);
    autoconnector.stop();
}

#[test]
fn pause_holds_requests_until_resume() {
    let server = system();
    let chains = Arc::new(StaticChainModel::default());
    let autoconnector = autoconnector(&server, &chains);
    autoconnector.start().unwrap();
    assert!(wait_for(|| server.is_connected(CAPTURE_1, "router:dev0_in")));

    autoconnector.pause();
    assert!(autoconnector.is_paused());
    assert!(autoconnector.is_running());
    chains.upsert(ChainRouting::new(1).midi_route("synth:in", "y:out"));
    assert_eq!(autoconnector.request_midi_connect(true), Dispatch::Deferred);
    std::thread::sleep(Duration::from_millis(50));
    assert!(!server.is_connected("y:out", "synth:in"));

    autoconnector.resume();
    assert!(wait_for(|| server.is_connected("y:out", "synth:in")));
    autoconnector.stop();
}

#[test]
fn restart_after_stop() {
    let server = system();
    let chains = Arc::new(StaticChainModel::default());
    let autoconnector = autoconnector(&server, &chains);
    autoconnector.start().unwrap();
    autoconnector.stop();

    chains.upsert(ChainRouting::new(1).midi_route("synth:in", "z:out"));
    autoconnector.start().unwrap();
    assert!(wait_for(|| server.is_connected("z:out", "synth:in")));
}

#[test]
fn runs_degraded_without_server() {
    let autoconnector = Autoconnector::builder()
        .config(test_config())
        .host_link(Arc::new(StaticLinkProbe::new(false)))
        .build()
        .unwrap();

    assert!(ran(autoconnector.request_midi_connect(true)).is_noop());
    assert!(ran(autoconnector.request_audio_connect(true)).is_noop());
    assert!(autoconnector.devices(Direction::Source).is_empty());

    autoconnector.set_friendly_name("midi_capture_1", "Keys").unwrap();
    assert_eq!(autoconnector.friendly_name("midi_capture_1").as_deref(), Some("Keys"));

    autoconnector.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    autoconnector.stop();
}

#[test]
fn stats_carry_xruns() {
    let telemetry = Arc::new(ServerTelemetry::new());
    let server = system().with_telemetry(telemetry.clone());
    let autoconnector = builder(&server, &Arc::new(StaticChainModel::default()))
        .telemetry(telemetry)
        .build()
        .unwrap();

    server.simulate_xrun();
    server.simulate_xrun();
    let stats = autoconnector.stats();
    assert_eq!(stats.xruns, 2);
    assert_eq!(stats.sample_rate, 48000);
    assert_eq!(autoconnector.telemetry().xruns(), 2);
}

#[test]
fn stats_use_server_counters_by_default() {
    let server = system();
    let autoconnector = autoconnector(&server, &Arc::new(StaticChainModel::default()));

    server.simulate_xrun();
    assert_eq!(autoconnector.stats().xruns, 1);
    assert_eq!(autoconnector.telemetry().xruns(), 1);
}
