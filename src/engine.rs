//! The autoconnector service object.
//!
//! All mutable state (routing-server handle, device slots, identities, alias table,
//! ownership ledgers, bound drivers) sits behind one mutex. Every MIDI or audio
//! pass runs with that lock held, so passes never interleave with each other or
//! with structural changes requested from other threads.

use crate::audio_routes::{audio_graph, AudioExtras};
use crate::builder::AutoconnectorBuilder;
use crate::chain::{AudioPlayerLookup, ChainModel};
use crate::config::AutoconnectConfig;
use crate::midi_routes::{hardware_endpoints, midi_graph, HardwareSet, OutputPolicy};
use crate::watchdog::{Command, RunState, Watchdog};
use crate::Result;
use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use patchbay_core::{
    reconcile, Direction, EndpointFilter, OwnershipLedger, PortKind, ReconcileReport,
    RoutingServer, ServerStats, ServerTelemetry,
};
use patchbay_devices::{
    AliasTable, DeviceInfo, DeviceRegistry, DriverBindings, DriverRegistry, HostLinkProbe,
    IdentityManager, RouterControl, SlotEvent,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The pass ran on the caller's thread.
    Ran(ReconcileReport),
    /// The pass will run on the next watchdog tick.
    Deferred,
}

impl Dispatch {
    pub fn report(&self) -> Option<&ReconcileReport> {
        match self {
            Dispatch::Ran(report) => Some(report),
            Dispatch::Deferred => None,
        }
    }
}

/// A slotted device, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub slot: usize,
    pub uid: String,
    pub endpoint: String,
    pub friendly_name: String,
    /// Control-surface driver bound to the slot (inputs only).
    pub driver: Option<String>,
}

pub(crate) struct State {
    pub server: Option<Box<dyn RoutingServer>>,
    pub registry: DeviceRegistry,
    pub identity: IdentityManager,
    pub aliases: AliasTable,
    pub midi_ledger: OwnershipLedger,
    pub audio_ledger: OwnershipLedger,
    pub bindings: DriverBindings,
    pub router: Box<dyn RouterControl>,
    pub policy: OutputPolicy,
    pub pitch_tracking: bool,
    pub host_link_up: bool,
    pub hardware_signature: Vec<String>,
}

pub(crate) struct Shared {
    pub config: AutoconnectConfig,
    pub state: Mutex<State>,
    pub chains: Arc<dyn ChainModel>,
    pub player: Option<Arc<dyn AudioPlayerLookup>>,
    pub drivers: DriverRegistry,
    pub host_link: Arc<dyn HostLinkProbe>,
    pub telemetry: Arc<ServerTelemetry>,
    pub stats: ArcSwap<ServerStats>,
    pub run_state: AtomicU8,
    pub commands_tx: Sender<Command>,
    pub commands_rx: Receiver<Command>,
}

impl Shared {
    pub fn run_state(&self) -> RunState {
        RunState::from(self.run_state.load(Ordering::Acquire))
    }

    pub fn set_run_state(&self, state: RunState) {
        self.run_state.store(state as u8, Ordering::Release);
    }

    pub fn send(&self, command: Command) {
        // Both channel ends live in `Shared`, so the channel never disconnects
        let _ = self.commands_tx.send(command);
    }

    fn hardware(&self, state: &mut State, server: &dyn RoutingServer) -> HardwareSet {
        let up = self.host_link.is_connected();
        if up != state.host_link_up {
            tracing::info!("Host USB link {}", if up { "up" } else { "down" });
            state.host_link_up = up;
        }
        hardware_endpoints(server, &self.config, &mut state.identity, up)
    }

    /// Watchdog check: did the hardware set or the host link change since the
    /// last MIDI pass? Also refreshes the stats snapshot.
    pub fn hardware_changed(&self, state: &mut State) -> bool {
        let Some(server) = state.server.take() else {
            return false;
        };
        self.stats.store(Arc::new(server.stats()));
        let link_before = state.host_link_up;
        let hw = self.hardware(state, server.as_ref());
        state.server = Some(server);
        hw.signature() != state.hardware_signature || link_before != state.host_link_up
    }

    pub fn midi_pass(&self, state: &mut State) -> ReconcileReport {
        let Some(mut server) = state.server.take() else {
            return ReconcileReport::default();
        };

        let hw = self.hardware(state, server.as_ref());
        for event in state.registry.refresh_slots(&hw.sources, &hw.sinks) {
            self.on_slot_event(state, event);
        }
        let labelled: Vec<_> = hw.endpoints().cloned().collect();
        let writes = state
            .identity
            .refresh_aliases(server.as_mut(), &labelled, &state.aliases);
        if writes > 0 {
            tracing::debug!("Relabelled {} endpoints", writes);
        }

        let live = server.endpoints(&EndpointFilter {
            kind: Some(PortKind::Midi),
            ..EndpointFilter::default()
        });
        let chains = self.chains.chains();
        let graph = midi_graph(
            &self.config,
            &live,
            &hw,
            &state.registry,
            &chains,
            &state.policy,
        );
        let report = reconcile(server.as_mut(), &graph, &mut state.midi_ledger);

        state.bindings.refresh_all();
        state.hardware_signature = hw.signature();
        state.server = Some(server);
        if !report.is_noop() {
            tracing::debug!("MIDI pass: {:?}", report);
        }
        report
    }

    pub fn audio_pass(&self, state: &mut State) -> ReconcileReport {
        let Some(server) = state.server.as_mut() else {
            return ReconcileReport::default();
        };

        let live = server.endpoints(&EndpointFilter {
            kind: Some(PortKind::Audio),
            ..EndpointFilter::default()
        });
        let extras = AudioExtras {
            player_outputs: self.player.as_ref().and_then(|p| p.player_outputs()),
            pitch_tracking: state.pitch_tracking,
        };
        let chains = self.chains.chains();
        let graph = audio_graph(&self.config, &live, &chains, &extras);
        let report = reconcile(server.as_mut(), &graph, &mut state.audio_ledger);

        if !report.is_noop() {
            tracing::debug!("Audio pass: {:?}", report);
        }
        report
    }

    fn on_slot_event(&self, state: &mut State, event: SlotEvent) {
        match event {
            SlotEvent::Connected {
                direction: Direction::Source,
                slot,
                uid,
            } => {
                let Some(endpoint) = state.registry.endpoint_of(Direction::Source, slot) else {
                    return;
                };
                let output_slot = uid
                    .strip_suffix(Direction::Source.uid_suffix())
                    .map(|stem| format!("{}{}", stem, Direction::Sink.uid_suffix()))
                    .and_then(|out| state.registry.slot_of_uid(Direction::Sink, &out));
                let device = DeviceInfo {
                    slot,
                    uid,
                    endpoint: endpoint.name.clone(),
                    output_slot,
                };
                state
                    .bindings
                    .on_connected(device, &self.drivers, state.router.as_mut());
            }
            SlotEvent::Disconnected {
                direction: Direction::Source,
                slot,
                ..
            } => {
                state.bindings.on_disconnected(slot, state.router.as_mut());
            }
            SlotEvent::Renamed {
                direction: Direction::Source,
                slot,
                endpoint,
                ..
            } => {
                state.bindings.on_renamed(slot, &endpoint);
            }
            SlotEvent::Connected { .. }
            | SlotEvent::Disconnected { .. }
            | SlotEvent::Renamed { .. } => {}
        }
    }

    fn friendly_name(&self, state: &State, uid: &str) -> Option<String> {
        state
            .aliases
            .get(uid)
            .or_else(|| state.identity.default_name(uid))
            .map(str::to_string)
    }
}

/// Keeps the routing server's connections in line with the chain model and the
/// plugged-in hardware.
///
/// # Example
///
/// ```ignore
/// use patchbay::prelude::*;
///
/// let autoconnector = Autoconnector::builder()
///     .server(MemoryServer::new())
///     .build()?;
/// autoconnector.start()?;
///
/// // After a chain edit
/// autoconnector.request_midi_connect(true);
/// ```
pub struct Autoconnector {
    pub(crate) shared: Arc<Shared>,
    watchdog: Mutex<Option<Watchdog>>,
}

impl Autoconnector {
    pub fn builder() -> AutoconnectorBuilder {
        AutoconnectorBuilder::default()
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            watchdog: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AutoconnectConfig {
        &self.shared.config
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the watchdog. An initial MIDI and audio pass is queued.
    pub fn start(&self) -> Result<()> {
        let mut watchdog = self.watchdog.lock();
        if watchdog.is_some() {
            return Ok(());
        }
        self.shared.set_run_state(RunState::Running);
        *watchdog = Some(Watchdog::spawn(Arc::clone(&self.shared))?);
        self.shared.send(Command::Midi);
        self.shared.send(Command::Audio);
        tracing::info!("Autoconnector started");
        Ok(())
    }

    /// Signal the watchdog to exit and join it.
    pub fn stop(&self) {
        if let Some(mut watchdog) = self.watchdog.lock().take() {
            watchdog.stop();
            tracing::info!("Autoconnector stopped");
        }
        self.shared.set_run_state(RunState::Stopped);
    }

    /// Suspend reconciliation. The watchdog keeps polling; requests pile up and
    /// run after [`Autoconnector::resume`].
    pub fn pause(&self) {
        if self.shared.run_state() == RunState::Running {
            self.shared.set_run_state(RunState::Paused);
            tracing::debug!("Autoconnector paused");
        }
    }

    pub fn resume(&self) {
        if self.shared.run_state() == RunState::Paused {
            self.shared.set_run_state(RunState::Running);
            self.shared.send(Command::Midi);
            self.shared.send(Command::Audio);
            tracing::debug!("Autoconnector resumed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.run_state() != RunState::Stopped
    }

    pub fn is_paused(&self) -> bool {
        self.shared.run_state() == RunState::Paused
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Reconcile MIDI connections, now (`fast`) or on the next tick.
    ///
    /// A fast request that cannot take the lock within the configured timeout is
    /// deferred instead; it never blocks longer than that.
    pub fn request_midi_connect(&self, fast: bool) -> Dispatch {
        self.request(fast, Command::Midi, Shared::midi_pass)
    }

    pub fn request_audio_connect(&self, fast: bool) -> Dispatch {
        self.request(fast, Command::Audio, Shared::audio_pass)
    }

    fn request(
        &self,
        fast: bool,
        command: Command,
        pass: fn(&Shared, &mut State) -> ReconcileReport,
    ) -> Dispatch {
        if fast && !self.is_paused() {
            let timeout = self.shared.config.lock_timeout();
            if let Some(mut state) = self.shared.state.try_lock_for(timeout) {
                return Dispatch::Ran(pass(&self.shared, &mut state));
            }
            tracing::debug!("Lock busy, {:?} pass deferred", command);
        }
        self.shared.send(command);
        Dispatch::Deferred
    }

    // -----------------------------------------------------------------------
    // Devices
    // -----------------------------------------------------------------------

    pub fn device_slot(&self, direction: Direction, uid: &str) -> Option<usize> {
        self.shared.state.lock().registry.slot_of_uid(direction, uid)
    }

    pub fn stable_uid(&self, direction: Direction, slot: usize) -> Option<String> {
        self.shared
            .state
            .lock()
            .registry
            .uid_of(direction, slot)
            .map(str::to_string)
    }

    /// Occupied slots of one direction.
    pub fn devices(&self, direction: Direction) -> Vec<DeviceSummary> {
        let state = self.shared.state.lock();
        state
            .registry
            .table(direction)
            .occupied()
            .map(|(slot, entry)| DeviceSummary {
                slot,
                uid: entry.uid.clone(),
                endpoint: entry.endpoint.name.clone(),
                friendly_name: self
                    .shared
                    .friendly_name(&state, &entry.uid)
                    .unwrap_or_else(|| entry.uid.clone()),
                driver: match direction {
                    Direction::Source => state.bindings.driver_name(slot).map(str::to_string),
                    Direction::Sink => None,
                },
            })
            .collect()
    }

    pub fn is_host_link_connected(&self) -> bool {
        self.shared.host_link.is_connected()
    }

    // -----------------------------------------------------------------------
    // Names
    // -----------------------------------------------------------------------

    /// Assign a friendly name to `uid`. Live endpoints are relabelled at once.
    pub fn set_friendly_name(&self, uid: &str, name: &str) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        let Some(mut server) = state.server.take() else {
            state.aliases.set(uid, name);
            return Ok(());
        };
        let hw = self.shared.hardware(state, server.as_ref());
        let live: Vec<_> = hw.endpoints().cloned().collect();
        let result = state
            .identity
            .rename(server.as_mut(), uid, name, &mut state.aliases, &live);
        state.server = Some(server);
        result?;
        Ok(())
    }

    /// User-assigned name if any, else the computed default for a live device.
    pub fn friendly_name(&self, uid: &str) -> Option<String> {
        let state = self.shared.state.lock();
        self.shared.friendly_name(&state, uid)
    }

    pub fn alias_table(&self) -> AliasTable {
        self.shared.state.lock().aliases.clone()
    }

    /// Replace the alias table (e.g. restored from saved settings). Endpoints are
    /// relabelled on the next MIDI pass.
    pub fn load_alias_table(&self, table: AliasTable) {
        self.shared.state.lock().aliases = table;
        self.shared.send(Command::Midi);
    }

    // -----------------------------------------------------------------------
    // Routing policy
    // -----------------------------------------------------------------------

    /// Send the router's MIDI output to the hardware destination `uid`.
    pub fn set_midi_output_enabled(&self, uid: &str, enabled: bool) {
        let changed = {
            let mut state = self.shared.state.lock();
            toggle(&mut state.policy.midi_output, uid, enabled)
        };
        if changed {
            self.shared.send(Command::Midi);
        }
    }

    /// Send controller feedback to the hardware destination `uid`.
    pub fn set_controller_feedback_enabled(&self, uid: &str, enabled: bool) {
        let changed = {
            let mut state = self.shared.state.lock();
            toggle(&mut state.policy.controller_feedback, uid, enabled)
        };
        if changed {
            self.shared.send(Command::Midi);
        }
    }

    pub fn is_midi_output_enabled(&self, uid: &str) -> bool {
        self.shared.state.lock().policy.midi_output.contains(uid)
    }

    /// Feed the system capture inputs to the pitch tracker.
    pub fn set_pitch_tracking(&self, enabled: bool) {
        let changed = {
            let mut state = self.shared.state.lock();
            std::mem::replace(&mut state.pitch_tracking, enabled) != enabled
        };
        if changed {
            self.shared.send(Command::Audio);
        }
    }

    // -----------------------------------------------------------------------
    // Drivers
    // -----------------------------------------------------------------------

    /// Forward raw MIDI from input `slot` to its driver. Returns true if consumed.
    pub fn dispatch_midi_event(&self, slot: usize, event: &[u8]) -> bool {
        self.shared.state.lock().bindings.dispatch(slot, event)
    }

    /// Device a driver is bound to on input `slot`.
    pub fn bound_device(&self, slot: usize) -> Option<DeviceInfo> {
        self.shared.state.lock().bindings.device(slot).cloned()
    }

    /// Unbind the driver of input `slot`; its raw input reaches the engines again.
    pub fn release_driver(&self, slot: usize) -> Result<()> {
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        state.bindings.release(slot, state.router.as_mut())?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Telemetry
    // -----------------------------------------------------------------------

    /// Latest server figures. Never waits for the lock.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            xruns: self.shared.telemetry.xruns(),
            ..**self.shared.stats.load()
        }
    }

    pub fn telemetry(&self) -> Arc<ServerTelemetry> {
        Arc::clone(&self.shared.telemetry)
    }

    /// Number of live connections this engine made, MIDI and audio.
    pub fn owned_connections(&self) -> (usize, usize) {
        let state = self.shared.state.lock();
        (state.midi_ledger.len(), state.audio_ledger.len())
    }
}

impl Drop for Autoconnector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn toggle(set: &mut std::collections::BTreeSet<String>, uid: &str, enabled: bool) -> bool {
    if enabled {
        set.insert(uid.to_string())
    } else {
        set.remove(uid)
    }
}
