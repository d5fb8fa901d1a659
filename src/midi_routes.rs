//! Required MIDI routes.
//!
//! Builds the [`RouteGraph`] for one MIDI pass from the hardware set, the device
//! slots, the chain model and the fixed system routes. Slot and alias refresh
//! happen before this, under the same lock.

use crate::chain::{ChainRouting, MidiTarget};
use crate::config::AutoconnectConfig;
use patchbay_core::{Direction, Endpoint, EndpointFilter, RouteGraph, RoutingServer};
use patchbay_devices::{DeviceRegistry, IdentityManager, SlotEntry};
use std::collections::BTreeSet;

/// Endpoints treated as hardware in one pass, with their uids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HardwareSet {
    pub sources: Vec<SlotEntry>,
    pub sinks: Vec<SlotEntry>,
}

impl HardwareSet {
    /// Sorted endpoint names, used to detect hot-plug between passes.
    pub fn signature(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .sources
            .iter()
            .chain(&self.sinks)
            .map(|e| e.endpoint.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.sources.iter().chain(&self.sinks).map(|e| &e.endpoint)
    }
}

/// Per-uid MIDI output switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct OutputPolicy {
    pub midi_output: BTreeSet<String>,
    pub controller_feedback: BTreeSet<String>,
}

/// Physical MIDI endpoints plus allow-listed virtual ones. Ports of a host link
/// that is down are left out as if unplugged.
pub(crate) fn hardware_endpoints<S>(
    server: &S,
    config: &AutoconnectConfig,
    identity: &mut IdentityManager,
    host_link_up: bool,
) -> HardwareSet
where
    S: RoutingServer + ?Sized,
{
    let mut collect = |direction| {
        let endpoints: Vec<Endpoint> = server
            .endpoints(&EndpointFilter::midi(direction))
            .into_iter()
            .filter(|e| {
                e.physical
                    || identity.is_service(e)
                    || config
                        .virtual_hardware
                        .iter()
                        .any(|p| e.name.starts_with(p.as_str()))
            })
            .filter(|e| host_link_up || !identity.is_host_link(e))
            .collect();
        let mut entries: Vec<SlotEntry> = endpoints
            .into_iter()
            .map(|endpoint| SlotEntry {
                uid: identity.compute_uid(&endpoint),
                endpoint,
            })
            .collect();
        entries.sort_by(|a, b| a.endpoint.name.cmp(&b.endpoint.name));
        entries
    };
    HardwareSet {
        sources: collect(Direction::Source),
        sinks: collect(Direction::Sink),
    }
}

pub(crate) fn midi_graph(
    config: &AutoconnectConfig,
    live: &[Endpoint],
    hardware: &HardwareSet,
    registry: &DeviceRegistry,
    chains: &[ChainRouting],
    policy: &OutputPolicy,
) -> RouteGraph {
    let ports = &config.ports;
    let destinations = live
        .iter()
        .filter(|e| e.direction == Direction::Sink)
        .map(|e| e.name.as_str());
    let sources = live
        .iter()
        .filter(|e| e.direction == Direction::Source)
        .map(|e| e.name.as_str());
    let mut graph = RouteGraph::new(destinations, sources);

    // Slotted hardware sources feed their router inputs
    for (slot, entry) in registry.table(Direction::Source).occupied() {
        graph.add(&ports.router_device_in(slot), &entry.endpoint.name);
    }

    for chain in chains {
        for (dest, srcs) in &chain.midi_routes {
            graph.add_all(dest, srcs.iter().map(String::as_str));
        }

        let mut thru_sources: Vec<String> = chain.midi_outputs.clone();
        if let (true, Some(ch)) = (chain.midi_thru, chain.midi_channel) {
            thru_sources.push(ports.router_channel_out(ch));
        }
        for target in &chain.midi_targets {
            let dest = match target {
                MidiTarget::Port(port) => Some(port.as_str()),
                MidiTarget::Chain(id) => chains
                    .iter()
                    .find(|c| c.id == *id)
                    .and_then(|c| c.midi_inputs.first())
                    .map(String::as_str),
            };
            if let Some(dest) = dest {
                graph.add_all(dest, thru_sources.iter().map(String::as_str));
            }
        }

        if let (Some(ch), Some(first)) = (chain.midi_channel, chain.midi_inputs.first()) {
            graph.add(first, &ports.router_channel_out(ch));
        }
    }

    graph.add(&ports.router_step_in, &ports.sequencer_out);
    graph.add(&ports.sequencer_in, &ports.router_step_out);
    graph.add(&ports.smf_in, &ports.router_main_out);
    graph.add(&ports.router_seq_in, &ports.smf_out);
    for src in live.iter().filter(|e| {
        e.direction == Direction::Source
            && ports
                .feedback_sources
                .iter()
                .any(|p| e.name.starts_with(p.as_str()))
    }) {
        graph.add(&ports.router_ctrl_in, &src.name);
    }

    for sink in &hardware.sinks {
        if policy.midi_output.contains(&sink.uid) {
            graph.add(&sink.endpoint.name, &ports.router_midi_out);
        }
        if policy.controller_feedback.contains(&sink.uid) {
            graph.add(&sink.endpoint.name, &ports.router_ctrl_out);
        }
    }

    graph.strip_prefixes(&config.unmanaged_prefixes);
    graph
}
