//! Routing intent read from the chain model.
//!
//! The chain model itself (processors, presets, the GUI's view of chains) lives
//! elsewhere. The autoconnector only needs the routing-relevant projection of each
//! chain, described by [`ChainRouting`], and reads it fresh on every pass.

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type ChainId = u32;

/// Where a chain's MIDI output goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiTarget {
    /// The first MIDI input of another chain.
    Chain(ChainId),
    /// An external port.
    Port(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRouting {
    pub id: ChainId,
    /// 0-based MIDI channel of a MIDI chain.
    pub midi_channel: Option<u8>,
    /// MIDI inputs of the chain's processors, first processor first.
    pub midi_inputs: Vec<String>,
    /// MIDI outputs of the chain's last processors.
    pub midi_outputs: Vec<String>,
    /// Processor-to-processor MIDI routes: destination port -> source ports.
    pub midi_routes: BTreeMap<String, Vec<String>>,
    /// Send the chain's channel input straight to its targets as well.
    pub midi_thru: bool,
    pub midi_targets: Vec<MidiTarget>,
    /// Audio routes: destination -> sources. Each name is either a full port name
    /// or a client name standing for all of that client's audio ports.
    pub audio_routes: BTreeMap<String, Vec<String>>,
}

impl ChainRouting {
    pub fn new(id: ChainId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn midi_channel(mut self, channel: u8) -> Self {
        self.midi_channel = Some(channel);
        self
    }

    pub fn midi_input(mut self, port: impl Into<String>) -> Self {
        self.midi_inputs.push(port.into());
        self
    }

    pub fn midi_output(mut self, port: impl Into<String>) -> Self {
        self.midi_outputs.push(port.into());
        self
    }

    pub fn midi_route(mut self, destination: impl Into<String>, source: impl Into<String>) -> Self {
        self.midi_routes
            .entry(destination.into())
            .or_default()
            .push(source.into());
        self
    }

    pub fn midi_thru(mut self, thru: bool) -> Self {
        self.midi_thru = thru;
        self
    }

    pub fn midi_target(mut self, target: MidiTarget) -> Self {
        self.midi_targets.push(target);
        self
    }

    pub fn audio_route(mut self, destination: impl Into<String>, source: impl Into<String>) -> Self {
        self.audio_routes
            .entry(destination.into())
            .or_default()
            .push(source.into());
        self
    }
}

/// Read-only view of the chain model.
pub trait ChainModel: Send + Sync {
    fn chains(&self) -> Vec<ChainRouting>;
}

/// Lookup of the global background audio player.
pub trait AudioPlayerLookup: Send + Sync {
    /// Stereo output ports of the player, if one is active.
    fn player_outputs(&self) -> Option<Vec<String>>;
}

/// Chain model held in memory and swapped atomically as a whole.
#[derive(Default)]
pub struct StaticChainModel {
    chains: ArcSwap<Vec<ChainRouting>>,
}

impl StaticChainModel {
    pub fn new(chains: Vec<ChainRouting>) -> Self {
        Self {
            chains: ArcSwap::from_pointee(chains),
        }
    }

    pub fn set(&self, chains: Vec<ChainRouting>) {
        self.chains.store(Arc::new(chains));
    }

    /// Replace one chain by id, or append it.
    pub fn upsert(&self, chain: ChainRouting) {
        self.chains.rcu(|current| {
            let mut next = Vec::clone(current);
            match next.iter_mut().find(|c| c.id == chain.id) {
                Some(existing) => *existing = chain.clone(),
                None => next.push(chain.clone()),
            }
            next
        });
    }

    pub fn remove(&self, id: ChainId) {
        self.chains.rcu(|current| {
            current
                .iter()
                .filter(|c| c.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
    }
}

impl ChainModel for StaticChainModel {
    fn chains(&self) -> Vec<ChainRouting> {
        Vec::clone(&self.chains.load())
    }
}

/// Player outputs held in memory.
#[derive(Default)]
pub struct StaticAudioPlayer {
    outputs: ArcSwapOption<Vec<String>>,
}

impl StaticAudioPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, outputs: Option<Vec<String>>) {
        self.outputs.store(outputs.map(Arc::new));
    }
}

impl AudioPlayerLookup for StaticAudioPlayer {
    fn player_outputs(&self) -> Option<Vec<String>> {
        self.outputs.load_full().map(|o| Vec::clone(&o))
    }
}
