//! # Patchbay - Audio/MIDI Autoconnection Engine
//!
//! Keeps a routing server's port connections in line with what the chain model
//! and the plugged-in hardware call for.
//!
//! ## Architecture
//!
//! Patchbay is an umbrella crate that coordinates:
//! - **patchbay-core** - Routing-server seam, route graphs, ownership ledger, reconciler
//! - **patchbay-devices** - Device slots, stable identities, friendly names, control-surface drivers
//!
//! The [`Autoconnector`] owns one lock over all mutable state. Callers request a
//! MIDI or audio pass either synchronously (`fast`) or for the next watchdog tick;
//! the watchdog also polls for hot-plug and host-link changes.
//!
//! Connections made by anyone else are never removed. Only connections the
//! engine created itself are torn down when no longer required.
//!
//! ## Quick Start
//!
//! ```ignore
//! use patchbay::prelude::*;
//!
//! let chains = Arc::new(StaticChainModel::default());
//! let autoconnector = Autoconnector::builder()
//!     .server(MemoryServer::new())
//!     .chains(chains.clone())
//!     .build()?;
//! autoconnector.start()?;
//!
//! chains.upsert(ChainRouting::new(1).midi_channel(0).midi_input("synth:in"));
//! autoconnector.request_midi_connect(true);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - In-memory server only
//! - `jack` - JACK routing-server backend

/// Re-export of patchbay-core for direct access
pub use patchbay_core as core;

/// Re-export of patchbay-devices for direct access
pub use patchbay_devices as devices;

pub use patchbay_core::{
    Direction, Endpoint, EndpointFilter, MemoryServer, PortKind, ReconcileReport, RouteError,
    RoutingServer, ServerStats, ServerTelemetry,
};

#[cfg(feature = "jack")]
pub use patchbay_core::JackServer;

pub use patchbay_devices::{
    AliasTable, ControlSurfaceDriver, DeviceInfo, DeviceMatch, DriverRegistry, HostLinkProbe,
    RouterControl, StaticLinkProbe, SysfsUdcProbe, VirtualService,
};

mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{AutoconnectConfig, SystemPorts};

pub mod chain;
pub use chain::{
    AudioPlayerLookup, ChainId, ChainModel, ChainRouting, MidiTarget, StaticAudioPlayer,
    StaticChainModel,
};

mod audio_routes;
mod builder;
mod engine;
mod midi_routes;
mod watchdog;

pub use builder::AutoconnectorBuilder;
pub use engine::{Autoconnector, DeviceSummary, Dispatch};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        AliasTable, AutoconnectConfig, Autoconnector, AutoconnectorBuilder, ChainModel,
        ChainRouting, Direction, Dispatch, Endpoint, MemoryServer, MidiTarget, RoutingServer,
        StaticAudioPlayer, StaticChainModel,
    };
    pub use crate::{Error, Result};
    pub use std::sync::Arc;
}
