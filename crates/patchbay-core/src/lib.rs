//! Routing-server seam and connection reconciler for the patchbay engine.
//!
//! # Primary API
//!
//! - [`RoutingServer`]: connection-level access to JACK or another routing server
//! - [`MemoryServer`]: in-memory server for tests and headless runs
//! - [`RouteGraph`]: required destination → sources mapping for one pass
//! - [`OwnershipLedger`]: connections this engine created itself
//! - [`reconcile`]: diff a graph against the live state and apply the difference
//!
//! # Feature-gated APIs
//!
//! - `"jack"`: [`JackServer`]
//!
//! # Example
//!
//! ```ignore
//! use patchbay_core::*;
//!
//! let mut server = MemoryServer::new();
//! server.add_endpoint(Endpoint::midi_source("kbd:out"));
//! server.add_endpoint(Endpoint::midi_sink("synth:in"));
//!
//! let mut graph = RouteGraph::new(["synth:in"], ["kbd:out"]);
//! graph.add("synth:in", "kbd:out");
//!
//! let mut ledger = OwnershipLedger::new();
//! let report = reconcile(&mut server, &graph, &mut ledger);
//! assert_eq!(report.connected, 1);
//! ```

pub mod error;
pub use error::{Error, Result, RouteError};

pub mod endpoint;
pub use endpoint::{Direction, Endpoint, EndpointFilter, PortKind, MAX_ALIASES};

mod server;
pub use server::RoutingServer;

mod memory;
pub use memory::MemoryServer;

pub mod graph;
pub use graph::{fan_pairs, RouteGraph};

mod ledger;
pub use ledger::OwnershipLedger;

mod reconcile;
pub use reconcile::{reconcile, ReconcileReport};

mod telemetry;
pub use telemetry::{ServerStats, ServerTelemetry};

#[cfg(feature = "jack")]
mod jack_server;

#[cfg(feature = "jack")]
pub use jack_server::JackServer;
