//! The routing-server seam.
//!
//! Everything the engine needs from JACK (or any other audio/MIDI routing server)
//! goes through [`RoutingServer`]. Calls are synchronous local IPC; failures are
//! reported as [`RouteError`] and never treated as fatal by callers.

use crate::endpoint::{Endpoint, EndpointFilter};
use crate::error::RouteError;
use crate::telemetry::{ServerStats, ServerTelemetry};
use std::sync::Arc;

/// Connection-level access to a live routing server.
pub trait RoutingServer: Send {
    /// Enumerate live endpoints matching `filter`, ordered by name.
    fn endpoints(&self, filter: &EndpointFilter) -> Vec<Endpoint>;

    /// Look up a single live endpoint.
    fn endpoint(&self, name: &str) -> Option<Endpoint>;

    /// Names of the endpoints currently connected to `name`.
    fn connections(&self, name: &str) -> Result<Vec<String>, RouteError>;

    fn connect(&mut self, source: &str, destination: &str) -> Result<(), RouteError>;

    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), RouteError>;

    /// Replace every alias of `name` with `aliases` (at most two are kept).
    fn set_aliases(&mut self, name: &str, aliases: &[String]) -> Result<(), RouteError>;

    /// Load and timing figures of the server.
    fn stats(&self) -> ServerStats;

    /// Counters the server's own callbacks write to, if it keeps any.
    fn telemetry(&self) -> Option<Arc<ServerTelemetry>> {
        None
    }
}

impl<T: RoutingServer + ?Sized> RoutingServer for Box<T> {
    fn endpoints(&self, filter: &EndpointFilter) -> Vec<Endpoint> {
        (**self).endpoints(filter)
    }

    fn endpoint(&self, name: &str) -> Option<Endpoint> {
        (**self).endpoint(name)
    }

    fn connections(&self, name: &str) -> Result<Vec<String>, RouteError> {
        (**self).connections(name)
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<(), RouteError> {
        (**self).connect(source, destination)
    }

    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), RouteError> {
        (**self).disconnect(source, destination)
    }

    fn set_aliases(&mut self, name: &str, aliases: &[String]) -> Result<(), RouteError> {
        (**self).set_aliases(name, aliases)
    }

    fn stats(&self) -> ServerStats {
        (**self).stats()
    }

    fn telemetry(&self) -> Option<Arc<ServerTelemetry>> {
        (**self).telemetry()
    }
}
