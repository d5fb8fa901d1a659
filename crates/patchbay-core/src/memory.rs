//! In-memory routing server.
//!
//! Behaves like a routing server without any audio hardware: endpoints come and go
//! through [`MemoryServer::add_endpoint`]/[`MemoryServer::remove_endpoint`], and
//! third-party software is simulated with [`MemoryServer::connect_external`].
//! Clones share the same state, so a test can keep one handle while the engine
//! owns another.

use crate::endpoint::{Direction, Endpoint, EndpointFilter, MAX_ALIASES};
use crate::error::RouteError;
use crate::server::RoutingServer;
use crate::telemetry::{ServerStats, ServerTelemetry};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct MemoryState {
    endpoints: BTreeMap<String, Endpoint>,
    /// (source, destination) pairs.
    links: BTreeSet<(String, String)>,
    /// Connections that fail on connect, to simulate a racing teardown.
    broken: BTreeSet<String>,
    stats: ServerStats,
}

#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<Mutex<MemoryState>>,
    telemetry: Arc<ServerTelemetry>,
    connect_calls: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
    alias_writes: Arc<AtomicUsize>,
}

impl MemoryServer {
    pub fn new() -> Self {
        let state = MemoryState {
            stats: ServerStats {
                cpu_load: 0.0,
                sample_rate: 48000,
                block_size: 256,
                xruns: 0,
            },
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            telemetry: Arc::new(ServerTelemetry::new()),
            connect_calls: Arc::new(AtomicUsize::new(0)),
            disconnect_calls: Arc::new(AtomicUsize::new(0)),
            alias_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Share an externally owned telemetry block (xruns are counted there).
    pub fn with_telemetry(mut self, telemetry: Arc<ServerTelemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn add_endpoint(&self, endpoint: Endpoint) {
        self.state
            .lock()
            .endpoints
            .insert(endpoint.name.clone(), endpoint);
    }

    /// Unplug an endpoint; its connections vanish with it.
    pub fn remove_endpoint(&self, name: &str) -> Option<Endpoint> {
        let mut state = self.state.lock();
        state.links.retain(|(s, d)| s != name && d != name);
        state.endpoints.remove(name)
    }

    /// Connect two ports as another application would, bypassing the call counters.
    pub fn connect_external(&self, source: &str, destination: &str) {
        self.state
            .lock()
            .links
            .insert((source.to_string(), destination.to_string()));
    }

    pub fn disconnect_external(&self, source: &str, destination: &str) {
        self.state
            .lock()
            .links
            .remove(&(source.to_string(), destination.to_string()));
    }

    pub fn is_connected(&self, source: &str, destination: &str) -> bool {
        self.state
            .lock()
            .links
            .contains(&(source.to_string(), destination.to_string()))
    }

    /// Sources connected into `destination`, sorted.
    pub fn sources_of(&self, destination: &str) -> Vec<String> {
        self.state
            .lock()
            .links
            .iter()
            .filter(|(_, d)| d == destination)
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub fn link_count(&self) -> usize {
        self.state.lock().links.len()
    }

    /// Make every connect into or out of `name` fail.
    pub fn break_port(&self, name: &str) {
        self.state.lock().broken.insert(name.to_string());
    }

    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .endpoints
            .get(name)
            .map(|e| e.aliases.clone())
            .unwrap_or_default()
    }

    pub fn set_stats(&self, stats: ServerStats) {
        self.state.lock().stats = stats;
    }

    /// Simulate the server's xrun callback.
    pub fn simulate_xrun(&self) {
        self.telemetry.record_xrun();
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn alias_writes(&self) -> usize {
        self.alias_writes.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.connect_calls.store(0, Ordering::SeqCst);
        self.disconnect_calls.store(0, Ordering::SeqCst);
        self.alias_writes.store(0, Ordering::SeqCst);
    }
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingServer for MemoryServer {
    fn endpoints(&self, filter: &EndpointFilter) -> Vec<Endpoint> {
        self.state
            .lock()
            .endpoints
            .values()
            .filter(|e| e.matches(filter))
            .cloned()
            .collect()
    }

    fn endpoint(&self, name: &str) -> Option<Endpoint> {
        self.state.lock().endpoints.get(name).cloned()
    }

    fn connections(&self, name: &str) -> Result<Vec<String>, RouteError> {
        let state = self.state.lock();
        let endpoint = state
            .endpoints
            .get(name)
            .ok_or_else(|| RouteError::PortNotFound(name.to_string()))?;
        let peers = state
            .links
            .iter()
            .filter_map(|(s, d)| match endpoint.direction {
                Direction::Sink if d == name => Some(s.clone()),
                Direction::Source if s == name => Some(d.clone()),
                _ => None,
            })
            .collect();
        Ok(peers)
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<(), RouteError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state.broken.contains(source) || state.broken.contains(destination) {
            return Err(RouteError::Server(format!(
                "cannot connect {} -> {}",
                source, destination
            )));
        }
        let src = state
            .endpoints
            .get(source)
            .ok_or_else(|| RouteError::PortNotFound(source.to_string()))?;
        let dst = state
            .endpoints
            .get(destination)
            .ok_or_else(|| RouteError::PortNotFound(destination.to_string()))?;
        if src.direction != Direction::Source
            || dst.direction != Direction::Sink
            || src.kind != dst.kind
        {
            return Err(RouteError::Incompatible {
                from: source.to_string(),
                to: destination.to_string(),
            });
        }
        if !state
            .links
            .insert((source.to_string(), destination.to_string()))
        {
            return Err(RouteError::AlreadyConnected {
                from: source.to_string(),
                to: destination.to_string(),
            });
        }
        Ok(())
    }

    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), RouteError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        if state
            .links
            .remove(&(source.to_string(), destination.to_string()))
        {
            Ok(())
        } else {
            Err(RouteError::NotConnected {
                from: source.to_string(),
                to: destination.to_string(),
            })
        }
    }

    fn set_aliases(&mut self, name: &str, aliases: &[String]) -> Result<(), RouteError> {
        self.alias_writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let endpoint = state
            .endpoints
            .get_mut(name)
            .ok_or_else(|| RouteError::PortNotFound(name.to_string()))?;
        endpoint.aliases = aliases.iter().take(MAX_ALIASES).cloned().collect();
        Ok(())
    }

    fn stats(&self) -> ServerStats {
        let stats = self.state.lock().stats;
        self.telemetry.merge(stats)
    }

    fn telemetry(&self) -> Option<Arc<ServerTelemetry>> {
        Some(Arc::clone(&self.telemetry))
    }
}
