//! Reconciler behaviour over several passes against a changing server.

use patchbay_core::{
    reconcile, Endpoint, EndpointFilter, MemoryServer, OwnershipLedger, ReconcileReport,
    RouteGraph, RoutingServer,
};

fn server() -> MemoryServer {
    let server = MemoryServer::new();
    for name in ["src:x", "src:y", "src:z"] {
        server.add_endpoint(Endpoint::midi_source(name));
    }
    server.add_endpoint(Endpoint::midi_sink("dest:a"));
    server
}

fn required(server: &MemoryServer, sources: &[&str]) -> RouteGraph {
    let live = server.endpoints(&EndpointFilter::all());
    let mut graph = RouteGraph::new(
        live.iter().filter(|e| e.name.starts_with("dest:")).map(|e| e.name.as_str()),
        live.iter().filter(|e| e.name.starts_with("src:")).map(|e| e.name.as_str()),
    );
    graph.add_all("dest:a", sources.iter().copied());
    graph
}

fn pass(
    server: &mut MemoryServer,
    ledger: &mut OwnershipLedger,
    sources: &[&str],
) -> ReconcileReport {
    let graph = required(server, sources);
    reconcile(server, &graph, ledger)
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

#[test]
fn owned_source_replaced_external_kept() {
    let mut server = server();
    let mut ledger = OwnershipLedger::new();

    // z is ours, x was patched by someone else
    pass(&mut server, &mut ledger, &["src:z"]);
    server.connect_external("src:x", "dest:a");

    let report = pass(&mut server, &mut ledger, &["src:x", "src:y"]);
    assert_eq!(report.connected, 1);
    assert_eq!(report.disconnected, 1);
    assert!(!server.is_connected("src:z", "dest:a"));
    assert!(server.is_connected("src:y", "dest:a"));
    assert!(server.is_connected("src:x", "dest:a"));
    assert_eq!(ledger.sources_of("dest:a"), vec!["src:y"]);
}

#[test]
fn external_connection_survives_many_passes() {
    let mut server = server();
    let mut ledger = OwnershipLedger::new();
    server.connect_external("src:z", "dest:a");

    for _ in 0..5 {
        let report = pass(&mut server, &mut ledger, &["src:x"]);
        assert_eq!(report.external, 1);
    }
    assert!(server.is_connected("src:z", "dest:a"));
    assert_eq!(server.disconnect_calls(), 0);
}

// ---------------------------------------------------------------------------
// Hot-plug
// ---------------------------------------------------------------------------

#[test]
fn unplugged_source_leaves_ledger() {
    let mut server = server();
    let mut ledger = OwnershipLedger::new();
    pass(&mut server, &mut ledger, &["src:x", "src:y"]);

    server.remove_endpoint("src:y");
    let report = pass(&mut server, &mut ledger, &["src:x", "src:y"]);
    assert!(report.is_noop());
    assert_eq!(ledger.sources_of("dest:a"), vec!["src:x"]);

    // Back again: reconnected and owned
    server.add_endpoint(Endpoint::midi_source("src:y"));
    let report = pass(&mut server, &mut ledger, &["src:x", "src:y"]);
    assert_eq!(report.connected, 1);
    assert!(ledger.owns("dest:a", "src:y"));
}

#[test]
fn unplugged_destination_drops_entry() {
    let mut server = server();
    let mut ledger = OwnershipLedger::new();
    pass(&mut server, &mut ledger, &["src:x"]);

    server.remove_endpoint("dest:a");
    pass(&mut server, &mut ledger, &["src:x"]);
    assert!(ledger.is_empty());
}
