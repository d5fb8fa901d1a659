//! Required audio routes.

use crate::chain::ChainRouting;
use crate::config::AutoconnectConfig;
use patchbay_core::{fan_pairs, Direction, Endpoint, RouteGraph};

/// Ports standing for `group` among `endpoints` of one direction: the port itself
/// for a full `client:port` name, else every port of the client in natural order.
pub(crate) fn ports_of<'a>(group: &str, endpoints: &'a [Endpoint]) -> Vec<&'a str> {
    let mut ports: Vec<&str> = if group.contains(':') {
        endpoints
            .iter()
            .filter(|e| e.name == group)
            .map(|e| e.name.as_str())
            .collect()
    } else {
        endpoints
            .iter()
            .filter(|e| e.client_name() == group)
            .map(|e| e.name.as_str())
            .collect()
    };
    sort_natural(&mut ports);
    ports
}

fn with_prefix<'a>(prefix: &str, endpoints: &'a [Endpoint]) -> Vec<&'a str> {
    let mut ports: Vec<&str> = endpoints
        .iter()
        .filter(|e| e.name.starts_with(prefix))
        .map(|e| e.name.as_str())
        .collect();
    sort_natural(&mut ports);
    ports
}

/// Sort so that `playback_2` comes before `playback_10`.
fn sort_natural(ports: &mut [&str]) {
    ports.sort_by_key(|name| {
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (stem, number) = name.split_at(name.len() - digits);
        (stem.to_string(), number.parse::<u64>().unwrap_or(0))
    });
}

/// Audio graph inputs that change at run time.
#[derive(Debug, Clone, Default)]
pub(crate) struct AudioExtras {
    pub player_outputs: Option<Vec<String>>,
    pub pitch_tracking: bool,
}

pub(crate) fn audio_graph(
    config: &AutoconnectConfig,
    live: &[Endpoint],
    chains: &[ChainRouting],
    extras: &AudioExtras,
) -> RouteGraph {
    let ports = &config.ports;
    let (sources, sinks): (Vec<Endpoint>, Vec<Endpoint>) = live
        .iter()
        .cloned()
        .partition(|e| e.direction == Direction::Source);
    let mut graph = RouteGraph::new(
        sinks.iter().map(|e| e.name.as_str()),
        sources.iter().map(|e| e.name.as_str()),
    );

    for chain in chains {
        for (dest, srcs) in &chain.audio_routes {
            let dst_ports = ports_of(dest, &sinks);
            for src in srcs {
                graph.add_pairs(fan_pairs(&ports_of(src, &sources), &dst_ports));
            }
        }
    }

    let returns: Vec<&str> = ports
        .mixer_returns
        .iter()
        .flat_map(|r| ports_of(r, &sinks))
        .collect();
    graph.add_pairs(fan_pairs(&ports_of(&ports.metronome, &sources), &returns));
    if let Some(player) = &extras.player_outputs {
        graph.add_pairs(fan_pairs(player, &returns));
    }

    let mixer_out: Vec<&str> = ports
        .mixer_outputs
        .iter()
        .flat_map(|o| ports_of(o, &sources))
        .collect();
    let playback: Vec<&str> = with_prefix(&ports.playback_prefix, &sinks)
        .into_iter()
        .filter(|p| !p.starts_with(ports.headphones_prefix.as_str()))
        .take(2)
        .collect();
    if playback.is_empty() {
        tracing::warn!("No playback ports matching {}", ports.playback_prefix);
    } else {
        graph.add_pairs(fan_pairs(&mixer_out, &playback));
        for (i, hp) in with_prefix(&ports.headphones_prefix, &sinks).iter().enumerate() {
            graph.mirror(playback[i.min(playback.len() - 1)], hp);
        }
    }

    if extras.pitch_tracking {
        let tracker = ports_of(&ports.pitch_tracker, &sinks);
        if !tracker.is_empty() {
            let captures = with_prefix(&ports.capture_prefix, &sources);
            for (i, capture) in captures.iter().enumerate() {
                graph.add(tracker[i % tracker.len()], capture);
            }
        }
    }

    graph.strip_prefixes(&config.unmanaged_prefixes);
    graph
}
