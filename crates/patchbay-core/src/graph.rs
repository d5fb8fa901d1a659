//! Required-route graph.
//!
//! A [`RouteGraph`] maps each destination endpoint to the set of sources that should
//! be connected to it. It is rebuilt from scratch on every reconciliation pass and
//! thrown away afterwards.
//!
//! Only live endpoints are admitted: the graph is seeded with the live destinations
//! and the live sources, and [`RouteGraph::add`] silently drops routes naming
//! anything else. A route to a port that does not exist would otherwise be retried
//! (and fail) on every pass.

use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGraph {
    routes: BTreeMap<String, BTreeSet<String>>,
    sources: HashSet<String>,
}

impl RouteGraph {
    /// Seed a graph with every live destination (empty source sets) and the set of
    /// live sources routes may draw from.
    pub fn new<D, S>(destinations: D, sources: S) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        Self {
            routes: destinations
                .into_iter()
                .map(|d| (d.into(), BTreeSet::new()))
                .collect(),
            sources: sources.into_iter().map(Into::into).collect(),
        }
    }

    /// Require `source -> destination`. Returns `false` if either end is not live.
    pub fn add(&mut self, destination: &str, source: &str) -> bool {
        if !self.sources.contains(source) {
            return false;
        }
        match self.routes.get_mut(destination) {
            Some(set) => {
                set.insert(source.to_string());
                true
            }
            None => false,
        }
    }

    pub fn add_all<'a, I>(&mut self, destination: &str, sources: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        sources
            .into_iter()
            .filter(|s| self.add(destination, s))
            .count()
    }

    /// Require every `(source, destination)` pair.
    pub fn add_pairs<I, A, B>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        for (src, dst) in pairs {
            self.add(dst.as_ref(), src.as_ref());
        }
    }

    /// Give `target` exactly the sources required by `origin`.
    ///
    /// Used for mirrored outputs (headphones follow the main playback pair).
    pub fn mirror(&mut self, origin: &str, target: &str) -> bool {
        let Some(sources) = self.routes.get(origin).cloned() else {
            return false;
        };
        match self.routes.get_mut(target) {
            Some(set) => {
                *set = sources;
                true
            }
            None => false,
        }
    }

    /// Drop every destination whose name starts with one of `prefixes`.
    pub fn strip_prefixes<S: AsRef<str>>(&mut self, prefixes: &[S]) {
        self.routes
            .retain(|dest, _| !prefixes.iter().any(|p| dest.starts_with(p.as_ref())));
    }

    pub fn has_destination(&self, destination: &str) -> bool {
        self.routes.contains_key(destination)
    }

    pub fn has_source(&self, source: &str) -> bool {
        self.sources.contains(source)
    }

    pub fn sources_of(&self, destination: &str) -> Option<&BTreeSet<String>> {
        self.routes.get(destination)
    }

    pub fn requires(&self, destination: &str, source: &str) -> bool {
        self.routes
            .get(destination)
            .is_some_and(|set| set.contains(source))
    }

    pub fn destinations(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.routes.iter().map(|(d, s)| (d.as_str(), s))
    }

    /// Number of required connections.
    pub fn route_count(&self) -> usize {
        self.routes.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.route_count() == 0
    }
}

/// Pair up source and destination ports of two multichannel endpoints.
///
/// The first `min(Ns, Nd)` ports connect one-to-one. Remaining destination ports are
/// fed from the last source port (fan-out); remaining source ports all go to the
/// last destination port (fan-in). Either side empty yields no pairs.
pub fn fan_pairs<'a, S, D>(sources: &'a [S], destinations: &'a [D]) -> Vec<(&'a str, &'a str)>
where
    S: AsRef<str>,
    D: AsRef<str>,
{
    let (ns, nd) = (sources.len(), destinations.len());
    if ns == 0 || nd == 0 {
        return Vec::new();
    }

    let mut pairs = Vec::with_capacity(ns.max(nd));
    for i in 0..ns.max(nd) {
        let src = &sources[i.min(ns - 1)];
        let dst = &destinations[i.min(nd - 1)];
        pairs.push((src.as_ref(), dst.as_ref()));
    }
    pairs
}
