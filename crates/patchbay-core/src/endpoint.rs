//! Routing-server endpoints.
//!
//! An [`Endpoint`] is a single port exposed by the routing server. The engine never
//! creates endpoints; it only enumerates, labels and connects them.

use serde::{Deserialize, Serialize};

/// Maximum number of aliases a routing-server port can carry.
pub const MAX_ALIASES: usize = 2;

/// Data flow direction of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// Emits data (a capture port or a client output).
    Source,
    /// Receives data (a playback port or a client input).
    Sink,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Source => Direction::Sink,
            Direction::Sink => Direction::Source,
        }
    }

    /// Label used in stable uids: hardware sources are device inputs.
    pub fn uid_suffix(self) -> &'static str {
        match self {
            Direction::Source => "IN",
            Direction::Sink => "OUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PortKind {
    Audio,
    Midi,
}

/// A single routing-server port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Server-qualified name, `client:port`.
    pub name: String,
    pub direction: Direction,
    pub kind: PortKind,
    pub physical: bool,
    /// At most [`MAX_ALIASES`] entries: `[uid, friendly_name]` once labelled.
    pub aliases: Vec<String>,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, direction: Direction, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            direction,
            kind,
            physical: false,
            aliases: Vec::new(),
        }
    }

    pub fn midi_source(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Source, PortKind::Midi)
    }

    pub fn midi_sink(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Sink, PortKind::Midi)
    }

    pub fn audio_source(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Source, PortKind::Audio)
    }

    pub fn audio_sink(name: impl Into<String>) -> Self {
        Self::new(name, Direction::Sink, PortKind::Audio)
    }

    pub fn physical(mut self) -> Self {
        self.physical = true;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        if self.aliases.len() < MAX_ALIASES {
            self.aliases.push(alias.into());
        }
        self
    }

    /// Client part of the name (before the first `:`).
    pub fn client_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(c, _)| c)
    }

    /// Port part of the name (after the first `:`).
    pub fn short_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(_, p)| p)
    }

    pub fn is_midi(&self) -> bool {
        self.kind == PortKind::Midi
    }

    pub fn is_audio(&self) -> bool {
        self.kind == PortKind::Audio
    }

    pub fn matches(&self, filter: &EndpointFilter) -> bool {
        filter.kind.is_none_or(|k| k == self.kind)
            && filter.direction.is_none_or(|d| d == self.direction)
            && (!filter.physical_only || self.physical)
            && filter
                .client
                .as_deref()
                .is_none_or(|c| self.client_name() == c)
    }
}

/// Selection criteria for [`crate::RoutingServer::endpoints`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointFilter {
    pub kind: Option<PortKind>,
    pub direction: Option<Direction>,
    pub physical_only: bool,
    /// Exact client name.
    pub client: Option<String>,
}

impl EndpointFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn midi(direction: Direction) -> Self {
        Self {
            kind: Some(PortKind::Midi),
            direction: Some(direction),
            ..Self::default()
        }
    }

    pub fn audio(direction: Direction) -> Self {
        Self {
            kind: Some(PortKind::Audio),
            direction: Some(direction),
            ..Self::default()
        }
    }

    pub fn physical(mut self) -> Self {
        self.physical_only = true;
        self
    }

    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_parts() {
        let ep = Endpoint::midi_source("system:midi_capture_1");
        assert_eq!(ep.client_name(), "system");
        assert_eq!(ep.short_name(), "midi_capture_1");

        // Only the first colon splits
        let ep = Endpoint::audio_sink("a2j:Launchkey [24] (playback): MIDI 1");
        assert_eq!(ep.client_name(), "a2j");
        assert_eq!(ep.short_name(), "Launchkey [24] (playback): MIDI 1");
    }

    #[test]
    fn test_alias_limit() {
        let ep = Endpoint::midi_sink("system:midi_playback_1")
            .with_alias("a")
            .with_alias("b")
            .with_alias("c");
        assert_eq!(ep.aliases, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_filter_matching() {
        let hw = Endpoint::midi_source("system:midi_capture_1").physical();
        let soft = Endpoint::midi_source("router:main_out");

        let filter = EndpointFilter::midi(Direction::Source).physical();
        assert!(hw.matches(&filter));
        assert!(!soft.matches(&filter));

        let filter = EndpointFilter::midi(Direction::Sink);
        assert!(!hw.matches(&filter));

        let filter = EndpointFilter::all().client("router");
        assert!(soft.matches(&filter));
        assert!(!hw.matches(&filter));
    }

    #[test]
    fn test_uid_suffix() {
        assert_eq!(Direction::Source.uid_suffix(), "IN");
        assert_eq!(Direction::Sink.uid_suffix(), "OUT");
        assert_eq!(Direction::Source.opposite(), Direction::Sink);
    }
}
