//! JACK backend for [`RoutingServer`].
//!
//! Requires the `jack` feature. The client is activated with a notification handler
//! that counts xruns into the shared [`ServerTelemetry`]; it never registers ports of
//! its own and never processes audio.

use crate::endpoint::{Direction, Endpoint, EndpointFilter, PortKind, MAX_ALIASES};
use crate::error::{Error, Result, RouteError};
use crate::server::RoutingServer;
use crate::telemetry::{ServerStats, ServerTelemetry};
use ::jack::{AsyncClient, Client, ClientOptions, Control, NotificationHandler, PortFlags};
use std::sync::Arc;

const AUDIO_TYPE: &str = "32 bit float mono audio";
const MIDI_TYPE: &str = "8 bit raw midi";

pub struct XrunCounter {
    telemetry: Arc<ServerTelemetry>,
}

impl NotificationHandler for XrunCounter {
    fn xrun(&mut self, _: &Client) -> Control {
        self.telemetry.record_xrun();
        Control::Continue
    }
}

pub struct JackServer {
    client: AsyncClient<XrunCounter, ()>,
    telemetry: Arc<ServerTelemetry>,
}

impl JackServer {
    /// Attach to a running JACK server. Never starts one.
    pub fn connect(client_name: &str, telemetry: Arc<ServerTelemetry>) -> Result<Self> {
        let (client, _status) = Client::new(client_name, ClientOptions::NO_START_SERVER)
            .map_err(|e| Error::ServerUnavailable(e.to_string()))?;
        let handler = XrunCounter {
            telemetry: Arc::clone(&telemetry),
        };
        let client = client
            .activate_async(handler, ())
            .map_err(|e| Error::ServerUnavailable(e.to_string()))?;

        tracing::info!("Attached to JACK as {}", client_name);
        Ok(Self { client, telemetry })
    }

    fn jack(&self) -> &Client {
        self.client.as_client()
    }
}

/// JACK matches port names against a regex; client names may contain brackets.
fn client_pattern(client: &str) -> String {
    format!("^{}:", regex::escape(client))
}

impl RoutingServer for JackServer {
    fn endpoints(&self, filter: &EndpointFilter) -> Vec<Endpoint> {
        let mut flags = PortFlags::empty();
        if filter.physical_only {
            flags |= PortFlags::IS_PHYSICAL;
        }
        match filter.direction {
            Some(Direction::Source) => flags |= PortFlags::IS_OUTPUT,
            Some(Direction::Sink) => flags |= PortFlags::IS_INPUT,
            None => {}
        }
        let type_pattern = match filter.kind {
            Some(PortKind::Audio) => Some(AUDIO_TYPE),
            Some(PortKind::Midi) => Some(MIDI_TYPE),
            None => None,
        };
        let name_pattern = filter
            .client
            .as_deref()
            .map(client_pattern);

        let mut names = self
            .jack()
            .ports(name_pattern.as_deref(), type_pattern, flags);
        names.sort();
        names
            .iter()
            .filter_map(|name| self.endpoint(name))
            .filter(|e| e.matches(filter))
            .collect()
    }

    fn endpoint(&self, name: &str) -> Option<Endpoint> {
        let port = self.jack().port_by_name(name)?;
        let flags = port.flags();
        let direction = if flags.contains(PortFlags::IS_OUTPUT) {
            Direction::Source
        } else {
            Direction::Sink
        };
        let kind = match port.port_type() {
            Ok(t) if t.contains("midi") => PortKind::Midi,
            _ => PortKind::Audio,
        };
        Some(Endpoint {
            name: name.to_string(),
            direction,
            kind,
            physical: flags.contains(PortFlags::IS_PHYSICAL),
            aliases: port.aliases().unwrap_or_default(),
        })
    }

    fn connections(&self, name: &str) -> std::result::Result<Vec<String>, RouteError> {
        let port = self
            .jack()
            .port_by_name(name)
            .ok_or_else(|| RouteError::PortNotFound(name.to_string()))?;
        Ok(port.get_connections())
    }

    fn connect(&mut self, source: &str, destination: &str) -> std::result::Result<(), RouteError> {
        self.jack()
            .connect_ports_by_name(source, destination)
            .map_err(|e| RouteError::Server(e.to_string()))
    }

    fn disconnect(
        &mut self,
        source: &str,
        destination: &str,
    ) -> std::result::Result<(), RouteError> {
        self.jack()
            .disconnect_ports_by_name(source, destination)
            .map_err(|e| RouteError::Server(e.to_string()))
    }

    fn set_aliases(&mut self, name: &str, aliases: &[String]) -> std::result::Result<(), RouteError> {
        let mut port = self
            .jack()
            .port_by_name(name)
            .ok_or_else(|| RouteError::PortNotFound(name.to_string()))?;
        for old in port.aliases().unwrap_or_default() {
            if let Err(e) = port.unset_alias(&old) {
                tracing::debug!("Could not clear alias '{}' of {}: {}", old, name, e);
            }
        }
        for alias in aliases.iter().take(MAX_ALIASES) {
            port.set_alias(alias)
                .map_err(|e| RouteError::Server(e.to_string()))?;
        }
        Ok(())
    }

    fn stats(&self) -> ServerStats {
        let client = self.jack();
        self.telemetry.merge(ServerStats {
            cpu_load: client.cpu_load(),
            sample_rate: client.sample_rate() as u32,
            block_size: client.buffer_size() as u32,
            xruns: 0,
        })
    }

    fn telemetry(&self) -> Option<Arc<ServerTelemetry>> {
        Some(Arc::clone(&self.telemetry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_pattern() {
        assert_eq!(client_pattern("a2j"), "^a2j:");
        assert_eq!(client_pattern("Midi Through [14]"), "^Midi Through \\[14\\]:");

        let re = regex::Regex::new(&client_pattern("Midi Through [14]")).unwrap();
        assert!(re.is_match("Midi Through [14]:port_0"));
        assert!(!re.is_match("Midi Through 1:port_0"));
    }

    /// Needs a running JACK server.
    #[test]
    #[ignore]
    fn test_enumerate_live_server() {
        let telemetry = Arc::new(ServerTelemetry::new());
        let server = JackServer::connect("patchbay-test", telemetry).unwrap();
        let all = server.endpoints(&EndpointFilter::all());
        for ep in &all {
            assert!(server.endpoint(&ep.name).is_some());
        }
        assert!(server.stats().sample_rate > 0);
    }
}
