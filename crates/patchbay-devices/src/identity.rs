//! Stable device identities and endpoint aliases.
//!
//! Routing-server port names are not stable: USB devices re-enumerate under new
//! names whenever they are re-plugged or the bus is rescanned. A device's *uid* is
//! derived from something that does not move:
//!
//! - known virtual services (network bridges, pitch tracker) have fixed uids;
//! - USB devices are located through sysfs: the sound-card index found in the
//!   port's hardware aliases resolves to a bus/port path such as `1-1.3`, giving
//!   `USB:1.1.3 <label> IN`;
//! - anything else falls back to the port's short name.
//!
//! Once labelled, a port carries `[uid, friendly_name]` as its two aliases. The
//! hardware aliases that were there before are gone at that point, so the identity
//! computed on first sight is cached and reused while the labels stay in place.

use crate::aliases::AliasTable;
use crate::error::{Error, Result};
use patchbay_core::{Endpoint, RoutingServer};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const USB_PREFIX: &str = "USB:";

/// `hw:2,0,0` in ALSA names, `hw-2-0-0` in JACK aliases.
static CARD_INDEX: LazyLock<Option<Regex>> = LazyLock::new(|| match Regex::new(r"hw[:-](\d+)") {
    Ok(re) => Some(re),
    Err(e) => {
        tracing::error!("Card index pattern does not compile: {}", e);
        None
    }
});

/// A software endpoint that is treated as hardware and has a well-known uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualService {
    /// Endpoint name prefix, usually `client:`.
    pub prefix: String,
    pub uid: String,
    pub name: String,
}

impl VirtualService {
    pub fn new(prefix: impl Into<String>, uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uid: uid.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Usb,
    Din5,
    HostLink,
    Service,
    Other,
}

/// Resolved identity of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub class: DeviceClass,
    /// Friendly name used when the alias table has no entry for the uid.
    pub default_name: String,
}

pub struct IdentityManager {
    sysfs_root: PathBuf,
    services: Vec<VirtualService>,
    din5_patterns: Vec<String>,
    host_link_patterns: Vec<String>,
    /// Endpoint name -> identity computed from its original aliases.
    cache: HashMap<String, Identity>,
}

impl IdentityManager {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            services: Vec::new(),
            din5_patterns: Vec::new(),
            host_link_patterns: Vec::new(),
            cache: HashMap::new(),
        }
    }

    pub fn with_service(mut self, service: VirtualService) -> Self {
        self.services.push(service);
        self
    }

    pub fn with_services(mut self, services: impl IntoIterator<Item = VirtualService>) -> Self {
        self.services.extend(services);
        self
    }

    pub fn with_din5_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.din5_patterns.extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_host_link_patterns<S: Into<String>>(
        mut self,
        patterns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.host_link_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn sysfs_root(&self) -> &Path {
        &self.sysfs_root
    }

    pub fn compute_uid(&mut self, endpoint: &Endpoint) -> String {
        self.identify(endpoint).uid
    }

    /// Resolve (or recall) the identity of `endpoint`.
    pub fn identify(&mut self, endpoint: &Endpoint) -> Identity {
        if let Some(cached) = self.cache.get(&endpoint.name) {
            // Still wearing our labels: hardware aliases are gone, trust the cache
            if endpoint.aliases.first() == Some(&cached.uid) {
                return cached.clone();
            }
        }
        let identity = self.resolve(endpoint);
        self.cache.insert(endpoint.name.clone(), identity.clone());
        identity
    }

    fn resolve(&self, endpoint: &Endpoint) -> Identity {
        let dir = endpoint.direction.uid_suffix();

        if let Some(service) = self
            .services
            .iter()
            .find(|s| endpoint.name.starts_with(&s.prefix))
        {
            return Identity {
                uid: format!("{} {}", service.uid, dir),
                class: DeviceClass::Service,
                default_name: service.name.clone(),
            };
        }

        let fallback = |class, default_name: String| Identity {
            uid: endpoint.short_name().to_string(),
            class,
            default_name,
        };
        if matches_any(endpoint, &self.host_link_patterns) {
            return fallback(DeviceClass::HostLink, format!("USB host MIDI {}", dir));
        }
        if matches_any(endpoint, &self.din5_patterns) {
            return fallback(DeviceClass::Din5, format!("DIN-5 MIDI {}", dir));
        }

        // Labelled by a previous run of this engine. The second alias may be a
        // user name, so the default comes from the label inside the uid.
        if let Some(uid) = endpoint.aliases.first().filter(|a| a.starts_with(USB_PREFIX)) {
            return Identity {
                uid: uid.clone(),
                class: DeviceClass::Usb,
                default_name: usb_uid_label(uid)
                    .map(device_name)
                    .unwrap_or_else(|| endpoint.short_name().to_string()),
            };
        }

        match self.usb_uid(endpoint) {
            Ok(identity) => identity,
            Err(e) => {
                tracing::debug!("No USB identity for {}: {}", endpoint.name, e);
                fallback(DeviceClass::Other, endpoint.short_name().to_string())
            }
        }
    }

    fn usb_uid(&self, endpoint: &Endpoint) -> Result<Identity> {
        let card = card_index(endpoint).ok_or_else(|| Error::NoCardIndex(endpoint.name.clone()))?;
        let path = self.usb_path(card)?;
        let label = hardware_label(endpoint);
        Ok(Identity {
            uid: format!(
                "{}{} {} {}",
                USB_PREFIX,
                path,
                label,
                endpoint.direction.uid_suffix()
            ),
            class: DeviceClass::Usb,
            default_name: device_name(label),
        })
    }

    /// `<sysfs>/class/sound/cardN/device` links to the USB interface node.
    fn usb_path(&self, card: u32) -> Result<String> {
        let link = self
            .sysfs_root
            .join("class/sound")
            .join(format!("card{}", card))
            .join("device");
        let target = fs::read_link(&link).map_err(|source| Error::Sysfs {
            path: link.clone(),
            source,
        })?;
        let node = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::UnrecognisedTopology(target.display().to_string()))?;
        parse_usb_topology(node)
    }

    pub fn is_host_link(&self, endpoint: &Endpoint) -> bool {
        matches_any(endpoint, &self.host_link_patterns)
    }

    pub fn is_service(&self, endpoint: &Endpoint) -> bool {
        self.services
            .iter()
            .any(|s| endpoint.name.starts_with(&s.prefix))
    }

    /// Default friendly name of a uid seen on a live endpoint.
    pub fn default_name(&self, uid: &str) -> Option<&str> {
        self.cache
            .values()
            .find(|i| i.uid == uid)
            .map(|i| i.default_name.as_str())
    }

    /// Label every endpoint with `[uid, friendly_name]`.
    ///
    /// Only endpoints whose aliases differ are written, so a second call with no
    /// hardware or name change writes nothing. Returns the number of writes.
    pub fn refresh_aliases<S>(&mut self, server: &mut S, endpoints: &[Endpoint], table: &AliasTable) -> usize
    where
        S: RoutingServer + ?Sized,
    {
        self.cache
            .retain(|name, _| endpoints.iter().any(|e| &e.name == name));

        let mut writes = 0;
        for endpoint in endpoints {
            let identity = self.identify(endpoint);
            let friendly = table
                .get(&identity.uid)
                .unwrap_or(identity.default_name.as_str())
                .to_string();
            let desired = [identity.uid, friendly];
            if endpoint.aliases == desired {
                continue;
            }
            match server.set_aliases(&endpoint.name, &desired) {
                Ok(()) => writes += 1,
                Err(e) => tracing::debug!("Cannot label {}: {}", endpoint.name, e),
            }
        }
        writes
    }

    /// Store a new friendly name and relabel any live endpoint carrying `uid`.
    pub fn rename<S>(
        &mut self,
        server: &mut S,
        uid: &str,
        name: &str,
        table: &mut AliasTable,
        live: &[Endpoint],
    ) -> Result<usize>
    where
        S: RoutingServer + ?Sized,
    {
        table.set(uid, name);

        let mut updated = 0;
        for endpoint in live {
            let identity = self.identify(endpoint);
            if identity.uid != uid {
                continue;
            }
            let friendly = table
                .get(uid)
                .unwrap_or(identity.default_name.as_str())
                .to_string();
            server.set_aliases(&endpoint.name, &[identity.uid, friendly])?;
            updated += 1;
        }
        tracing::info!("Renamed {} to \"{}\" ({} live endpoints)", uid, name, updated);
        Ok(updated)
    }
}

fn matches_any(endpoint: &Endpoint, patterns: &[String]) -> bool {
    patterns.iter().any(|p| {
        endpoint.name.contains(p.as_str()) || endpoint.aliases.iter().any(|a| a.contains(p.as_str()))
    })
}

/// Sound-card index from a `hw:N` or `hw-N` token in the name or aliases.
fn card_index(endpoint: &Endpoint) -> Option<u32> {
    std::iter::once(&endpoint.name)
        .chain(&endpoint.aliases)
        .find_map(|s| parse_card_index(s))
}

fn parse_card_index(s: &str) -> Option<u32> {
    CARD_INDEX
        .as_ref()?
        .captures_iter(s)
        .find_map(|caps| caps[1].parse().ok())
}

/// Per-card port label from a hardware alias such as `alsa_pcm:Launchkey-Mini/midi_capture_1`.
fn hardware_label(endpoint: &Endpoint) -> &str {
    endpoint
        .aliases
        .iter()
        .filter_map(|a| a.split_once(':').map(|(_, rest)| rest))
        .find(|rest| rest.contains('/'))
        .unwrap_or_else(|| endpoint.short_name())
}

/// `USB:1.1.3 Keys/midi_capture_1 IN` carries the label `Keys/midi_capture_1`.
fn usb_uid_label(uid: &str) -> Option<&str> {
    let (_, rest) = uid.strip_prefix(USB_PREFIX)?.split_once(' ')?;
    let (label, _) = rest.rsplit_once(' ')?;
    Some(label).filter(|l| !l.is_empty())
}

fn device_name(label: &str) -> String {
    let device = label.split_once('/').map_or(label, |(d, _)| d);
    device.replace(['-', '_'], " ")
}

/// `1-1.3:1.0` (bus 1, hub port 1, port 3, interface 1.0) becomes `1.1.3`.
pub fn parse_usb_topology(node: &str) -> Result<String> {
    let device = node.split_once(':').map_or(node, |(d, _)| d);
    let bad = || Error::UnrecognisedTopology(node.to_string());
    let (bus, ports) = device.split_once('-').ok_or_else(bad)?;

    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !numeric(bus) || !ports.split('.').all(numeric) {
        return Err(bad());
    }
    Ok(format!("{}.{}", bus, ports))
}
