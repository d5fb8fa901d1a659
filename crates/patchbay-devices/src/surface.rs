//! Control-surface drivers.
//!
//! A driver takes over a physical controller (pads, faders, LEDs) that sits in a
//! device slot. Drivers are picked from a [`DriverRegistry`] by uid or by name
//! pattern when their device is slotted, and released when it is unplugged.
//!
//! While a driver owns a slot, the MIDI router must not broadcast that slot's raw
//! input to the synth engines. [`RouterControl`] is the switch for that.

use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The device a driver is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Input slot of the device.
    pub slot: usize,
    pub uid: String,
    /// Current routing-server endpoint name.
    pub endpoint: String,
    /// Output slot of the same device, for feedback.
    pub output_slot: Option<usize>,
}

pub trait ControlSurfaceDriver: Send {
    fn init(&mut self, device: &DeviceInfo) -> Result<()>;

    /// Called after every MIDI reconciliation pass.
    fn refresh(&mut self) {}

    /// Returns true if the event was consumed.
    fn on_midi_event(&mut self, event: &[u8]) -> bool;

    fn release(&mut self) {}
}

/// How a registered driver recognises its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    /// Exact stable uid.
    Uid(String),
    /// Substring of the uid or the endpoint name.
    NameContains(String),
}

impl DeviceMatch {
    pub fn matches(&self, device: &DeviceInfo) -> bool {
        match self {
            DeviceMatch::Uid(uid) => &device.uid == uid,
            DeviceMatch::NameContains(pattern) => {
                device.uid.contains(pattern.as_str()) || device.endpoint.contains(pattern.as_str())
            }
        }
    }
}

/// Function that builds a driver for a matched device
pub type DriverConstructor =
    Arc<dyn Fn(&DeviceInfo) -> Box<dyn ControlSurfaceDriver> + Send + Sync>;

struct DriverEntry {
    name: String,
    matcher: DeviceMatch,
    constructor: DriverConstructor,
}

/// Table of known drivers. Clones share the same table.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    entries: Arc<RwLock<Vec<DriverEntry>>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver. Earlier registrations win when several match.
    pub fn register<F>(&self, name: impl Into<String>, matcher: DeviceMatch, constructor: F)
    where
        F: Fn(&DeviceInfo) -> Box<dyn ControlSurfaceDriver> + Send + Sync + 'static,
    {
        self.entries.write().push(DriverEntry {
            name: name.into(),
            matcher,
            constructor: Arc::new(constructor),
        });
    }

    /// Build the first driver matching `device`, with its registered name.
    pub fn create(&self, device: &DeviceInfo) -> Option<(String, Box<dyn ControlSurfaceDriver>)> {
        let entries = self.entries.read();
        let entry = entries.iter().find(|e| e.matcher.matches(device))?;
        Some((entry.name.clone(), (entry.constructor)(device)))
    }

    pub fn list_drivers(&self) -> Vec<String> {
        self.entries.read().iter().map(|e| e.name.clone()).collect()
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.name != name);
        entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Low-level MIDI router switch for per-slot raw-input broadcast.
pub trait RouterControl: Send {
    fn set_device_passthrough(&mut self, slot: usize, enabled: bool);
}

/// Router without per-slot control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRouterControl;

impl RouterControl for NoRouterControl {
    fn set_device_passthrough(&mut self, _slot: usize, _enabled: bool) {}
}

struct BoundDriver {
    name: String,
    device: DeviceInfo,
    driver: Box<dyn ControlSurfaceDriver>,
}

/// Drivers currently bound, by input slot.
#[derive(Default)]
pub struct DriverBindings {
    bound: BTreeMap<usize, BoundDriver>,
}

impl DriverBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// A device was slotted: bind a driver if one matches.
    ///
    /// The slot's passthrough is off while a driver owns it and on otherwise.
    /// Returns the driver name when one was bound.
    pub fn on_connected(
        &mut self,
        device: DeviceInfo,
        registry: &DriverRegistry,
        router: &mut dyn RouterControl,
    ) -> Option<&str> {
        let slot = device.slot;
        if self.bound.contains_key(&slot) {
            return None;
        }
        let Some((name, mut driver)) = registry.create(&device) else {
            router.set_device_passthrough(slot, true);
            return None;
        };

        router.set_device_passthrough(slot, false);
        if let Err(e) = driver.init(&device) {
            tracing::warn!("Driver {} failed to start on slot {}: {}", name, slot, e);
            router.set_device_passthrough(slot, true);
            return None;
        }
        tracing::info!("Driver {} bound to {} (slot {})", name, device.uid, slot);

        let bound = self.bound.entry(slot).or_insert(BoundDriver {
            name,
            device,
            driver,
        });
        Some(bound.name.as_str())
    }

    /// A slot was freed. Its passthrough is cut, and restored once a bound driver
    /// has been released. Returns true if a driver was released.
    pub fn on_disconnected(&mut self, slot: usize, router: &mut dyn RouterControl) -> bool {
        router.set_device_passthrough(slot, false);
        let Some(mut bound) = self.bound.remove(&slot) else {
            return false;
        };
        bound.driver.release();
        router.set_device_passthrough(slot, true);
        tracing::info!(
            "Driver {} released from {} (slot {})",
            bound.name,
            bound.device.uid,
            slot
        );
        true
    }

    /// A driver gives up its slot; raw input flows to the engines again.
    pub fn release(&mut self, slot: usize, router: &mut dyn RouterControl) -> Result<()> {
        let mut bound = self.bound.remove(&slot).ok_or(Error::NoDriver(slot))?;
        bound.driver.release();
        router.set_device_passthrough(slot, true);
        tracing::debug!("Driver {} released slot {}", bound.name, slot);
        Ok(())
    }

    /// The bound device re-enumerated under a new endpoint name.
    pub fn on_renamed(&mut self, slot: usize, endpoint: &str) -> bool {
        let Some(bound) = self.bound.get_mut(&slot) else {
            return false;
        };
        tracing::debug!("Driver {} follows slot {} to {}", bound.name, slot, endpoint);
        bound.device.endpoint = endpoint.to_string();
        true
    }

    /// Forward a raw MIDI event. Returns true if a driver consumed it.
    pub fn dispatch(&mut self, slot: usize, event: &[u8]) -> bool {
        self.bound
            .get_mut(&slot)
            .is_some_and(|b| b.driver.on_midi_event(event))
    }

    pub fn refresh_all(&mut self) {
        for bound in self.bound.values_mut() {
            bound.driver.refresh();
        }
    }

    pub fn device(&self, slot: usize) -> Option<&DeviceInfo> {
        self.bound.get(&slot).map(|b| &b.device)
    }

    pub fn driver_name(&self, slot: usize) -> Option<&str> {
        self.bound.get(&slot).map(|b| b.name.as_str())
    }

    pub fn is_bound(&self, slot: usize) -> bool {
        self.bound.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
