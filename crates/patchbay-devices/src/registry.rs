//! Device slots.
//!
//! Physical endpoints get small, stable slot indices that do not depend on the order
//! in which the OS or driver enumerated them. Each direction has its own table of
//! [`SLOT_CAPACITY`] slots; the index is the public identity used by chain routing
//! rules and by control-surface drivers.
//!
//! Slots remember the uid of their last occupant, so a device that is unplugged and
//! plugged back in reclaims its old slot as long as nobody else took it meanwhile.

use patchbay_core::{Direction, Endpoint};
use std::collections::HashSet;

pub const SLOT_CAPACITY: usize = 16;

/// A live endpoint together with its stable uid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    pub endpoint: Endpoint,
    pub uid: String,
}

/// Change reported by a slot refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotEvent {
    Connected {
        direction: Direction,
        slot: usize,
        uid: String,
    },
    Disconnected {
        direction: Direction,
        slot: usize,
        uid: String,
    },
    /// Same device, same slot, new endpoint name.
    Renamed {
        direction: Direction,
        slot: usize,
        uid: String,
        endpoint: String,
    },
}

impl SlotEvent {
    pub fn slot(&self) -> usize {
        match self {
            SlotEvent::Connected { slot, .. }
            | SlotEvent::Disconnected { slot, .. }
            | SlotEvent::Renamed { slot, .. } => *slot,
        }
    }
}

/// Fixed-size slot arena for one direction.
#[derive(Debug, Clone)]
pub struct SlotTable {
    direction: Direction,
    slots: Vec<Option<SlotEntry>>,
    /// Uid of the last occupant of each slot.
    last_uid: Vec<Option<String>>,
    /// Endpoints already reported as unslotted, so the warning fires once.
    unslotted: HashSet<String>,
}

impl SlotTable {
    pub fn new(direction: Direction, capacity: usize) -> Self {
        Self {
            direction,
            slots: vec![None; capacity],
            last_uid: vec![None; capacity],
            unslotted: HashSet::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reconcile the table with the live hardware endpoints of this direction.
    ///
    /// Frees slots whose device disappeared, re-binds slots whose device came back
    /// under a different endpoint name, and assigns free slots to new endpoints.
    /// A different device showing up under an old endpoint name is a new device.
    pub fn refresh(&mut self, live: &[SlotEntry]) -> Vec<SlotEvent> {
        let mut events = Vec::new();
        let mut claimed: HashSet<&str> = HashSet::new();

        // Keep occupants that are still live. The uid decides; the name only breaks
        // ties between endpoints sharing a uid.
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            let Some(current) = entry.as_mut() else {
                continue;
            };
            let candidate = |l: &&SlotEntry| {
                l.uid == current.uid && !claimed.contains(l.endpoint.name.as_str())
            };
            let found = live
                .iter()
                .filter(candidate)
                .find(|l| l.endpoint.name == current.endpoint.name)
                .or_else(|| live.iter().find(candidate));
            match found {
                Some(l) => {
                    claimed.insert(l.endpoint.name.as_str());
                    if l.endpoint.name != current.endpoint.name {
                        tracing::debug!(
                            "Slot {} re-enumerated: {} -> {}",
                            slot,
                            current.endpoint.name,
                            l.endpoint.name
                        );
                        events.push(SlotEvent::Renamed {
                            direction: self.direction,
                            slot,
                            uid: l.uid.clone(),
                            endpoint: l.endpoint.name.clone(),
                        });
                    }
                    *current = l.clone();
                }
                None => {
                    tracing::info!(
                        "Device {} ({}) disconnected from slot {}",
                        current.uid,
                        current.endpoint.name,
                        slot
                    );
                    events.push(SlotEvent::Disconnected {
                        direction: self.direction,
                        slot,
                        uid: current.uid.clone(),
                    });
                    self.last_uid[slot] = Some(current.uid.clone());
                    *entry = None;
                }
            }
        }

        // Assign the rest
        for l in live {
            if claimed.contains(l.endpoint.name.as_str()) {
                continue;
            }
            match self.pick_free_slot(&l.uid) {
                Some(slot) => {
                    tracing::info!(
                        "Device {} ({}) assigned to slot {}",
                        l.uid,
                        l.endpoint.name,
                        slot
                    );
                    self.slots[slot] = Some(l.clone());
                    self.last_uid[slot] = Some(l.uid.clone());
                    self.unslotted.remove(&l.endpoint.name);
                    events.push(SlotEvent::Connected {
                        direction: self.direction,
                        slot,
                        uid: l.uid.clone(),
                    });
                }
                None => {
                    if self.unslotted.insert(l.endpoint.name.clone()) {
                        tracing::warn!(
                            "No free {:?} slot for {} ({}), left unslotted",
                            self.direction,
                            l.uid,
                            l.endpoint.name
                        );
                    }
                }
            }
        }

        self.unslotted
            .retain(|name| live.iter().any(|l| &l.endpoint.name == name));
        events
    }

    /// The slot last held by `uid` if it is free, else the lowest free slot.
    fn pick_free_slot(&self, uid: &str) -> Option<usize> {
        let remembered = self
            .slots
            .iter()
            .zip(&self.last_uid)
            .position(|(s, last)| s.is_none() && last.as_deref() == Some(uid));
        remembered.or_else(|| self.slots.iter().position(Option::is_none))
    }

    pub fn get(&self, slot: usize) -> Option<&SlotEntry> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn slot_of(&self, endpoint_name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.endpoint.name == endpoint_name))
    }

    pub fn slot_of_uid(&self, uid: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|e| e.uid == uid))
    }

    /// Occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &SlotEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    pub fn unslotted_count(&self) -> usize {
        self.unslotted.len()
    }
}

/// Slot tables for both directions.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    inputs: SlotTable,
    outputs: SlotTable,
}

impl DeviceRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            inputs: SlotTable::new(Direction::Source, capacity),
            outputs: SlotTable::new(Direction::Sink, capacity),
        }
    }

    /// Refresh both tables from the live hardware sources and destinations.
    pub fn refresh_slots(&mut self, sources: &[SlotEntry], sinks: &[SlotEntry]) -> Vec<SlotEvent> {
        let mut events = self.inputs.refresh(sources);
        events.extend(self.outputs.refresh(sinks));
        events
    }

    pub fn table(&self, direction: Direction) -> &SlotTable {
        match direction {
            Direction::Source => &self.inputs,
            Direction::Sink => &self.outputs,
        }
    }

    pub fn slot_of(&self, endpoint: &Endpoint) -> Option<usize> {
        self.table(endpoint.direction).slot_of(&endpoint.name)
    }

    pub fn endpoint_of(&self, direction: Direction, slot: usize) -> Option<&Endpoint> {
        self.table(direction).get(slot).map(|e| &e.endpoint)
    }

    pub fn slot_of_uid(&self, direction: Direction, uid: &str) -> Option<usize> {
        self.table(direction).slot_of_uid(uid)
    }

    pub fn uid_of(&self, direction: Direction, slot: usize) -> Option<&str> {
        self.table(direction).get(slot).map(|e| e.uid.as_str())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(SLOT_CAPACITY)
    }
}
