//! Host USB link state.
//!
//! When the device runs as a USB gadget, a host computer shows up as a MIDI peer.
//! The gadget's MIDI ports exist whether or not a cable is plugged in, so the link
//! state is read separately and ports of a down link are treated as unplugged.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait HostLinkProbe: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Reads `<sysfs>/class/udc/*/state`; the link is up when any controller reports
/// `configured`.
#[derive(Debug, Clone)]
pub struct SysfsUdcProbe {
    udc_dir: PathBuf,
}

impl SysfsUdcProbe {
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            udc_dir: sysfs_root.into().join("class/udc"),
        }
    }
}

impl HostLinkProbe for SysfsUdcProbe {
    fn is_connected(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.udc_dir) else {
            return false;
        };
        entries.flatten().any(|entry| {
            fs::read_to_string(entry.path().join("state"))
                .map(|state| state.trim() == "configured")
                .unwrap_or(false)
        })
    }
}

/// Link state set by hand, for hosts without a USB device controller and for tests.
#[derive(Debug, Default)]
pub struct StaticLinkProbe {
    connected: AtomicBool,
}

impl StaticLinkProbe {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl HostLinkProbe for StaticLinkProbe {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
