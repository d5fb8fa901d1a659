//! Autoconnector configuration.
//!
//! Every port name the engine routes by is configurable. Names containing `{}`
//! are templates filled with a slot index or a MIDI channel number.

use crate::{Error, Result};
use patchbay_devices::{VirtualService, SLOT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Well-known ports of the surrounding system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemPorts {
    /// Router input fed by the hardware source in slot `{}`.
    pub router_device_in: String,
    /// Router output for channel `{}` (1-16), feeding MIDI output chains.
    pub router_channel_out: String,
    /// Filtered MIDI output, sent to enabled hardware destinations.
    pub router_midi_out: String,
    /// Controller feedback output, sent to feedback-enabled destinations.
    pub router_ctrl_out: String,
    pub router_ctrl_in: String,
    pub router_main_out: String,
    pub router_step_in: String,
    pub router_step_out: String,
    pub router_seq_in: String,

    pub sequencer_out: String,
    pub sequencer_in: String,
    pub smf_in: String,
    pub smf_out: String,
    /// Name prefixes of synth-engine ports that send controller feedback.
    pub feedback_sources: Vec<String>,

    /// Client whose audio outputs carry the metronome click.
    pub metronome: String,
    pub mixer_returns: Vec<String>,
    pub mixer_outputs: Vec<String>,
    pub playback_prefix: String,
    pub headphones_prefix: String,
    pub capture_prefix: String,
    /// Client of the audio-to-MIDI pitch tracker.
    pub pitch_tracker: String,
}

impl Default for SystemPorts {
    fn default() -> Self {
        Self {
            router_device_in: "router:dev{}_in".into(),
            router_channel_out: "router:ch{}_out".into(),
            router_midi_out: "router:midi_out".into(),
            router_ctrl_out: "router:ctrl_out".into(),
            router_ctrl_in: "router:ctrl_in".into(),
            router_main_out: "router:main_out".into(),
            router_step_in: "router:step_in".into(),
            router_step_out: "router:step_out".into(),
            router_seq_in: "router:seq_in".into(),
            sequencer_out: "sequencer:output".into(),
            sequencer_in: "sequencer:input".into(),
            smf_in: "smf:midi_in".into(),
            smf_out: "smf:midi_out".into(),
            feedback_sources: vec!["synth:ctrl_out".into()],
            metronome: "metronome".into(),
            mixer_returns: vec!["mixer:return_a".into(), "mixer:return_b".into()],
            mixer_outputs: vec!["mixer:output_a".into(), "mixer:output_b".into()],
            playback_prefix: "system:playback_".into(),
            headphones_prefix: "headphones:playback_".into(),
            capture_prefix: "system:capture_".into(),
            pitch_tracker: "pitch".into(),
        }
    }
}

impl SystemPorts {
    pub fn router_device_in(&self, slot: usize) -> String {
        self.router_device_in.replace("{}", &slot.to_string())
    }

    /// `channel` is 0-based; port names count from 1.
    pub fn router_channel_out(&self, channel: u8) -> String {
        self.router_channel_out
            .replace("{}", &(u16::from(channel) + 1).to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoconnectConfig {
    pub tick_ms: u64,
    pub hotplug_interval_ms: u64,
    /// How long a fast request waits for the lock before deferring.
    pub lock_timeout_ms: u64,
    pub slot_capacity: usize,
    pub client_name: String,
    pub sysfs_root: PathBuf,
    pub ports: SystemPorts,
    /// Software endpoints treated as hardware, with fixed uids.
    pub virtual_services: Vec<VirtualService>,
    /// Further endpoint prefixes treated as hardware (sequencer clock and step ports).
    pub virtual_hardware: Vec<String>,
    /// Destinations under these prefixes are never managed.
    pub unmanaged_prefixes: Vec<String>,
    pub host_link_patterns: Vec<String>,
    pub din5_patterns: Vec<String>,
}

impl Default for AutoconnectConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            hotplug_interval_ms: 2000,
            lock_timeout_ms: 10,
            slot_capacity: SLOT_CAPACITY,
            client_name: "patchbay".into(),
            sysfs_root: PathBuf::from("/sys"),
            ports: SystemPorts::default(),
            virtual_services: vec![
                VirtualService::new("rtpmidi:", "NET:rtpmidi", "Network RTP-MIDI"),
                VirtualService::new("QmidiNet:", "NET:qmidinet", "Network QmidiNet"),
                VirtualService::new("touchosc:", "NET:touchosc", "TouchOSC bridge"),
                VirtualService::new("pitch:", "AUBIO:pitch", "Pitch tracker"),
            ],
            virtual_hardware: vec!["sequencer:clock".into(), "sequencer:step".into()],
            unmanaged_prefixes: vec!["mod-host:".into()],
            host_link_patterns: vec!["f_midi".into()],
            din5_patterns: vec!["ttymidi".into(), "MIDI DIN".into()],
        }
    }
}

impl AutoconnectConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn hotplug_interval(&self) -> Duration {
        Duration::from_millis(self.hotplug_interval_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::Core(patchbay_core::Error::InvalidConfig(msg)));

        if self.tick_ms == 0 {
            return invalid("tick_ms must be > 0".into());
        }
        if self.hotplug_interval_ms < self.tick_ms {
            return invalid(format!(
                "hotplug_interval_ms {} shorter than tick_ms {}",
                self.hotplug_interval_ms, self.tick_ms
            ));
        }
        if self.slot_capacity == 0 || self.slot_capacity > 64 {
            return invalid(format!(
                "slot_capacity {} out of range (1-64)",
                self.slot_capacity
            ));
        }
        for (field, template) in [
            ("router_device_in", &self.ports.router_device_in),
            ("router_channel_out", &self.ports.router_channel_out),
        ] {
            if !template.contains("{}") {
                return invalid(format!("{} must contain {{}}: {}", field, template));
            }
        }
        if self.ports.mixer_outputs.is_empty() {
            return invalid("mixer_outputs is empty".into());
        }
        Ok(())
    }
}
