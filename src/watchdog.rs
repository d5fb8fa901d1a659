//! Background worker that runs deferred passes and polls for hot-plug.

use crate::engine::Shared;
use crate::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Midi,
    Audio,
    /// Wakes the loop so it can notice shutdown.
    Wake,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunState {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl From<u8> for RunState {
    fn from(value: u8) -> Self {
        match value {
            1 => RunState::Running,
            2 => RunState::Paused,
            _ => RunState::Stopped,
        }
    }
}

pub(crate) struct Watchdog {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl Watchdog {
    pub fn spawn(shared: Arc<Shared>) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let rx = shared.commands_rx.clone();
        let worker_shared = Arc::clone(&shared);
        let worker_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name("patchbay-watchdog".into())
            .spawn(move || watchdog_loop(worker_shared, rx, worker_shutdown))?;

        Ok(Self {
            handle: Some(handle),
            shutdown,
            shared,
        })
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.shared.send(Command::Wake);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watchdog_loop(shared: Arc<Shared>, rx: Receiver<Command>, shutdown: Arc<AtomicBool>) {
    let tick = shared.config.tick();
    let hotplug_interval = shared.config.hotplug_interval();
    let mut last_check = Instant::now();
    let mut pending_midi = false;
    let mut pending_audio = false;

    tracing::debug!("Watchdog running, tick {:?}", tick);

    loop {
        // Sleep until the next tick or the next command, whichever comes first
        let first = match rx.recv_timeout(tick) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        for command in first.into_iter().chain(rx.try_iter()) {
            match command {
                Command::Midi => pending_midi = true,
                Command::Audio => pending_audio = true,
                Command::Wake => {}
            }
        }

        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if shared.run_state() == RunState::Paused {
            continue;
        }

        if last_check.elapsed() >= hotplug_interval {
            last_check = Instant::now();
            let mut state = shared.state.lock();
            if shared.hardware_changed(&mut state) {
                tracing::debug!("Hardware changed");
                pending_midi = true;
            }
        }

        if pending_midi || pending_audio {
            let mut state = shared.state.lock();
            if std::mem::take(&mut pending_midi) {
                shared.midi_pass(&mut state);
            }
            if std::mem::take(&mut pending_audio) {
                shared.audio_pass(&mut state);
            }
        }
    }

    tracing::debug!("Watchdog exiting");
}
