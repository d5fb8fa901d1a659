//! Error types for device identity and driver binding.

use patchbay_core::RouteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("No sound-card index for endpoint: {0}")]
    NoCardIndex(String),

    #[error("Cannot read {path}: {source}")]
    Sysfs {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unrecognised USB topology: {0}")]
    UnrecognisedTopology(String),

    #[error("No driver bound to slot {0}")]
    NoDriver(usize),

    #[error("Driver init failed: {0}")]
    DriverInit(String),

    #[error(transparent)]
    Route(#[from] RouteError),
}

pub type Result<T> = std::result::Result<T, Error>;
