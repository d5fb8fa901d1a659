//! Centralized error type for the patchbay umbrella crate.
//!
//! Wraps the subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] patchbay_core::Error),

    #[error("Devices: {0}")]
    Devices(#[from] patchbay_devices::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<patchbay_core::RouteError> for Error {
    fn from(e: patchbay_core::RouteError) -> Self {
        Error::Core(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
