//! Physical device bookkeeping for the patchbay engine.
//!
//! # Primary API
//!
//! - [`DeviceRegistry`]: stable slot indices for hardware endpoints
//! - [`IdentityManager`]: stable uids and `[uid, friendly_name]` aliases
//! - [`AliasTable`]: user-assigned friendly names
//! - [`HostLinkProbe`]: USB host link state
//! - [`DriverRegistry`] / [`DriverBindings`]: control-surface drivers per slot

pub mod error;
pub use error::{Error, Result};

pub mod registry;
pub use registry::{DeviceRegistry, SlotEntry, SlotEvent, SlotTable, SLOT_CAPACITY};

pub mod identity;
pub use identity::{DeviceClass, Identity, IdentityManager, VirtualService};

mod aliases;
pub use aliases::AliasTable;

mod hostlink;
pub use hostlink::{HostLinkProbe, StaticLinkProbe, SysfsUdcProbe};

pub mod surface;
pub use surface::{
    ControlSurfaceDriver, DeviceInfo, DeviceMatch, DriverBindings, DriverConstructor,
    DriverRegistry, NoRouterControl, RouterControl,
};
