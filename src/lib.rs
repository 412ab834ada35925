//! GATT server characteristic core.
//!
//! Owns the value of a single Bluetooth LE characteristic, serves read and
//! write access events from the transport layer, and fans out notifications
//! and indications to subscribed peers. Link management and the send
//! primitives are provided by a [`host::Host`] implementation.

pub use gatt_chr_const::{Descriptor as DescriptorUuid, Uuid, Uuid16, UuidType};

pub mod att;
pub mod gatt;
pub mod host;

mod util;
