//! Transport and connection registry interface.
//!
//! The characteristic core does not manage links. Everything it needs from the
//! underlying stack, namely the connection registry, negotiated MTUs, and the
//! notification and indication send primitives, is provided by a [`Host`]
//! implementation bound to the characteristic at registration time.

use std::fmt::{Debug, Display, Formatter};

use structbuf::StructBuf;

use crate::att::Handle;
use crate::util::name_of;

/// Indication procedure completed and was confirmed by the peer.
pub const EDONE: i32 = 14;
/// Indication was not confirmed within the transaction timeout.
pub const ETIMEOUT: i32 = 13;
/// Connection was terminated while the operation was in progress.
pub const ENOTCONN: i32 = 7;

/// Raw host status code returned by the send primitives. `Ok(())` means the
/// PDU was accepted for transmission.
pub type HostResult = std::result::Result<(), i32>;

/// Connection handle assigned by the stack to one peer.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[repr(transparent)]
pub struct ConnHandle(pub u16);

impl Debug for ConnHandle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(ConnHandle), self.0)
    }
}

impl Display for ConnHandle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<ConnHandle> for u16 {
    #[inline]
    fn from(cn: ConnHandle) -> Self {
        cn.0
    }
}

/// Services provided by the stack to a registered characteristic.
///
/// The send primitives must not block. They take ownership of the payload
/// because the stack releases it after transmission. Indication confirmations
/// are reported asynchronously via
/// [`Characteristic::indicate_status`](crate::gatt::Characteristic::indicate_status).
pub trait Host: Debug + Send + Sync {
    /// Returns the number of connected peers.
    fn connected_count(&self) -> usize;

    /// Returns the negotiated ATT MTU for the connection or 0 if the peer is
    /// not connected.
    fn peer_mtu(&self, cn: ConnHandle) -> u16;

    /// Sends a Handle Value Notification.
    fn send_notification(&self, cn: ConnHandle, hdl: Handle, val: StructBuf) -> HostResult;

    /// Sends a Handle Value Indication. Confirmation is reported separately.
    fn send_indication(&self, cn: ConnHandle, hdl: Handle, val: StructBuf) -> HostResult;
}
