use std::fmt::{Debug, Display, Formatter};

use bitflags::bitflags;

bitflags! {
    /// Characteristic properties ([Vol 3] Part G, Section 3.3.1.1).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct Prop: u8 {
        /// Permits broadcasts of the Characteristic Value using Server
        /// Characteristic Configuration Descriptor.
        const BROADCAST = 0x01;
        /// Permits reads of the Characteristic Value.
        const READ = 0x02;
        /// Permit writes of the Characteristic Value without response.
        const WRITE_NO_RSP = 0x04;
        /// Permits writes of the Characteristic Value with response.
        const WRITE = 0x08;
        /// Permits notifications of a Characteristic Value without
        /// acknowledgment. The Client Characteristic Configuration Descriptor
        /// must be created before notifying.
        const NOTIFY = 0x10;
        /// Permits indications of a Characteristic Value with acknowledgment.
        /// The Client Characteristic Configuration Descriptor must be created
        /// before indicating.
        const INDICATE = 0x20;
    }
}

impl Prop {
    /// Property names in the order used by [`Characteristic::describe`].
    ///
    /// [`Characteristic::describe`]: super::Characteristic::describe
    pub(super) const NAMES: [(Self, &'static str); 6] = [
        (Self::READ, "Read"),
        (Self::WRITE, "Write"),
        (Self::WRITE_NO_RSP, "WriteNoResponse"),
        (Self::BROADCAST, "Broadcast"),
        (Self::NOTIFY, "Notify"),
        (Self::INDICATE, "Indicate"),
    ];
}

bitflags! {
    /// Client Characteristic Configuration descriptor value
    /// ([Vol 3] Part G, Section 3.3.3.3).
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct SubFlags: u16 {
        /// The Characteristic Value shall be notified.
        const NOTIFY = 1 << 0;
        /// The Characteristic Value shall be indicated.
        const INDICATE = 1 << 1;
    }
}

bitflags! {
    /// Descriptor access permissions.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    #[repr(transparent)]
    pub struct DescPerm: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const READ_ENC = 1 << 2;
        const READ_AUTHEN = 1 << 3;
        const READ_AUTHOR = 1 << 4;
        const WRITE_ENC = 1 << 5;
        const WRITE_AUTHEN = 1 << 6;
        const WRITE_AUTHOR = 1 << 7;
    }
}

/// Notification or indication delivery outcome reported to
/// [`Callbacks::on_status`](super::Callbacks::on_status) for each subscriber.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum Status {
    /// Indication was confirmed by the peer.
    SuccessIndicate = 0,
    /// Notification was accepted by the transport.
    SuccessNotify = 1,
    /// Peer disabled indications while one was outstanding.
    ErrorIndicateDisabled = 2,
    ErrorNotifyDisabled = 3,
    /// Send primitive failed synchronously.
    ErrorTransport = 4,
    ErrorNoClient = 5,
    /// Indication was not confirmed before the deadline.
    ErrorIndicateTimeout = 6,
    /// Indication was rejected or the link was lost.
    ErrorIndicateFailure = 7,
}

impl Status {
    /// Returns whether the value was delivered.
    #[inline]
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::SuccessIndicate | Self::SuccessNotify)
    }
}

impl Display for Status {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Characteristic presentation format types ([Assigned Numbers] Section 2.4).
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[non_exhaustive]
#[repr(u8)]
pub enum FmtType {
    Bool = 0x01,
    U2 = 0x02,
    U4 = 0x03,
    U8 = 0x04,
    U12 = 0x05,
    U16 = 0x06,
    U24 = 0x07,
    U32 = 0x08,
    U48 = 0x09,
    U64 = 0x0A,
    U128 = 0x0B,
    I8 = 0x0C,
    I12 = 0x0D,
    I16 = 0x0E,
    I24 = 0x0F,
    I32 = 0x10,
    I48 = 0x11,
    I64 = 0x12,
    I128 = 0x13,
    /// IEEE-754 32-bit floating point.
    F32 = 0x14,
    /// IEEE-754 64-bit floating point.
    F64 = 0x15,
    /// IEEE 11073-20601 16-bit SFLOAT.
    MedF16 = 0x16,
    /// IEEE 11073-20601 32-bit FLOAT.
    MedF32 = 0x17,
    /// IEEE 11073-20601 nomenclature code.
    U16x2 = 0x18,
    Utf8 = 0x19,
    Utf16 = 0x1A,
    /// Opaque structure.
    Struct = 0x1B,
}

/// Unitless unit UUID used by default in presentation format descriptors
/// ([Assigned Numbers] Section 3.5).
pub const UNITLESS: u16 = 0x2700;

/// Bluetooth SIG description namespace.
pub const NAMESPACE_SIG: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(u8::from(Status::SuccessIndicate), 0);
        assert_eq!(u8::from(Status::SuccessNotify), 1);
        assert_eq!(u8::from(Status::ErrorTransport), 4);
        assert_eq!(u8::from(Status::ErrorIndicateTimeout), 6);
        assert_eq!(u8::from(Status::ErrorIndicateFailure), 7);
        assert!(Status::SuccessNotify.is_ok());
        assert!(!Status::ErrorTransport.is_ok());
    }

    #[test]
    fn prop_bits() {
        assert_eq!(Prop::NOTIFY.bits(), 0x10);
        assert_eq!(Prop::INDICATE.bits(), 0x20);
        assert_eq!(SubFlags::from_bits_truncate(0x0003), SubFlags::all());
    }
}
