use std::fmt::{Debug, Display, Formatter};
use std::num::NonZeroU16;

use crate::util::name_of;

/// Attribute handle ([Vol 3] Part F, Section 3.2.2). Assigned by the stack
/// when a characteristic is registered.
#[allow(clippy::unsafe_derive_deserialize)]
#[derive(
    Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Handle(NonZeroU16);

impl Handle {
    /// Raw value reported for an attribute that has not been assigned a handle
    /// yet.
    pub const UNSET: u16 = 0xFFFF;

    /// Wraps a raw handle. Returns `None` if the handle is invalid.
    #[inline]
    #[must_use]
    pub const fn new(h: u16) -> Option<Self> {
        match NonZeroU16::new(h) {
            Some(nz) => Some(Self(nz)),
            None => None,
        }
    }
}

impl Debug for Handle {
    #[allow(clippy::use_self)]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:#06X})", name_of!(Handle), self.0.get())
    }
}

impl Display for Handle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl From<Handle> for u16 {
    #[inline]
    fn from(h: Handle) -> Self {
        h.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle() {
        assert_eq!(std::mem::size_of::<Option<Handle>>(), 2);
        assert!(Handle::new(0).is_none());
        let h = Handle::new(0x002A).unwrap();
        assert_eq!(u16::from(h), 0x002A);
        assert_eq!(format!("{h}"), "Handle(0x002A)");
        assert_eq!(serde_json::to_string(&h).unwrap(), "42");
    }
}
