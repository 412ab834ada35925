use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use structbuf::{Pack, StructBuf};
use tracing::debug;

use gatt_chr_const::{Descriptor as DescUuid, Uuid};

use crate::att::{ErrorCode, MAX_VAL_LEN};
use crate::host::ConnHandle;
use crate::util::name_of;

use super::io::dispatch;
use super::value::Value;
use super::*;

/// Descriptor event handler. All methods default to no-ops.
pub trait DescriptorCallbacks: Send + Sync {
    /// Called before the descriptor value is returned to a peer.
    fn on_read(&self, _d: &Descriptor) {}

    /// Called after the descriptor value was written. For the Client
    /// Characteristic Configuration descriptor this is called after every
    /// subscription change.
    fn on_write(&self, _d: &Descriptor) {}
}

/// Characteristic descriptor.
pub struct Descriptor {
    uuid: Uuid,
    perms: DescPerm,
    val: Value,
    kind: Kind,
    cb: RwLock<Option<Arc<dyn DescriptorCallbacks>>>,
}

#[derive(Debug)]
enum Kind {
    Generic,
    Cccd(Cccd),
    Format,
}

impl Descriptor {
    /// Length of the Client Characteristic Configuration descriptor value.
    pub const CCCD_LEN: usize = 2;
    /// Length of the Characteristic Presentation Format descriptor value.
    pub const FORMAT_LEN: usize = 7;

    /// Creates a descriptor with an empty value of at most `max_len` bytes.
    #[must_use]
    pub(super) fn generic(uuid: Uuid, perms: DescPerm, max_len: usize) -> Self {
        Self::new(uuid, perms, Value::new(max_len.min(MAX_VAL_LEN)), Kind::Generic)
    }

    /// Creates a Client Characteristic Configuration descriptor.
    #[must_use]
    pub(super) fn new_cccd() -> Self {
        Self::new(
            DescUuid::ClientCharacteristicConfiguration.uuid(),
            DescPerm::READ | DescPerm::WRITE,
            Value::with(Self::CCCD_LEN, &[0; Self::CCCD_LEN]),
            Kind::Cccd(Cccd::default()),
        )
    }

    /// Creates a Characteristic Presentation Format descriptor with an opaque
    /// unitless format.
    #[must_use]
    pub(super) fn format() -> Self {
        let d = Self::new(
            DescUuid::CharacteristicPresentationFormat.uuid(),
            DescPerm::READ,
            Value::new(Self::FORMAT_LEN),
            Kind::Format,
        );
        d.set_format(FmtType::Struct, 0, UNITLESS, NAMESPACE_SIG, 0);
        d
    }

    #[inline]
    fn new(uuid: Uuid, perms: DescPerm, val: Value, kind: Kind) -> Self {
        Self {
            uuid,
            perms,
            val,
            kind,
            cb: RwLock::new(None),
        }
    }

    /// Returns the descriptor UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the descriptor permissions.
    #[inline(always)]
    #[must_use]
    pub const fn perms(&self) -> DescPerm {
        self.perms
    }

    /// Returns the maximum value length.
    #[inline(always)]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.val.max_len()
    }

    /// Returns the current value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Vec<u8> {
        self.val.get()
    }

    /// Sets the descriptor value.
    pub fn set_value(&self, v: impl AsRef<[u8]>) -> Result<()> {
        self.val.set(v.as_ref())
    }

    /// Returns the subscriber registry if this is the Client Characteristic
    /// Configuration descriptor.
    #[inline]
    #[must_use]
    pub const fn cccd(&self) -> Option<&Cccd> {
        match self.kind {
            Kind::Cccd(ref c) => Some(c),
            _ => None,
        }
    }

    /// Sets the presentation format fields
    /// ([Vol 3] Part G, Section 3.3.3.5).
    ///
    /// # Panics
    ///
    /// Panics if this is not a Characteristic Presentation Format descriptor.
    pub fn set_format(&self, fmt: FmtType, exp: i8, unit: u16, ns: u8, desc: u16) {
        assert!(
            matches!(self.kind, Kind::Format),
            "{} is not a presentation format descriptor",
            self.uuid
        );
        #[allow(clippy::cast_sign_loss)]
        let exp = exp as u8;
        let mut b = StructBuf::new(Self::FORMAT_LEN);
        b.append()
            .u8(fmt)
            .u8(exp)
            .u16(unit)
            .u8(ns)
            .u16(desc);
        // The buffer length is fixed at FORMAT_LEN
        let _ = self.val.set(b.as_ref());
    }

    /// Sets or clears the event handler.
    #[inline]
    pub fn set_callbacks(&self, cb: Option<Arc<dyn DescriptorCallbacks>>) {
        *self.cb.write() = cb;
    }

    /// Handles an access event from the transport. Reads and writes are
    /// rejected unless permitted by [`DescPerm::READ`] and [`DescPerm::WRITE`].
    /// Subscription changes are not written through this path; the transport
    /// reports them via [`Characteristic::subscribe`].
    pub fn access(&self, req: IoReq) -> IoResult {
        if req.uuid() != self.uuid {
            return Err(ErrorCode::UnlikelyError);
        }
        match req {
            IoReq::Read(_) if !self.perms.contains(DescPerm::READ) => {
                return Err(ErrorCode::ReadNotPermitted);
            }
            IoReq::Write(_) if matches!(self.kind, Kind::Cccd(_)) => {
                return Err(ErrorCode::WriteNotPermitted);
            }
            IoReq::Write(_) if !self.perms.contains(DescPerm::WRITE) => {
                return Err(ErrorCode::WriteNotPermitted);
            }
            _ => {}
        }
        let cb = self.cb.read().clone();
        dispatch(
            &self.val,
            req,
            || {
                if let Some(ref cb) = cb {
                    cb.on_read(self);
                }
            },
            || self.written(),
        )
    }

    /// Records new subscription flags as the descriptor value.
    pub(super) fn set_flags(&self, flags: SubFlags) {
        let _ = self.val.set(&flags.bits().to_le_bytes());
    }

    /// Notifies the write observer.
    pub(super) fn written(&self) {
        let cb = self.cb.read().clone();
        match cb {
            Some(cb) => cb.on_write(self),
            None => debug!("Descriptor {} written", self.uuid),
        }
    }
}

impl Debug for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Descriptor))
            .field("uuid", &self.uuid)
            .field("perms", &self.perms)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Subscription state of one peer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Sub {
    pub cn: ConnHandle,
    pub flags: SubFlags,
}

/// Subscriber registry kept by the Client Characteristic Configuration
/// descriptor. Holds at most one entry per connection, in subscription order.
#[derive(Debug, Default)]
pub struct Cccd {
    subs: Mutex<SmallVec<[Sub; 4]>>,
}

impl Cccd {
    /// Inserts or updates the flags for `cn`. The entry is removed when
    /// `flags` is empty.
    pub fn upsert(&self, cn: ConnHandle, flags: SubFlags) {
        let mut subs = self.subs.lock();
        let i = subs.iter().position(|s| s.cn == cn);
        match i {
            Some(i) if flags.is_empty() => {
                subs.remove(i);
            }
            Some(i) => subs[i].flags = flags,
            None if flags.is_empty() => {}
            None => subs.push(Sub { cn, flags }),
        }
    }

    /// Removes the entry for `cn`, returning its flags.
    pub fn remove(&self, cn: ConnHandle) -> Option<SubFlags> {
        let mut subs = self.subs.lock();
        let i = subs.iter().position(|s| s.cn == cn)?;
        Some(subs.remove(i).flags)
    }

    /// Returns the flags for `cn`.
    #[must_use]
    pub fn get(&self, cn: ConnHandle) -> SubFlags {
        (self.subs.lock().iter())
            .find(|s| s.cn == cn)
            .map_or_else(SubFlags::empty, |s| s.flags)
    }

    /// Returns a snapshot of all subscribers in subscription order.
    #[must_use]
    pub fn all(&self) -> SmallVec<[Sub; 4]> {
        self.subs.lock().clone()
    }

    /// Returns the number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.lock().len()
    }

    /// Returns whether there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.lock().is_empty()
    }
}
