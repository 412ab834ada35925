use smallvec::SmallVec;
use tracing::warn;

use gatt_chr_const::Uuid;

use crate::att::{ErrorCode, MAX_VAL_LEN};
use crate::host::ConnHandle;

use super::value::Value;

/// Access event result returned to the transport layer.
pub type IoResult = std::result::Result<(), ErrorCode>;

/// Characteristic or descriptor access event.
#[derive(Debug)]
#[non_exhaustive]
pub enum IoReq<'a, 'b> {
    Read(&'a mut ReadReq),
    Write(&'a WriteReq<'b>),
}

impl IoReq<'_, '_> {
    /// Returns the UUID of the attribute targeted by the event.
    #[inline]
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        match *self {
            Self::Read(ref r) => r.uuid,
            Self::Write(w) => w.uuid,
        }
    }

    /// Returns the requesting connection.
    #[inline]
    #[must_use]
    pub fn conn(&self) -> ConnHandle {
        match *self {
            Self::Read(ref r) => r.cn,
            Self::Write(w) => w.cn,
        }
    }
}

/// Read access event. The full attribute value is returned in the response
/// buffer and the transport is responsible for applying the offset and MTU.
#[derive(Debug)]
pub struct ReadReq {
    cn: ConnHandle,
    uuid: Uuid,
    off: u16,
    buf: Vec<u8>,
}

impl ReadReq {
    /// Creates a read request. A non-zero offset marks a continuation of a
    /// long read.
    #[inline]
    #[must_use]
    pub const fn new(cn: ConnHandle, uuid: Uuid, off: u16) -> Self {
        Self {
            cn,
            uuid,
            off,
            buf: Vec::new(),
        }
    }

    /// Returns the requesting connection.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnHandle {
        self.cn
    }

    /// Returns the value offset.
    #[inline(always)]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.off as _
    }

    /// Returns whether this request continues a previous long read.
    #[inline(always)]
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.off != 0
    }

    /// Returns the response value.
    #[inline(always)]
    #[must_use]
    pub fn value(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the request, returning the response value.
    #[inline(always)]
    #[must_use]
    pub fn into_value(self) -> Vec<u8> {
        self.buf
    }

    /// Appends `v` to the response.
    fn complete(&mut self, v: &[u8]) -> IoResult {
        self.buf.clear();
        (self.buf.try_reserve_exact(v.len())).map_err(|_| ErrorCode::InsufficientResources)?;
        self.buf.extend_from_slice(v);
        Ok(())
    }
}

/// Write access event carrying one or more chained fragments of a single
/// write.
#[derive(Debug)]
pub struct WriteReq<'a> {
    cn: ConnHandle,
    uuid: Uuid,
    frags: SmallVec<[&'a [u8]; 4]>,
}

impl<'a> WriteReq<'a> {
    /// Creates a write request with the first fragment.
    #[inline]
    #[must_use]
    pub fn new(cn: ConnHandle, uuid: Uuid, frag: &'a [u8]) -> Self {
        let mut frags = SmallVec::new();
        frags.push(frag);
        Self { cn, uuid, frags }
    }

    /// Appends the next fragment of the chain.
    #[inline]
    #[must_use]
    pub fn chain(mut self, frag: &'a [u8]) -> Self {
        self.frags.push(frag);
        self
    }

    /// Returns the requesting connection.
    #[inline(always)]
    #[must_use]
    pub const fn conn(&self) -> ConnHandle {
        self.cn
    }

    /// Returns the fragments in arrival order.
    #[inline(always)]
    #[must_use]
    pub fn fragments(&self) -> &[&'a [u8]] {
        &self.frags
    }

    /// Returns the total length of all fragments.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.frags.iter().map(|f| f.len()).sum()
    }

    /// Returns whether the write carries no data.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subscription change reported by the transport when a peer writes the
/// Client Characteristic Configuration descriptor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SubscribeEvent {
    pub cn: ConnHandle,
    pub notify: bool,
    pub indicate: bool,
}

/// Executes a read or write against `val`. `on_read` is not called for
/// continuation reads, and `on_write` is called only after a successful commit.
pub(super) fn dispatch(
    val: &Value,
    req: IoReq,
    on_read: impl FnOnce(),
    on_write: impl FnOnce(),
) -> IoResult {
    match req {
        IoReq::Read(r) => {
            if !r.is_continuation() {
                on_read();
            }
            val.map(|v| r.complete(v))
        }
        IoReq::Write(w) => {
            if let Some(f) = w.frags.iter().find(|f| f.len() > MAX_VAL_LEN) {
                warn!("Write fragment of {} bytes exceeds {MAX_VAL_LEN}", f.len());
                return Err(ErrorCode::InvalidAttributeValueLength);
            }
            let mut a = val.begin();
            for f in w.fragments() {
                if let Err(e) = a.append(f) {
                    warn!("Write rejected from {} after {} bytes: {e}", w.cn, a.len());
                    return Err(ErrorCode::InvalidAttributeValueLength);
                }
            }
            val.commit(a);
            on_write();
            Ok(())
        }
    }
}
