use std::fmt::{Debug, Display, Formatter, Write as _};
use std::sync::Arc;

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::{debug, error, info, warn};

use gatt_chr_const::{Descriptor as DescUuid, Uuid};

use crate::att::{ErrorCode, Handle, MAX_VAL_LEN};
use crate::host::{ConnHandle, Host, ENOTCONN};
use crate::util::{name_of, Gate};

use super::io::dispatch;
use super::value::Value;
use super::*;

/// Characteristic event handler. All methods default to no-ops.
///
/// Handlers are called without any characteristic locks held, so they may
/// read or update the characteristic value.
pub trait Callbacks: Send + Sync {
    /// Called before the value is returned to a peer. Not called again for
    /// continuations of the same long read.
    fn on_read(&self, _c: &Characteristic) {}

    /// Called after a peer write was committed.
    fn on_write(&self, _c: &Characteristic) {}

    /// Called once before each notification or indication fan-out, allowing
    /// the value to be refreshed.
    fn on_notify(&self, _c: &Characteristic) {}

    /// Called after each subscriber was served with the delivery outcome and
    /// the raw host code.
    fn on_status(&self, _c: &Characteristic, _s: Status, _code: i32) {}
}

/// Handler used by characteristics without an application handler.
#[derive(Debug)]
struct DefaultCallbacks;

impl Callbacks for DefaultCallbacks {
    fn on_read(&self, c: &Characteristic) {
        debug!("{}: on_read: default", c.uuid);
    }

    fn on_write(&self, c: &Characteristic) {
        debug!("{}: on_write: default", c.uuid);
    }

    fn on_notify(&self, c: &Characteristic) {
        debug!("{}: on_notify: default", c.uuid);
    }

    fn on_status(&self, c: &Characteristic, s: Status, code: i32) {
        debug!("{}: on_status: default ({s}, {code})", c.uuid);
    }
}

lazy_static! {
    static ref DEFAULT_CALLBACKS: Arc<dyn Callbacks> = Arc::new(DefaultCallbacks);
}

/// Stack binding established by [`Characteristic::register`].
#[derive(Debug)]
pub(super) struct Binding {
    pub hdl: Handle,
    pub host: Arc<dyn Host>,
}

/// GATT server characteristic.
pub struct Characteristic {
    pub(super) uuid: Uuid,
    pub(super) props: Prop,
    pub(super) cfg: Config,
    pub(super) bind: OnceCell<Binding>,
    pub(super) val: Value,
    desc: RwLock<SmallVec<[Arc<Descriptor>; 2]>>,
    cb: RwLock<Arc<dyn Callbacks>>,
    /// Indication confirmation gate. Only present for indicatable
    /// characteristics.
    pub(super) gate: Option<Gate>,
}

impl Characteristic {
    /// Creates a characteristic with the default configuration.
    #[inline]
    #[must_use]
    pub fn new(uuid: Uuid, props: Prop) -> Self {
        Self::with_config(uuid, props, Config::default())
    }

    /// Creates a characteristic with the specified configuration.
    #[must_use]
    pub fn with_config(uuid: Uuid, props: Prop, mut cfg: Config) -> Self {
        cfg.max_len = cfg.max_len.min(MAX_VAL_LEN);
        Self {
            uuid,
            props,
            cfg,
            bind: OnceCell::new(),
            val: Value::new(cfg.max_len),
            desc: RwLock::new(SmallVec::new()),
            cb: RwLock::new(DEFAULT_CALLBACKS.clone()),
            gate: props.contains(Prop::INDICATE).then(Gate::new),
        }
    }

    /// Assigns the attribute handle and the host that serves this
    /// characteristic.
    ///
    /// # Panics
    ///
    /// Panics if the characteristic is already registered.
    pub fn register(&self, hdl: Handle, host: Arc<dyn Host>) {
        let ok = self.bind.set(Binding { hdl, host }).is_ok();
        assert!(ok, "{} is already registered", self.uuid);
        debug!("Registered {} at {hdl}", self.uuid);
    }

    /// Returns the characteristic UUID.
    #[inline(always)]
    #[must_use]
    pub const fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the attribute handle or `None` if the characteristic is not
    /// registered.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Option<Handle> {
        self.bind.get().map(|b| b.hdl)
    }

    /// Returns the characteristic properties.
    #[inline(always)]
    #[must_use]
    pub const fn props(&self) -> Prop {
        self.props
    }

    /// Returns the characteristic configuration.
    #[inline(always)]
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns a copy of the current value.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Vec<u8> {
        self.val.get()
    }

    /// Returns the current value length.
    #[inline]
    #[must_use]
    pub fn value_len(&self) -> usize {
        self.val.len()
    }

    /// Replaces the value. The current value is kept if `v` exceeds the
    /// maximum length.
    pub fn set_value(&self, v: impl AsRef<[u8]>) -> Result<()> {
        (self.val.set(v.as_ref())).map_err(|e| {
            error!("Failed to set {} value: {e}", self.uuid);
            e
        })
    }

    /// Sets the value to a little-endian `u16`.
    #[inline]
    pub fn set_u16(&self, v: u16) -> Result<()> {
        self.set_value(v.to_le_bytes())
    }

    /// Sets the value to a little-endian `u32`.
    #[inline]
    pub fn set_u32(&self, v: u32) -> Result<()> {
        self.set_value(v.to_le_bytes())
    }

    /// Sets the value to a little-endian `i32`.
    #[inline]
    pub fn set_i32(&self, v: i32) -> Result<()> {
        self.set_value(v.to_le_bytes())
    }

    /// Sets the value to a little-endian IEEE-754 `f32`.
    #[inline]
    pub fn set_f32(&self, v: f32) -> Result<()> {
        self.set_value(v.to_le_bytes())
    }

    /// Sets the value to a little-endian IEEE-754 `f64`.
    #[inline]
    pub fn set_f64(&self, v: f64) -> Result<()> {
        self.set_value(v.to_le_bytes())
    }

    /// Sets the event handler. `None` restores the default handler. The new
    /// handler is used for all subsequent events.
    pub fn set_callbacks(&self, cb: Option<Arc<dyn Callbacks>>) {
        *self.cb.write() = cb.unwrap_or_else(|| DEFAULT_CALLBACKS.clone());
    }

    /// Returns the current event handler.
    #[inline]
    pub(super) fn callbacks(&self) -> Arc<dyn Callbacks> {
        self.cb.read().clone()
    }

    /// Creates a descriptor. The Client Characteristic Configuration
    /// descriptor is created at most once and `perms` and `max_len` are
    /// ignored for it and for the Characteristic Presentation Format
    /// descriptor.
    ///
    /// # Panics
    ///
    /// Panics if a Client Characteristic Configuration descriptor is requested
    /// for a characteristic that can neither notify nor indicate.
    pub fn create_descriptor(&self, uuid: Uuid, perms: DescPerm, max_len: usize) -> Arc<Descriptor> {
        let is_cccd = uuid == DescUuid::ClientCharacteristicConfiguration;
        if is_cccd {
            assert!(
                self.props.intersects(Prop::NOTIFY | Prop::INDICATE),
                "{} can neither notify nor indicate",
                self.uuid
            );
        }
        let mut desc = self.desc.write();
        if is_cccd {
            if let Some(d) = desc.iter().find(|d| d.cccd().is_some()) {
                return Arc::clone(d);
            }
        }
        let d = Arc::new(if is_cccd {
            Descriptor::new_cccd()
        } else if uuid == DescUuid::CharacteristicPresentationFormat {
            Descriptor::format()
        } else {
            Descriptor::generic(uuid, perms, max_len)
        });
        desc.push(Arc::clone(&d));
        debug!("Created descriptor {uuid} for {}", self.uuid);
        d
    }

    /// Returns the first descriptor with the specified UUID.
    #[must_use]
    pub fn descriptor(&self, uuid: Uuid) -> Option<Arc<Descriptor>> {
        self.desc.read().iter().find(|d| d.uuid() == uuid).cloned()
    }

    /// Returns all descriptors in creation order.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Arc<Descriptor>> {
        self.desc.read().to_vec()
    }

    /// Returns the Client Characteristic Configuration descriptor.
    #[inline]
    #[must_use]
    pub fn cccd(&self) -> Option<Arc<Descriptor>> {
        self.descriptor(DescUuid::ClientCharacteristicConfiguration.uuid())
    }

    /// Handles a read or write of the characteristic value from the transport.
    /// Reads require [`Prop::READ`] and writes require [`Prop::WRITE`] or
    /// [`Prop::WRITE_NO_RSP`]. Write fragments are committed together, and the
    /// value is unchanged if any of them is rejected.
    pub fn access(&self, req: IoReq) -> IoResult {
        debug!("{} access from {}", self.uuid, req.conn());
        if req.uuid() != self.uuid {
            warn!("Access to {} routed to {}", req.uuid(), self.uuid);
            return Err(ErrorCode::UnlikelyError);
        }
        match req {
            IoReq::Read(_) if !self.props.contains(Prop::READ) => {
                return Err(ErrorCode::ReadNotPermitted);
            }
            IoReq::Write(_) if !self.props.intersects(Prop::WRITE | Prop::WRITE_NO_RSP) => {
                return Err(ErrorCode::WriteNotPermitted);
            }
            _ => {}
        }
        let cb = self.callbacks();
        dispatch(&self.val, req, || cb.on_read(self), || cb.on_write(self))
    }

    /// Handles a subscription change reported by the transport. Disabling
    /// indications fails any indication outstanding to the same peer.
    pub fn subscribe(&self, ev: SubscribeEvent) {
        let mut flags = SubFlags::empty();
        flags.set(SubFlags::NOTIFY, ev.notify);
        flags.set(SubFlags::INDICATE, ev.indicate);
        info!("New subscription for {} from {}: {flags:?}", self.uuid, ev.cn);
        if !ev.indicate {
            if let Some(ref g) = self.gate {
                if g.release_conn(ev.cn, i32::from(u8::from(Status::ErrorIndicateDisabled))) {
                    debug!("Pending indication to {} cancelled", ev.cn);
                }
            }
        }
        let Some(d) = self.cccd() else {
            error!("No client configuration descriptor for {}", self.uuid);
            return;
        };
        if let Some(c) = d.cccd() {
            c.upsert(ev.cn, flags);
        }
        d.set_flags(flags);
        d.written();
    }

    /// Reports an indication confirmation or failure from the transport.
    /// Codes for peers without an outstanding indication are ignored.
    pub fn indicate_status(&self, cn: ConnHandle, code: i32) {
        let Some(ref g) = self.gate else {
            warn!("Indication status for {} without indicate property", self.uuid);
            return;
        };
        if !g.release_conn(cn, code) {
            debug!("Unexpected indication status {code} from {cn}");
        }
    }

    /// Removes the subscription of a disconnected peer and fails any
    /// indication outstanding to it.
    pub fn disconnected(&self, cn: ConnHandle) {
        if let Some(g) = self.gate.as_ref() {
            g.release_conn(cn, ENOTCONN);
        }
        if let Some(flags) = (self.cccd()).and_then(|d| d.cccd().and_then(|c| c.remove(cn))) {
            info!("Removed {} subscription for {cn}: {flags:?}", self.uuid);
        }
    }

    /// Returns a human-readable summary of the UUID, handle, and properties.
    #[must_use]
    pub fn describe(&self) -> String {
        let hdl = self.handle().map_or(Handle::UNSET, u16::from);
        let mut s = format!("UUID: {}, handle: {hdl:#06x} ", self.uuid);
        for (p, name) in Prop::NAMES {
            if self.props.contains(p) {
                let _ = write!(s, "{name} ");
            }
        }
        s
    }
}

impl Debug for Characteristic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(name_of!(Characteristic))
            .field("uuid", &self.uuid)
            .field("hdl", &self.handle())
            .field("props", &self.props)
            .field("len", &self.val.len())
            .field("indicating", &self.gate.as_ref().map(Gate::is_armed))
            .finish_non_exhaustive()
    }
}

impl Display for Characteristic {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
