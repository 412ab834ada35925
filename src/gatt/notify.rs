use structbuf::StructBuf;
use tracing::{debug, error, trace, warn};

use crate::att::NOTIFY_HDR_LEN;
use crate::host::{EDONE, ETIMEOUT};
use crate::util::Signal;

use super::chr::Binding;
use super::*;

impl Characteristic {
    /// Sends the current value to all subscribed peers without requesting
    /// confirmation. Peers that only accept indications are indicated
    /// instead. Delivery outcome is reported per peer via
    /// [`Callbacks::on_status`]. This is a no-op if there are no connected
    /// peers.
    ///
    /// # Panics
    ///
    /// Panics if the characteristic is not registered.
    pub async fn notify(&self) -> Result<()> {
        self.send(false).await
    }

    /// Sends the current value to all subscribed peers, waiting for each peer
    /// to confirm before moving to the next one. Indications are serialized
    /// across concurrent callers. Peers that only accept notifications are
    /// notified instead.
    ///
    /// # Panics
    ///
    /// Panics if the characteristic does not have the indicate property or if
    /// it is not registered.
    pub async fn indicate(&self) -> Result<()> {
        assert!(self.gate.is_some(), "{} cannot indicate", self.uuid);
        self.send(true).await
    }

    async fn send(&self, ind: bool) -> Result<()> {
        let Some(bind) = self.bind.get() else {
            panic!("{} is not registered", self.uuid);
        };
        if bind.host.connected_count() == 0 {
            debug!("No connected peers for {}", self.uuid);
            return Ok(());
        }
        let Some(d) = self.cccd() else {
            error!("No client configuration descriptor for {}", self.uuid);
            return Err(Error::MissingCccd(self.uuid));
        };
        let cb = self.callbacks();
        cb.on_notify(self);
        let subs = d.cccd().map(Cccd::all).unwrap_or_default();
        for sub in subs {
            let mtu = bind.host.peer_mtu(sub.cn);
            if mtu == 0 || sub.flags.is_empty() {
                trace!("Skipping {} (MTU {mtu}, {:?})", sub.cn, sub.flags);
                continue;
            }
            let (st, code) = self.send_one(bind, sub, mtu, ind).await;
            cb.on_status(self, st, code);
        }
        Ok(())
    }

    /// Delivers the value to one subscriber, returning the outcome and raw
    /// host code.
    async fn send_one(&self, bind: &Binding, sub: Sub, mtu: u16, mut ind: bool) -> (Status, i32) {
        if !ind && !sub.flags.contains(SubFlags::NOTIFY) {
            warn!("{} subscribed to indications, sending indication instead", sub.cn);
            ind = true;
        }
        if ind && !sub.flags.contains(SubFlags::INDICATE) {
            warn!("{} subscribed to notifications, sending notification instead", sub.cn);
            ind = false;
        }
        let cap = usize::from(mtu).saturating_sub(NOTIFY_HDR_LEN);
        let mut val = StructBuf::new(cap);
        self.val.map(|v| {
            if v.len() > cap {
                warn!("Truncating {} value to {cap} bytes for {}", self.uuid, sub.cn);
            }
            val.put_at(0, &v[..v.len().min(cap)]);
        });
        match self.gate {
            Some(ref g) if ind => {
                let permit = g.acquire(Some(sub.cn)).await;
                if let Err(rc) = bind.host.send_indication(sub.cn, bind.hdl, val) {
                    warn!("Indication to {} failed: {rc}", sub.cn);
                    drop(permit);
                    return (Status::ErrorTransport, rc);
                }
                match permit.wait(self.cfg.indicate_timeout).await {
                    Signal::Released(0 | EDONE) => (Status::SuccessIndicate, 0),
                    Signal::Released(ETIMEOUT) | Signal::Timeout => {
                        warn!("Indication to {} was not confirmed", sub.cn);
                        (Status::ErrorIndicateTimeout, ETIMEOUT)
                    }
                    Signal::Released(rc) => (Status::ErrorIndicateFailure, rc),
                }
            }
            _ => match bind.host.send_notification(sub.cn, bind.hdl, val) {
                Ok(()) => (Status::SuccessNotify, 0),
                Err(rc) => {
                    warn!("Notification to {} failed: {rc}", sub.cn);
                    (Status::ErrorTransport, rc)
                }
            },
        }
    }
}
