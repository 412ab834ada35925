use std::mem;
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tracing::trace;

use crate::host::ConnHandle;

/// Single-permit rendezvous used to serialize indications and await their
/// confirmation.
///
/// The gate is either idle or armed by one [`Permit`]. [`Gate::release_conn`]
/// never blocks and may be called from the event context at any time. Releasing an
/// idle gate has no effect because the permit is already available.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    inner: parking_lot::Mutex<Inner>,
    idle: Notify,
}

#[derive(Debug, Default)]
struct Inner {
    state: State,
    seq: u64,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Idle,
    Armed(Armed),
}

#[derive(Debug)]
struct Armed {
    id: u64,
    cn: Option<ConnHandle>,
    tx: oneshot::Sender<i32>,
}

/// Outcome of waiting on an armed gate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Signal {
    /// The gate was released with the specified code.
    Released(i32),
    /// The deadline elapsed before the gate was released.
    Timeout,
}

impl Gate {
    /// Creates an idle gate.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the gate is idle and arms it for the specified peer. The
    /// gate returns to the idle state when it is released or when the permit
    /// is dropped.
    pub async fn acquire(&self, cn: Option<ConnHandle>) -> Permit<'_> {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            // Register interest before checking the state so that a release
            // between the check and the await is not missed.
            idle.as_mut().enable();
            {
                let mut g = self.inner.lock();
                if matches!(g.state, State::Idle) {
                    g.seq = g.seq.wrapping_add(1);
                    let id = g.seq;
                    let (tx, rx) = oneshot::channel();
                    g.state = State::Armed(Armed { id, cn, tx });
                    return Permit {
                        gate: self,
                        id,
                        rx: Some(rx),
                    };
                }
            }
            trace!("Waiting for pending indication");
            idle.await;
        }
    }

    /// Releases the gate if it is armed for `cn`, delivering `code` to the
    /// permit holder. Returns whether the gate was released.
    #[inline]
    pub fn release_conn(&self, cn: ConnHandle, code: i32) -> bool {
        self.disarm(|a| a.cn == Some(cn), code)
    }

    /// Returns whether a permit is currently outstanding.
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self.inner.lock().state, State::Armed(_))
    }

    /// Returns the gate to the idle state if `f` accepts the current permit.
    fn disarm(&self, f: impl Fn(&Armed) -> bool, code: i32) -> bool {
        let armed = {
            let mut g = self.inner.lock();
            if !matches!(g.state, State::Armed(ref a) if f(a)) {
                return false;
            }
            let State::Armed(armed) = mem::take(&mut g.state) else {
                unreachable!()
            };
            armed
        };
        trace!("Gate {} released with {code}", armed.id);
        // The receiver is gone if the holder stopped waiting
        let _ = armed.tx.send(code);
        self.idle.notify_waiters();
        true
    }
}

/// Outstanding gate permit. Dropping the permit returns the gate to the idle
/// state if it is still armed by this permit.
#[derive(Debug)]
#[must_use]
pub(crate) struct Permit<'a> {
    gate: &'a Gate,
    id: u64,
    rx: Option<oneshot::Receiver<i32>>,
}

impl Permit<'_> {
    /// Waits for the gate to be released or for the deadline to elapse.
    pub async fn wait(mut self, deadline: Duration) -> Signal {
        let Some(rx) = self.rx.take() else {
            return Signal::Timeout;
        };
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(code)) => Signal::Released(code),
            // The sender is only dropped without sending if the gate is
            // dropped, which cannot happen while it is borrowed.
            Ok(Err(_)) => unreachable!("gate dropped while armed"),
            Err(_) => Signal::Timeout,
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.gate.disarm(|a| a.id == id, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);
    const A: ConnHandle = ConnHandle(1);
    const B: ConnHandle = ConnHandle(2);

    #[tokio::test(start_paused = true)]
    async fn release_idle() {
        let g = Gate::new();
        assert!(!g.release_conn(A, 1));
        assert!(!g.is_armed());
        let p = g.acquire(Some(A)).await;
        assert!(g.is_armed());
        drop(p);
        assert!(!g.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn serialize() {
        let g = Gate::new();
        let p = g.acquire(Some(A)).await;
        assert!(tokio::time::timeout(SEC, g.acquire(Some(B))).await.is_err());
        assert!(g.is_armed());
        let (sig, p2) = tokio::join!(p.wait(SEC * 5), async {
            tokio::task::yield_now().await;
            assert!(g.release_conn(A, 0));
            g.acquire(Some(B)).await
        });
        assert_eq!(sig, Signal::Released(0));
        assert!(g.is_armed());
        drop(p2);
        assert!(!g.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_code() {
        let g = Gate::new();
        let p = g.acquire(Some(A)).await;
        let (sig, released) = tokio::join!(p.wait(SEC), async {
            tokio::task::yield_now().await;
            assert!(!g.release_conn(B, 7));
            g.release_conn(A, 7)
        });
        assert!(released);
        assert_eq!(sig, Signal::Released(7));
        assert!(!g.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_timeout() {
        let g = Gate::new();
        let p = g.acquire(Some(A)).await;
        assert_eq!(p.wait(SEC).await, Signal::Timeout);
        assert!(!g.is_armed());
        // Late confirmation is ignored
        assert!(!g.release_conn(A, 0));
        let _p = g.acquire(Some(A)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unbound_permit() {
        let g = Gate::new();
        let p = g.acquire(None).await;
        assert!(!g.release_conn(A, 0));
        assert!(g.is_armed());
        drop(p);
        assert!(!g.is_armed());
    }
}
