use parking_lot::RwLock;

use super::{Error, Result};

/// Attribute value store.
///
/// Readers observe either the value before or after a commit, never an
/// assembly in progress. The event context (commits) and the application
/// context ([`Value::set`]) are serialized by the lock.
#[derive(Debug)]
pub(super) struct Value {
    v: RwLock<Vec<u8>>,
    max: usize,
}

impl Value {
    /// Creates an empty value limited to `max` bytes.
    #[inline]
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            v: RwLock::new(Vec::new()),
            max,
        }
    }

    /// Creates a value with initial contents, which must not exceed `max`.
    #[inline]
    #[must_use]
    pub fn with(max: usize, init: &[u8]) -> Self {
        debug_assert!(init.len() <= max);
        Self {
            v: RwLock::new(init.to_vec()),
            max,
        }
    }

    /// Returns the maximum value length.
    #[inline(always)]
    #[must_use]
    pub const fn max_len(&self) -> usize {
        self.max
    }

    /// Returns a copy of the current value.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Vec<u8> {
        self.v.read().clone()
    }

    /// Returns the current value length.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.v.read().len()
    }

    /// Calls `f` with the current value. The value cannot change until `f`
    /// returns, so `f` must not call back into the owner.
    #[inline]
    pub fn map<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(&self.v.read())
    }

    /// Replaces the value, bypassing write assembly.
    pub fn set(&self, v: &[u8]) -> Result<()> {
        if v.len() > self.max {
            return Err(Error::ValueTooLarge {
                len: v.len(),
                max: self.max,
            });
        }
        let mut cur = self.v.write();
        cur.clear();
        cur.extend_from_slice(v);
        Ok(())
    }

    /// Starts a new write transaction.
    #[inline]
    pub fn begin(&self) -> Assembly {
        Assembly {
            buf: Vec::new(),
            max: self.max,
        }
    }

    /// Replaces the value with the assembled fragments.
    #[inline]
    pub fn commit(&self, a: Assembly) {
        *self.v.write() = a.buf;
    }
}

/// In-progress write. Fragments are invisible to readers until the assembly
/// is committed, and dropping it discards them.
#[derive(Debug)]
#[must_use]
pub(super) struct Assembly {
    buf: Vec<u8>,
    max: usize,
}

impl Assembly {
    /// Appends the next fragment.
    pub fn append(&mut self, frag: &[u8]) -> Result<()> {
        let len = self.buf.len() + frag.len();
        if len > self.max {
            return Err(Error::ValueTooLarge { len, max: self.max });
        }
        self.buf.extend_from_slice(frag);
        Ok(())
    }

    /// Returns the number of bytes assembled so far.
    #[inline(always)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use matches::assert_matches;

    use super::*;

    #[test]
    fn set_get() {
        let v = Value::new(4);
        assert!(v.get().is_empty());
        v.set(&[1, 2, 3, 4]).unwrap();
        assert_eq!(v.get(), [1, 2, 3, 4]);
        assert_matches!(v.set(&[0; 5]), Err(Error::ValueTooLarge { len: 5, max: 4 }));
        assert_eq!(v.get(), [1, 2, 3, 4]);
        v.set(&[]).unwrap();
        assert_eq!(v.len(), 0);
    }

    #[test]
    fn assembly() {
        let v = Value::with(4, &[9]);
        let mut a = v.begin();
        a.append(&[1, 2]).unwrap();
        a.append(&[3]).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(v.get(), [9]);
        v.commit(a);
        assert_eq!(v.get(), [1, 2, 3]);

        let mut a = v.begin();
        a.append(&[4, 5, 6]).unwrap();
        assert_matches!(a.append(&[7, 8]), Err(Error::ValueTooLarge { len: 5, .. }));
        drop(a);
        assert_eq!(v.get(), [1, 2, 3]);
    }
}
