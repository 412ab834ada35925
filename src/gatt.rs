//! Generic Attribute Profile characteristic core ([Vol 3] Part G).
//!
//! A [`Characteristic`] owns one attribute value, serves read and write access
//! events from the transport, and fans out notifications and indications to
//! the peers subscribed via its Client Characteristic Configuration
//! descriptor.

use std::time::Duration;

use gatt_chr_const::Uuid;
use serde::{Deserialize, Serialize};

pub use {chr::*, consts::*, desc::*, io::*};

use crate::att::MAX_VAL_LEN;

mod chr;
mod consts;
mod desc;
mod io;
mod notify;
mod value;


/// Error type returned by the characteristic API.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("value length {len} exceeds maximum of {max}")]
    ValueTooLarge { len: usize, max: usize },
    #[error("characteristic {0} has no client configuration descriptor")]
    MissingCccd(Uuid),
}

/// Common characteristic result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Characteristic configuration.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Deadline for the peer to confirm an indication
    /// ([Vol 3] Part F, Section 3.3.3).
    pub indicate_timeout: Duration,
    /// Maximum value length, clamped to [`MAX_VAL_LEN`].
    pub max_len: usize,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            indicate_timeout: Duration::from_secs(30),
            max_len: MAX_VAL_LEN,
        }
    }
}
