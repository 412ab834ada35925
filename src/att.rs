//! Attribute Protocol types shared by the characteristic core
//! ([Vol 3] Part F).

pub use {consts::*, handle::*};

mod consts;
mod handle;

/// Maximum attribute value length ([Vol 3] Part F, Section 3.2.9). This is
/// also the largest write fragment accepted from the transport.
pub const MAX_VAL_LEN: usize = 512;

/// Number of bytes of each notification or indication PDU taken by the opcode
/// and attribute handle ([Vol 3] Part F, Section 3.4.7.1).
pub const NOTIFY_HDR_LEN: usize = 3;
