//! Wire protocol
//!
//! Newline-delimited JSON over a persistent TCP connection. A single
//! connection can act as a vendor (announce, report, offline), a viewer
//! (subscribe, unsubscribe) or both, and can issue proximity queries.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::FrameCodec;
pub use message::{ClientMessage, ErrorKind, RegionRequest, ServerMessage};
