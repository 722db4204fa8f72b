//! ONC-RPC transport layer: record framing, header validation and program
//! dispatch, per RFC 5531.
//!
//! The split of responsibilities is:
//! - [`wire`] owns the byte-level work — reassembling record-marked
//!   fragments, emitting replies as single last-fragments, and running each
//!   decoded call in its own worker task, and
//! - [`Context`] carries the per-connection state every handler needs (the
//!   export policy, the handle registry, the server's write verifier).
//!
//! Replies from concurrent workers are funneled through one channel per
//! connection and written by a single drain loop, so response fragments are
//! never interleaved regardless of how many requests are in flight.

mod context;
mod wire;

pub use context::Context;
pub use wire::{handle_rpc, write_fragment, SocketMessageHandler, SocketMessageType};

/// Upper bound on a reassembled RPC record. Large enough to admit the
/// biggest WRITE the server advertises in FSINFO plus headers; a connection
/// exceeding it is torn down.
pub const MAX_RPC_RECORD_LENGTH: usize = 8 * 1024 * 1024;
