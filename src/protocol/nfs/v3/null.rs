//! NULL (procedure 0): do nothing.
//!
//! Used by clients to probe liveness and measure round-trip time. The reply
//! is just the RPC success header with an empty body.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, Serialize};

pub fn nfsproc3_null(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_null({:?})", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    Ok(())
}
