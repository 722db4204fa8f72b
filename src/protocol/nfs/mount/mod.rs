//! MOUNT v3 procedure dispatch (RFC 1813 Appendix I).
//!
//! Only NULL, MNT and UMNT are served; DUMP, UMNTALL and EXPORT answer
//! `PROC_UNAVAIL`. MNT is the entry point of every client session — it
//! turns an export path into the root file handle all subsequent NFS calls
//! build on.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, mount, Serialize};

mod mnt;
mod null;
mod umnt;

use mnt::mountproc3_mnt;
use null::mountproc3_null;
use umnt::mountproc3_umnt;

/// Routes one MOUNT program call to its procedure handler.
pub async fn handle_mount(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != mount::VERSION {
        warn!("invalid MOUNT version number {} != {}", call.vers, mount::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, mount::VERSION).serialize(output)?;
        return Ok(());
    }
    let proc = mount::MountProcedure::from_u32(call.proc).unwrap_or(mount::MountProcedure::INVALID);

    match proc {
        mount::MountProcedure::MOUNTPROC3_NULL => mountproc3_null(xid, output)?,
        mount::MountProcedure::MOUNTPROC3_MNT => {
            mountproc3_mnt(xid, input, output, context).await?
        }
        mount::MountProcedure::MOUNTPROC3_UMNT => {
            mountproc3_umnt(xid, input, output, context).await?
        }
        _ => {
            warn!("unsupported MOUNT procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
