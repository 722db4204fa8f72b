//! NFSv3 procedure dispatch (RFC 1813).
//!
//! All 22 procedures are served. Each lives in its own module and follows
//! the same contract: decode arguments from the request body, resolve file
//! handles through the registry, perform the operation against the backing
//! filesystem, and write a complete XDR reply — beginning with the RPC
//! success header and an `nfsstat3` — to the output buffer. Error replies
//! carry the same body topology as successes for their procedure (bare
//! status, `post_op_attr`-suffixed, or `wcc_data`-suffixed), so clients can
//! always decode what they get.
//!
//! MKNOD and LINK are served as `NFS3ERR_NOTSUPP`: path-addressed backing
//! stores are not assumed to support device nodes or hard links.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::warn;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, nfs3, Serialize};

mod access;
mod commit;
mod create;
mod fsinfo;
mod fsstat;
mod getattr;
mod helpers;
mod link;
mod lookup;
mod mkdir;
mod mknod;
mod null;
mod pathconf;
mod read;
mod readdir;
mod readdirplus;
mod readlink;
mod remove;
mod rename;
mod rmdir;
mod setattr;
mod symlink;
mod write;

use access::nfsproc3_access;
use commit::nfsproc3_commit;
use create::nfsproc3_create;
use fsinfo::nfsproc3_fsinfo;
use fsstat::nfsproc3_fsstat;
use getattr::nfsproc3_getattr;
use link::nfsproc3_link;
use lookup::nfsproc3_lookup;
use mkdir::nfsproc3_mkdir;
use mknod::nfsproc3_mknod;
use null::nfsproc3_null;
use pathconf::nfsproc3_pathconf;
use read::nfsproc3_read;
use readdir::nfsproc3_readdir;
use readdirplus::nfsproc3_readdirplus;
use readlink::nfsproc3_readlink;
use remove::nfsproc3_remove;
use rename::nfsproc3_rename;
use rmdir::nfsproc3_rmdir;
use setattr::nfsproc3_setattr;
use symlink::nfsproc3_symlink;
use write::nfsproc3_write;

/// Routes one NFS program call to its procedure handler.
///
/// Unsupported versions answer `PROG_MISMATCH`; procedure numbers outside
/// 0..=21 answer `PROC_UNAVAIL`.
pub async fn handle_nfs(
    xid: u32,
    call: xdr::rpc::call_body,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    if call.vers != nfs3::VERSION {
        warn!("invalid NFS version number {} != {}", call.vers, nfs3::VERSION);
        xdr::rpc::prog_mismatch_reply_message(xid, nfs3::VERSION).serialize(output)?;
        return Ok(());
    }
    let proc = nfs3::NfsProcedure::from_u32(call.proc).unwrap_or(nfs3::NfsProcedure::INVALID);

    match proc {
        nfs3::NfsProcedure::NFSPROC3_NULL => nfsproc3_null(xid, output)?,
        nfs3::NfsProcedure::NFSPROC3_GETATTR => {
            nfsproc3_getattr(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_SETATTR => {
            nfsproc3_setattr(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_LOOKUP => nfsproc3_lookup(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_ACCESS => nfsproc3_access(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_READLINK => {
            nfsproc3_readlink(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_READ => nfsproc3_read(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_WRITE => nfsproc3_write(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_CREATE => nfsproc3_create(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_MKDIR => nfsproc3_mkdir(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_SYMLINK => {
            nfsproc3_symlink(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_MKNOD => nfsproc3_mknod(xid, output)?,
        nfs3::NfsProcedure::NFSPROC3_REMOVE => nfsproc3_remove(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_RMDIR => nfsproc3_rmdir(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_RENAME => nfsproc3_rename(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_LINK => nfsproc3_link(xid, output)?,
        nfs3::NfsProcedure::NFSPROC3_READDIR => {
            nfsproc3_readdir(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_READDIRPLUS => {
            nfsproc3_readdirplus(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_FSSTAT => nfsproc3_fsstat(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_FSINFO => nfsproc3_fsinfo(xid, input, output, context).await?,
        nfs3::NfsProcedure::NFSPROC3_PATHCONF => {
            nfsproc3_pathconf(xid, input, output, context).await?
        }
        nfs3::NfsProcedure::NFSPROC3_COMMIT => nfsproc3_commit(xid, input, output, context).await?,
        nfs3::NfsProcedure::INVALID => {
            warn!("unknown NFS procedure {}", call.proc);
            xdr::rpc::proc_unavail_reply_message(xid).serialize(output)?;
        }
    }
    Ok(())
}
