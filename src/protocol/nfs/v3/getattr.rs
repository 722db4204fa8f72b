//! GETATTR (procedure 1): fetch the attributes of a filesystem object.
//!
//! The hottest procedure in most client workloads — clients revalidate
//! their attribute caches with it constantly — so it does exactly one
//! lstat. On failure the reply is the bare status, per the RFC's void
//! `GETATTR3resfail`.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_getattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_getattr({:?},{:?})", xid, handle);

    let (fs, path) = match context.registry.from_handle(&handle) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            return Ok(());
        }
    };

    match fs.lstat(&fs.join(&path)).await {
        Ok(meta) => {
            let attr = meta.to_fattr3(handle.fileid());
            debug!(" {:?} --> {:?}", xid, attr);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            attr.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_getattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
        }
    }
    Ok(())
}
