//! READLINK (procedure 5): read the target of a symbolic link.
//!
//! Rejects non-symlink objects with `NFS3ERR_INVAL`, per the RFC's guidance
//! for READLINK on the wrong object type.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_readlink(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_readlink({:?},{:?})", xid, handle);

    let (fs, path) = match context.registry.from_handle(&handle) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let obj_attr = try_stat(context, &fs, &path).await;
    match &obj_attr {
        Some(attr) if attr.ftype == nfs3::ftype3::NF3LNK => {}
        Some(_) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
            obj_attr.serialize(output)?;
            return Ok(());
        }
        None => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_STALE.serialize(output)?;
            obj_attr.serialize(output)?;
            return Ok(());
        }
    }

    match fs.readlink(&fs.join(&path)).await {
        Ok(target) => {
            debug!(" {:?} --> {:?}", xid, String::from_utf8_lossy(&target));
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            obj_attr.serialize(output)?;
            nfs3::nfspath3::from(target).serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_readlink error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}
