//! RMDIR (procedure 13): remove an empty directory.
//!
//! The same shape as REMOVE with the type check inverted: the target must
//! be a directory, and a non-empty one fails with `NFS3ERR_NOTEMPTY` from
//! the backing store.

use std::io::{Read, Write};

use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::{child_path, name_component, pre_op_wcc, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rmdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_rmdir({:?},{:?})", xid, dirops);

    let (fs, dir_path) = match context.registry.from_handle(&dirops.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    if !fs.capabilities().write {
        warn!("rmdir on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let pre_dir_attr = pre_op_wcc(&fs, &dir_path).await;

    let res: Result<(), nfs3::nfsstat3> = match name_component(&dirops.name) {
        Ok(name) => {
            let target_path = child_path(&dir_path, name);
            let target_joined = fs.join(&target_path);
            match fs.lstat(&target_joined).await {
                Ok(meta) if !meta.is_dir() => Err(nfs3::nfsstat3::NFS3ERR_NOTDIR),
                Ok(_) => match fs.remove(&target_joined).await {
                    Ok(()) => {
                        context.registry.invalidate_handle(&fs, &target_path);
                        Ok(())
                    }
                    Err(stat) => Err(stat),
                },
                Err(stat) => Err(stat),
            }
        }
        Err(stat) => Err(stat),
    };

    if res.is_ok() {
        context.registry.invalidate_listings(&fs.join(&dir_path));
    }
    let post_dir_attr = try_stat(context, &fs, &dir_path).await;
    let wcc = nfs3::wcc_data { before: pre_dir_attr, after: post_dir_attr };

    match res {
        Ok(()) => {
            debug!("rmdir success {:?}", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("rmdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
