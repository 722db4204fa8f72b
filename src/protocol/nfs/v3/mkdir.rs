//! MKDIR (procedure 9): create a directory and apply the supplied
//! attributes.

use std::io::{Read, Write};

use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::{child_path, name_component, pre_op_wcc, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::vfs;

pub async fn nfsproc3_mkdir(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::dir::MKDIR3args>(input)?;
    debug!("nfsproc3_mkdir({:?},{:?})", xid, args);

    let (fs, dir_path) = match context.registry.from_handle(&args.dirops.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    if !fs.capabilities().write {
        warn!("mkdir on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let pre_dir_attr = pre_op_wcc(&fs, &dir_path).await;

    let res: Result<Vec<String>, nfs3::nfsstat3> = match name_component(&args.dirops.name) {
        Ok(name) => {
            let target_path = child_path(&dir_path, name);
            let target_joined = fs.join(&target_path);
            if fs.lstat(&target_joined).await.is_ok() {
                Err(nfs3::nfsstat3::NFS3ERR_EXIST)
            } else {
                match fs.mkdir_all(&target_joined).await {
                    Ok(()) => {
                        // Attribute application is best effort on a fresh
                        // directory; a failure still leaves the mkdir done.
                        if let Err(stat) =
                            vfs::apply_sattr(&fs, &target_joined, &args.attributes).await
                        {
                            debug!("mkdir attribute application failed: {:?}", stat);
                        }
                        Ok(target_path)
                    }
                    Err(stat) => Err(stat),
                }
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
        Ok(target_path) => {
            let obj_handle = context.registry.to_handle(&fs, &target_path);
            let obj_attr = try_stat(context, &fs, &target_path).await;
            debug!("mkdir success {:?} --> {:?}", xid, obj_handle);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_fh3::Some(obj_handle).serialize(output)?;
            obj_attr.serialize(output)?;
            wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("mkdir error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
