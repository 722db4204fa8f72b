//! RENAME (procedure 14): move an object between names, possibly across
//! directories of the same filesystem.
//!
//! Cross-filesystem renames are refused with `NFS3ERR_NOTSUPP`; the two
//! directory handles must resolve to the same backing filesystem instance.
//! On success the registry rebinds the moved object's handle to its new
//! path, so a client that looked the object up before the rename keeps a
//! working handle afterwards.

use std::io::{Read, Write};

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::{child_path, name_component, pre_op_wcc, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_rename(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let fromdirops = deserialize::<nfs3::diropargs3>(input)?;
    let todirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_rename({:?},{:?},{:?})", xid, fromdirops, todirops);

    let (from_fs, from_dir_path) = match context.registry.from_handle(&fromdirops.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let (to_fs, to_dir_path) = match context.registry.from_handle(&todirops.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    if !Arc::ptr_eq(&from_fs, &to_fs) {
        warn!("cross-filesystem rename refused");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }
    let fs = from_fs;

    if !fs.capabilities().write {
        warn!("rename on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let pre_from_dir_attr = pre_op_wcc(&fs, &from_dir_path).await;
    let pre_to_dir_attr = pre_op_wcc(&fs, &to_dir_path).await;

    let res: Result<(), nfs3::nfsstat3> =
        match (name_component(&fromdirops.name), name_component(&todirops.name)) {
            (Ok(from_name), Ok(to_name)) => {
                let from_path = child_path(&from_dir_path, from_name);
                let to_path = child_path(&to_dir_path, to_name);
                match fs.rename(&fs.join(&from_path), &fs.join(&to_path)).await {
                    Ok(()) => {
                        context.registry.update_handle(&fs, &from_path, &to_path);
                        Ok(())
                    }
                    Err(stat) => Err(stat),
                }
            }
            (Err(stat), _) | (_, Err(stat)) => Err(stat),
        };

    if res.is_ok() {
        context.registry.invalidate_listings(&fs.join(&from_dir_path));
        context.registry.invalidate_listings(&fs.join(&to_dir_path));
    }
    let post_from_dir_attr = try_stat(context, &fs, &from_dir_path).await;
    let post_to_dir_attr = try_stat(context, &fs, &to_dir_path).await;
    let from_wcc = nfs3::wcc_data { before: pre_from_dir_attr, after: post_from_dir_attr };
    let to_wcc = nfs3::wcc_data { before: pre_to_dir_attr, after: post_to_dir_attr };

    match res {
        Ok(()) => {
            debug!("rename success {:?}", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            from_wcc.serialize(output)?;
            to_wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("rename error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            from_wcc.serialize(output)?;
            to_wcc.serialize(output)?;
        }
    }
    Ok(())
}
