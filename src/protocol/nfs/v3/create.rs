//! CREATE (procedure 8): create a regular file.
//!
//! The three dispositions behave as follows:
//! - UNCHECKED creates or truncates, then applies the supplied attributes.
//! - GUARDED fails with `NFS3ERR_EXIST` when the target exists.
//! - EXCLUSIVE carries an 8-octet client verifier instead of attributes.
//!   The verifier's two big-endian words are stored as the new file's mtime
//!   and atime seconds; a retransmitted CREATE finds the file already
//!   carrying its own verifier and succeeds idempotently, while a file with
//!   different stored words belongs to someone else and fails with
//!   `NFS3ERR_EXIST`.
//!
//! A target that is a directory is `NFS3ERR_EXIST` in every mode.

use std::io::{Read, Write};

use byteorder::ByteOrder;
use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::{child_path, name_component, pre_op_wcc, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Deserialize, Serialize, XdrEndian};
use crate::vfs;

/// The two timestamp words an exclusive-create verifier encodes.
fn verifier_times(verf: &nfs3::createverf3) -> (u32, u32) {
    (XdrEndian::read_u32(&verf[0..4]), XdrEndian::read_u32(&verf[4..8]))
}

pub async fn nfsproc3_create(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    let createhow = deserialize::<nfs3::createmode3>(input)?;

    let mut target_attributes = nfs3::sattr3::default();
    let mut createverf = nfs3::createverf3::default();
    match createhow {
        nfs3::createmode3::UNCHECKED | nfs3::createmode3::GUARDED => {
            target_attributes.deserialize(input)?;
        }
        nfs3::createmode3::EXCLUSIVE => {
            createverf.deserialize(input)?;
        }
    }
    debug!("nfsproc3_create({:?},{:?},{:?})", xid, dirops, createhow);

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
        warn!("create on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let pre_dir_attr = pre_op_wcc(&fs, &dir_path).await;

    let name = match name_component(&dirops.name) {
        Ok(name) => name,
        Err(stat) => {
            let post_dir_attr = try_stat(context, &fs, &dir_path).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data { before: pre_dir_attr, after: post_dir_attr }.serialize(output)?;
            return Ok(());
        }
    };

    let target_path = child_path(&dir_path, name);
    let target_joined = fs.join(&target_path);

    let res: Result<(), nfs3::nfsstat3> = match fs.lstat(&target_joined).await {
        Ok(existing) => {
            if existing.is_dir() {
                Err(nfs3::nfsstat3::NFS3ERR_EXIST)
            } else {
                match createhow {
                    nfs3::createmode3::GUARDED => Err(nfs3::nfsstat3::NFS3ERR_EXIST),
                    nfs3::createmode3::UNCHECKED => {
                        debug!("create unchecked over existing file {:?}", target_joined);
                        match fs.create(&target_joined).await {
                            Ok(_truncated) => {
                                vfs::apply_sattr(&fs, &target_joined, &target_attributes).await
                            }
                            Err(stat) => Err(stat),
                        }
                    }
                    nfs3::createmode3::EXCLUSIVE => {
                        let (want_mtime, want_atime) = verifier_times(&createverf);
                        if existing.mtime.seconds == want_mtime
                            && existing.atime.seconds == want_atime
                        {
                            // Replay of our own CREATE; answer success with
                            // no further mutation.
                            debug!("exclusive create replay for {:?}", target_joined);
                            Ok(())
                        } else {
                            Err(nfs3::nfsstat3::NFS3ERR_EXIST)
                        }
                    }
                }
            }
        }
        Err(nfs3::nfsstat3::NFS3ERR_NOENT) => {
            // The parent must exist and be a directory before creating in it.
            match fs.stat(&fs.join(&dir_path)).await {
                Ok(dir_meta) if dir_meta.is_dir() => match fs.create(&target_joined).await {
                    Ok(_file) => match createhow {
                        nfs3::createmode3::EXCLUSIVE => {
                            let (mtime, atime) = verifier_times(&createverf);
                            match fs.change() {
                                Some(change) => {
                                    change
                                        .chtimes(
                                            &target_joined,
                                            Some(nfs3::nfstime3 { seconds: atime, nseconds: 0 }),
                                            Some(nfs3::nfstime3 { seconds: mtime, nseconds: 0 }),
                                        )
                                        .await
                                }
                                None => Err(nfs3::nfsstat3::NFS3ERR_ROFS),
                            }
                        }
                        _ => vfs::apply_sattr(&fs, &target_joined, &target_attributes).await,
                    },
                    Err(stat) => Err(stat),
                },
                Ok(_) => Err(nfs3::nfsstat3::NFS3ERR_NOTDIR),
                Err(_) => Err(nfs3::nfsstat3::NFS3ERR_ACCES),
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
            let obj_handle = context.registry.to_handle(&fs, &target_path);
            let obj_attr = try_stat(context, &fs, &target_path).await;
            debug!("create success {:?} --> {:?}", xid, obj_handle);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            nfs3::post_op_fh3::Some(obj_handle).serialize(output)?;
            obj_attr.serialize(output)?;
            wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("create error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
