//! LOOKUP (procedure 3): resolve one name inside a directory to a handle.
//!
//! `.` and `..` are answered from the registry's path components without
//! touching the backing store's namespace: `.` is the directory itself and
//! `..` its parent. `..` at the export root is refused with `NFS3ERR_ACCES`
//! so clients cannot walk above the export.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::v3::helpers::{child_path, name_component, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_lookup(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let dirops = deserialize::<nfs3::diropargs3>(input)?;
    debug!("nfsproc3_lookup({:?},{:?})", xid, dirops);

    let (fs, dir_path) = match context.registry.from_handle(&dirops.dir) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let dir_attr = try_stat(context, &fs, &dir_path).await;

    if dirops.name.as_ref() == b"." {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3_OK.serialize(output)?;
        dirops.dir.serialize(output)?;
        dir_attr.serialize(output)?;
        dir_attr.serialize(output)?;
        return Ok(());
    }
    if dirops.name.as_ref() == b".." {
        if dir_path.is_empty() {
            debug!("nfsproc3_lookup {:?} .. at export root", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_ACCES.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
        let parent_path = &dir_path[..dir_path.len() - 1];
        let parent_handle = context.registry.to_handle(&fs, parent_path);
        let parent_attr = try_stat(context, &fs, parent_path).await;
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3_OK.serialize(output)?;
        parent_handle.serialize(output)?;
        parent_attr.serialize(output)?;
        dir_attr.serialize(output)?;
        return Ok(());
    }

    let name = match name_component(&dirops.name) {
        Ok(name) => name,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
    };

    match &dir_attr {
        Some(attr) if attr.ftype == nfs3::ftype3::NF3DIR => {}
        _ => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_NOTDIR.serialize(output)?;
            dir_attr.serialize(output)?;
            return Ok(());
        }
    }

    let obj_path = child_path(&dir_path, name);
    match fs.lstat(&fs.join(&obj_path)).await {
        Ok(meta) => {
            let obj_handle = context.registry.to_handle(&fs, &obj_path);
            let obj_attr: nfs3::post_op_attr = Some(meta.to_fattr3(obj_handle.fileid()));
            debug!("nfsproc3_lookup success {:?} --> {:?}", xid, obj_handle);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            obj_handle.serialize(output)?;
            obj_attr.serialize(output)?;
            dir_attr.serialize(output)?;
        }
        Err(stat) => {
            debug!("nfsproc3_lookup error {:?}({:?}) --> {:?}", xid, dirops.name, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            dir_attr.serialize(output)?;
        }
    }
    Ok(())
}
