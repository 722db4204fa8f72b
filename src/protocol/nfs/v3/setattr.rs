//! SETATTR (procedure 2): change mode, ownership, size or times of an
//! object.
//!
//! The optional guard compares the object's current ctime against a
//! client-supplied snapshot; a mismatch means another client changed the
//! object first and the call fails with `NFS3ERR_NOT_SYNC`.

use std::io::{Read, Write};

use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::vfs;

pub async fn nfsproc3_setattr(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::SETATTR3args>(input)?;
    debug!("nfsproc3_setattr({:?},{:?})", xid, args);

    let (fs, path) = match context.registry.from_handle(&args.object) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    if !fs.capabilities().write {
        warn!("setattr on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    let joined = fs.join(&path);
    let pre_meta = match fs.lstat(&joined).await {
        Ok(meta) => meta,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };
    let pre_attr: nfs3::pre_op_attr = Some(pre_meta.to_wcc_attr());

    if let Some(guard_ctime) = args.guard {
        if guard_ctime != pre_meta.ctime {
            debug!("setattr guard mismatch {:?} != {:?}", guard_ctime, pre_meta.ctime);
            let post_attr = try_stat(context, &fs, &path).await;
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3ERR_NOT_SYNC.serialize(output)?;
            nfs3::wcc_data { before: pre_attr, after: post_attr }.serialize(output)?;
            return Ok(());
        }
    }

    let res = vfs::apply_sattr(&fs, &joined, &args.new_attributes).await;
    let post_attr = try_stat(context, &fs, &path).await;
    let wcc = nfs3::wcc_data { before: pre_attr, after: post_attr };

    match res {
        Ok(()) => {
            debug!("setattr success {:?}", xid);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            wcc.serialize(output)?;
        }
        Err(stat) => {
            error!("setattr error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
