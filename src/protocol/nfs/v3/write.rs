//! WRITE (procedure 7): write a byte range to a regular file.
//!
//! Every write this server performs is durable before the reply is sent, so
//! the committed level is always `FILE_SYNC` no matter what the client
//! requested, and COMMIT is a no-op. The reply carries the server's write
//! verifier; it is constant for the life of the process, which is how
//! clients detect a restart between WRITE and COMMIT.

use std::io::{Read, Write};

use num_traits::cast::FromPrimitive;
use tracing::{debug, error, warn};

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_write(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::WRITE3args>(input)?;
    debug!("nfsproc3_write({:?},{:?},{},{})", xid, args.file, args.offset, args.count);

    let (fs, path) = match context.registry.from_handle(&args.file) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    if !fs.capabilities().write {
        warn!("write on read-only filesystem");
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_ROFS.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    if nfs3::file::stable_how::from_u32(args.stable).is_none() {
        warn!("invalid write stability {}", args.stable);
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }

    if args.data.len() != args.count as usize {
        xdr::rpc::garbage_args_reply_message(xid).serialize(output)?;
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
    if !pre_meta.is_file() {
        xdr::rpc::make_success_reply(xid).serialize(output)?;
        nfs3::nfsstat3::NFS3ERR_INVAL.serialize(output)?;
        nfs3::wcc_data::default().serialize(output)?;
        return Ok(());
    }
    let pre_attr: nfs3::pre_op_attr = Some(pre_meta.to_wcc_attr());

    let res = match fs.open_file(&joined).await {
        Ok(file) => file.write_at(args.offset, &args.data).await,
        Err(stat) => Err(stat),
    };

    let post_attr = try_stat(context, &fs, &path).await;
    let wcc = nfs3::wcc_data { before: pre_attr, after: post_attr };

    match res {
        Ok(written) => {
            debug!("write success {:?} --> {} bytes", xid, written);
            let res = nfs3::file::WRITE3resok {
                file_wcc: wcc,
                count: written,
                committed: nfs3::file::stable_how::FILE_SYNC,
                verf: context.write_verifier,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("write error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            wcc.serialize(output)?;
        }
    }
    Ok(())
}
