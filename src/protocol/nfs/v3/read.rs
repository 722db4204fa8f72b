//! READ (procedure 6): read a byte range from a regular file.
//!
//! The returned byte count is `min(count, MAX_READ, size - offset)`; the
//! eof flag is set exactly when the read reached the end of the file,
//! including reads at or past the end which return no data.

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

/// Hard cap on a single READ, regardless of what the client asks for.
pub const MAX_READ: u32 = 1 << 24;

pub async fn nfsproc3_read(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::READ3args>(input)?;
    debug!("nfsproc3_read({:?},{:?})", xid, args);

    let (fs, path) = match context.registry.from_handle(&args.file) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };

    let joined = fs.join(&path);
    let meta = match fs.lstat(&joined).await {
        Ok(meta) => meta,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::post_op_attr::None.serialize(output)?;
            return Ok(());
        }
    };
    let obj_attr: nfs3::post_op_attr = Some(meta.to_fattr3(args.file.fileid()));

    let remaining = meta.size.saturating_sub(args.offset);
    let count = (u64::from(args.count.min(MAX_READ))).min(remaining) as u32;

    let file = match fs.open(&joined).await {
        Ok(file) => file,
        Err(stat) => {
            error!("nfsproc3_read open error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
            return Ok(());
        }
    };

    match file.read_at(args.offset, count).await {
        Ok(data) => {
            let eof = args.offset + data.len() as u64 >= meta.size;
            let res = nfs3::file::READ3resok {
                file_attributes: obj_attr,
                count: data.len() as u32,
                eof,
                data,
            };
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_read error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}
