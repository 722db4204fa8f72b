//! FSSTAT (procedure 18): volatile filesystem statistics.
//!
//! Totals come from the mount handler; stores that cannot answer leave the
//! 2^62-capped defaults in place, which clients treat as "very large".

use std::io::{Read, Write};

use tracing::{debug, error};

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};
use crate::vfs::FsStat;

pub async fn nfsproc3_fsstat(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsstat({:?},{:?})", xid, handle);

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

    let mut totals = FsStat::default();
    match context.handler.fsstat(&fs, &mut totals).await {
        Ok(()) => {
            let res = nfs3::fs::FSSTAT3resok {
                obj_attributes: obj_attr,
                tbytes: totals.total_bytes,
                fbytes: totals.free_bytes,
                abytes: totals.avail_bytes,
                tfiles: totals.total_files,
                ffiles: totals.free_files,
                afiles: totals.avail_files,
                invarsec: 0,
            };
            debug!(" {:?} --> {:?}", xid, res);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            nfs3::nfsstat3::NFS3_OK.serialize(output)?;
            res.serialize(output)?;
        }
        Err(stat) => {
            error!("nfsproc3_fsstat error {:?} --> {:?}", xid, stat);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            obj_attr.serialize(output)?;
        }
    }
    Ok(())
}
