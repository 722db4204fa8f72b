//! COMMIT (procedure 21): flush previously written data to stable storage.
//!
//! Every WRITE this server performs is already durable before its reply, so
//! COMMIT has nothing to flush; it answers with current wcc data and the
//! same per-instance write verifier WRITE returns.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::v3::helpers::{pre_op_wcc, try_stat};
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_commit(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let args = deserialize::<nfs3::file::COMMIT3args>(input)?;
    debug!("nfsproc3_commit({:?},{:?})", xid, args);

    let (fs, path) = match context.registry.from_handle(&args.file) {
        Ok(resolved) => resolved,
        Err(stat) => {
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            stat.serialize(output)?;
            nfs3::wcc_data::default().serialize(output)?;
            return Ok(());
        }
    };

    let pre_attr = pre_op_wcc(&fs, &path).await;
    let post_attr = try_stat(context, &fs, &path).await;

    let res = nfs3::file::COMMIT3resok {
        file_wcc: nfs3::wcc_data { before: pre_attr, after: post_attr },
        verf: context.write_verifier,
    };
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
