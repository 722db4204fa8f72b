//! ACCESS (procedure 4): check access rights against the server's view of
//! the object.
//!
//! The server ANDs the client's requested mask with what the filesystem can
//! actually honor. With AUTH_NONE there is no caller identity to evaluate,
//! so the only restriction applied is structural: a filesystem without the
//! write capability keeps only the read, lookup and execute bits.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_access(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    let mut mask = deserialize::<u32>(input)?;
    debug!("nfsproc3_access({:?},{:?},{:#x})", xid, handle, mask);

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

    if !fs.capabilities().write {
        mask &= nfs3::ACCESS3_READ | nfs3::ACCESS3_LOOKUP | nfs3::ACCESS3_EXECUTE;
    }

    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    obj_attr.serialize(output)?;
    mask.serialize(output)?;
    Ok(())
}
