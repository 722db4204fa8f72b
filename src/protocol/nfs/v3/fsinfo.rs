//! FSINFO (procedure 19): static filesystem parameters.
//!
//! Answered from constants: 1 MiB preferred and maximum transfer sizes, a
//! 128 GiB maximum file size, and millisecond time resolution. Clients use
//! these to size their READ/WRITE requests.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_fsinfo(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_fsinfo({:?},{:?})", xid, handle);

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

    let res = nfs3::fs::fsinfo3 {
        obj_attributes: obj_attr,
        rtmax: 1024 * 1024,
        rtpref: 1024 * 1024,
        rtmult: 1024 * 1024,
        wtmax: 1024 * 1024,
        wtpref: 1024 * 1024,
        wtmult: 1024 * 1024,
        dtpref: 1024 * 1024,
        maxfilesize: 128 * 1024 * 1024 * 1024,
        time_delta: nfs3::nfstime3 { seconds: 0, nseconds: 1_000_000 },
        properties: nfs3::fs::FSF_SYMLINK | nfs3::fs::FSF_HOMOGENEOUS | nfs3::fs::FSF_CANSETTIME,
    };
    debug!(" {:?} --> {:?}", xid, res);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
