//! PATHCONF (procedure 20): POSIX pathconf values for the export.
//!
//! Static for every object: no hard links, 255-octet names rejected rather
//! than truncated, case-sensitive and case-preserving.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::nfs::v3::helpers::try_stat;
use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, nfs3, Serialize};

pub async fn nfsproc3_pathconf(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let handle = deserialize::<nfs3::nfs_fh3>(input)?;
    debug!("nfsproc3_pathconf({:?},{:?})", xid, handle);

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

    let res = nfs3::fs::PATHCONF3resok {
        obj_attributes: obj_attr,
        linkmax: 1,
        name_max: nfs3::PATHNAME_MAX as u32,
        no_trunc: true,
        chown_restricted: false,
        case_insensitive: false,
        case_preserving: true,
    };
    debug!(" {:?} --> {:?}", xid, res);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3_OK.serialize(output)?;
    res.serialize(output)?;
    Ok(())
}
