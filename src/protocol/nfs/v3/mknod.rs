//! MKNOD (procedure 11): create a special file.
//!
//! Path-addressed backing stores are not assumed to support device nodes,
//! sockets or FIFOs, so the procedure is answered with `NFS3ERR_NOTSUPP`
//! without reading its arguments; the request body is self-contained per
//! record, so the unread remainder is simply discarded.

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, nfs3, Serialize};

pub fn nfsproc3_mknod(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_mknod({:?}) --> NOTSUPP", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    nfs3::wcc_data::default().serialize(output)?;
    Ok(())
}
