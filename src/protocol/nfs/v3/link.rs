//! LINK (procedure 15): create a hard link.
//!
//! Not offered by this server; the backing-store contract has no hard-link
//! operation. Clients receive `NFS3ERR_NOTSUPP` with the procedure's usual
//! failure body (object attributes plus directory wcc data).

use std::io::Write;

use tracing::debug;

use crate::protocol::xdr::{self, nfs3, Serialize};

pub fn nfsproc3_link(xid: u32, output: &mut impl Write) -> Result<(), anyhow::Error> {
    debug!("nfsproc3_link({:?}) --> NOTSUPP", xid);
    xdr::rpc::make_success_reply(xid).serialize(output)?;
    nfs3::nfsstat3::NFS3ERR_NOTSUPP.serialize(output)?;
    nfs3::post_op_attr::None.serialize(output)?;
    nfs3::wcc_data::default().serialize(output)?;
    Ok(())
}
