//! MOUNT MNT (procedure 1): mount an export.
//!
//! The dirpath is handed to the [`crate::vfs::MountHandler`], which decides
//! which filesystem (if any) this client gets. On success the filesystem's
//! root — the empty component list — is registered and returned as the
//! mount's root file handle, together with the handler's accepted
//! authentication flavors.

use std::io::{Read, Write};

use tracing::debug;

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, Serialize};

pub async fn mountproc3_mnt(
    xid: u32,
    input: &mut impl Read,
    output: &mut impl Write,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let path = deserialize::<mount::dirpath>(input)?;
    debug!("mountproc3_mnt({:?},{:?})", xid, String::from_utf8_lossy(&path));

    let result = context.handler.mount(&context.client_addr, &path).await;

    match (result.status, result.fs) {
        (mount::mountstat3::MNT3_OK, Some(fs)) => {
            let root_handle = context.registry.to_handle(&fs, &[]);
            let response = mount::mountres3_ok {
                fhandle: root_handle.data,
                auth_flavors: result.auth_flavors,
            };
            debug!("{:?} --> {:?}", xid, response);
            if let Some(ref chan) = context.mount_signal {
                let _ = chan.send(true).await;
            }
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            mount::mountstat3::MNT3_OK.serialize(output)?;
            response.serialize(output)?;
        }
        (status, _) => {
            // MNT3_OK with no filesystem is a handler bug; report it as a
            // server fault rather than handing out a dead handle.
            let status = if status == mount::mountstat3::MNT3_OK {
                mount::mountstat3::MNT3ERR_SERVERFAULT
            } else {
                status
            };
            debug!("{:?} --> {:?}", xid, status);
            xdr::rpc::make_success_reply(xid).serialize(output)?;
            status.serialize(output)?;
        }
    }
    Ok(())
}
