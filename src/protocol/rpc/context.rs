//! Per-connection request context.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::xdr::nfs3;
use crate::registry::HandleRegistry;
use crate::vfs::MountHandler;

/// Everything a procedure handler needs beyond its own arguments.
///
/// One `Context` is built per accepted connection and cloned into each
/// request's worker task; all clones share the server-wide mount handler
/// and handle registry.
#[derive(Clone)]
pub struct Context {
    /// Port the server is listening on.
    pub local_port: u16,

    /// Peer address, used for logging and handed to the mount handler so
    /// export policy can discriminate by client.
    pub client_addr: String,

    /// The export policy: answers MNT and fills FSSTAT totals.
    pub handler: Arc<dyn MountHandler>,

    /// Handle/path registry shared by every connection of this server.
    pub registry: Arc<HandleRegistry>,

    /// Optional mount/unmount notification channel: `true` on MNT,
    /// `false` on UMNT.
    pub mount_signal: Option<mpsc::Sender<bool>>,

    /// 8-octet verifier chosen at server start, returned by WRITE and
    /// COMMIT so clients can detect a restart.
    pub write_verifier: nfs3::writeverf3,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("rpc::Context")
            .field("local_port", &self.local_port)
            .field("client_addr", &self.client_addr)
            .field("write_verifier", &self.write_verifier)
            .finish()
    }
}
