//! TCP server front end: accepts client connections and runs the
//! per-connection read/dispatch/write machinery over them.
//!
//! Each accepted connection gets one reader task pulling record-marked
//! requests off the socket and one writer (the `select!` loop below)
//! draining finished replies onto it. Requests themselves run in worker
//! tasks spawned per record, so slow filesystem operations never stall the
//! connection; reply order between concurrent requests is unspecified, as
//! the protocol permits.

use std::net::SocketAddr;
use std::sync::Arc;
use std::{io, net::IpAddr};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::protocol::rpc;
use crate::registry::HandleRegistry;
use crate::vfs::MountHandler;

/// Default bound on resident file handles when none is configured.
pub const DEFAULT_HANDLE_LIMIT: usize = 16384;

/// Builds a loopback address in the 127.88.x.y range from a 16-bit host
/// number. Used by `bind("auto:...")` to find a free local address.
pub fn generate_host_ip(hostnum: u16) -> String {
    format!("127.88.{}.{}", ((hostnum >> 8) & 0xFF) as u8, (hostnum & 0xFF) as u8)
}

/// Runs one established client connection to completion.
async fn process_socket(
    mut socket: tokio::net::TcpStream,
    context: rpc::Context,
) -> Result<(), anyhow::Error> {
    let (mut message_handler, mut socksend, mut replyrecv) =
        rpc::SocketMessageHandler::new(&context);
    let _ = socket.set_nodelay(true);

    tokio::spawn(async move {
        loop {
            if let Err(e) = message_handler.read().await {
                debug!("message loop broken due to {:?}", e);
                break;
            }
        }
    });
    loop {
        tokio::select! {
            _ = socket.readable() => {
                let mut buf = [0; 128_000];

                match socket.try_read(&mut buf) {
                    Ok(0) => {
                        return Ok(());
                    }
                    Ok(n) => {
                        let _ = socksend.write_all(&buf[..n]).await;
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                        // spurious readiness; retry
                    }
                    Err(e) => {
                        debug!("message handling closed: {:?}", e);
                        return Err(e.into());
                    }
                }
            },
            reply = replyrecv.recv() => {
                match reply {
                    Some(Err(e)) => {
                        debug!("message handling closed: {:?}", e);
                        return Err(e);
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = rpc::write_fragment(&mut socket, &msg).await {
                            error!("write error {:?}", e);
                        }
                    }
                    None => {
                        return Err(anyhow::anyhow!("unexpected socket context termination"));
                    }
                }
            }
        }
    }
}

/// Common operations of an NFS-over-TCP server.
#[async_trait]
pub trait NfsTcp: Send + Sync {
    /// The port actually bound, useful after binding port 0.
    fn get_listen_port(&self) -> u16;

    /// The address actually bound, useful with the "auto" address.
    fn get_listen_ip(&self) -> IpAddr;

    /// Registers a channel receiving `true` on each MNT and `false` on
    /// each UMNT.
    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>);

    /// Accepts and serves connections until the listener fails.
    async fn handle_forever(&self) -> io::Result<()>;
}

/// The server: a bound TCP listener plus the export policy and the
/// server-wide handle registry and write verifier shared by every
/// connection.
pub struct NfsTcpListener<T: MountHandler + 'static> {
    listener: TcpListener,
    port: u16,
    handler: Arc<T>,
    registry: Arc<HandleRegistry>,
    mount_signal: Option<mpsc::Sender<bool>>,
    write_verifier: crate::protocol::xdr::nfs3::writeverf3,
}

impl<T: MountHandler + 'static> NfsTcpListener<T> {
    /// Binds to `"ip:port"` and prepares to serve `handler`. The special
    /// form `"auto:port"` probes 127.88.x.y loopback addresses until one
    /// binds, which lets multiple local servers coexist on one port.
    pub async fn bind(ipstr: &str, handler: T) -> io::Result<NfsTcpListener<T>> {
        let (ip, port) = ipstr.split_once(':').ok_or_else(|| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "IP address must be of form ip:port")
        })?;
        let port = port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::AddrNotAvailable, "port not in range 0..=65535")
        })?;
        let handler: Arc<T> = Arc::new(handler);

        if ip != "auto" {
            return NfsTcpListener::bind_internal(ip, port, handler).await;
        }

        const NUM_TRIES: u16 = 32;
        for try_ip in 1..=NUM_TRIES {
            let ip = generate_host_ip(try_ip);
            let result = NfsTcpListener::bind_internal(&ip, port, handler.clone()).await;

            if result.is_ok() {
                return result;
            }
        }

        Err(io::Error::other("can't bind automatically"))
    }

    async fn bind_internal(ip: &str, port: u16, handler: Arc<T>) -> io::Result<NfsTcpListener<T>> {
        let ipstr = format!("{ip}:{port}");
        let listener = TcpListener::bind(&ipstr).await?;
        info!("listening on {:?}", &ipstr);

        let port = match listener.local_addr()? {
            SocketAddr::V4(s) => s.port(),
            SocketAddr::V6(s) => s.port(),
        };
        Ok(NfsTcpListener {
            listener,
            port,
            handler,
            registry: Arc::new(HandleRegistry::new(DEFAULT_HANDLE_LIMIT)),
            mount_signal: None,
            write_verifier: rand::random(),
        })
    }

    /// Replaces the handle registry, e.g. to change the handle limit.
    /// Only sensible before `handle_forever` is started.
    pub fn with_handle_registry(&mut self, registry: HandleRegistry) {
        self.registry = Arc::new(registry);
    }
}

#[async_trait]
impl<T: MountHandler + 'static> NfsTcp for NfsTcpListener<T> {
    fn get_listen_port(&self) -> u16 {
        self.port
    }

    fn get_listen_ip(&self) -> IpAddr {
        self.listener
            .local_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED))
    }

    fn set_mount_listener(&mut self, signal: mpsc::Sender<bool>) {
        self.mount_signal = Some(signal);
    }

    async fn handle_forever(&self) -> io::Result<()> {
        loop {
            let (socket, _) = self.listener.accept().await?;
            let context = rpc::Context {
                local_port: self.port,
                client_addr: socket.peer_addr()?.to_string(),
                handler: self.handler.clone(),
                registry: self.registry.clone(),
                mount_signal: self.mount_signal.clone(),
                write_verifier: self.write_verifier,
            };
            info!("accepting connection from {}", context.client_addr);
            debug!("accepting socket {:?} {:?}", socket, context);
            tokio::spawn(async move {
                let _ = process_socket(socket, context).await;
            });
        }
    }
}
