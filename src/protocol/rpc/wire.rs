//! Record marking and call dispatch for RPC over TCP (RFC 5531 section 11).
//!
//! TCP is a byte stream, so each RPC record is carried as a sequence of
//! fragments, every fragment prefixed with a 4-octet header: the top bit
//! flags the final fragment, the low 31 bits give the fragment length.
//! [`SocketMessageHandler`] reassembles records and hands each complete call
//! to its own spawned worker; workers may run concurrently and finish in any
//! order, since clients correlate replies by xid. Every reply travels back
//! through one channel per connection and is written as a single
//! last-fragment record, which keeps response bytes from interleaving
//! without any handler ever holding a connection-wide lock across
//! filesystem I/O.

use std::io::{Cursor, Read};

use anyhow::anyhow;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::protocol::rpc;
use crate::protocol::xdr::{self, deserialize, mount, nfs3, Serialize};
use crate::protocol::nfs;

/// Initial capacity of a reply buffer; covers everything but READ and large
/// directory pages without reallocation.
const DEFAULT_RESPONSE_BUFFER_CAPACITY: usize = 8192;

/// Validates one decoded call and routes it to the owning program.
///
/// The reply — including every error reply — is staged into `output`.
/// Returning `Err` means no usable reply could be produced at all (the
/// record was not a CALL, or the header was garbage); the connection is
/// expected to be torn down in that case. A handler failure below the RPC
/// layer is downgraded to a `SYSTEM_ERR` reply here so that every parsed
/// request yields exactly one response.
pub async fn handle_rpc(
    input: &mut impl Read,
    output: &mut Vec<u8>,
    context: &rpc::Context,
) -> Result<(), anyhow::Error> {
    let recv = deserialize::<xdr::rpc::rpc_msg>(input)?;
    let xid = recv.xid;
    let call = match recv.body {
        xdr::rpc::rpc_body::CALL(call) => call,
        xdr::rpc::rpc_body::REPLY(_) => {
            error!("unexpectedly received a reply instead of a call");
            return Err(anyhow!("bad RPC call format"));
        }
    };

    if call.rpcvers != xdr::rpc::RPC_VERSION {
        warn!("invalid RPC version {} != {}", call.rpcvers, xdr::rpc::RPC_VERSION);
        xdr::rpc::rpc_vers_mismatch_reply_message(xid).serialize(output)?;
        return Ok(());
    }

    match call.cred.flavor {
        xdr::rpc::AUTH_FLAVOR_NONE => {}
        xdr::rpc::AUTH_FLAVOR_UNIX => {
            // Parsed for validity only; identity is not acted upon.
            let creds: Result<xdr::rpc::auth_unix, _> =
                deserialize(&mut Cursor::new(&call.cred.body));
            match creds {
                Ok(creds) => trace!("auth_unix cred from {:?}: {:?}", context.client_addr, creds),
                Err(e) => {
                    warn!("undecodable auth_unix cred: {:?}", e);
                    xdr::rpc::auth_error_reply_message(xid, xdr::rpc::auth_stat::AUTH_BADCRED)
                        .serialize(output)?;
                    return Ok(());
                }
            }
        }
        flavor => {
            warn!("rejecting auth flavor {}", flavor);
            xdr::rpc::auth_error_reply_message(xid, xdr::rpc::auth_stat::AUTH_REJECTEDCRED)
                .serialize(output)?;
            return Ok(());
        }
    }

    let res = match call.prog {
        nfs3::PROGRAM => nfs::v3::handle_nfs(xid, call, input, output, context).await,
        mount::PROGRAM => nfs::mount::handle_mount(xid, call, input, output, context).await,
        unknown => {
            warn!("unknown RPC program number {}", unknown);
            xdr::rpc::prog_unavail_reply_message(xid).serialize(output)?;
            Ok(())
        }
    };

    if let Err(e) = res {
        error!("handler failed for xid {}: {:?}", xid, e);
        output.clear();
        xdr::rpc::system_err_reply_message(xid).serialize(output)?;
    }
    Ok(())
}

/// Reads one record-marked fragment from the stream into `append_to`.
///
/// Returns whether the fragment carried the last-fragment bit. The running
/// record size is capped at [`rpc::MAX_RPC_RECORD_LENGTH`]; a record above
/// the cap fails the connection rather than buffering without bound.
async fn read_fragment(
    socket: &mut DuplexStream,
    append_to: &mut Vec<u8>,
) -> Result<bool, anyhow::Error> {
    let mut header_buf = [0_u8; 4];
    socket.read_exact(&mut header_buf).await?;
    let fragment_header = u32::from_be_bytes(header_buf);
    let is_last = (fragment_header & (1 << 31)) > 0;
    let length = (fragment_header & ((1 << 31) - 1)) as usize;
    trace!("reading fragment length:{}, last:{}", length, is_last);
    if append_to.len().saturating_add(length) > rpc::MAX_RPC_RECORD_LENGTH {
        return Err(anyhow!(
            "RPC record length {} exceeds max {}",
            append_to.len().saturating_add(length),
            rpc::MAX_RPC_RECORD_LENGTH
        ));
    }
    let start_offset = append_to.len();
    append_to.resize(append_to.len() + length, 0);
    socket.read_exact(&mut append_to[start_offset..]).await?;
    trace!("finished reading fragment length:{}, last:{}", length, is_last);
    Ok(is_last)
}

/// Writes `buf` to the socket as record-marked fragments.
///
/// A reply almost always fits one fragment; buffers past 2^31-1 bytes are
/// split with only the final fragment carrying the last bit. The caller
/// serializes invocations per connection, so fragments from different
/// replies never interleave.
pub async fn write_fragment(
    socket: &mut tokio::net::TcpStream,
    buf: &[u8],
) -> Result<(), anyhow::Error> {
    const MAX_FRAGMENT_SIZE: usize = (1 << 31) - 1;

    let mut offset = 0;
    while offset < buf.len() {
        let remaining = buf.len() - offset;
        let fragment_size = std::cmp::min(remaining, MAX_FRAGMENT_SIZE);
        let is_last = offset + fragment_size >= buf.len();
        let fragment_header =
            if is_last { fragment_size as u32 + (1 << 31) } else { fragment_size as u32 };

        socket.write_all(&u32::to_be_bytes(fragment_header)).await?;
        trace!("writing fragment length:{}, last:{}", fragment_size, is_last);
        socket.write_all(&buf[offset..offset + fragment_size]).await?;

        offset += fragment_size;
    }

    Ok(())
}

/// A finished reply ready for framing, or the error that ends the
/// connection.
pub type SocketMessageType = Result<Vec<u8>, anyhow::Error>;

/// Per-connection record reassembly and request fan-out.
///
/// Bytes from the socket are pushed into the returned [`DuplexStream`];
/// [`SocketMessageHandler::read`] pulls fragments out of it, and once a
/// record is complete spawns a worker task to decode and execute the call.
/// Workers post their replies to the returned receiver, from which the
/// connection's single writer drains them onto the wire. In-flight workers
/// owning a dropped channel simply have their replies discarded, which is
/// the defined behavior when a client disconnects mid-request.
#[derive(Debug)]
pub struct SocketMessageHandler {
    cur_fragment: Vec<u8>,
    socket_receive_channel: DuplexStream,
    context: rpc::Context,
    reply_send: mpsc::UnboundedSender<SocketMessageType>,
}

impl SocketMessageHandler {
    /// Creates the handler plus the write half for socket bytes and the
    /// receiver the connection writer drains.
    pub fn new(
        context: &rpc::Context,
    ) -> (Self, DuplexStream, mpsc::UnboundedReceiver<SocketMessageType>) {
        let (socksend, sockrecv) = tokio::io::duplex(256_000);
        let (reply_send, reply_recv) = mpsc::unbounded_channel();
        (
            Self {
                cur_fragment: Vec::new(),
                socket_receive_channel: sockrecv,
                context: context.clone(),
                reply_send,
            },
            socksend,
            reply_recv,
        )
    }

    /// Reads one fragment, and on record completion spawns a worker for the
    /// call. Call in a loop; an error means the connection should close.
    pub async fn read(&mut self) -> Result<(), anyhow::Error> {
        let is_last =
            read_fragment(&mut self.socket_receive_channel, &mut self.cur_fragment).await?;
        if !is_last {
            return Ok(());
        }

        let record = std::mem::take(&mut self.cur_fragment);
        let context = self.context.clone();
        let reply_send = self.reply_send.clone();
        tokio::spawn(async move {
            let mut input = Cursor::new(record);
            let mut output = Vec::with_capacity(DEFAULT_RESPONSE_BUFFER_CAPACITY);
            match handle_rpc(&mut input, &mut output, &context).await {
                Ok(()) => {
                    // A send failure means the connection is gone; the
                    // reply is dropped and no retry is made.
                    let _ = reply_send.send(Ok(output));
                }
                Err(e) => {
                    debug!("dropping undecodable request: {:?}", e);
                    let _ = reply_send.send(Err(e));
                }
            }
        });
        Ok(())
    }
}
