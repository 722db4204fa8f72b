//! ONC-RPC v2 message structures (RFC 5531) and the canned replies the
//! dispatcher answers with.
//!
//! Only the call side of the protocol is ever decoded by this server; the
//! reply structures exist so responses can be built and so the test suite can
//! parse what the server emits.

// The complete RFC structure set is defined even where the server itself only
// uses part of it.
#![allow(dead_code)]
// RFC naming is kept as-is for recognizability against the specification.
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::cast::FromPrimitive;

use super::{deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize,
            SerializeEnum, SerializeStruct};

/// RPC protocol version handled by this server.
pub const RPC_VERSION: u32 = 2;

/// AUTH_NONE: calls carrying no credential.
pub const AUTH_FLAVOR_NONE: u32 = 0;
/// AUTH_UNIX (AUTH_SYS): uid/gid style credentials.
pub const AUTH_FLAVOR_UNIX: u32 = 1;

/// Reasons a server refuses to authenticate a caller.
#[derive(Copy, Clone, Debug, Default, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum auth_stat {
    /// Bad credential (seal broken).
    #[default]
    AUTH_BADCRED = 1,
    /// Client must begin a new session.
    AUTH_REJECTEDCRED = 2,
    /// Bad verifier (seal broken).
    AUTH_BADVERF = 3,
    /// Verifier expired or replayed.
    AUTH_REJECTEDVERF = 4,
    /// Rejected for security reasons.
    AUTH_TOOWEAK = 5,
}
SerializeEnum!(auth_stat);
DeserializeEnum!(auth_stat);

/// Authentication data attached to calls and replies.
///
/// The flavor is kept as a raw `u32` rather than a closed enum: a client
/// presenting an unknown flavor must be answered with an `AUTH_ERROR` reply,
/// not a decode failure that tears the connection down.
#[derive(Clone, Debug, Default)]
pub struct opaque_auth {
    /// Authentication mechanism identifier (`AUTH_FLAVOR_*`).
    pub flavor: u32,
    /// Mechanism-specific payload, opaque to the RPC layer.
    pub body: Vec<u8>,
}
DeserializeStruct!(opaque_auth, flavor, body);
SerializeStruct!(opaque_auth, flavor, body);

/// UNIX-style credential body carried under `AUTH_FLAVOR_UNIX`.
///
/// Parsed so the bytes are consumed and validated; this server does not act
/// on the identity it carries.
#[derive(Clone, Debug, Default)]
pub struct auth_unix {
    pub stamp: u32,
    pub machinename: Vec<u8>,
    pub uid: u32,
    pub gid: u32,
    pub gids: Vec<u32>,
}
DeserializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);
SerializeStruct!(auth_unix, stamp, machinename, uid, gid, gids);

/// An RPC message: transaction id plus a call or reply body.
///
/// The xid is how clients pair replies with calls; this server echoes it
/// verbatim and attaches no other meaning to it.
#[derive(Clone, Debug, Default)]
pub struct rpc_msg {
    pub xid: u32,
    pub body: rpc_body,
}
DeserializeStruct!(rpc_msg, xid, body);
SerializeStruct!(rpc_msg, xid, body);

/// Discriminated body of an RPC message.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug)]
#[repr(u32)]
pub enum rpc_body {
    CALL(call_body),
    REPLY(reply_body),
}

impl Default for rpc_body {
    fn default() -> rpc_body {
        rpc_body::CALL(call_body::default())
    }
}

impl Serialize for rpc_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rpc_body::CALL(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            rpc_body::REPLY(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}
impl Deserialize for rpc_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rpc_body::CALL(deserialize(src)?),
            1 => *self = rpc_body::REPLY(deserialize(src)?),
            msg_type => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid message type in rpc_body: {msg_type}"),
                ))
            }
        }
        Ok(())
    }
}

/// The call side of an RPC message: what to invoke and as whom.
#[derive(Clone, Debug, Default)]
pub struct call_body {
    /// Must be [`RPC_VERSION`].
    pub rpcvers: u32,
    pub prog: u32,
    pub vers: u32,
    pub proc: u32,
    pub cred: opaque_auth,
    pub verf: opaque_auth,
    // procedure-specific arguments follow in the record
}
DeserializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);
SerializeStruct!(call_body, rpcvers, prog, vers, proc, cred, verf);

/// The reply side: either the call was accepted (possibly with a
/// processing-level error) or denied outright.
#[derive(Clone, Debug)]
pub enum reply_body {
    MSG_ACCEPTED(accepted_reply),
    MSG_DENIED(rejected_reply),
}

impl Default for reply_body {
    fn default() -> reply_body {
        reply_body::MSG_ACCEPTED(accepted_reply::default())
    }
}

impl Serialize for reply_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            reply_body::MSG_ACCEPTED(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            reply_body::MSG_DENIED(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}
impl Deserialize for reply_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = reply_body::MSG_ACCEPTED(deserialize(src)?),
            1 => *self = reply_body::MSG_DENIED(deserialize(src)?),
            reply_status => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid reply status in reply_body: {reply_status}"),
                ))
            }
        }
        Ok(())
    }
}

/// Supported version range, reported on program or RPC version mismatch.
#[derive(Clone, Debug, Default)]
pub struct mismatch_info {
    pub low: u32,
    pub high: u32,
}
DeserializeStruct!(mismatch_info, low, high);
SerializeStruct!(mismatch_info, low, high);

/// Reply to an accepted call: server verifier plus the outcome union.
#[derive(Clone, Debug, Default)]
pub struct accepted_reply {
    pub verf: opaque_auth,
    pub reply_data: accept_body,
}
DeserializeStruct!(accepted_reply, verf, reply_data);
SerializeStruct!(accepted_reply, verf, reply_data);

/// Outcome of an accepted call, discriminated by `accept_stat`.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, Default)]
#[repr(u32)]
pub enum accept_body {
    /// Procedure ran; its results follow the reply header.
    #[default]
    SUCCESS,
    /// The program number is not served here.
    PROG_UNAVAIL,
    /// The program is served, but not at the requested version.
    PROG_MISMATCH(mismatch_info),
    /// The program has no such procedure.
    PROC_UNAVAIL,
    /// The argument body could not be decoded.
    GARBAGE_ARGS,
    /// The procedure failed in a way that maps to no protocol status.
    SYSTEM_ERR,
}

impl Serialize for accept_body {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            accept_body::SUCCESS => 0_u32.serialize(dest)?,
            accept_body::PROG_UNAVAIL => 1_u32.serialize(dest)?,
            accept_body::PROG_MISMATCH(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            accept_body::PROC_UNAVAIL => 3_u32.serialize(dest)?,
            accept_body::GARBAGE_ARGS => 4_u32.serialize(dest)?,
            accept_body::SYSTEM_ERR => 5_u32.serialize(dest)?,
        }
        Ok(())
    }
}
impl Deserialize for accept_body {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = accept_body::SUCCESS,
            1 => *self = accept_body::PROG_UNAVAIL,
            2 => *self = accept_body::PROG_MISMATCH(deserialize(src)?),
            3 => *self = accept_body::PROC_UNAVAIL,
            4 => *self = accept_body::GARBAGE_ARGS,
            5 => *self = accept_body::SYSTEM_ERR,
            accept_stat => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid accept stat in accept_body: {accept_stat}"),
                ));
            }
        }
        Ok(())
    }
}

/// Reply to a denied call: RPC version mismatch or authentication failure.
#[derive(Clone, Debug)]
pub enum rejected_reply {
    RPC_MISMATCH(mismatch_info),
    AUTH_ERROR(auth_stat),
}

impl Default for rejected_reply {
    fn default() -> rejected_reply {
        rejected_reply::AUTH_ERROR(auth_stat::default())
    }
}

impl Serialize for rejected_reply {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            rejected_reply::RPC_MISMATCH(v) => {
                0_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
            rejected_reply::AUTH_ERROR(v) => {
                1_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}
impl Deserialize for rejected_reply {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = rejected_reply::RPC_MISMATCH(deserialize(src)?),
            1 => *self = rejected_reply::AUTH_ERROR(deserialize(src)?),
            stat => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid reject stat in rejected_reply: {stat}"),
                ))
            }
        }
        Ok(())
    }
}

/// Reply: the requested procedure does not exist in this program.
pub fn proc_unavail_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROC_UNAVAIL,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Reply: the requested program is not served here.
pub fn prog_unavail_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROG_UNAVAIL,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Reply: the program exists, but only at `accepted_ver`.
pub fn prog_mismatch_reply_message(xid: u32, accepted_ver: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::PROG_MISMATCH(mismatch_info {
            low: accepted_ver,
            high: accepted_ver,
        }),
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Reply: the argument body could not be decoded.
pub fn garbage_args_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::GARBAGE_ARGS,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Reply: the handler failed with no protocol-level status to report.
pub fn system_err_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::SYSTEM_ERR,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Denial: caller requested an RPC version other than 2.
pub fn rpc_vers_mismatch_reply_message(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::RPC_MISMATCH(mismatch_info {
        low: RPC_VERSION,
        high: RPC_VERSION,
    }));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Denial: the presented credential flavor is not acceptable.
pub fn auth_error_reply_message(xid: u32, stat: auth_stat) -> rpc_msg {
    let reply = reply_body::MSG_DENIED(rejected_reply::AUTH_ERROR(stat));
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}

/// Accepted-success reply header; procedure results are appended after it.
pub fn make_success_reply(xid: u32) -> rpc_msg {
    let reply = reply_body::MSG_ACCEPTED(accepted_reply {
        verf: opaque_auth::default(),
        reply_data: accept_body::SUCCESS,
    });
    rpc_msg { xid, body: rpc_body::REPLY(reply) }
}
