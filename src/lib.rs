//! nfs-gate — a pluggable user-space NFSv3 server.
//!
//! This library lets any Rust application expose a virtual filesystem tree
//! to standard NFS clients over TCP, implementing the NFSv3 protocol of
//! RFC 1813 and its companion MOUNT protocol on ONC-RPC (RFC 5531) record
//! marking.
//!
//! ## Main components
//!
//! - `vfs`: the backing-filesystem contract. Implement
//!   [`vfs::NfsFileSystem`] (path-addressed storage) and
//!   [`vfs::MountHandler`] (export policy) to make a tree mountable.
//!
//! - `registry`: the handle registry translating opaque NFS file handles to
//!   `(filesystem, path)` pairs, with LRU eviction and the directory
//!   listing verifier cache behind READDIR paging.
//!
//! - `tcp`: the server front end — [`tcp::NfsTcpListener`] accepts client
//!   connections and drives the protocol over them.
//!
//! - `protocol`: the wire engine — XDR encoding, RPC framing and dispatch,
//!   and the 22 NFSv3 procedure handlers plus MOUNT.
//!
//! ## Standards
//!
//! - RFC 1813: NFS version 3 protocol
//! - RFC 5531: ONC RPC version 2
//! - RFC 1832: XDR
//!
//! ## Usage
//!
//! Implement the `vfs` traits, hand a [`vfs::MountHandler`] to
//! [`tcp::NfsTcpListener::bind`], and call
//! [`tcp::NfsTcp::handle_forever`].

pub mod protocol;
pub mod registry;
pub mod tcp;
pub mod vfs;

mod write_counter;

pub use protocol::xdr;
