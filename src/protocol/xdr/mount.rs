//! MOUNT v3 wire types (RFC 1813 Appendix I).
//!
//! The MOUNT protocol is how a client turns an export path into the root
//! file handle it will use for all subsequent NFS calls. This server
//! implements the NULL, MNT and UMNT procedures; everything else in the
//! appendix is answered with `PROC_UNAVAIL` by the dispatcher.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::cast::FromPrimitive;

use super::{Deserialize, DeserializeEnum, DeserializeStruct, Serialize, SerializeEnum,
            SerializeStruct};

/// The RPC program number of the MOUNT service.
pub const PROGRAM: u32 = 100005;
/// The MOUNT protocol version implemented by this crate.
pub const VERSION: u32 = 3;

/// Maximum octets in a dirpath argument.
pub const MNTPATHLEN: u32 = 1024;
/// Maximum octets in a name.
pub const MNTNAMLEN: u32 = 255;
/// Maximum octets in a v3 file handle.
pub const FHSIZE3: u32 = 64;

/// Root file handle returned by MNT; wire-identical to `nfs_fh3`.
pub type fhandle3 = Vec<u8>;
/// Export path presented by the client.
pub type dirpath = Vec<u8>;

/// Status codes for MOUNT procedures.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum mountstat3 {
    #[default]
    MNT3_OK = 0,
    MNT3ERR_PERM = 1,
    MNT3ERR_NOENT = 2,
    MNT3ERR_IO = 5,
    MNT3ERR_ACCES = 13,
    MNT3ERR_NOTDIR = 20,
    MNT3ERR_INVAL = 22,
    MNT3ERR_NAMETOOLONG = 63,
    MNT3ERR_NOTSUPP = 10004,
    MNT3ERR_SERVERFAULT = 10006,
}
SerializeEnum!(mountstat3);
DeserializeEnum!(mountstat3);

/// Successful MNT result: the export's root handle plus the authentication
/// flavors the server will accept on the NFS program.
#[derive(Clone, Debug, Default)]
pub struct mountres3_ok {
    pub fhandle: fhandle3,
    pub auth_flavors: Vec<u32>,
}
DeserializeStruct!(mountres3_ok, fhandle, auth_flavors);
SerializeStruct!(mountres3_ok, fhandle, auth_flavors);

/// MOUNT v3 procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
pub enum MountProcedure {
    MOUNTPROC3_NULL = 0,
    MOUNTPROC3_MNT = 1,
    MOUNTPROC3_DUMP = 2,
    MOUNTPROC3_UMNT = 3,
    MOUNTPROC3_UMNTALL = 4,
    MOUNTPROC3_EXPORT = 5,
    INVALID,
}
