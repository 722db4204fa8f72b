//! NFSv3 wire types and constants, as defined in RFC 1813.
//!
//! The structures here are a direct transliteration of the protocol
//! specification into the crate's XDR codec; RFC names are kept so that the
//! definitions can be read side by side with the RFC. Sub-modules group the
//! per-procedure argument and result bodies: [`dir`] for directory
//! operations, [`file`] for file I/O, [`fs`] for filesystem information.

// The complete RFC structure set is defined even where this server only uses
// part of it.
#![allow(dead_code)]
// RFC naming is kept as-is for recognizability against the specification.
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use byteorder::ByteOrder;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::cast::FromPrimitive;

use super::{deserialize, Deserialize, DeserializeEnum, DeserializeStruct, Serialize,
            SerializeEnum, SerializeStruct, XdrEndian};

pub mod dir;
pub mod file;
pub mod fs;

/// The RPC program number of the NFS service.
pub const PROGRAM: u32 = 100003;
/// The protocol version implemented by this crate.
pub const VERSION: u32 = 3;

/// Maximum size in octets of an opaque file handle.
pub const NFS3_FHSIZE: u32 = 64;
/// Size in octets of the READDIR/READDIRPLUS cookie verifier.
pub const NFS3_COOKIEVERFSIZE: u32 = 8;
/// Size in octets of the exclusive-CREATE verifier.
pub const NFS3_CREATEVERFSIZE: u32 = 8;
/// Size in octets of the WRITE/COMMIT verifier.
pub const NFS3_WRITEVERFSIZE: u32 = 8;

/// Longest accepted name component. Longer names are answered with
/// `NFS3ERR_NAMETOOLONG`.
pub const PATHNAME_MAX: usize = 255;

/// Byte string used for filenames and paths.
///
/// NFS names are octet sequences with no encoding attached; this wrapper
/// keeps them out of `String` while still printing readably in logs.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct nfsstring(pub Vec<u8>);

impl nfsstring {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view, for joining into vfs paths.
    pub fn as_utf8_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<Vec<u8>> for nfsstring {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl From<&[u8]> for nfsstring {
    fn from(value: &[u8]) -> Self {
        Self(value.into())
    }
}

impl From<&str> for nfsstring {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().into())
    }
}

impl AsRef<[u8]> for nfsstring {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for nfsstring {
    type Target = Vec<u8>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Debug for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for nfsstring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for nfsstring {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstring {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// NFSv3 procedure numbers.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, FromPrimitive, ToPrimitive)]
pub enum NfsProcedure {
    NFSPROC3_NULL = 0,
    NFSPROC3_GETATTR = 1,
    NFSPROC3_SETATTR = 2,
    NFSPROC3_LOOKUP = 3,
    NFSPROC3_ACCESS = 4,
    NFSPROC3_READLINK = 5,
    NFSPROC3_READ = 6,
    NFSPROC3_WRITE = 7,
    NFSPROC3_CREATE = 8,
    NFSPROC3_MKDIR = 9,
    NFSPROC3_SYMLINK = 10,
    NFSPROC3_MKNOD = 11,
    NFSPROC3_REMOVE = 12,
    NFSPROC3_RMDIR = 13,
    NFSPROC3_RENAME = 14,
    NFSPROC3_LINK = 15,
    NFSPROC3_READDIR = 16,
    NFSPROC3_READDIRPLUS = 17,
    NFSPROC3_FSSTAT = 18,
    NFSPROC3_FSINFO = 19,
    NFSPROC3_PATHCONF = 20,
    NFSPROC3_COMMIT = 21,
    INVALID = 22,
}

pub type filename3 = nfsstring;
pub type nfspath3 = nfsstring;
pub type fileid3 = u64;
pub type cookie3 = u64;
pub type cookieverf3 = [u8; NFS3_COOKIEVERFSIZE as usize];
pub type createverf3 = [u8; NFS3_CREATEVERFSIZE as usize];
pub type writeverf3 = [u8; NFS3_WRITEVERFSIZE as usize];
pub type uid3 = u32;
pub type gid3 = u32;
pub type size3 = u64;
pub type offset3 = u64;
pub type mode3 = u32;
pub type count3 = u32;

/// Status codes returned in the first word of every NFSv3 reply body.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum nfsstat3 {
    /// The call completed successfully.
    #[default]
    NFS3_OK = 0,
    /// Not owner: caller is neither privileged nor the owner of the target.
    NFS3ERR_PERM = 1,
    /// No such file or directory.
    NFS3ERR_NOENT = 2,
    /// A hard I/O error occurred while processing the operation.
    NFS3ERR_IO = 5,
    /// No such device or address.
    NFS3ERR_NXIO = 6,
    /// Permission denied for this operation.
    NFS3ERR_ACCES = 13,
    /// The target already exists.
    NFS3ERR_EXIST = 17,
    /// Attempted cross-device hard link.
    NFS3ERR_XDEV = 18,
    /// No such device.
    NFS3ERR_NODEV = 19,
    /// A non-directory was named in a directory operation.
    NFS3ERR_NOTDIR = 20,
    /// A directory was named in a non-directory operation.
    NFS3ERR_ISDIR = 21,
    /// Invalid or unsupported argument.
    NFS3ERR_INVAL = 22,
    /// The operation would grow a file past the server's limit.
    NFS3ERR_FBIG = 27,
    /// No space left on the backing store.
    NFS3ERR_NOSPC = 28,
    /// Modifying operation on a read-only filesystem.
    NFS3ERR_ROFS = 30,
    /// Too many hard links.
    NFS3ERR_MLINK = 31,
    /// A name in the operation exceeded [`PATHNAME_MAX`].
    NFS3ERR_NAMETOOLONG = 63,
    /// Attempt to remove a non-empty directory.
    NFS3ERR_NOTEMPTY = 66,
    /// Quota exceeded.
    NFS3ERR_DQUOT = 69,
    /// The file handle no longer resolves to an object.
    NFS3ERR_STALE = 70,
    /// The file handle crosses onto a non-local filesystem.
    NFS3ERR_REMOTE = 71,
    /// The file handle failed internal consistency checks.
    NFS3ERR_BADHANDLE = 10001,
    /// SETATTR guard ctime did not match the object.
    NFS3ERR_NOT_SYNC = 10002,
    /// READDIR/READDIRPLUS cookie verifier no longer matches the directory.
    NFS3ERR_BAD_COOKIE = 10003,
    /// The operation is not supported by this server.
    NFS3ERR_NOTSUPP = 10004,
    /// The request's size limits are too small to answer at all.
    NFS3ERR_TOOSMALL = 10005,
    /// Server-side failure with no closer protocol mapping.
    NFS3ERR_SERVERFAULT = 10006,
    /// Creation of an object type the server does not support.
    NFS3ERR_BADTYPE = 10007,
    /// The server needs more time; retry with a new transaction.
    NFS3ERR_JUKEBOX = 10008,
}
SerializeEnum!(nfsstat3);
DeserializeEnum!(nfsstat3);

/// Type of a filesystem object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype3 {
    /// Regular file
    #[default]
    NF3REG = 1,
    /// Directory
    NF3DIR = 2,
    /// Block special device
    NF3BLK = 3,
    /// Character special device
    NF3CHR = 4,
    /// Symbolic link
    NF3LNK = 5,
    /// Socket
    NF3SOCK = 6,
    /// Named pipe
    NF3FIFO = 7,
}
SerializeEnum!(ftype3);
DeserializeEnum!(ftype3);

/// Major/minor numbers for character and block special files.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct specdata3 {
    pub specdata1: u32,
    pub specdata2: u32,
}
DeserializeStruct!(specdata3, specdata1, specdata2);
SerializeStruct!(specdata3, specdata1, specdata2);

/// An opaque file handle, at most [`NFS3_FHSIZE`] octets.
///
/// Handles are minted by the handle registry; the server guarantees the
/// first 8 octets are usable as a `fileid3` when listing directories, and
/// nothing else about their contents.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct nfs_fh3 {
    pub data: Vec<u8>,
}
DeserializeStruct!(nfs_fh3, data);
SerializeStruct!(nfs_fh3, data);

impl nfs_fh3 {
    /// The synthesized file id carried in the leading 8 octets of the
    /// handle, zero-extended for shorter handles.
    pub fn fileid(&self) -> fileid3 {
        let mut word = [0_u8; 8];
        let take = self.data.len().min(8);
        word[..take].copy_from_slice(&self.data[..take]);
        XdrEndian::read_u64(&word)
    }
}

/// Timestamp with nanosecond resolution.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct nfstime3 {
    pub seconds: u32,
    pub nseconds: u32,
}
DeserializeStruct!(nfstime3, seconds, nseconds);
SerializeStruct!(nfstime3, seconds, nseconds);

/// The full attribute record returned for filesystem objects: 84 octets of
/// packed fields on the wire.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr3 {
    pub ftype: ftype3,
    pub mode: mode3,
    pub nlink: u32,
    pub uid: uid3,
    pub gid: gid3,
    pub size: size3,
    /// Bytes actually allocated on the backing store.
    pub used: size3,
    pub rdev: specdata3,
    pub fsid: u64,
    pub fileid: fileid3,
    pub atime: nfstime3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);
SerializeStruct!(
    fattr3, ftype, mode, nlink, uid, gid, size, used, rdev, fsid, fileid, atime, mtime, ctime
);

/// The attribute subset captured before a mutating operation for weak cache
/// consistency.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct wcc_attr {
    pub size: size3,
    pub mtime: nfstime3,
    pub ctime: nfstime3,
}
DeserializeStruct!(wcc_attr, size, mtime, ctime);
SerializeStruct!(wcc_attr, size, mtime, ctime);

/// Optional pre-operation attributes.
pub type pre_op_attr = Option<wcc_attr>;
/// Optional post-operation attributes.
pub type post_op_attr = Option<fattr3>;
/// Optional file handle in CREATE/MKDIR/SYMLINK results and READDIRPLUS
/// entries.
pub type post_op_fh3 = Option<nfs_fh3>;

/// Weak cache consistency data: attributes straddling a mutation so clients
/// can detect concurrent changes in one round trip.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct wcc_data {
    pub before: pre_op_attr,
    pub after: post_op_attr,
}
DeserializeStruct!(wcc_data, before, after);
SerializeStruct!(wcc_data, before, after);

pub type set_mode3 = Option<mode3>;
pub type set_uid3 = Option<uid3>;
pub type set_gid3 = Option<gid3>;
pub type set_size3 = Option<size3>;

/// How SETATTR should treat the access time.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[repr(u32)]
pub enum set_atime {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_atime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_atime::DONT_CHANGE => 0_u32.serialize(dest)?,
            set_atime::SET_TO_SERVER_TIME => 1_u32.serialize(dest)?,
            set_atime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}
impl Deserialize for set_atime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_atime::DONT_CHANGE,
            1 => *self = set_atime::SET_TO_SERVER_TIME,
            2 => *self = set_atime::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid set_atime value: {c}"),
                ));
            }
        }
        Ok(())
    }
}

/// How SETATTR should treat the modification time.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[repr(u32)]
pub enum set_mtime {
    #[default]
    DONT_CHANGE,
    SET_TO_SERVER_TIME,
    SET_TO_CLIENT_TIME(nfstime3),
}

impl Serialize for set_mtime {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            set_mtime::DONT_CHANGE => 0_u32.serialize(dest)?,
            set_mtime::SET_TO_SERVER_TIME => 1_u32.serialize(dest)?,
            set_mtime::SET_TO_CLIENT_TIME(v) => {
                2_u32.serialize(dest)?;
                v.serialize(dest)?;
            }
        }
        Ok(())
    }
}
impl Deserialize for set_mtime {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        match deserialize::<u32>(src)? {
            0 => *self = set_mtime::DONT_CHANGE,
            1 => *self = set_mtime::SET_TO_SERVER_TIME,
            2 => *self = set_mtime::SET_TO_CLIENT_TIME(deserialize(src)?),
            c => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("invalid set_mtime value: {c}"),
                ));
            }
        }
        Ok(())
    }
}

/// Attribute changes requested by SETATTR and object creation.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct sattr3 {
    pub mode: set_mode3,
    pub uid: set_uid3,
    pub gid: set_gid3,
    pub size: set_size3,
    pub atime: set_atime,
    pub mtime: set_mtime,
}
DeserializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);
SerializeStruct!(sattr3, mode, uid, gid, size, atime, mtime);

/// A directory handle plus a name within it — the addressing form used by
/// LOOKUP, CREATE, REMOVE and friends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct diropargs3 {
    pub dir: nfs_fh3,
    pub name: filename3,
}
DeserializeStruct!(diropargs3, dir, name);
SerializeStruct!(diropargs3, dir, name);

/// Payload of a SYMLINK call: attributes plus the link target.
#[derive(Debug, Default)]
pub struct symlinkdata3 {
    pub symlink_attributes: sattr3,
    pub symlink_data: nfspath3,
}
DeserializeStruct!(symlinkdata3, symlink_attributes, symlink_data);
SerializeStruct!(symlinkdata3, symlink_attributes, symlink_data);

/// Permission to read file data or list a directory.
pub const ACCESS3_READ: u32 = 0x0001;
/// Permission to look up names in a directory.
pub const ACCESS3_LOOKUP: u32 = 0x0002;
/// Permission to modify an existing file.
pub const ACCESS3_MODIFY: u32 = 0x0004;
/// Permission to grow a file or add directory entries.
pub const ACCESS3_EXTEND: u32 = 0x0008;
/// Permission to delete an entry.
pub const ACCESS3_DELETE: u32 = 0x0010;
/// Permission to execute a file or traverse a directory.
pub const ACCESS3_EXECUTE: u32 = 0x0020;

/// CREATE dispositions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum createmode3 {
    /// Create or truncate; succeeds whether or not the target exists.
    #[default]
    UNCHECKED = 0,
    /// Fail with `NFS3ERR_EXIST` when the target exists.
    GUARDED = 1,
    /// Idempotent create keyed by an 8-octet client verifier.
    EXCLUSIVE = 2,
}
SerializeEnum!(createmode3);
DeserializeEnum!(createmode3);

/// Optional ctime guard on SETATTR.
pub type sattrguard3 = Option<nfstime3>;

/// Arguments of the SETATTR procedure.
#[derive(Clone, Debug, Default)]
pub struct SETATTR3args {
    pub object: nfs_fh3,
    pub new_attributes: sattr3,
    pub guard: sattrguard3,
}
DeserializeStruct!(SETATTR3args, object, new_attributes, guard);
SerializeStruct!(SETATTR3args, object, new_attributes, guard);
