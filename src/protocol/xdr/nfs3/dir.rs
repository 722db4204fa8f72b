//! Argument and result bodies for the directory procedures: MKDIR, SYMLINK,
//! READDIR and READDIRPLUS.
//!
//! The READDIR family encodes its entry list as an XDR linked list — each
//! entry is preceded by a `true` continuation flag and the list ends with
//! `false` followed by the eof flag — so the entry structures here are
//! emitted one at a time by the handlers rather than as a `Vec`.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;
use crate::protocol::xdr::{Deserialize, DeserializeStruct, Serialize, SerializeStruct};

/// MKDIR: where to create the directory and the attributes to apply.
#[derive(Debug, Default)]
pub struct MKDIR3args {
    pub dirops: diropargs3,
    pub attributes: sattr3,
}
DeserializeStruct!(MKDIR3args, dirops, attributes);
SerializeStruct!(MKDIR3args, dirops, attributes);

/// SYMLINK: where to create the link and what it points at.
#[derive(Debug, Default)]
pub struct SYMLINK3args {
    pub dirops: diropargs3,
    pub symlink: symlinkdata3,
}
DeserializeStruct!(SYMLINK3args, dirops, symlink);
SerializeStruct!(SYMLINK3args, dirops, symlink);

/// One READDIR entry: file id, name, and the cookie a client presents to
/// resume after this entry.
#[derive(Debug, Default, PartialEq)]
pub struct entry3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
}
DeserializeStruct!(entry3, fileid, name, cookie);
SerializeStruct!(entry3, fileid, name, cookie);

/// READDIR arguments.
#[derive(Debug, Default)]
pub struct READDIR3args {
    pub dir: nfs_fh3,
    /// Resume point; 0 starts at the beginning of the directory.
    pub cookie: cookie3,
    /// Verifier from the previous page; all zero on the first call.
    pub cookieverf: cookieverf3,
    /// Upper bound on the size of the serialized reply.
    pub count: count3,
}
DeserializeStruct!(READDIR3args, dir, cookie, cookieverf, count);
SerializeStruct!(READDIR3args, dir, cookie, cookieverf, count);

/// One READDIRPLUS entry: as [`entry3`] plus per-entry attributes and
/// handle, saving the client a LOOKUP per name.
#[derive(Debug, Default)]
pub struct entryplus3 {
    pub fileid: fileid3,
    pub name: filename3,
    pub cookie: cookie3,
    pub name_attributes: post_op_attr,
    pub name_handle: post_op_fh3,
}
DeserializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);
SerializeStruct!(entryplus3, fileid, name, cookie, name_attributes, name_handle);

/// READDIRPLUS arguments.
#[derive(Debug, Default)]
pub struct READDIRPLUS3args {
    pub dir: nfs_fh3,
    pub cookie: cookie3,
    pub cookieverf: cookieverf3,
    /// Byte budget for just the fileid/name/cookie portion of the entries.
    pub dircount: count3,
    /// Byte budget for the whole serialized reply.
    pub maxcount: count3,
}
DeserializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
SerializeStruct!(READDIRPLUS3args, dir, cookie, cookieverf, dircount, maxcount);
