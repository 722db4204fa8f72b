//! Result bodies for the filesystem information procedures: FSSTAT, FSINFO
//! and PATHCONF.

#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use super::*;
use crate::protocol::xdr::{Deserialize, DeserializeStruct, Serialize, SerializeStruct};

/// The filesystem supports hard links.
pub const FSF_LINK: u32 = 0x0001;
/// The filesystem supports symbolic links.
pub const FSF_SYMLINK: u32 = 0x0002;
/// PATHCONF answers are identical for every object in the filesystem.
pub const FSF_HOMOGENEOUS: u32 = 0x0008;
/// SETATTR can set object times to the requested accuracy.
pub const FSF_CANSETTIME: u32 = 0x0010;

/// Static filesystem parameters returned by FSINFO.
#[derive(Debug, Default)]
pub struct fsinfo3 {
    pub obj_attributes: post_op_attr,
    /// Maximum READ request honored, in bytes.
    pub rtmax: u32,
    /// Preferred READ request size.
    pub rtpref: u32,
    /// Suggested READ size multiple.
    pub rtmult: u32,
    /// Maximum WRITE request honored, in bytes.
    pub wtmax: u32,
    /// Preferred WRITE request size.
    pub wtpref: u32,
    /// Suggested WRITE size multiple.
    pub wtmult: u32,
    /// Preferred READDIR request size.
    pub dtpref: u32,
    pub maxfilesize: size3,
    /// Granularity of object timestamps.
    pub time_delta: nfstime3,
    /// Bitmask of the `FSF_*` properties.
    pub properties: u32,
}
DeserializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);
SerializeStruct!(
    fsinfo3,
    obj_attributes,
    rtmax,
    rtpref,
    rtmult,
    wtmax,
    wtpref,
    wtmult,
    dtpref,
    maxfilesize,
    time_delta,
    properties
);

/// Volatile filesystem statistics returned by FSSTAT.
#[derive(Debug, Default)]
pub struct FSSTAT3resok {
    pub obj_attributes: post_op_attr,
    /// Total bytes in the filesystem.
    pub tbytes: size3,
    /// Free bytes.
    pub fbytes: size3,
    /// Free bytes available to the caller.
    pub abytes: size3,
    /// Total file slots.
    pub tfiles: size3,
    /// Free file slots.
    pub ffiles: size3,
    /// Free file slots available to the caller.
    pub afiles: size3,
    /// Seconds this answer can be cached; 0 means volatile.
    pub invarsec: u32,
}
DeserializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);
SerializeStruct!(
    FSSTAT3resok,
    obj_attributes,
    tbytes,
    fbytes,
    abytes,
    tfiles,
    ffiles,
    afiles,
    invarsec
);

/// POSIX pathconf information returned by PATHCONF.
#[derive(Debug, Default)]
pub struct PATHCONF3resok {
    pub obj_attributes: post_op_attr,
    pub linkmax: u32,
    pub name_max: u32,
    /// Long names are rejected rather than truncated.
    pub no_trunc: bool,
    pub chown_restricted: bool,
    pub case_insensitive: bool,
    pub case_preserving: bool,
}
DeserializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
SerializeStruct!(
    PATHCONF3resok,
    obj_attributes,
    linkmax,
    name_max,
    no_trunc,
    chown_restricted,
    case_insensitive,
    case_preserving
);
