//! XDR (External Data Representation, RFC 1832) encoding layer.
//!
//! Everything that crosses the wire in this crate — RPC headers, MOUNT
//! replies, NFSv3 argument and result bodies — is encoded through the
//! [`Serialize`] and [`Deserialize`] traits defined here. The codec is
//! streaming: values read from and write to plain `std::io` readers and
//! writers, so request bodies can be consumed directly from a received
//! record and replies staged into a growable buffer whose length is known
//! before framing.
//!
//! The representation follows RFC 1832 exactly:
//! - integers are 4 or 8 bytes, big endian
//! - booleans are 32-bit 0/1
//! - fixed opaques are raw bytes, no length prefix
//! - variable opaques and strings carry a 4-byte length and are padded to a
//!   multiple of 4 bytes
//! - optionals are a boolean discriminant followed by the value when true

use std::io::{Read, Write};

use byteorder::BigEndian;
use byteorder::{ReadBytesExt, WriteBytesExt};

pub mod mount;
pub mod nfs3;
pub mod rpc;

/// Byte order mandated by RFC 1832.
pub type XdrEndian = BigEndian;

/// Serialization half of the XDR codec.
pub trait Serialize {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()>;
}

/// Deserialization half of the XDR codec.
///
/// Implementations decode in place so that compound types can reuse
/// macro-generated field-by-field impls.
pub trait Deserialize {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()>;
}

/// Reads one `T` from `src`.
pub fn deserialize<T: Deserialize + Default>(src: &mut impl Read) -> std::io::Result<T> {
    let mut value = T::default();
    value.deserialize(src)?;
    Ok(value)
}

/// Implements [`Serialize`] for a struct by serializing each named field in
/// declaration order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                $(self.$element.serialize(dest)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Deserialize`] for a struct by decoding each named field in
/// declaration order.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeStruct {
    (
        $t:ident,
        $($element:ident),*
    ) => {
        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                $(self.$element.deserialize(src)?;)*
                Ok(())
            }
        }
    };
}

/// Implements [`Serialize`] for a fieldless `repr(u32)` enum as its 32-bit
/// discriminant.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! SerializeEnum {
    ($t:ident) => {
        impl Serialize for $t {
            fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
                (*self as u32).serialize(dest)
            }
        }
    };
}

/// Implements [`Deserialize`] for a fieldless `repr(u32)` enum, rejecting
/// discriminants outside the defined set.
#[allow(non_camel_case_types)]
#[macro_export]
macro_rules! DeserializeEnum {
    ($t:ident) => {
        impl Deserialize for $t {
            fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
                let raw: u32 = $crate::protocol::xdr::deserialize(src)?;
                if let Some(value) = FromPrimitive::from_u32(raw) {
                    *self = value;
                    Ok(())
                } else {
                    Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        format!("invalid value {} for {}", raw, stringify!($t)),
                    ))
                }
            }
        }
    };
}

impl Serialize for bool {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XdrEndian>(*self as u32)
    }
}

impl Deserialize for bool {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XdrEndian>()? > 0;
        Ok(())
    }
}

impl Serialize for i32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i32::<XdrEndian>(*self)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i32::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for i64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_i64::<XdrEndian>(*self)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_i64::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for u32 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u32::<XdrEndian>(*self)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u32::<XdrEndian>()?;
        Ok(())
    }
}

impl Serialize for u64 {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_u64::<XdrEndian>(*self)
    }
}

impl Deserialize for u64 {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = src.read_u64::<XdrEndian>()?;
        Ok(())
    }
}

/// Fixed opaque data: raw bytes without a length prefix. The array length is
/// part of the protocol, so no padding is applied.
impl<const N: usize> Serialize for [u8; N] {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        dest.write_all(self)
    }
}

impl<const N: usize> Deserialize for [u8; N] {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        src.read_exact(self)
    }
}

/// Variable-length opaque data: 4-byte length, bytes, zero padding to a
/// 4-byte boundary.
impl Serialize for Vec<u8> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        debug_assert!(self.len() < u32::MAX as usize);
        let length = self.len() as u32;
        length.serialize(dest)?;
        dest.write_all(self)?;
        let pad = ((4 - length % 4) % 4) as usize;
        let zeros: [u8; 4] = [0, 0, 0, 0];
        if pad > 0 {
            dest.write_all(&zeros[..pad])?;
        }
        Ok(())
    }
}

impl Deserialize for Vec<u8> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let mut length: u32 = 0;
        length.deserialize(src)?;
        self.resize(length as usize, 0);
        src.read_exact(self)?;
        let pad = ((4 - length % 4) % 4) as usize;
        let mut zeros: [u8; 4] = [0, 0, 0, 0];
        src.read_exact(&mut zeros[..pad])?;
        Ok(())
    }
}

/// Counted array of 32-bit integers: 4-byte element count followed by the
/// elements. Every element is already word sized, so no padding is needed.
impl Serialize for Vec<u32> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        debug_assert!(self.len() < u32::MAX as usize);
        let length = self.len() as u32;
        length.serialize(dest)?;
        for i in self {
            i.serialize(dest)?;
        }
        Ok(())
    }
}

impl Deserialize for Vec<u32> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let mut length: u32 = 0;
        length.deserialize(src)?;
        self.resize(length as usize, 0);
        for i in self {
            i.deserialize(src)?;
        }
        Ok(())
    }
}

impl Serialize for String {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        debug_assert!(self.len() < u32::MAX as usize);
        let length = self.len() as u32;
        length.serialize(dest)?;
        dest.write_all(self.as_bytes())?;
        let pad = ((4 - length % 4) % 4) as usize;
        let zeros: [u8; 4] = [0, 0, 0, 0];
        if pad > 0 {
            dest.write_all(&zeros[..pad])?;
        }
        Ok(())
    }
}

impl Deserialize for String {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let mut raw: Vec<u8> = Vec::new();
        raw.deserialize(src)?;
        *self = String::from_utf8(raw).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "string is not valid utf-8")
        })?;
        Ok(())
    }
}

/// XDR optionals ("pointers" in RFC 1832 terms): a boolean discriminant
/// followed by the value when present. `post_op_attr`, `pre_op_attr`,
/// `post_op_fh3` and the `sattr3` fields are all aliases over this impl.
impl<T: Serialize> Serialize for Option<T> {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            None => false.serialize(dest),
            Some(value) => {
                true.serialize(dest)?;
                value.serialize(dest)
            }
        }
    }
}

impl<T: Deserialize + Default> Deserialize for Option<T> {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let mut present = false;
        present.deserialize(src)?;
        if present {
            let mut value = T::default();
            value.deserialize(src)?;
            *self = Some(value);
        } else {
            *self = None;
        }
        Ok(())
    }
}

// Macro re-exports so the sibling wire-type modules can import them from here.
pub use crate::DeserializeEnum;
pub use crate::DeserializeStruct;
pub use crate::SerializeEnum;
pub use crate::SerializeStruct;
