//! BGP path attributes (RFC 4271 Section 4.3)
//!
//! Composition only. The generator announces routes with a fixed attribute
//! set and never interprets the attributes of received updates.

// SPDX-License-Identifier: AGPL-3.0-or-later

use bytes::{BufMut, BytesMut};
use enum_primitive_derive::Primitive;
use std::net::Ipv4Addr;
use std::ops::Deref;

/// BGP path attributes
#[derive(Clone, Debug, Default, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub struct PathAttributes(pub Vec<Value>);

impl PathAttributes {
    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for attribute in self.0 {
            len += attribute.to_bytes(dst);
        }
        len
    }

    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(Value::encoded_len).sum()
    }
}

impl Deref for PathAttributes {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP path attribute
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub flags: Flags,
    pub data: Data,
}

impl Value {
    /// ORIGIN attribute (type 1)
    #[must_use]
    pub fn origin(origin: Origin) -> Self {
        Self {
            flags: Flags::WELL_KNOWN_COMPLETE,
            data: Data::Origin(origin),
        }
    }

    /// AS_PATH attribute (type 2) from a single segment
    #[must_use]
    pub fn as_path(type_: AsSegmentType, asns: Vec<u32>) -> Self {
        Self {
            flags: Flags::WELL_KNOWN_COMPLETE,
            data: Data::AsPath(AsPath(vec![AsSegment { type_, asns }])),
        }
    }

    /// NEXT_HOP attribute (type 3)
    #[must_use]
    pub fn next_hop(addr: Ipv4Addr) -> Self {
        Self {
            flags: Flags::WELL_KNOWN_COMPLETE,
            data: Data::NextHop(addr),
        }
    }

    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        dst.put_u8(self.flags.0); // Flags
        len += 1;
        dst.put_u8(u8::from(&self.data)); // Type
        len += 1;
        let len_pos = dst.len();
        let two_byte_len = if self.flags.is_extended_length() {
            dst.put_u16(0); // Placeholder for the length
            len += 2;
            true
        } else {
            dst.put_u8(0); // Placeholder for the length
            len += 1;
            false
        };
        let data_len = match self.data {
            Data::Origin(origin) => {
                dst.put_u8(origin as u8);
                1
            }
            Data::AsPath(as_path) => as_path.to_bytes(dst),
            Data::NextHop(next_hop) => {
                dst.put_u32(next_hop.into());
                4
            }
        };
        if two_byte_len {
            dst[len_pos..len_pos + 2].copy_from_slice(
                &(u16::try_from(data_len)
                    .expect("Path attribute length overflow")
                    .to_be_bytes()),
            );
        } else {
            dst[len_pos] = u8::try_from(data_len).expect("Path attribute length overflow");
        }
        len + data_len
    }

    pub fn encoded_len(&self) -> usize {
        1 + 1
            + if self.flags.is_extended_length() {
                2
            } else {
                1
            }
            + match &self.data {
                Data::Origin(_) => 1,
                Data::AsPath(as_path) => as_path.encoded_len(),
                Data::NextHop(_) => 4,
            }
    }
}

/// BGP path attribute flags
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    pub const OPTIONAL: Flags = Flags(0x80);
    pub const TRANSITIVE: Flags = Flags(0x40);
    pub const PARTIAL: Flags = Flags(0x20);
    pub const EXTENDED_LENGTH: Flags = Flags(0x10);
    /// Transitive, well-known, complete
    pub const WELL_KNOWN_COMPLETE: Flags = Flags(0x40);

    /// Check if the attribute is optional
    #[must_use]
    pub const fn is_optional(self) -> bool {
        self.0 & Self::OPTIONAL.0 != 0
    }

    /// Check if the attribute is transitive
    #[must_use]
    pub const fn is_transitive(self) -> bool {
        self.0 & Self::TRANSITIVE.0 != 0
    }

    /// Check if the attribute is partial
    #[must_use]
    pub const fn is_partial(self) -> bool {
        self.0 & Self::PARTIAL.0 != 0
    }

    /// Check if the attribute carries a 16-bit length
    #[must_use]
    pub const fn is_extended_length(self) -> bool {
        self.0 & Self::EXTENDED_LENGTH.0 != 0
    }
}

/// BGP path attribute data
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Origin(Origin),
    AsPath(AsPath),
    /// BGP next hop (RFC 4271 Section 5.1.3)
    NextHop(Ipv4Addr),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
}

impl From<&Data> for u8 {
    fn from(data: &Data) -> u8 {
        match data {
            Data::Origin(_) => Type::Origin as u8,
            Data::AsPath(_) => Type::AsPath as u8,
            Data::NextHop(_) => Type::NextHop as u8,
        }
    }
}

/// BGP origin
#[derive(Copy, Clone, Debug, PartialEq, Primitive)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

/// BGP AS path
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsPath(pub Vec<AsSegment>);

impl AsPath {
    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for segment in self.0 {
            len += segment.to_bytes(dst);
        }
        len
    }

    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(AsSegment::encoded_len).sum()
    }
}

impl Deref for AsPath {
    type Target = Vec<AsSegment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP AS path segment (RFC 4271 Section 5.1.2)
///
/// ASNs are always emitted as four octets; the four-octet AS capability is
/// advertised with every OPEN this speaker sends.
#[derive(Clone, Debug, PartialEq)]
pub struct AsSegment {
    pub type_: AsSegmentType,
    pub asns: Vec<u32>,
}

/// BGP AS path segment type
#[derive(Copy, Clone, Debug, PartialEq, Primitive)]
#[repr(u8)]
pub enum AsSegmentType {
    AsSet = 1,
    AsSequence = 2,
}

impl AsSegment {
    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let encoded_len = self.encoded_len();
        dst.put_u8(self.type_ as u8);
        dst.put_u8(u8::try_from(self.asns.len()).expect("AS segment length overflow"));
        for asn in self.asns {
            dst.put_u32(asn);
        }
        encoded_len
    }

    pub fn encoded_len(&self) -> usize {
        2 + self.asns.len() * 4
    }
}
