//! BGP path attributes (RFC 4271 Section 4.3, 5).
//!
//! Only the attributes meaningful to an IPv4-unicast-only speaker are
//! modeled (no MP_REACH_NLRI/MP_UNREACH_NLRI, no AS4_PATH -- see `spec.md`
//! Non-goals: no multiprotocol extensions, no capability negotiation).
//! AS_PATH is always 2-octet ASNs.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::wire::{Component, Error};
use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::Ipv4Addr;
use std::ops::Deref;

/// BGP path attributes as carried in an UPDATE message. No outer length
/// field -- length comes from the enclosing TotalPathAttributeLength.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathAttributes(pub Vec<Value>);

impl Component for PathAttributes {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let mut attributes = Vec::new();
        while src.has_remaining() {
            attributes.push(Value::from_bytes(src)?);
        }
        Ok(Self(attributes))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for attribute in self.0 {
            len += attribute.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Value::encoded_len).sum()
    }
}

impl Deref for PathAttributes {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PathAttributes {
    /// Enforce the structural invariants of spec.md 4.1: no duplicate
    /// attribute type codes, and every well-known mandatory attribute
    /// (ORIGIN, AS_PATH, NEXT_HOP) present.
    ///
    /// Semantic checks on individual values (ORIGIN range, NEXT_HOP not
    /// being our own address) are the caller's responsibility -- those are
    /// logged and the route ignored rather than torn down, per spec.md 4.1.
    pub fn validate(&self) -> Result<(), Error> {
        let mut seen = std::collections::HashSet::new();
        for attr in &self.0 {
            let code = u8::from(&attr.data);
            if !seen.insert(code) {
                return Err(Error::MalformedAttributeList);
            }
        }
        if !seen.contains(&(Type::Origin as u8)) {
            return Err(Error::MissingWellKnown("ORIGIN"));
        }
        if !seen.contains(&(Type::AsPath as u8)) {
            return Err(Error::MissingWellKnown("AS_PATH"));
        }
        if !seen.contains(&(Type::NextHop as u8)) {
            return Err(Error::MissingWellKnown("NEXT_HOP"));
        }
        Ok(())
    }

    /// The advertised NEXT_HOP, if present.
    #[must_use]
    pub fn next_hop(&self) -> Option<Ipv4Addr> {
        self.0.iter().find_map(|v| match v.data {
            Data::NextHop(nh) => Some(nh),
            _ => None,
        })
    }
}

/// A single BGP path attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    pub flags: Flags,
    pub data: Data,
}

impl Component for Value {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let flags = Flags(src.get_u8());
        let type_ = src.get_u8();
        if flags.0 & 0x0f != 0 {
            return Err(Error::AttributeFlags(type_));
        }
        let len = if flags.is_extended_length() {
            src.get_u16() as usize
        } else {
            src.get_u8() as usize
        };
        if src.remaining() < len {
            return Err(Error::MalformedAttributeList);
        }
        let mut body = src.split_to(len);
        let data = match Type::from_u8(type_) {
            Some(Type::Origin) => {
                expect_flags(flags, type_, Flags::WELL_KNOWN_COMPLETE)?;
                expect_len(type_, body.remaining(), 1)?;
                Data::Origin(Origin::from_bytes(&mut body)?)
            }
            Some(Type::AsPath) => {
                expect_flags(flags, type_, Flags::WELL_KNOWN_COMPLETE)?;
                Data::AsPath(AsPath::from_bytes(&mut body)?)
            }
            Some(Type::NextHop) => {
                expect_flags(flags, type_, Flags::WELL_KNOWN_COMPLETE)?;
                expect_len(type_, body.remaining(), 4)?;
                Data::NextHop(Ipv4Addr::from_bytes(&mut body)?)
            }
            Some(Type::MultiExitDisc) => {
                expect_len(type_, body.remaining(), 4)?;
                Data::MultiExitDisc(body.get_u32())
            }
            Some(Type::LocalPref) => {
                expect_flags(flags, type_, Flags::WELL_KNOWN_COMPLETE)?;
                expect_len(type_, body.remaining(), 4)?;
                Data::LocalPref(body.get_u32())
            }
            Some(Type::AtomicAggregate) => {
                expect_flags(flags, type_, Flags::WELL_KNOWN_COMPLETE)?;
                expect_len(type_, body.remaining(), 0)?;
                Data::AtomicAggregate
            }
            Some(Type::Aggregator) => {
                expect_len(type_, body.remaining(), 6)?;
                Data::Aggregator(Aggregator::from_bytes(&mut body)?)
            }
            None if flags.is_optional() => Data::Unsupported(type_, body),
            None => return Err(Error::UnrecognizedWellKnown(type_)),
        };
        Ok(Self { flags, data })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        dst.put_u8(self.flags.0);
        len += 1;
        dst.put_u8(u8::from(&self.data));
        len += 1;
        let len_pos = dst.len();
        let two_byte_len = if self.flags.is_extended_length() {
            dst.put_u16(0);
            len += 2;
            true
        } else {
            dst.put_u8(0);
            len += 1;
            false
        };
        let data_len = match self.data {
            Data::Origin(origin) => origin.to_bytes(dst),
            Data::AsPath(as_path) => as_path.to_bytes(dst),
            Data::NextHop(next_hop) => next_hop.to_bytes(dst),
            Data::MultiExitDisc(med) => {
                dst.put_u32(med);
                4
            }
            Data::LocalPref(local_pref) => {
                dst.put_u32(local_pref);
                4
            }
            Data::AtomicAggregate => 0,
            Data::Aggregator(agg) => agg.to_bytes(dst),
            Data::Unsupported(_, data) => {
                let len = data.len();
                dst.put_slice(&data);
                len
            }
        };
        if two_byte_len {
            dst[len_pos..len_pos + 2]
                .copy_from_slice(&u16::try_from(data_len).expect("attribute length overflow").to_be_bytes());
        } else {
            dst[len_pos] = u8::try_from(data_len).expect("attribute length overflow");
        }
        len + data_len
    }

    fn encoded_len(&self) -> usize {
        1 + 1
            + if self.flags.is_extended_length() { 2 } else { 1 }
            + match &self.data {
                Data::Origin(_) => 1,
                Data::AsPath(p) => p.encoded_len(),
                Data::NextHop(nh) => nh.encoded_len(),
                Data::MultiExitDisc(_) | Data::LocalPref(_) => 4,
                Data::AtomicAggregate => 0,
                Data::Aggregator(a) => a.encoded_len(),
                Data::Unsupported(_, data) => data.len(),
            }
    }
}

fn expect_flags(flags: Flags, type_: u8, expected: Flags) -> Result<(), Error> {
    // Compare only optional/transitive bits; partial/extended-length are
    // orthogonal to the well-known-ness of the type.
    if (flags.0 & 0xc0) != (expected.0 & 0xc0) {
        Err(Error::AttributeFlags(type_))
    } else {
        Ok(())
    }
}

fn expect_len(type_: u8, actual: usize, expected: usize) -> Result<(), Error> {
    if actual == expected {
        Ok(())
    } else {
        Err(Error::AttributeLength(type_))
    }
}

/// BGP path attribute flags.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    /// Well-known, transitive, complete.
    pub const WELL_KNOWN_COMPLETE: Flags = Flags(0b0100_0000);
    /// Optional, transitive, complete.
    pub const OPTIONAL_TRANSITIVE: Flags = Flags(0b1100_0000);

    #[must_use]
    pub const fn is_optional(self) -> bool {
        self.0 & 0x80 != 0
    }

    #[must_use]
    pub const fn is_transitive(self) -> bool {
        self.0 & 0x40 != 0
    }

    #[must_use]
    pub const fn is_partial(self) -> bool {
        self.0 & 0x20 != 0
    }

    #[must_use]
    pub const fn is_extended_length(self) -> bool {
        self.0 & 0x10 != 0
    }
}

/// BGP path attribute data.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Data {
    Origin(Origin),
    AsPath(AsPath),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    /// An attribute type this speaker does not interpret, carried verbatim.
    Unsupported(u8, Bytes),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum Type {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
}

impl From<&Data> for u8 {
    fn from(data: &Data) -> u8 {
        match data {
            Data::Origin(_) => Type::Origin as u8,
            Data::AsPath(_) => Type::AsPath as u8,
            Data::NextHop(_) => Type::NextHop as u8,
            Data::MultiExitDisc(_) => Type::MultiExitDisc as u8,
            Data::LocalPref(_) => Type::LocalPref as u8,
            Data::AtomicAggregate => Type::AtomicAggregate as u8,
            Data::Aggregator(_) => Type::Aggregator as u8,
            Data::Unsupported(type_, _) => *type_,
        }
    }
}

/// BGP ORIGIN attribute (RFC 4271 Section 5.1.1).
#[derive(Copy, Clone, Debug, PartialEq, Primitive)]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Component for Origin {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let value = src.get_u8();
        Self::from_u8(value).ok_or(Error::InvalidOrigin(value))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u8(self as u8);
        1
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

/// BGP AS_PATH attribute (RFC 4271 Section 5.1.2). 2-octet AS numbers only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AsPath(pub Vec<AsSegment>);

impl Component for AsPath {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let mut segments = Vec::new();
        while src.has_remaining() {
            segments.push(AsSegment::from_bytes(src)?);
        }
        Ok(Self(segments))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for segment in self.0 {
            len += segment.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(AsSegment::encoded_len).sum()
    }
}

impl Deref for AsPath {
    type Target = Vec<AsSegment>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A single AS_PATH segment.
#[derive(Clone, Debug, PartialEq)]
pub struct AsSegment {
    pub type_: AsSegmentType,
    pub asns: Vec<u16>,
}

#[derive(Copy, Clone, Debug, PartialEq, Primitive)]
#[repr(u8)]
pub enum AsSegmentType {
    AsSet = 1,
    AsSequence = 2,
}

impl Component for AsSegment {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let type_ = src.get_u8();
        let type_ = AsSegmentType::from_u8(type_).ok_or(Error::MalformedAsPath)?;
        let len = src.get_u8() as usize;
        if src.remaining() < len * 2 {
            return Err(Error::MalformedAsPath);
        }
        let mut asns = Vec::with_capacity(len);
        for _ in 0..len {
            asns.push(src.get_u16());
        }
        Ok(Self { type_, asns })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u8(self.type_ as u8);
        dst.put_u8(u8::try_from(self.asns.len()).expect("AS segment length overflow"));
        for asn in &self.asns {
            dst.put_u16(*asn);
        }
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        2 + self.asns.len() * 2
    }
}

/// BGP AGGREGATOR attribute (RFC 4271 Section 5.1.7).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aggregator {
    pub asn: u16,
    pub addr: Ipv4Addr,
}

impl Component for Aggregator {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let asn = src.get_u16();
        let addr = Ipv4Addr::from_bytes(src)?;
        Ok(Self { asn, addr })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.asn);
        self.addr.to_bytes(dst) + 2
    }

    fn encoded_len(&self) -> usize {
        6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_round_trips() {
        let mut buf = bytes::BytesMut::new();
        Origin::Egp.to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(Origin::from_bytes(&mut bytes).unwrap(), Origin::Egp);
    }

    #[test]
    fn invalid_origin_rejected() {
        let mut bytes = Bytes::from_static(&[3]);
        assert!(matches!(
            Origin::from_bytes(&mut bytes),
            Err(Error::InvalidOrigin(3))
        ));
    }

    #[test]
    fn unrecognized_well_known_attribute_is_rejected() {
        // Type 99 is not one this speaker knows, and the Optional flag is
        // clear, so it cannot be tolerated as `Data::Unsupported`.
        let mut bytes = Bytes::from_static(&[Flags::WELL_KNOWN_COMPLETE.0, 99, 0]);
        assert!(matches!(
            Value::from_bytes(&mut bytes),
            Err(Error::UnrecognizedWellKnown(99))
        ));
    }

    #[test]
    fn unrecognized_optional_attribute_is_tolerated() {
        let mut bytes = Bytes::from_static(&[Flags::OPTIONAL_TRANSITIVE.0, 99, 2, 0xaa, 0xbb]);
        let value = Value::from_bytes(&mut bytes).unwrap();
        assert!(matches!(value.data, Data::Unsupported(99, _)));
    }

    #[test]
    fn as_path_round_trips() {
        let path = AsPath(vec![AsSegment {
            type_: AsSegmentType::AsSequence,
            asns: vec![64500, 64501],
        }]);
        let mut buf = bytes::BytesMut::new();
        path.clone().to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(AsPath::from_bytes(&mut bytes).unwrap(), path);
    }

    #[test]
    fn path_attributes_require_mandatory_well_known() {
        let attrs = PathAttributes(vec![Value {
            flags: Flags::WELL_KNOWN_COMPLETE,
            data: Data::Origin(Origin::Igp),
        }]);
        assert!(matches!(
            attrs.validate(),
            Err(Error::MissingWellKnown("AS_PATH"))
        ));
    }

    #[test]
    fn path_attributes_reject_duplicates() {
        let attrs = PathAttributes(vec![
            Value {
                flags: Flags::WELL_KNOWN_COMPLETE,
                data: Data::Origin(Origin::Igp),
            },
            Value {
                flags: Flags::WELL_KNOWN_COMPLETE,
                data: Data::Origin(Origin::Egp),
            },
        ]);
        assert!(matches!(
            attrs.validate(),
            Err(Error::MalformedAttributeList)
        ));
    }

    #[test]
    fn full_set_of_mandatory_attributes_validates() {
        let attrs = PathAttributes(vec![
            Value {
                flags: Flags::WELL_KNOWN_COMPLETE,
                data: Data::Origin(Origin::Igp),
            },
            Value {
                flags: Flags::WELL_KNOWN_COMPLETE,
                data: Data::AsPath(AsPath::default()),
            },
            Value {
                flags: Flags::WELL_KNOWN_COMPLETE,
                data: Data::NextHop("192.0.2.1".parse().unwrap()),
            },
        ]);
        assert!(attrs.validate().is_ok());
        assert_eq!(attrs.next_hop(), Some("192.0.2.1".parse().unwrap()));
    }
}
