//! Wire primitives: big-endian readers/writers and the `Component` trait
//! every encodable/decodable piece of a BGP message implements.

// SPDX-License-Identifier: AGPL-3.0-or-later

use bytes::{Buf, BufMut};
use std::net::Ipv4Addr;

/// Errors that can occur while decoding wire bytes into a typed value.
///
/// These are distinct from [`crate::session::Error`]: a `wire::Error` always
/// maps to a specific NOTIFICATION (see [`crate::bgp::Notification`]),
/// whereas session errors also cover transport and protocol-sequencing
/// failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid or missing marker")]
    Marker,
    #[error("bad message length {0}")]
    HeaderLength(u16),
    #[error("bad message type {0}")]
    HeaderType(u8),
    #[error("invalid internal length at {0} ({1:?})")]
    InternalLength(&'static str, std::cmp::Ordering),
    #[error("invalid {0} value {1}")]
    InternalType(&'static str, u16),
    #[error("unsupported version {0}")]
    UnsupportedVersion(u8),
    #[error("bad peer AS {0}")]
    BadPeerAs(u16),
    #[error("bad BGP identifier {0}")]
    BadBgpIdentifier(Ipv4Addr),
    #[error("unacceptable hold time {0}")]
    UnacceptableHoldTime(u16),
    #[error("unsupported optional parameter {0}")]
    UnsupportedOptionalParameter(u8),
    #[error("malformed attribute list")]
    MalformedAttributeList,
    #[error("unrecognized well-known attribute {0}")]
    UnrecognizedWellKnown(u8),
    #[error("missing well-known attribute {0}")]
    MissingWellKnown(&'static str),
    #[error("attribute flags error for type {0}")]
    AttributeFlags(u8),
    #[error("attribute length error for type {0}")]
    AttributeLength(u8),
    #[error("invalid ORIGIN value {0}")]
    InvalidOrigin(u8),
    #[error("malformed AS_PATH")]
    MalformedAsPath,
    #[error("invalid network field: prefix length {0} exceeds 32 bits")]
    InvalidNetworkField(u8),
}

/// A BGP packet component with either a fixed length or a length implied by
/// the surrounding container.
///
/// Mirrors the teacher's `bgp::endec::Component` trait: decode takes
/// ownership-by-reference of a cursor over exactly the component's bytes,
/// encode appends to a growable buffer and returns the number of bytes
/// written.
pub trait Component {
    /// Decode the component from a buffer holding exactly its bytes.
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error>
    where
        Self: Sized;

    /// Encode the component into a buffer. Returns the number of bytes
    /// written.
    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize;

    /// The encoded length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

impl Component for Ipv4Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        Ok(Self::from(src.get_u32()))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u32(self.into());
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

macro_rules! impl_component_for_intn {
    ($typ:ty, $getter:ident, $putter:ident, $n:expr) => {
        impl Component for $typ {
            fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
                Ok(src.$getter())
            }

            fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
                dst.$putter(self);
                $n
            }

            fn encoded_len(&self) -> usize {
                $n
            }
        }
    };
}

impl_component_for_intn!(u8, get_u8, put_u8, 1);
impl_component_for_intn!(u16, get_u16, put_u16, 2);
impl_component_for_intn!(u32, get_u32, put_u32, 4);

/// Is `addr` a value an ordinary unicast host could legitimately hold as a
/// BGP identifier -- not unspecified, not loopback, not multicast, not the
/// all-ones broadcast address?
#[must_use]
pub fn is_valid_unicast_host(addr: Ipv4Addr) -> bool {
    !addr.is_unspecified()
        && !addr.is_loopback()
        && !addr.is_multicast()
        && !addr.is_broadcast()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn u16_round_trips() {
        let mut buf = BytesMut::new();
        42u16.to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(u16::from_bytes(&mut bytes).unwrap(), 42);
    }

    #[test]
    fn ipv4_round_trips() {
        let addr: Ipv4Addr = "203.0.113.1".parse().unwrap();
        let mut buf = BytesMut::new();
        addr.to_bytes(&mut buf);
        assert_eq!(buf.len(), 4);
        let mut bytes = buf.freeze();
        assert_eq!(Ipv4Addr::from_bytes(&mut bytes).unwrap(), addr);
    }

    #[test]
    fn valid_unicast_host() {
        assert!(is_valid_unicast_host("10.0.0.1".parse().unwrap()));
        assert!(!is_valid_unicast_host(Ipv4Addr::UNSPECIFIED));
        assert!(!is_valid_unicast_host("127.0.0.1".parse().unwrap()));
        assert!(!is_valid_unicast_host("224.0.0.1".parse().unwrap()));
        assert!(!is_valid_unicast_host(Ipv4Addr::BROADCAST));
    }
}
