//! BGP routes: length-prefixed IPv4 CIDR blocks as carried in the
//! withdrawn-routes and NLRI fields of an UPDATE message.
//!
//! RFC 4271 gives the address family implicitly via the enclosing message
//! (this speaker carries only IPv4 unicast -- no MP-BGP, see `spec.md`
//! Non-goals), so unlike the teacher's `Routes`, there is only one prefix
//! shape here.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::wire::{Component, Error};
use bytes::{Buf, BufMut, Bytes};
use std::net::Ipv4Addr;
use std::ops::Deref;

/// Number of octets needed to hold `prefix_len` bits, rounded up.
fn n_prefix_octets(prefix_len: u8) -> usize {
    usize::from((prefix_len + 7) / 8)
}

/// A single IPv4 prefix: a bit length (0..=32) and the minimal packed
/// representation of its network bits. Trailing bits beyond `prefix_len`
/// within the last octet are unspecified on the wire and ignored here.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prefix {
    pub prefix_len: u8,
    pub prefix: Bytes,
}

impl Component for Prefix {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let prefix_len = src.get_u8();
        if prefix_len > 32 {
            return Err(Error::InvalidNetworkField(prefix_len));
        }
        let n = n_prefix_octets(prefix_len);
        if src.remaining() < n {
            return Err(Error::MalformedAttributeList);
        }
        let prefix = src.split_to(n);
        Ok(Self { prefix_len, prefix })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u8(self.prefix_len);
        dst.put_slice(&self.prefix);
        1 + self.prefix.len()
    }

    fn encoded_len(&self) -> usize {
        1 + self.prefix.len()
    }
}

impl Prefix {
    /// Build a prefix from a host address and a prefix length, packing only
    /// the significant octets.
    #[must_use]
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
        let n = n_prefix_octets(prefix_len);
        let prefix = Bytes::copy_from_slice(&addr.octets()[..n]);
        Self { prefix_len, prefix }
    }

    /// Expand the packed prefix back into a full, zero-padded host address.
    #[must_use]
    pub fn to_ipv4(&self) -> Ipv4Addr {
        let mut octets = [0u8; 4];
        octets[..self.prefix.len()].copy_from_slice(&self.prefix);
        Ipv4Addr::from(octets)
    }
}

/// A sequence of prefixes without an outer length field -- the length is
/// implied by the enclosing withdrawn-routes or NLRI field length.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Routes(pub Vec<Prefix>);

impl Component for Routes {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let mut routes = Vec::new();
        while src.has_remaining() {
            routes.push(Prefix::from_bytes(src)?);
        }
        Ok(Self(routes))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for route in self.0 {
            len += route.to_bytes(dst);
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Component::encoded_len).sum()
    }
}

impl Deref for Routes {
    type Target = Vec<Prefix>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Prefix>> for Routes {
    fn from(routes: Vec<Prefix>) -> Self {
        Self(routes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_on_byte_boundary() {
        let p = Prefix::new("10.0.0.0".parse().unwrap(), 8);
        assert_eq!(&p.prefix[..], &[10]);
    }

    #[test]
    fn prefix_off_byte_boundary() {
        let p = Prefix::new("172.24.0.0".parse().unwrap(), 12);
        assert_eq!(&p.prefix[..], &[172, 16]);
    }

    #[test]
    fn zero_length_matches_any() {
        let p = Prefix::new(Ipv4Addr::UNSPECIFIED, 0);
        assert!(p.prefix.is_empty());
    }

    #[test]
    fn routes_round_trip() {
        let routes = Routes(vec![
            Prefix::new("203.0.113.0".parse().unwrap(), 24),
            Prefix::new("198.51.100.0".parse().unwrap(), 23),
        ]);
        let mut buf = bytes::BytesMut::new();
        routes.clone().to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = Routes::from_bytes(&mut bytes).unwrap();
        assert_eq!(decoded, routes);
    }
}
