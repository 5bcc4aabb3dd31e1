//! BGP OPEN optional parameters (RFC 4271 Section 4.2).
//!
//! RFC 5492 capability negotiation is not implemented (see `spec.md`
//! Non-goals: "no capabilities negotiation beyond tolerant parsing"). Every
//! optional parameter is parsed generically as `(type, length, value)` and
//! kept opaque; whether an unrecognized parameter is accepted or rejected is
//! a policy decision made by the caller (see
//! [`crate::peer::PeerOptions::accept_unknown_optional_parameters`]), not by
//! this module.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::wire::{Component, Error};
use bytes::{Buf, BufMut, Bytes};
use std::ops::Deref;

/// A list of BGP OPEN optional parameters, with their own length prefix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionalParameters(pub Vec<OptionalParameterValue>);

impl Component for OptionalParameters {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let len = src.get_u8() as usize;
        crate::check_remaining_len!(src, len, "optional parameters length");
        let mut body = src.split_to(len);
        let mut params = Vec::new();
        while body.has_remaining() {
            params.push(OptionalParameterValue::from_bytes(&mut body)?);
        }
        Ok(Self(params))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let len_pos = dst.len();
        dst.put_u8(0);
        let mut len = 0;
        for param in self.0 {
            len += param.to_bytes(dst);
        }
        dst[len_pos] = u8::try_from(len).expect("optional parameters length overflow");
        len + 1
    }

    fn encoded_len(&self) -> usize {
        1 + self.0.iter().map(Component::encoded_len).sum::<usize>()
    }
}

impl Deref for OptionalParameters {
    type Target = Vec<OptionalParameterValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<OptionalParameterValue>> for OptionalParameters {
    fn from(params: Vec<OptionalParameterValue>) -> Self {
        Self(params)
    }
}

/// A single generic BGP OPEN optional parameter: type code and opaque value.
///
/// Type 2 (Capabilities, RFC 5492) is the only one ever seen in the wild;
/// it is kept as raw bytes here since this speaker neither advertises nor
/// consumes capabilities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionalParameterValue {
    pub param_type: u8,
    pub data: Bytes,
}

/// RFC 5492 Capabilities optional parameter type code.
pub const CAPABILITIES_PARAM_TYPE: u8 = 2;

impl Component for OptionalParameterValue {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let param_type = src.get_u8();
        let param_len = src.get_u8() as usize;
        crate::check_remaining_len!(src, param_len, "optional parameter");
        let data = src.split_to(param_len);
        Ok(Self { param_type, data })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u8(self.param_type);
        dst.put_u8(u8::try_from(self.data.len()).expect("optional parameter length overflow"));
        dst.put_slice(&self.data);
        2 + self.data.len()
    }

    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl OptionalParameterValue {
    /// Is this the RFC 5492 Capabilities parameter? We do not interpret its
    /// contents but recognize the type code for tolerant-parsing purposes.
    #[must_use]
    pub fn is_capabilities(&self) -> bool {
        self.param_type == CAPABILITIES_PARAM_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_optional_parameters_round_trip() {
        let params = OptionalParameters::default();
        let mut buf = bytes::BytesMut::new();
        params.clone().to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        assert_eq!(OptionalParameters::from_bytes(&mut bytes).unwrap(), params);
    }

    #[test]
    fn generic_parameter_round_trips() {
        let params = OptionalParameters(vec![OptionalParameterValue {
            param_type: CAPABILITIES_PARAM_TYPE,
            data: Bytes::from_static(&[0x41, 0x04, 0x00, 0x01, 0x00, 0x01]),
        }]);
        let mut buf = bytes::BytesMut::new();
        params.clone().to_bytes(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = OptionalParameters::from_bytes(&mut bytes).unwrap();
        assert_eq!(decoded, params);
        assert!(decoded.0[0].is_capabilities());
    }
}
