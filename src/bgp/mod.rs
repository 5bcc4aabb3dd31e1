//! BGP message structures (RFC 4271 Section 4).
//!
//! Structs here represent the data, not the on-wire framing -- framing and
//! the marker/length/type header live in [`codec`].

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod capability;
pub mod codec;
pub mod path;
pub mod route;

pub use codec::BgpCodec as Codec;
pub use crate::wire::Error;

use crate::wire::{is_valid_unicast_host, Component};
use bytes::{Buf, BufMut};
use capability::OptionalParameters;
use enum_primitive_derive::Primitive;
use path::PathAttributes;
use route::Routes;
use std::net::Ipv4Addr;

/// A decoded BGP message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Open(Open),
    Update(Update),
    Notification(Notification),
    Keepalive,
}

/// BGP OPEN message (RFC 4271 Section 4.2).
#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: OptionalParameters,
}

impl Component for Open {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        let version = src.get_u8();
        let asn = src.get_u16();
        let hold_time = src.get_u16();
        let bgp_id = Ipv4Addr::from(src.get_u32());
        let opt_params = OptionalParameters::from_bytes(src)?;
        Ok(Self {
            version,
            asn,
            hold_time,
            bgp_id,
            opt_params,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        len += self.version.to_bytes(dst);
        len += self.asn.to_bytes(dst);
        len += self.hold_time.to_bytes(dst);
        len += self.bgp_id.to_bytes(dst);
        len += self.opt_params.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        10 + self.opt_params.encoded_len()
    }
}

impl Open {
    /// Build an OPEN with no optional parameters, for the common case of a
    /// speaker that does not advertise capabilities.
    #[must_use]
    pub fn new(asn: u16, hold_time: u16, bgp_id: Ipv4Addr) -> Self {
        Self {
            version: crate::BGP_VERSION,
            asn,
            hold_time,
            bgp_id,
            opt_params: OptionalParameters::default(),
        }
    }

    /// Validate this OPEN against the locally configured expectations,
    /// returning the matching wire error for the first violation found, in
    /// the order spec.md 4.1 lists them.
    pub fn validate(&self, expected_remote_as: u16) -> Result<(), Error> {
        if self.version != crate::BGP_VERSION {
            return Err(Error::UnsupportedVersion(self.version));
        }
        if self.asn != expected_remote_as {
            return Err(Error::BadPeerAs(self.asn));
        }
        if self.hold_time != 0 && self.hold_time < 3 {
            return Err(Error::UnacceptableHoldTime(self.hold_time));
        }
        if !is_valid_unicast_host(self.bgp_id) {
            return Err(Error::BadBgpIdentifier(self.bgp_id));
        }
        Ok(())
    }
}

/// BGP UPDATE message (RFC 4271 Section 4.3).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    pub withdrawn_routes: Routes,
    pub path_attributes: PathAttributes,
    pub nlri: Routes,
}

impl Component for Update {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        let withdrawn_len = src.get_u16() as usize;
        if src.remaining() < withdrawn_len {
            return Err(Error::MalformedAttributeList);
        }
        let mut wdr_buf = src.split_to(withdrawn_len);
        let withdrawn_routes = Routes::from_bytes(&mut wdr_buf)?;
        let tpa_len = src.get_u16() as usize;
        if src.remaining() < tpa_len {
            return Err(Error::MalformedAttributeList);
        }
        let mut tpa_buf = src.split_to(tpa_len);
        let path_attributes = PathAttributes::from_bytes(&mut tpa_buf)?;
        if tpa_len == 0 && src.has_remaining() {
            // "If the Total Path Attribute Length is 0, then there MUST be
            // no NLRI in the UPDATE message" (RFC 4271 4.3).
            return Err(Error::MalformedAttributeList);
        }
        let nlri = Routes::from_bytes(src)?;
        if !path_attributes.is_empty() {
            path_attributes.validate()?;
        }
        Ok(Self {
            withdrawn_routes,
            path_attributes,
            nlri,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        let wdr_len_pos = dst.len();
        len += 0u16.to_bytes(dst);
        let wdr_len = self.withdrawn_routes.to_bytes(dst);
        len += wdr_len;
        dst[wdr_len_pos..wdr_len_pos + 2].copy_from_slice(
            &u16::try_from(wdr_len)
                .expect("withdrawn routes length overflow")
                .to_be_bytes(),
        );
        let tpa_len_pos = dst.len();
        len += 0u16.to_bytes(dst);
        let tpa_len = self.path_attributes.to_bytes(dst);
        len += tpa_len;
        dst[tpa_len_pos..tpa_len_pos + 2].copy_from_slice(
            &u16::try_from(tpa_len)
                .expect("total path attribute length overflow")
                .to_be_bytes(),
        );
        len += self.nlri.to_bytes(dst);
        len
    }

    fn encoded_len(&self) -> usize {
        4 + self.withdrawn_routes.encoded_len()
            + self.path_attributes.encoded_len()
            + self.nlri.encoded_len()
    }
}

/// BGP NOTIFICATION message (RFC 4271 Section 4.5).
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub error_code: NotificationErrorCode,
    pub error_subcode: u8,
    pub data: bytes::Bytes,
}

impl Component for Notification {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        use num_traits::FromPrimitive;
        let error_code = src.get_u8();
        let error_subcode = src.get_u8();
        let data = src.copy_to_bytes(src.remaining());
        Ok(Self {
            error_code: NotificationErrorCode::from_u8(error_code)
                .ok_or(Error::InternalType("error_code", u16::from(error_code)))?,
            error_subcode,
            data,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        len += (self.error_code as u8).to_bytes(dst);
        len += self.error_subcode.to_bytes(dst);
        len += self.data.len();
        dst.put_slice(&self.data);
        len
    }

    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl Notification {
    #[must_use]
    pub fn new(error_code: NotificationErrorCode, error_subcode: u8, data: bytes::Bytes) -> Self {
        Self {
            error_code,
            error_subcode,
            data,
        }
    }

    /// Shorthand for a NOTIFICATION with no data.
    #[must_use]
    pub fn simple(error_code: NotificationErrorCode, error_subcode: u8) -> Self {
        Self::new(error_code, error_subcode, bytes::Bytes::new())
    }

    /// Does this NOTIFICATION report (OPEN Message Error, Unsupported
    /// Version Number)? The FSM treats this case distinctly (spec.md 4.1).
    #[must_use]
    pub fn is_unsupported_version(&self) -> bool {
        self.error_code == NotificationErrorCode::OpenMessageError
            && self.error_subcode == OpenMessageErrorSubcode::UnsupportedVersionNumber as u8
    }
}

/// NOTIFICATION error codes (RFC 4271 Section 4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum NotificationErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageHeaderErrorSubcode {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum OpenMessageErrorSubcode {
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum UpdateMessageErrorSubcode {
    MalformedAttributeList = 1,
    UnrecognizedWellKnownAttribute = 2,
    MissingWellKnownAttribute = 3,
    AttributeFlagsError = 4,
    AttributeLengthError = 5,
    InvalidOriginAttribute = 6,
    AsRoutingLoop = 7,
    InvalidNextHopAttribute = 8,
    OptionalAttributeError = 9,
    InvalidNetworkField = 10,
    MalformedAsPath = 11,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum CeaseSubcode {
    MaximumNumberOfPrefixesReached = 1,
    AdministrativeShutdown = 2,
    PeerDeconfigured = 3,
    AdministrativeReset = 4,
    ConnectionRejected = 5,
    OtherConfigurationChange = 6,
    ConnectionCollisionResolution = 7,
    OutOfResources = 8,
}

/// Map a [`Error`] raised while decoding a message body into the
/// NOTIFICATION that reports it, per spec.md Section 7.
#[must_use]
pub fn error_to_notification(err: &Error) -> Notification {
    use bytes::Bytes;
    match err {
        Error::Marker => Notification::simple(
            NotificationErrorCode::MessageHeaderError,
            MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8,
        ),
        Error::HeaderLength(len) => Notification::new(
            NotificationErrorCode::MessageHeaderError,
            MessageHeaderErrorSubcode::BadMessageLength as u8,
            Bytes::copy_from_slice(&len.to_be_bytes()),
        ),
        Error::HeaderType(ty) => Notification::new(
            NotificationErrorCode::MessageHeaderError,
            MessageHeaderErrorSubcode::BadMessageType as u8,
            Bytes::copy_from_slice(&[*ty]),
        ),
        Error::UnsupportedVersion(_) => Notification::new(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnsupportedVersionNumber as u8,
            Bytes::copy_from_slice(&u16::from(crate::BGP_VERSION).to_be_bytes()),
        ),
        Error::BadPeerAs(_) => Notification::simple(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::BadPeerAs as u8,
        ),
        Error::BadBgpIdentifier(_) => Notification::simple(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::BadBgpIdentifier as u8,
        ),
        Error::UnacceptableHoldTime(_) => Notification::simple(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnacceptableHoldTime as u8,
        ),
        Error::UnsupportedOptionalParameter(_) => Notification::simple(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnsupportedOptionalParameter as u8,
        ),
        Error::MalformedAttributeList => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::MalformedAttributeList as u8,
        ),
        Error::UnrecognizedWellKnown(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::UnrecognizedWellKnownAttribute as u8,
        ),
        Error::MissingWellKnown(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::MissingWellKnownAttribute as u8,
        ),
        Error::AttributeFlags(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::AttributeFlagsError as u8,
        ),
        Error::AttributeLength(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::AttributeLengthError as u8,
        ),
        Error::InvalidOrigin(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::InvalidOriginAttribute as u8,
        ),
        Error::MalformedAsPath => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::MalformedAsPath as u8,
        ),
        Error::InvalidNetworkField(_) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::InvalidNetworkField as u8,
        ),
        Error::InternalLength(..) | Error::InternalType(..) => Notification::simple(
            NotificationErrorCode::UpdateMessageError,
            UpdateMessageErrorSubcode::MalformedAttributeList as u8,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trips() {
        let open = Open::new(65001, 90, "1.2.3.4".parse().unwrap());
        let mut buf = bytes::BytesMut::new();
        let len = open.clone().to_bytes(&mut buf);
        // version(1) + asn(2) + hold_time(2) + bgp_id(4) + opt-parm-len(1) == 10
        assert_eq!(len, 10);
        // total message length: 19-byte header + 10-byte body == spec.md's minimum OPEN length
        assert_eq!(len + 19, u16::from(crate::MIN_OPEN_LENGTH));
        let mut bytes = buf.freeze();
        assert_eq!(Open::from_bytes(&mut bytes).unwrap(), open);
    }

    #[test]
    fn open_validate_rejects_bad_peer_as() {
        let open = Open::new(65001, 90, "1.2.3.4".parse().unwrap());
        assert!(matches!(
            open.validate(64500),
            Err(Error::BadPeerAs(65001))
        ));
        assert!(open.validate(65001).is_ok());
    }

    #[test]
    fn notification_is_unsupported_version_detection() {
        let n = Notification::new(
            NotificationErrorCode::OpenMessageError,
            OpenMessageErrorSubcode::UnsupportedVersionNumber as u8,
            bytes::Bytes::new(),
        );
        assert!(n.is_unsupported_version());
        let other = Notification::simple(NotificationErrorCode::Cease, 2);
        assert!(!other.is_unsupported_version());
    }
}
