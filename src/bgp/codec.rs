//! Message framing: the 19-octet common header, and the
//! `tokio_util::codec::{Decoder, Encoder}` pair used to turn a TCP byte
//! stream into a sequence of [`Message`]s (spec.md Section 4.1).

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::{Message, Notification, Open, Update};
use crate::wire::{Component, Error};
use bytes::{Buf, BufMut};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use tokio_util::codec::{Decoder, Encoder};

/// BGP wire codec: frames messages on `MARKER`/length/type and validates
/// the header before handing the body to the per-type decoder.
#[derive(Copy, Clone, Debug, Default)]
pub struct BgpCodec;

fn min_length_for(msg_type: MessageType) -> u16 {
    match msg_type {
        MessageType::Open => crate::MIN_OPEN_LENGTH,
        MessageType::Update => crate::MIN_UPDATE_LENGTH,
        MessageType::Notification => crate::MIN_NOTIFICATION_LENGTH,
        MessageType::Keepalive => crate::KEEPALIVE_LENGTH,
    }
}

impl Decoder for BgpCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Marker (16) + Length (2) + Type (1).
        if src.len() < crate::MARKER.len() + 3 {
            return Ok(None);
        }
        let length = u16::from_be_bytes([src[16], src[17]]);
        if !(crate::MIN_MESSAGE_LENGTH..=crate::MAX_MESSAGE_LENGTH).contains(&length) {
            return Err(Error::HeaderLength(length));
        }
        if (src.len() as u64) < u64::from(length) {
            return Ok(None);
        }
        if src[..16] != crate::MARKER {
            return Err(Error::Marker);
        }
        let msg_type_raw = src[18];
        let msg_type = MessageType::from_u8(msg_type_raw).ok_or(Error::HeaderType(msg_type_raw))?;
        if length < min_length_for(msg_type) {
            return Err(Error::HeaderLength(length));
        }
        if msg_type == MessageType::Keepalive && length != crate::KEEPALIVE_LENGTH {
            return Err(Error::HeaderLength(length));
        }
        // Header validated; consume it and the body together.
        let mut frame = src.split_to(length as usize);
        frame.advance(19);
        let mut body: bytes::Bytes = frame.into();
        let msg = match msg_type {
            MessageType::Open => Message::Open(Open::from_bytes(&mut body)?),
            MessageType::Update => Message::Update(Update::from_bytes(&mut body)?),
            MessageType::Notification => Message::Notification(Notification::from_bytes(&mut body)?),
            MessageType::Keepalive => Message::Keepalive,
        };
        if body.has_remaining() {
            log::debug!("trailing bytes after decoding a {msg_type:?} message: {body:?}");
            return Err(Error::InternalLength("message", std::cmp::Ordering::Greater));
        }
        log::trace!("decoded {length}-byte {msg_type:?} message");
        Ok(Some(msg))
    }
}

impl Encoder<Message> for BgpCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&crate::MARKER);
        let len_pos = dst.len();
        dst.put_u16(0); // placeholder
        let body_len = match item {
            Message::Open(msg) => {
                dst.put_u8(MessageType::Open as u8);
                msg.to_bytes(dst)
            }
            Message::Update(msg) => {
                dst.put_u8(MessageType::Update as u8);
                msg.to_bytes(dst)
            }
            Message::Notification(msg) => {
                dst.put_u8(MessageType::Notification as u8);
                msg.to_bytes(dst)
            }
            Message::Keepalive => {
                dst.put_u8(MessageType::Keepalive as u8);
                0
            }
        };
        let total_len = u16::try_from(body_len + 19).expect("message length overflow");
        dst[len_pos..len_pos + 2].copy_from_slice(&total_len.to_be_bytes());
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Update = 2,
    Notification = 3,
    Keepalive = 4,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgp::capability::OptionalParameters;
    use bytes::BytesMut;

    fn hex_to_bytes(hex: &str) -> BytesMut {
        let clean: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
        let mut out = BytesMut::with_capacity(clean.len() / 2);
        let bytes = clean.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let hi = (bytes[i] as char).to_digit(16).unwrap() as u8;
            let lo = (bytes[i + 1] as char).to_digit(16).unwrap() as u8;
            out.put_u8((hi << 4) | lo);
            i += 2;
        }
        out
    }

    #[test]
    fn keepalive_round_trips() {
        let mut data = hex_to_bytes("ffffffffffffffffffffffffffffffff001304");
        let mut codec = BgpCodec;
        let msg = codec.decode(&mut data).unwrap().unwrap();
        assert_eq!(msg, Message::Keepalive);
        let mut encoded = BytesMut::new();
        codec.encode(Message::Keepalive, &mut encoded).unwrap();
        assert_eq!(encoded, hex_to_bytes("ffffffffffffffffffffffffffffffff001304"));
    }

    #[test]
    fn bad_header_length_is_rejected() {
        // Marker + length=10 (too short even for a header) + type byte.
        let mut data = hex_to_bytes("ffffffffffffffffffffffffffffffff000a04");
        let mut codec = BgpCodec;
        let err = codec.decode(&mut data).unwrap_err();
        match err {
            Error::HeaderLength(len) => assert_eq!(len, 10),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn bad_marker_is_rejected() {
        let mut data = hex_to_bytes("00ffffffffffffffffffffffffffffff001304");
        let mut codec = BgpCodec;
        assert!(matches!(codec.decode(&mut data), Err(Error::Marker)));
    }

    #[test]
    fn bad_message_type_is_rejected() {
        let mut data = hex_to_bytes("ffffffffffffffffffffffffffffffff001309");
        let mut codec = BgpCodec;
        assert!(matches!(codec.decode(&mut data), Err(Error::HeaderType(9))));
    }

    #[test]
    fn incomplete_message_waits_for_more_data() {
        let mut data = hex_to_bytes("ffffffffffffffffffffffffffffffff001d01");
        let mut codec = BgpCodec;
        assert_eq!(codec.decode(&mut data).unwrap(), None);
    }

    #[test]
    fn open_message_round_trips_through_codec() {
        let open = Open {
            version: 4,
            asn: 64893,
            hold_time: 120,
            bgp_id: "172.23.6.165".parse().unwrap(),
            opt_params: OptionalParameters::default(),
        };
        let mut buf = BytesMut::new();
        let mut codec = BgpCodec;
        codec.encode(Message::Open(open.clone()), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::Open(open));
    }

    #[test]
    fn keepalive_with_nonempty_body_is_bad_length() {
        // Length says 20 (one body byte) but type is Keepalive.
        let mut data = hex_to_bytes("ffffffffffffffffffffffffffffffff00140400");
        let mut codec = BgpCodec;
        assert!(matches!(codec.decode(&mut data), Err(Error::HeaderLength(20))));
    }
}
