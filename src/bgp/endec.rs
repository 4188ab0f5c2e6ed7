//! BGP packet encoding and decoding

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::Error;
#[cfg(feature = "tokio-endec")]
use super::{Message, Notification, Open, Update, HEADER_LEN, MARKER, MAX_MESSAGE_LEN};
use bytes::{Buf, BufMut};
use enum_primitive_derive::Primitive;
#[cfg(feature = "tokio-endec")]
use num_traits::FromPrimitive;
use std::net::Ipv4Addr;
#[cfg(feature = "tokio-endec")]
use tokio_util::codec::{Decoder, Encoder};

/// BGP packet encoder and streaming decoder
///
/// The decoder leaves incomplete frames in the read buffer, so the buffer
/// itself is the residual tail carried between socket reads.
#[derive(Copy, Clone, Debug)]
#[cfg(feature = "tokio-endec")]
pub struct BgpCodec;

#[cfg(feature = "tokio-endec")]
impl Decoder for BgpCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }
        if src[..MARKER.len()] != MARKER {
            // A stream without the marker cannot be re-framed; drop it so
            // the session can report the error and keep reading.
            src.clear();
            return Err(Error::NotSynchronized);
        }
        let length = u16::from_be_bytes([src[16], src[17]]);
        if usize::from(length) < HEADER_LEN || usize::from(length) > MAX_MESSAGE_LEN {
            // The declared length cannot be used to find the next frame
            src.clear();
            return Err(Error::BadMessageLength(length));
        }
        if src.len() < usize::from(length) {
            // Partial message: consume nothing until the rest arrives
            return Ok(None);
        }
        let mut frame = src.split_to(usize::from(length)).freeze();
        frame.advance(MARKER.len());
        let _ = frame.get_u16();
        let msg_type = frame.get_u8();
        log::trace!("Valid BGP frame, type: {msg_type}, length: {length}");
        match MessageType::from_u8(msg_type) {
            Some(MessageType::Open) => Ok(Some(Message::Open(Open::from_bytes(&mut frame)?))),
            Some(MessageType::Update) => Ok(Some(Message::Update(Update::from_bytes(&mut frame)?))),
            Some(MessageType::Notification) => Ok(Some(Message::Notification(
                Notification::from_bytes(&mut frame)?,
            ))),
            Some(MessageType::Keepalive) => Ok(Some(Message::Keepalive)),
            // The frame is already consumed, so later messages still decode
            None => Err(Error::BadMessageType(msg_type)),
        }
    }
}

#[cfg(feature = "tokio-endec")]
impl Encoder<Message> for BgpCodec {
    // tokio requires the Error type to be `From<io::Error>`, but actually ours is `!`
    type Error = std::io::Error;

    fn encode(&mut self, item: Message, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
        dst.put_slice(&MARKER);
        let len_pos = dst.len();
        dst.put_u16(0); // Placeholder for length
        let len = match item {
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
        let len = u16::try_from(len + HEADER_LEN).expect("Message length overflow");
        dst[len_pos..len_pos + 2].copy_from_slice(&len.to_be_bytes());
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

/// BGP packet component with a fixed length or containing a length field
pub trait Component {
    /// Decode the component from a buffer.
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error>
    where
        Self: Sized;

    /// Encode the component into a buffer.
    ///
    /// Returns the number of bytes written.
    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize;

    /// Find out the length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

impl Component for Ipv4Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, Error> {
        if src.remaining() < 4 {
            return Err(Error::InternalLength("IPv4 address"));
        }
        let octets = src.get_u32();
        Ok(Self::from(octets))
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
                if src.remaining() < $n {
                    return Err(Error::InternalLength(stringify!($typ)));
                }
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
