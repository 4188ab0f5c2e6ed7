//! BGP wire structures for the route-churn generator
//!
//! Structs here intend to represent the data instead of the on-wire format.
//! Inbound UPDATE bodies are carried as raw octets: this speaker announces
//! routes, it never installs them.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod capability;
mod endec;
pub mod path;
pub mod route;
#[cfg(test)]
#[cfg(feature = "tokio-endec")]
mod tests;
mod update;

#[cfg(feature = "tokio-endec")]
pub use endec::BgpCodec as Codec;
pub use update::UpdateBuilder;

use bytes::{Buf, BufMut, Bytes};
use capability::{Capabilities, OptionalParameters};
use endec::Component;
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::Ipv4Addr;

/// Supported BGP version
pub const BGP_VERSION: u8 = 4;

/// ASN placed in the 16-bit OPEN field when the real ASN does not fit
pub const AS_TRANS: u16 = 23456;

/// BGP marker
pub const MARKER: [u8; 16] = [0xff; 16];

/// Size of the fixed message header (marker, length, type)
pub const HEADER_LEN: usize = 19;

/// Largest valid BGP message, header included
pub const MAX_MESSAGE_LEN: usize = 4096;

/// BGP packet errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid or missing marker")]
    NotSynchronized,
    #[error("bad message length {0}")]
    BadMessageLength(u16),
    #[error("bad message type {0}")]
    BadMessageType(u8),
    #[error("malformed OPEN message body")]
    MalformedOpen,
    #[error("invalid internal length at {0}")]
    InternalLength(&'static str),
    #[error("invalid {0} type of {1}")]
    InternalType(&'static str, u16),
    #[error("invalid UTF-8 in {0}")]
    InternalUtf8(&'static str),
}

impl Error {
    /// The NOTIFICATION this error elicits, if it is a protocol error the
    /// peer should hear about. I/O and capability-internal errors map to
    /// `None`.
    #[must_use]
    pub fn notification(&self) -> Option<Notification> {
        match self {
            Self::NotSynchronized => Some(Notification::new(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::ConnectionNotSynchronized as u8,
                Bytes::new(),
            )),
            // RFC 4271 6.1: the data field carries the offending octets
            Self::BadMessageLength(len) => Some(Notification::new(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::BadMessageLength as u8,
                Bytes::copy_from_slice(&len.to_be_bytes()),
            )),
            Self::BadMessageType(type_) => Some(Notification::new(
                NotificationErrorCode::MessageHeaderError,
                MessageHeaderErrorSubcode::BadMessageType as u8,
                Bytes::copy_from_slice(&[*type_]),
            )),
            Self::MalformedOpen => Some(Notification::new(
                NotificationErrorCode::OpenMessageError,
                OpenMessageErrorSubcode::UnsupportedOptionalParameter as u8,
                Bytes::new(),
            )),
            _ => None,
        }
    }
}

/// BGP message
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    Open(Open),
    Update(Update),
    Notification(Notification),
    Keepalive,
}

/// BGP open message
#[derive(Clone, Debug, PartialEq)]
pub struct Open {
    pub version: u8,
    pub asn: u16,
    pub hold_time: u16,
    pub bgp_id: Ipv4Addr,
    pub opt_params: OptionalParameters,
}

impl Component for Open {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        // Version through BGP identifier plus the parameter length octet
        if src.remaining() < 10 {
            return Err(Error::MalformedOpen);
        }
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
        1 + 2 + 2 + 4 + self.opt_params.encoded_len()
    }
}

impl Open {
    /// Create a new BGP open message
    ///
    /// ASNs above the 16-bit range are squashed to [`AS_TRANS`] in the
    /// fixed field; the real ASN belongs in a four-octet AS capability.
    #[must_use]
    pub fn new(asn: u32, hold_time: u16, bgp_id: Ipv4Addr, capabilities: Capabilities) -> Self {
        let oldbgp_asn = u16::try_from(asn).unwrap_or(AS_TRANS);
        Self {
            version: BGP_VERSION,
            asn: oldbgp_asn,
            hold_time,
            bgp_id,
            opt_params: vec![capability::OptionalParameterValue::Capabilities(
                capabilities,
            )]
            .into(),
        }
    }
}

/// BGP update message, kept as the raw body octets
///
/// Outbound updates are composed with [`UpdateBuilder`]; inbound updates
/// are accepted but never interpreted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update(pub Bytes);

impl Component for Update {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        Ok(Self(src.copy_to_bytes(src.remaining())))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_slice(&self.0);
        self.0.len()
    }

    fn encoded_len(&self) -> usize {
        self.0.len()
    }
}

/// BGP notification message
///
/// The code octets are stored raw so that a peer sending codes we do not
/// know about never fails the decode.
#[derive(Clone, Debug, PartialEq)]
pub struct Notification {
    pub error_code: u8,
    pub error_subcode: u8,
    pub data: Bytes,
}

impl Component for Notification {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let error_code = if src.has_remaining() { src.get_u8() } else { 0 };
        let error_subcode = if src.has_remaining() { src.get_u8() } else { 0 };
        let data = src.copy_to_bytes(src.remaining());
        Ok(Self {
            error_code,
            error_subcode,
            data,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        len += self.error_code.to_bytes(dst);
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
    /// Create a new BGP notification message
    #[must_use]
    pub fn new(error_code: NotificationErrorCode, error_subcode: u8, data: Bytes) -> Self {
        Self {
            error_code: error_code as u8,
            error_subcode,
            data,
        }
    }

    /// The error code, if it is one defined by RFC 4271
    #[must_use]
    pub fn code(&self) -> Option<NotificationErrorCode> {
        NotificationErrorCode::from_u8(self.error_code)
    }
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code() {
            Some(code) => write!(f, "{code:?}({})", self.error_subcode),
            None => write!(f, "code {}({})", self.error_code, self.error_subcode),
        }
    }
}

/// Notification error codes
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

/// Notification error subcodes for MessageHeaderError
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum MessageHeaderErrorSubcode {
    ConnectionNotSynchronized = 1,
    BadMessageLength = 2,
    BadMessageType = 3,
}

/// Notification error subcodes for OpenMessageError
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum OpenMessageErrorSubcode {
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
}
