//! BGP open message optional parameters and the capability parameter
//!
//! RFC 4271 Section 4.2 specifies the optional parameters that can be
//! included in the BGP open message. The only parameter this speaker
//! interprets is the capability parameter (RFC 3392/5492); anything else is
//! carried as raw octets so an OPEN always re-encodes to the bytes it came
//! from.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::endec::Component;
use crate::Error;
use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::ops::Deref;

/// Check that the remaining buffer length can satisfy the expected length
macro_rules! check_remaining_len {
    ($src:expr, $len:expr, $name:expr) => {
        if $src.remaining() < $len {
            return Err($crate::Error::InternalLength($name));
        }
    };
}

/// A list of BGP optional parameters
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptionalParameters(pub Vec<OptionalParameterValue>);

impl Component for OptionalParameters {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        // RFC 4271 4.2 Optional Parameters Length
        let len = src.get_u8() as usize;
        if src.remaining() != len {
            return Err(Error::MalformedOpen);
        }
        let mut opt_params = Vec::new();
        // RFC 4271 4.2 Optional Parameters
        while src.has_remaining() {
            let param = OptionalParameterValue::from_bytes(src)?;
            opt_params.push(param);
        }
        Ok(Self(opt_params))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        let length_pos = dst.len();
        dst.put_u8(0); // Placeholder for length
        for param in self.0 {
            len += param.to_bytes(dst);
        }
        dst[length_pos] = u8::try_from(len).expect("Optional parameters length overflow");
        len + 1 // Length
    }

    fn encoded_len(&self) -> usize {
        self.0.iter().map(Component::encoded_len).sum::<usize>() + 1 // Length
    }
}

impl From<Vec<OptionalParameterValue>> for OptionalParameters {
    fn from(params: Vec<OptionalParameterValue>) -> Self {
        Self(params)
    }
}

impl Deref for OptionalParameters {
    type Target = Vec<OptionalParameterValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// BGP optional parameter (RFC 4271 4.2)
///
/// A type 2 parameter whose capability list does not parse is kept as
/// `Unsupported` with the raw value octets, as are parameters of any other
/// type.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionalParameterValue {
    Capabilities(Capabilities),
    Unsupported(u8, Bytes),
}

/// BGP optional parameter types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum OptionalParameterType {
    Capabilities = 2,
}

impl Component for OptionalParameterValue {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        if src.remaining() < 2 {
            return Err(Error::MalformedOpen);
        }
        // RFC 5492 4. Optional Parameters -> Parameter Type
        let param_type = src.get_u8();
        // RFC 5492 4. Optional Parameters -> Parameter Length
        let param_len = src.get_u8() as usize;
        if src.remaining() < param_len {
            return Err(Error::MalformedOpen);
        }
        let value = src.split_to(param_len);
        match OptionalParameterType::from_u8(param_type) {
            Some(OptionalParameterType::Capabilities) => {
                match Capabilities::from_bytes(&mut value.clone()) {
                    Ok(cap) => Ok(Self::Capabilities(cap)),
                    Err(e) => {
                        log::debug!("Unparseable capability parameter kept raw: {e}");
                        Ok(Self::Unsupported(param_type, value))
                    }
                }
            }
            _ => Ok(Self::Unsupported(param_type, value)),
        }
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let type_pos = dst.len();
        dst.put_u8(0); // Placeholder for type
        let len_pos = dst.len();
        dst.put_u8(0); // Placeholder for length
        match self {
            OptionalParameterValue::Capabilities(cap) => {
                let len = cap.to_bytes(dst);
                dst[type_pos] = OptionalParameterType::Capabilities as u8;
                dst[len_pos] = u8::try_from(len).expect("Capabilities length overflow");
                len + 2 // Type and length
            }
            OptionalParameterValue::Unsupported(param_type, data) => {
                dst.put_slice(&data);
                dst[type_pos] = param_type;
                dst[len_pos] = u8::try_from(data.len()).expect("Parameter length overflow");
                data.len() + 2 // Type and length
            }
        }
    }

    fn encoded_len(&self) -> usize {
        2 + match self {
            OptionalParameterValue::Capabilities(cap) => cap.encoded_len(),
            OptionalParameterValue::Unsupported(_, data) => data.len(),
        }
    }
}

/// BGP capability list
// "a BGP speaker MUST be prepared to accept such multiple instances," so a Vec must be used
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Capabilities(Vec<Value>);

impl Component for Capabilities {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let mut cap = Vec::new();
        while src.has_remaining() {
            check_remaining_len!(src, 2, "capability header");
            // RFC 5492 4. Optional Parameters -> Capability Code
            let code = src.get_u8();
            // RFC 5492 4. Optional Parameters -> Capability Length
            let len = src.get_u8() as usize;
            check_remaining_len!(src, len, "capability");
            // Bound each capability to its own length field
            let mut src = src.split_to(len);
            log::trace!("Capability code: {code}, length: {len}, data: {src:?}");
            let value = match Type::from_u8(code) {
                Some(Type::MultiProtocol) => {
                    Value::MultiProtocol(MultiProtocol::from_bytes(&mut src)?)
                }
                Some(Type::RouteRefresh) => Value::RouteRefresh,
                Some(Type::GracefulRestart) => {
                    Value::GracefulRestart(GracefulRestart::from_bytes(&mut src)?)
                }
                Some(Type::FourOctetAsNumber) => {
                    Value::FourOctetAsNumber(FourOctetAsNumber::from_bytes(&mut src)?)
                }
                Some(Type::AddPath) => Value::AddPath(AddPath::from_bytes(&mut src)?),
                Some(Type::Fqdn) => Value::Fqdn(Fqdn::from_bytes(&mut src)?),
                Some(Type::CiscoRouteRefresh) => Value::CiscoRouteRefresh,
                _ => Value::Unsupported(code, src.copy_to_bytes(src.len())),
            };
            if src.has_remaining() {
                // Accepting trailing octets would lose them on re-encode
                return Err(Error::InternalLength("capability value"));
            }
            cap.push(value);
        }
        Ok(Self(cap))
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let mut len = 0;
        for value in self.0 {
            dst.put_u8((&value).into());
            let len_pos = dst.len();
            dst.put_u8(0); // Placeholder for length
            let value_len = match value {
                Value::MultiProtocol(mp) => mp.to_bytes(dst),
                Value::RouteRefresh | Value::CiscoRouteRefresh => 0,
                Value::GracefulRestart(gr) => gr.to_bytes(dst),
                Value::FourOctetAsNumber(four) => four.asn.to_bytes(dst),
                Value::AddPath(ap) => ap.to_bytes(dst),
                Value::Fqdn(fqdn) => fqdn.to_bytes(dst),
                Value::Unsupported(_, data) => {
                    dst.put_slice(&data);
                    data.len()
                }
            };
            dst[len_pos] = u8::try_from(value_len).expect("Capability length overflow");
            len += value_len + 2; // Code and length
        }
        len
    }

    fn encoded_len(&self) -> usize {
        self.0
            .iter()
            .map(|v| {
                let len = match v {
                    Value::MultiProtocol(mp) => mp.encoded_len(),
                    Value::RouteRefresh | Value::CiscoRouteRefresh => 0,
                    Value::GracefulRestart(gr) => gr.encoded_len(),
                    Value::FourOctetAsNumber(_) => 4,
                    Value::AddPath(ap) => ap.encoded_len(),
                    Value::Fqdn(fqdn) => fqdn.encoded_len(),
                    Value::Unsupported(_, data) => data.len(),
                };
                len + 2 // Code and length
            })
            .sum()
    }
}

impl From<Vec<Value>> for Capabilities {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl Deref for Capabilities {
    type Target = Vec<Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Capabilities {
    /// Check if a specific capability is present
    pub fn has(&self, cap: &Value) -> bool {
        self.0.iter().any(|v| *v == *cap)
    }

    /// Check if the IPv4 unicast multi-protocol capability is present
    #[must_use]
    pub fn has_mp_ipv4_unicast(&self) -> bool {
        self.has(&Value::MultiProtocol(MultiProtocol {
            afi: Afi::Ipv4,
            safi: Safi::Unicast,
        }))
    }

    /// The peer's four-octet AS number, if advertised
    #[must_use]
    pub fn four_octet_as_number(&self) -> Option<u32> {
        self.0.iter().find_map(|v| {
            if let Value::FourOctetAsNumber(four) = v {
                Some(four.asn)
            } else {
                None
            }
        })
    }
}

/// BGP capability (RFC 3392/5492)
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// BGP multi-protocol capability (RFC 2858)
    MultiProtocol(MultiProtocol),
    /// BGP route refresh capability (RFC 2918)
    RouteRefresh,
    /// BGP graceful restart capability (RFC 4724)
    GracefulRestart(GracefulRestart),
    /// BGP four-octet AS number capability (RFC 6793)
    FourOctetAsNumber(FourOctetAsNumber),
    /// BGP additional-paths capability (RFC 7911)
    AddPath(AddPath),
    /// BGP FQDN capability (draft-walton-bgp-hostname-capability)
    Fqdn(Fqdn),
    /// Pre-standard route refresh capability used by Cisco routers
    CiscoRouteRefresh,
    /// Other unsupported capability
    Unsupported(u8, Bytes),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Type {
    MultiProtocol = 1,
    RouteRefresh = 2,
    GracefulRestart = 64,
    FourOctetAsNumber = 65,
    AddPath = 69,
    Fqdn = 73,
    CiscoRouteRefresh = 128,
}

impl From<&Value> for u8 {
    fn from(cap: &Value) -> Self {
        match cap {
            Value::MultiProtocol(_) => Type::MultiProtocol as u8,
            Value::RouteRefresh => Type::RouteRefresh as u8,
            Value::GracefulRestart(_) => Type::GracefulRestart as u8,
            Value::FourOctetAsNumber(_) => Type::FourOctetAsNumber as u8,
            Value::AddPath(_) => Type::AddPath as u8,
            Value::Fqdn(_) => Type::Fqdn as u8,
            Value::CiscoRouteRefresh => Type::CiscoRouteRefresh as u8,
            Value::Unsupported(code, _) => *code,
        }
    }
}

/// BGP multi-protocol capability value field (RFC 2858 Section 7)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultiProtocol {
    pub afi: Afi,
    pub safi: Safi,
}

impl Component for MultiProtocol {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        check_remaining_len!(src, 4, "multi-protocol capability");
        let afi = src.get_u16();
        let afi = Afi::try_from(afi).map_err(|_| Error::InternalType("MultiProtocol AFI", afi))?;
        let _ = src.get_u8(); // Reserved
        let safi = src.get_u8();
        let safi = Safi::try_from(safi)
            .map_err(|_| Error::InternalType("MultiProtocol SAFI", u16::from(safi)))?;
        Ok(Self { afi, safi })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(0); // Reserved
        dst.put_u8(self.safi as u8);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

/// BGP address family identifier
///
/// # References
/// [Address Family Numbers](https://www.iana.org/assignments/address-family-numbers/address-family-numbers.xhtml)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u16)]
pub enum Afi {
    Ipv4 = 1,
    Ipv6 = 2,
}

/// BGP subsequent address family identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[non_exhaustive]
#[repr(u8)]
pub enum Safi {
    Unicast = 1,
    Multicast = 2,
}

/// BGP graceful restart capability value field (RFC 4724 Section 3)
///
/// Only the restart flag and the 12-bit restart time are understood; a
/// capability carrying per-AFI forwarding state falls back to the raw
/// parameter representation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GracefulRestart {
    pub restart: bool,
    pub restart_time: u16,
}

impl Component for GracefulRestart {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        check_remaining_len!(src, 2, "graceful restart capability");
        let value = src.get_u16();
        if value & 0x7000 != 0 {
            // Reserved bits would be lost on re-encode
            return Err(Error::InternalType("graceful restart flags", value));
        }
        Ok(Self {
            restart: value & 0x8000 != 0,
            restart_time: value & 0x0fff,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let flag = if self.restart { 0x8000 } else { 0 };
        dst.put_u16(flag | (self.restart_time & 0x0fff));
        2
    }

    fn encoded_len(&self) -> usize {
        2
    }
}

/// BGP four-octet AS number capability value field (RFC 6793)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FourOctetAsNumber {
    pub asn: u32,
}

impl Component for FourOctetAsNumber {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        check_remaining_len!(src, 4, "four-octet AS number capability");
        Ok(Self { asn: src.get_u32() })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u32(self.asn);
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

impl From<u32> for FourOctetAsNumber {
    fn from(asn: u32) -> Self {
        Self { asn }
    }
}

impl Deref for FourOctetAsNumber {
    type Target = u32;

    fn deref(&self) -> &Self::Target {
        &self.asn
    }
}

/// BGP additional-paths capability value field (RFC 7911 Section 4)
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AddPath {
    pub afi: Afi,
    pub safi: Safi,
    pub direction: AddPathDirection,
}

/// Send/Receive field of the additional-paths capability
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum AddPathDirection {
    Receive = 1,
    Send = 2,
    SendReceive = 3,
}

impl Component for AddPath {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        check_remaining_len!(src, 4, "additional-paths capability");
        let afi = src.get_u16();
        let afi = Afi::try_from(afi).map_err(|_| Error::InternalType("AddPath AFI", afi))?;
        let safi = src.get_u8();
        let safi = Safi::try_from(safi)
            .map_err(|_| Error::InternalType("AddPath SAFI", u16::from(safi)))?;
        let direction = src.get_u8();
        let direction = AddPathDirection::try_from(direction)
            .map_err(|_| Error::InternalType("AddPath direction", u16::from(direction)))?;
        Ok(Self {
            afi,
            safi,
            direction,
        })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(self.safi as u8);
        dst.put_u8(self.direction as u8);
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

/// BGP FQDN capability value field (draft-walton-bgp-hostname-capability-02)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fqdn {
    pub hostname: String,
    pub domain: String,
}

impl Fqdn {
    fn string_from_bytes(src: &mut Bytes, name: &'static str) -> Result<String, Error> {
        check_remaining_len!(src, 1, name);
        let len = src.get_u8() as usize;
        check_remaining_len!(src, len, name);
        let raw = src.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| Error::InternalUtf8(name))
    }
}

impl Component for Fqdn {
    fn from_bytes(src: &mut Bytes) -> Result<Self, Error> {
        let hostname = Self::string_from_bytes(src, "FQDN hostname")?;
        let domain = Self::string_from_bytes(src, "FQDN domain")?;
        Ok(Self { hostname, domain })
    }

    fn to_bytes(self, dst: &mut bytes::BytesMut) -> usize {
        let len = self.encoded_len();
        dst.put_u8(u8::try_from(self.hostname.len()).expect("FQDN hostname length overflow"));
        dst.put_slice(self.hostname.as_bytes());
        dst.put_u8(u8::try_from(self.domain.len()).expect("FQDN domain length overflow"));
        dst.put_slice(self.domain.as_bytes());
        len
    }

    fn encoded_len(&self) -> usize {
        2 + self.hostname.len() + self.domain.len()
    }
}

/// Builder for BGP capabilities
#[derive(Debug, Default)]
pub struct CapabilitiesBuilder {
    data: Vec<Value>,
}

impl CapabilitiesBuilder {
    /// Create a new capabilities builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a multi-protocol capability
    #[must_use]
    pub fn multi_protocol(mut self, afi: Afi, safi: Safi) -> Self {
        self.data
            .push(Value::MultiProtocol(MultiProtocol { afi, safi }));
        self
    }

    /// Shortcut for adding an IPv4 unicast multi-protocol capability
    #[must_use]
    pub fn mp_ipv4_unicast(self) -> Self {
        self.multi_protocol(Afi::Ipv4, Safi::Unicast)
    }

    /// Add a route refresh capability
    #[must_use]
    pub fn route_refresh(mut self) -> Self {
        self.data.push(Value::RouteRefresh);
        self
    }

    /// Add a graceful restart capability
    #[must_use]
    pub fn graceful_restart(mut self, restart: bool, restart_time: u16) -> Self {
        self.data.push(Value::GracefulRestart(GracefulRestart {
            restart,
            restart_time,
        }));
        self
    }

    /// Add a four-octet AS number capability
    #[must_use]
    pub fn four_octet_as_number(mut self, asn: u32) -> Self {
        self.data
            .push(Value::FourOctetAsNumber(FourOctetAsNumber { asn }));
        self
    }

    /// Add an additional-paths capability
    #[must_use]
    pub fn add_path(mut self, afi: Afi, safi: Safi, direction: AddPathDirection) -> Self {
        self.data.push(Value::AddPath(AddPath {
            afi,
            safi,
            direction,
        }));
        self
    }

    /// Add an FQDN capability
    #[must_use]
    pub fn fqdn(mut self, hostname: &str, domain: &str) -> Self {
        self.data.push(Value::Fqdn(Fqdn {
            hostname: hostname.to_string(),
            domain: domain.to_string(),
        }));
        self
    }

    /// Add a Cisco pre-standard route refresh capability
    #[must_use]
    pub fn cisco_route_refresh(mut self) -> Self {
        self.data.push(Value::CiscoRouteRefresh);
        self
    }

    /// Add an unsupported capability
    #[must_use]
    pub fn other(mut self, code: u8, data: Bytes) -> Self {
        self.data.push(Value::Unsupported(code, data));
        self
    }

    /// Build the capabilities
    #[must_use]
    pub fn build(self) -> Capabilities {
        Capabilities(self.data)
    }
}
