//! BGP NLRI routes
//!
//! These structures correspond to BGP's NLRI fields: a prefix length octet
//! followed by the minimum number of prefix octets. Composition only, as
//! with path attributes.

// SPDX-License-Identifier: AGPL-3.0-or-later

use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use std::ops::Deref;

/// Compute the number of prefix octets from the prefix length
fn n_prefix_octets(prefix_len: u8) -> usize {
    #[allow(clippy::verbose_bit_mask)]
    let result = if prefix_len & 0x07 == 0 {
        prefix_len >> 3
    } else {
        (prefix_len >> 3) + 1
    };
    usize::from(result)
}

/// One NLRI entry: a prefix length and the octets that cover it
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub prefix_len: u8,
    pub prefix: Bytes,
}

impl Route {
    /// A host route (/32) for a single IPv4 address
    #[must_use]
    pub fn host(addr: Ipv4Addr) -> Self {
        (addr, 32).into()
    }

    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        dst.put_u8(self.prefix_len);
        dst.put_slice(&self.prefix);
        1 + self.prefix.len()
    }

    pub fn encoded_len(&self) -> usize {
        1 + self.prefix.len()
    }
}

impl From<(Ipv4Addr, u8)> for Route {
    fn from((addr, prefix_len): (Ipv4Addr, u8)) -> Self {
        let n_prefix_octets = n_prefix_octets(prefix_len);
        let prefix = Bytes::copy_from_slice(&addr.octets()[..n_prefix_octets]);
        Self { prefix_len, prefix }
    }
}

/// A compact list of NLRI entries without a length field
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Routes(pub Vec<Route>);

impl Routes {
    pub fn to_bytes(self, dst: &mut BytesMut) -> usize {
        let mut len = 0;
        for route in self.0 {
            len += route.to_bytes(dst);
        }
        len
    }

    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(Route::encoded_len).sum()
    }
}

impl Deref for Routes {
    type Target = Vec<Route>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<I, T> From<I> for Routes
where
    I: IntoIterator<Item = T>,
    T: Into<Route>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
