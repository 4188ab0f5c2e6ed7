//! Build UPDATE messages.

// SPDX-License-Identifier: AGPL-3.0-or-later

use super::path::{self, AsSegmentType, Origin, PathAttributes};
use super::route::{Route, Routes};
use super::Update;
use bytes::{BufMut, BytesMut};

/// Builder for UPDATE message bodies.
///
/// Announcements only: the withdrawn-routes list is always empty, and the
/// attribute set is ORIGIN, AS_PATH, NEXT_HOP in that order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UpdateBuilder {
    origin: Option<Origin>,
    as_path: Option<(AsSegmentType, Vec<u32>)>,
    next_hop: Option<std::net::Ipv4Addr>,
    nlri: Routes,
}

impl UpdateBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the origin.
    #[must_use]
    pub fn set_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set the AS path to a single segment.
    #[must_use]
    pub fn set_as_path(mut self, type_: AsSegmentType, asns: Vec<u32>) -> Self {
        self.as_path = Some((type_, asns));
        self
    }

    /// Set the next hop.
    #[must_use]
    pub fn set_next_hop(mut self, next_hop: std::net::Ipv4Addr) -> Self {
        self.next_hop = Some(next_hop);
        self
    }

    /// Announce a single route.
    #[must_use]
    pub fn add_route(mut self, route: Route) -> Self {
        self.nlri.0.push(route);
        self
    }

    /// Announce some routes.
    #[must_use]
    pub fn add_routes(mut self, routes: Routes) -> Self {
        self.nlri.0.extend(routes.0);
        self
    }

    /// Build the UPDATE body.
    #[must_use]
    pub fn build(self) -> Update {
        let mut attributes = PathAttributes::default();
        if let Some(origin) = self.origin {
            attributes.0.push(path::Value::origin(origin));
        }
        if let Some((type_, asns)) = self.as_path {
            attributes.0.push(path::Value::as_path(type_, asns));
        }
        if let Some(next_hop) = self.next_hop {
            attributes.0.push(path::Value::next_hop(next_hop));
        }
        let mut body =
            BytesMut::with_capacity(2 + 2 + attributes.encoded_len() + self.nlri.encoded_len());
        body.put_u16(0); // Withdrawn routes length: nothing is ever withdrawn
        let tpa_len_pos = body.len();
        body.put_u16(0); // Placeholder for total path attributes length
        let tpa_len = attributes.to_bytes(&mut body);
        body[tpa_len_pos..tpa_len_pos + 2].copy_from_slice(
            &(u16::try_from(tpa_len)
                .expect("Total path attributes length overflow")
                .to_be_bytes()),
        );
        self.nlri.to_bytes(&mut body);
        Update(body.freeze())
    }
}
