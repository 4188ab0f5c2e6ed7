//! Neighbor configuration records.
//!
//! The benchmark is entirely config-driven: one TOML `[[peer]]` table per
//! neighbor, no state across restarts.

// SPDX-License-Identifier: AGPL-3.0-or-later

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration file
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// One entry per BGP neighbor
    #[serde(default, rename = "peer")]
    pub peers: Vec<PeerConfig>,
}

/// One BGP neighbor
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    /// Remote IPv4 address
    pub neighbor: Ipv4Addr,
    /// Remote TCP port
    #[serde(default = "default_neighbor_port")]
    pub neighbor_port: u16,
    /// Expected peer AS; informational, never checked against the peer OPEN
    pub remote_as: u32,
    /// IPv4 bind address for the outbound socket
    pub local_address: Ipv4Addr,
    /// Local AS, advertised in the OPEN and the four-octet AS capability
    pub local_as: u32,
    /// BGP identifier advertised in the OPEN
    pub router_id: Ipv4Addr,
    /// First IPv4 /32 prefix to announce
    pub prefix_start: Ipv4Addr,
    /// Number of sequential /32 prefixes to announce; 0 sends none
    #[serde(default)]
    pub prefix_amount: u32,
}

fn default_neighbor_port() -> u16 {
    179
}

impl Config {
    /// Load the configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
