//! DHCP lease documents written by the DHCPv4 and DHCPv6 clients.
//!
//! Both clients serialise their current lease as JSON under
//! `<config_root>/dhcp{4,6}/wire/lease.json`. A missing document means the
//! client has not obtained a lease yet. Empty strings stand in for absent
//! addresses, and the zero timestamp (`0001-01-01T00:00:00Z`) for an absent
//! expiry.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer};

use crate::addr::{IpPrefix, mask_prefix_len, netmask_prefix_len};
use crate::config::read_document;
use crate::error::{Error, Result};

pub const DHCP4_LEASE_FILE: &str = "dhcp4/wire/lease.json";
pub const DHCP6_LEASE_FILE: &str = "dhcp6/wire/lease.json";

/// The most recent DHCPv4 lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dhcp4Lease {
    #[serde(default, deserialize_with = "timestamp")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "optional_addr")]
    pub client_ip: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "optional_addr")]
    pub subnet_mask: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "optional_addr")]
    pub router: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "list")]
    pub dns: Vec<IpAddr>,
}

impl Dhcp4Lease {
    /// Whether the lease carries an expiry at all.
    ///
    /// An expiry in the past still counts: the client rewrites the document
    /// on renewal, and tearing down the uplink is not this crate's job.
    pub fn is_valid(&self) -> bool {
        self.valid_until.is_some() && self.client_ip.is_some()
    }

    /// Client address with the lease's prefix length.
    pub fn address(&self) -> Result<Option<IpPrefix>> {
        let (Some(ip), Some(mask)) = (self.client_ip, self.subnet_mask) else {
            return Ok(None);
        };
        let len = netmask_prefix_len(mask).map_err(|e| Error::InvalidConfig {
            path: DHCP4_LEASE_FILE.into(),
            message: e.to_string(),
        })?;
        Ok(Some(IpPrefix {
            addr: IpAddr::V4(ip),
            len,
        }))
    }
}

/// A prefix delegated by the upstream DHCPv6 server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DelegatedPrefix {
    #[serde(rename = "IP")]
    pub ip: Ipv6Addr,
    /// Raw netmask bytes.
    #[serde(rename = "Mask", deserialize_with = "base64_bytes")]
    pub mask: Vec<u8>,
}

impl DelegatedPrefix {
    pub fn prefix(&self) -> Result<IpPrefix> {
        let len = mask_prefix_len(&self.mask).map_err(|e| Error::InvalidConfig {
            path: DHCP6_LEASE_FILE.into(),
            message: e.to_string(),
        })?;
        IpPrefix::new(IpAddr::V6(self.ip), len).map_err(|e| Error::InvalidConfig {
            path: DHCP6_LEASE_FILE.into(),
            message: e.to_string(),
        })
    }

    /// The router's own address in the delegation: host `::1` of its first /64.
    pub fn lan_address(&self) -> Result<IpPrefix> {
        let host_bits = 128 - u32::from(self.prefix()?.len);
        let network = u128::from(self.ip)
            .checked_shr(host_bits)
            .map_or(0, |n| n << host_bits);
        let first64 = network & (u128::MAX << 64);
        Ok(IpPrefix {
            addr: IpAddr::V6(Ipv6Addr::from(first64 | 1)),
            len: 64,
        })
    }
}

/// The most recent DHCPv6 lease.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Dhcp6Lease {
    #[serde(default, deserialize_with = "timestamp")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "list")]
    pub prefixes: Vec<DelegatedPrefix>,
    #[serde(default, deserialize_with = "list")]
    pub dns: Vec<IpAddr>,
}

/// Load the DHCPv4 lease; `None` when the client has not written one.
pub async fn load_dhcp4(config_root: &Path) -> Result<Option<Dhcp4Lease>> {
    let lease: Option<Dhcp4Lease> = read_document(&config_root.join(DHCP4_LEASE_FILE)).await?;
    if let Some(lease) = &lease {
        tracing::debug!(
            client_ip = ?lease.client_ip,
            router = ?lease.router,
            valid_until = ?lease.valid_until,
            "loaded DHCPv4 lease"
        );
    }
    Ok(lease)
}

/// Load the DHCPv6 lease; `None` when the client has not written one.
pub async fn load_dhcp6(config_root: &Path) -> Result<Option<Dhcp6Lease>> {
    let lease: Option<Dhcp6Lease> = read_document(&config_root.join(DHCP6_LEASE_FILE)).await?;
    if let Some(lease) = &lease {
        // Surface a malformed mask while loading rather than mid-reconcile
        for prefix in &lease.prefixes {
            prefix.prefix()?;
        }
        tracing::debug!(prefixes = lease.prefixes.len(), "loaded DHCPv6 lease");
    }
    Ok(lease)
}

fn timestamp<'de, D>(de: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let ts: Option<DateTime<Utc>> = Option::deserialize(de)?;
    Ok(ts.filter(|t| t.year() > 1))
}

fn optional_addr<'de, D>(de: D) -> std::result::Result<Option<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(de)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// The clients write an empty list as `null`.
fn list<'de, D, T>(de: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

fn base64_bytes<'de, D: Deserializer<'de>>(de: D) -> std::result::Result<Vec<u8>, D::Error> {
    let s = String::deserialize(de)?;
    STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
}
