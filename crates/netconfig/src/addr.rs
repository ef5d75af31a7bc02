//! Hardware and IP prefix types with parsing and formatting.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error type for address parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddrError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("non-contiguous netmask: {0}")]
    InvalidNetmask(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// A 48-bit Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddr {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(AddrError::InvalidMac(s.to_string()));
        }

        let mut mac = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() || part.len() > 2 {
                return Err(AddrError::InvalidMac(s.to_string()));
            }
            mac[i] =
                u8::from_str_radix(part, 16).map_err(|_| AddrError::InvalidMac(s.to_string()))?;
        }

        Ok(Self(mac))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = AddrError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> String {
        mac.to_string()
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// An address with prefix length (CIDR notation), host bits preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpPrefix {
    pub addr: IpAddr,
    pub len: u8,
}

impl IpPrefix {
    /// Create a prefix, validating the length for the address family.
    pub fn new(addr: IpAddr, len: u8) -> Result<Self> {
        let max = max_prefix_len(&addr);
        if len > max {
            return Err(AddrError::InvalidPrefix(format!(
                "{} exceeds maximum {} for address family",
                len, max
            )));
        }
        Ok(Self { addr, len })
    }

    /// The network address (host bits cleared).
    pub fn network(&self) -> IpAddr {
        match self.addr {
            IpAddr::V4(a) => IpAddr::V4(Ipv4Addr::from(u32::from(a) & v4_mask(self.len))),
            IpAddr::V6(a) => IpAddr::V6(Ipv6Addr::from(u128::from(a) & v6_mask(self.len))),
        }
    }

    /// IPv4 broadcast address; `None` for IPv6 and for /31 and /32.
    pub fn broadcast(&self) -> Option<Ipv4Addr> {
        match self.addr {
            IpAddr::V4(a) if self.len < 31 => Some(Ipv4Addr::from(u32::from(a) | !v4_mask(self.len))),
            _ => None,
        }
    }

    pub fn contains(&self, other: IpAddr) -> bool {
        match (self.addr, other) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = v4_mask(self.len);
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = v6_mask(self.len);
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpPrefix {
    type Err = AddrError;

    fn from_str(s: &str) -> Result<Self> {
        let Some((addr_str, len_str)) = s.split_once('/') else {
            let addr = parse_addr(s)?;
            return Ok(Self {
                addr,
                len: max_prefix_len(&addr),
            });
        };

        let addr = parse_addr(addr_str)?;
        let len: u8 = len_str
            .parse()
            .map_err(|_| AddrError::InvalidPrefix(len_str.to_string()))?;
        Self::new(addr, len)
    }
}

impl TryFrom<String> for IpPrefix {
    type Error = AddrError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<IpPrefix> for String {
    fn from(prefix: IpPrefix) -> String {
        prefix.to_string()
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

/// Parse an IP address from string.
pub fn parse_addr(s: &str) -> Result<IpAddr> {
    s.parse()
        .map_err(|_| AddrError::InvalidAddress(s.to_string()))
}

/// Prefix length of a contiguous netmask given as raw bytes (4 or 16 of them).
pub fn mask_prefix_len(mask: &[u8]) -> Result<u8> {
    let ones: u32 = mask.iter().map(|b| b.count_ones()).sum();
    let bits = mask.len() as u32 * 8;
    if mask.is_empty() || bits > 128 {
        return Err(AddrError::InvalidNetmask(format!("{:02x?}", mask)));
    }

    // Contiguous iff the leading ones account for all set bits
    let leading: u32 = mask
        .iter()
        .scan(true, |still_ones, b| {
            if !*still_ones {
                return Some(0);
            }
            let n = b.leading_ones();
            *still_ones = n == 8;
            Some(n)
        })
        .sum();

    if leading != ones {
        return Err(AddrError::InvalidNetmask(format!("{:02x?}", mask)));
    }
    Ok(ones as u8)
}

/// Prefix length of a dotted-quad IPv4 netmask.
pub fn netmask_prefix_len(mask: Ipv4Addr) -> Result<u8> {
    mask_prefix_len(&mask.octets()).map_err(|_| AddrError::InvalidNetmask(mask.to_string()))
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    if addr.is_ipv4() { 32 } else { 128 }
}

fn v4_mask(len: u8) -> u32 {
    if len == 0 { 0 } else { u32::MAX << (32 - len as u32) }
}

fn v6_mask(len: u8) -> u128 {
    if len == 0 { 0 } else { u128::MAX << (128 - len as u32) }
}
