//! Route attributes (`struct rtattr`): a 4-byte length/type header
//! followed by the payload, padded to four bytes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use zerocopy::{Immutable, IntoBytes};

use super::error::{Error, Result};

pub const NLA_HDRLEN: usize = 4;

#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + 3) & !3
}

#[repr(C)]
#[derive(Debug, Clone, Copy, IntoBytes, Immutable)]
pub struct NlAttr {
    pub nla_len: u16,
    pub nla_type: u16,
}

impl NlAttr {
    pub fn new(attr_type: u16, payload_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + payload_len) as u16,
            nla_type: attr_type,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        IntoBytes::as_bytes(self)
    }
}

/// Typed views of attribute payloads.
pub mod decode {
    use super::*;

    fn fixed<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
        data.get(..N)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::Truncated {
                expected: N,
                actual: data.len(),
            })
    }

    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        fixed(data).map(u32::from_ne_bytes)
    }

    /// NUL-terminated string. A missing terminator takes the whole payload.
    pub fn string(data: &[u8]) -> Result<&str> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..end])
            .map_err(|e| Error::InvalidAttribute(format!("string is not UTF-8: {}", e)))
    }

    /// Ethernet address. Other link-layer lengths give `None`.
    pub fn mac(data: &[u8]) -> Option<[u8; 6]> {
        (data.len() == 6).then(|| fixed(data).ok()).flatten()
    }

    pub fn ip_addr(data: &[u8], family: u8) -> Result<IpAddr> {
        match i32::from(family) {
            libc::AF_INET => fixed::<4>(data).map(|o| IpAddr::V4(Ipv4Addr::from(o))),
            libc::AF_INET6 => fixed::<16>(data).map(|o| IpAddr::V6(Ipv6Addr::from(o))),
            other => Err(Error::InvalidAttribute(format!(
                "address family {} is neither inet nor inet6",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_string() {
        assert_eq!(decode::string(b"lo\0\0").unwrap(), "lo");
        assert_eq!(decode::string(b"eth0").unwrap(), "eth0");
        assert!(decode::string(&[0xff, 0xfe, 0]).is_err());
        assert_eq!(decode::u32_ne(&65536u32.to_ne_bytes()).unwrap(), 65536);
    }

    #[test]
    fn test_decode_addresses() {
        let v4 = decode::ip_addr(&[192, 168, 42, 1], libc::AF_INET as u8).unwrap();
        assert_eq!(v4.to_string(), "192.168.42.1");
        assert!(decode::ip_addr(&[1, 2], libc::AF_INET as u8).is_err());
        assert!(decode::ip_addr(&[0; 4], libc::AF_PACKET as u8).is_err());
        let mac = [0x02, 0x73, 0x53, 0x00, 0xca, 0xfe];
        assert_eq!(decode::mac(&mac), Some(mac));
        assert_eq!(decode::mac(&[0; 4]), None);
    }
}
