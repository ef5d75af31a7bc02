//! Strongly-typed link and route messages.

use std::net::IpAddr;

use zerocopy::IntoBytes;

use super::attr::decode;
use super::parse::{FromNetlink, PResult, attributes, cut, header};
use super::types::{IfInfoMsg, RtMsg, iff, ifla, rta};

/// A network interface as reported by RTM_NEWLINK.
#[derive(Debug, Clone, Default)]
pub struct LinkMessage {
    pub(crate) header: IfInfoMsg,
    pub(crate) name: Option<String>,
    pub(crate) address: Option<[u8; 6]>,
    pub(crate) perm_address: Option<[u8; 6]>,
}

impl LinkMessage {
    /// Interface index.
    pub fn ifindex(&self) -> u32 {
        self.header.ifi_index as u32
    }

    /// Interface name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Current hardware address.
    pub fn address(&self) -> Option<[u8; 6]> {
        self.address
    }

    /// Permanent (factory) hardware address, when the driver reports one.
    pub fn perm_address(&self) -> Option<[u8; 6]> {
        self.perm_address
    }

    /// Whether the interface is administratively up.
    pub fn is_up(&self) -> bool {
        self.header.ifi_flags & iff::UP != 0
    }
}

impl FromNetlink for LinkMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfInfoMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let raw = header(input, IfInfoMsg::SIZE)?;
        let Ok(header) = IfInfoMsg::from_bytes(raw) else {
            return cut();
        };

        let mut msg = LinkMessage {
            header,
            ..Default::default()
        };

        for (kind, data) in attributes(input)? {
            match kind {
                ifla::IFNAME => msg.name = decode::string(data).ok().map(str::to_string),
                ifla::ADDRESS => msg.address = decode::mac(data),
                ifla::PERM_ADDRESS => msg.perm_address = decode::mac(data),
                _ => {}
            }
        }

        Ok(msg)
    }
}

/// A route as reported by RTM_NEWROUTE.
#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    pub(crate) header: RtMsg,
    pub(crate) destination: Option<IpAddr>,
    pub(crate) gateway: Option<IpAddr>,
    pub(crate) oif: Option<u32>,
    pub(crate) prefsrc: Option<IpAddr>,
    pub(crate) table: Option<u32>,
}

impl RouteMessage {
    pub fn family(&self) -> u8 {
        self.header.rtm_family
    }

    pub fn dst_len(&self) -> u8 {
        self.header.rtm_dst_len
    }

    pub fn protocol(&self) -> u8 {
        self.header.rtm_protocol
    }

    pub fn scope(&self) -> u8 {
        self.header.rtm_scope
    }

    pub fn route_type(&self) -> u8 {
        self.header.rtm_type
    }

    pub fn destination(&self) -> Option<IpAddr> {
        self.destination
    }

    pub fn gateway(&self) -> Option<IpAddr> {
        self.gateway
    }

    /// Output interface index.
    pub fn oif(&self) -> Option<u32> {
        self.oif
    }

    pub fn prefsrc(&self) -> Option<IpAddr> {
        self.prefsrc
    }

    /// Routing table ID; RTA_TABLE overrides the 8-bit header field.
    pub fn table_id(&self) -> u32 {
        self.table.unwrap_or(self.header.rtm_table as u32)
    }
}

impl FromNetlink for RouteMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(RtMsg::default().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let raw = header(input, RtMsg::SIZE)?;
        let Ok(header) = RtMsg::from_bytes(raw) else {
            return cut();
        };
        let family = header.rtm_family;

        let mut msg = RouteMessage {
            header,
            ..Default::default()
        };

        for (kind, data) in attributes(input)? {
            match kind {
                rta::DST => msg.destination = decode::ip_addr(data, family).ok(),
                rta::GATEWAY => msg.gateway = decode::ip_addr(data, family).ok(),
                rta::PREFSRC => msg.prefsrc = decode::ip_addr(data, family).ok(),
                rta::OIF => msg.oif = decode::u32_ne(data).ok(),
                rta::TABLE => msg.table = decode::u32_ne(data).ok(),
                _ => {}
            }
        }

        Ok(msg)
    }
}
