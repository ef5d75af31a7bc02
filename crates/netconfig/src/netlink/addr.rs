//! Interface address queries and assignment.

use std::net::{IpAddr, Ipv4Addr};

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::types::{IfAddrMsg, ifa, rt_scope};

/// Address to assign to an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRequest {
    pub ifindex: u32,
    pub address: IpAddr,
    pub prefix_len: u8,
    pub broadcast: Option<Ipv4Addr>,
}

impl AddressRequest {
    pub fn new(ifindex: u32, address: IpAddr, prefix_len: u8) -> Self {
        Self {
            ifindex,
            address,
            prefix_len,
            broadcast: None,
        }
    }

    pub fn broadcast(mut self, broadcast: Ipv4Addr) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    fn build(&self) -> MessageBuilder {
        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        );

        let family = match self.address {
            IpAddr::V4(_) => libc::AF_INET,
            IpAddr::V6(_) => libc::AF_INET6,
        };
        builder.append(&IfAddrMsg {
            ifa_family: family as u8,
            ifa_prefixlen: self.prefix_len,
            ifa_flags: 0,
            ifa_scope: rt_scope::UNIVERSE,
            ifa_index: self.ifindex,
        });

        match self.address {
            IpAddr::V4(addr) => {
                builder.append_attr(ifa::LOCAL, &addr.octets());
                builder.append_attr(ifa::ADDRESS, &addr.octets());
                if let Some(brd) = self.broadcast {
                    builder.append_attr(ifa::BROADCAST, &brd.octets());
                }
            }
            IpAddr::V6(addr) => {
                builder.append_attr(ifa::ADDRESS, &addr.octets());
            }
        }

        builder
    }
}

impl Connection {
    /// Assign an address. Fails with EEXIST if it is already present.
    pub async fn add_address(&self, request: AddressRequest) -> Result<()> {
        self.request_ack(request.build()).await.map_err(|e| {
            e.with_context(format!(
                "add address {}/{} to link {}",
                request.address, request.prefix_len, request.ifindex
            ))
        })
    }
}
