//! IPv4 route queries and changes.

use std::net::Ipv4Addr;

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::Result;
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::messages::RouteMessage;
use super::types::{RtMsg, rt_table, rta, rtn};

/// An IPv4 unicast route in the main table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Route {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Option<Ipv4Addr>,
    pub prefsrc: Option<Ipv4Addr>,
    pub oif: u32,
    pub protocol: u8,
    pub scope: u8,
}

impl Ipv4Route {
    fn header(&self) -> RtMsg {
        RtMsg {
            rtm_family: libc::AF_INET as u8,
            rtm_dst_len: self.prefix_len,
            rtm_table: rt_table::MAIN,
            rtm_protocol: self.protocol,
            rtm_scope: self.scope,
            rtm_type: rtn::UNICAST,
            ..Default::default()
        }
    }

    fn write_attrs(&self, builder: &mut MessageBuilder) {
        if self.prefix_len > 0 {
            builder.append_attr(rta::DST, &self.destination.octets());
        }
        if let Some(gw) = self.gateway {
            builder.append_attr(rta::GATEWAY, &gw.octets());
        }
        if let Some(src) = self.prefsrc {
            builder.append_attr(rta::PREFSRC, &src.octets());
        }
        builder.append_attr_u32(rta::OIF, self.oif);
    }

    fn build(&self) -> MessageBuilder {
        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWROUTE,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        );
        builder.append(&self.header());
        self.write_attrs(&mut builder);
        builder
    }

    fn build_delete(&self) -> MessageBuilder {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_DELROUTE, NLM_F_REQUEST | NLM_F_ACK);
        builder.append(&self.header());
        self.write_attrs(&mut builder);
        builder
    }
}

impl Connection {
    /// Dump all IPv4 routes.
    pub async fn get_routes_v4(&self) -> Result<Vec<RouteMessage>> {
        let routes: Vec<RouteMessage> = self.dump_typed(NlMsgType::RTM_GETROUTE).await?;
        Ok(routes
            .into_iter()
            .filter(|r| r.family() == libc::AF_INET as u8)
            .collect())
    }

    /// Add a route. Fails with EEXIST if an identical route is present.
    pub async fn add_route_v4(&self, route: &Ipv4Route) -> Result<()> {
        self.request_ack(route.build()).await.map_err(|e| {
            e.with_context(format!(
                "add route {}/{}",
                route.destination, route.prefix_len
            ))
        })
    }

    pub async fn del_route_v4(&self, route: &Ipv4Route) -> Result<()> {
        self.request_ack(route.build_delete()).await.map_err(|e| {
            e.with_context(format!(
                "delete route {}/{}",
                route.destination, route.prefix_len
            ))
        })
    }
}
