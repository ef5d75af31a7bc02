//! Kernel network stack as seen by the reconcilers.
//!
//! [`NetworkStack`] is the seam between reconciliation logic and the
//! kernel. The production implementation is [`netlink::Connection`];
//! tests substitute an in-memory stack. Add and delete operations report
//! an [`Outcome`] instead of failing when the kernel already matches.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};

use crate::addr::{IpPrefix, MacAddr};
use crate::error::Result;
use crate::netlink::types::{rt_scope, rt_table, rtn, rtprot};
use crate::netlink::{self, AddressRequest, Ipv4Route, RouteMessage};

/// Whether a mutation changed kernel state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Unchanged,
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// A network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub index: u32,
    pub name: String,
    /// Current hardware address.
    pub address: Option<MacAddr>,
    /// Burnt-in hardware address, unaffected by spoofing.
    pub perm_address: Option<MacAddr>,
    pub up: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteScope {
    Universe,
    Link,
    Host,
    Other(u8),
}

impl From<u8> for RouteScope {
    fn from(v: u8) -> Self {
        match v {
            rt_scope::UNIVERSE => Self::Universe,
            rt_scope::LINK => Self::Link,
            rt_scope::HOST => Self::Host,
            other => Self::Other(other),
        }
    }
}

impl From<RouteScope> for u8 {
    fn from(s: RouteScope) -> u8 {
        match s {
            RouteScope::Universe => rt_scope::UNIVERSE,
            RouteScope::Link => rt_scope::LINK,
            RouteScope::Host => rt_scope::HOST,
            RouteScope::Other(v) => v,
        }
    }
}

/// Originator of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProtocol {
    Kernel,
    Boot,
    Static,
    Dhcp,
    Other(u8),
}

impl From<u8> for RouteProtocol {
    fn from(v: u8) -> Self {
        match v {
            rtprot::KERNEL => Self::Kernel,
            rtprot::BOOT => Self::Boot,
            rtprot::STATIC => Self::Static,
            rtprot::DHCP => Self::Dhcp,
            other => Self::Other(other),
        }
    }
}

impl From<RouteProtocol> for u8 {
    fn from(p: RouteProtocol) -> u8 {
        match p {
            RouteProtocol::Kernel => rtprot::KERNEL,
            RouteProtocol::Boot => rtprot::BOOT,
            RouteProtocol::Static => rtprot::STATIC,
            RouteProtocol::Dhcp => rtprot::DHCP,
            RouteProtocol::Other(v) => v,
        }
    }
}

/// An IPv4 route in the main table. Metric is not part of a route's
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub destination: Ipv4Addr,
    pub prefix_len: u8,
    pub gateway: Option<Ipv4Addr>,
    pub source: Option<Ipv4Addr>,
    pub scope: RouteScope,
    pub protocol: RouteProtocol,
    pub oif: u32,
}

impl fmt::Display for RouteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix_len == 0 {
            f.write_str("default")?;
        } else {
            write!(f, "{}/{}", self.destination, self.prefix_len)?;
        }
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        write!(f, " dev {}", self.oif)?;
        if let Some(src) = self.source {
            write!(f, " src {}", src)?;
        }
        Ok(())
    }
}

/// Link, address and route operations the reconcilers need.
pub trait NetworkStack: Send + Sync {
    fn links(&self) -> impl Future<Output = Result<Vec<Link>>> + Send;

    fn set_hardware_addr(&self, index: u32, addr: MacAddr) -> impl Future<Output = Result<()>> + Send;

    fn rename_link(&self, index: u32, name: &str) -> impl Future<Output = Result<()>> + Send;

    fn set_link_up(&self, index: u32, up: bool) -> impl Future<Output = Result<()>> + Send;

    /// Assign an address; IPv4 addresses carry their broadcast address.
    fn assign_address(
        &self,
        index: u32,
        addr: IpPrefix,
    ) -> impl Future<Output = Result<Outcome>> + Send;

    /// Unicast routes in the main table leaving through `oif`.
    fn routes(&self, oif: u32) -> impl Future<Output = Result<Vec<RouteSpec>>> + Send;

    fn install_route(&self, route: &RouteSpec) -> impl Future<Output = Result<Outcome>> + Send;

    fn remove_route(&self, route: &RouteSpec) -> impl Future<Output = Result<Outcome>> + Send;
}

fn to_kernel(route: &RouteSpec) -> Ipv4Route {
    Ipv4Route {
        destination: route.destination,
        prefix_len: route.prefix_len,
        gateway: route.gateway,
        prefsrc: route.source,
        oif: route.oif,
        protocol: route.protocol.into(),
        scope: route.scope.into(),
    }
}

fn from_kernel(msg: &RouteMessage) -> RouteSpec {
    let v4 = |addr: Option<IpAddr>| match addr {
        Some(IpAddr::V4(a)) => Some(a),
        _ => None,
    };
    RouteSpec {
        destination: v4(msg.destination()).unwrap_or(Ipv4Addr::UNSPECIFIED),
        prefix_len: msg.dst_len(),
        gateway: v4(msg.gateway()),
        source: v4(msg.prefsrc()),
        scope: msg.scope().into(),
        protocol: msg.protocol().into(),
        oif: msg.oif().unwrap_or(0),
    }
}

fn absorb(result: netlink::Result<()>, benign: fn(&netlink::Error) -> bool) -> Result<Outcome> {
    match result {
        Ok(()) => Ok(Outcome::Applied),
        Err(e) if benign(&e) => Ok(Outcome::Unchanged),
        Err(e) => Err(e.into()),
    }
}

impl NetworkStack for netlink::Connection {
    async fn links(&self) -> Result<Vec<Link>> {
        let links = self.get_links().await?;
        Ok(links
            .iter()
            .map(|l| Link {
                index: l.ifindex(),
                name: l.name().unwrap_or_default().to_string(),
                address: l.address().map(MacAddr::from),
                perm_address: l.perm_address().map(MacAddr::from),
                up: l.is_up(),
            })
            .collect())
    }

    async fn set_hardware_addr(&self, index: u32, addr: MacAddr) -> Result<()> {
        Ok(self.set_link_address_by_index(index, addr.octets()).await?)
    }

    async fn rename_link(&self, index: u32, name: &str) -> Result<()> {
        Ok(self.set_link_name_by_index(index, name).await?)
    }

    async fn set_link_up(&self, index: u32, up: bool) -> Result<()> {
        Ok(self.set_link_state_by_index(index, up).await?)
    }

    async fn assign_address(&self, index: u32, addr: IpPrefix) -> Result<Outcome> {
        let mut request = AddressRequest::new(index, addr.addr, addr.len);
        if let Some(brd) = addr.broadcast() {
            request = request.broadcast(brd);
        }
        absorb(self.add_address(request).await, netlink::Error::is_already_exists)
    }

    async fn routes(&self, oif: u32) -> Result<Vec<RouteSpec>> {
        let routes = self.get_routes_v4().await?;
        Ok(routes
            .iter()
            .filter(|r| r.table_id() == u32::from(rt_table::MAIN))
            .filter(|r| r.route_type() == rtn::UNICAST)
            .filter(|r| r.oif() == Some(oif))
            .map(from_kernel)
            .collect())
    }

    async fn install_route(&self, route: &RouteSpec) -> Result<Outcome> {
        absorb(
            self.add_route_v4(&to_kernel(route)).await,
            netlink::Error::is_already_exists,
        )
    }

    async fn remove_route(&self, route: &RouteSpec) -> Result<Outcome> {
        absorb(
            self.del_route_v4(&to_kernel(route)).await,
            netlink::Error::is_not_found,
        )
    }
}
