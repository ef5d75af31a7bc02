//! Uplink route reconciliation.

use std::net::{IpAddr, Ipv4Addr};

use crate::error::Result;
use crate::lease::Dhcp4Lease;
use crate::stack::{NetworkStack, RouteProtocol, RouteScope, RouteSpec};

/// Routes implied by a DHCPv4 lease, in installation order.
///
/// The subnet and router host routes come first so the gateway of the
/// default route is reachable when it is added. An unusable lease implies
/// no routes.
pub fn derive_routes(lease: &Dhcp4Lease, oif: u32) -> Result<Vec<RouteSpec>> {
    let (Some(client), Some(router)) = (lease.client_ip, lease.router) else {
        return Ok(Vec::new());
    };
    if !lease.is_valid() {
        return Ok(Vec::new());
    }

    let mut routes = Vec::with_capacity(3);

    if let Some(prefix) = lease.address()? {
        if let IpAddr::V4(network) = prefix.network() {
            routes.push(RouteSpec {
                destination: network,
                prefix_len: prefix.len,
                gateway: None,
                source: Some(client),
                scope: RouteScope::Link,
                protocol: RouteProtocol::Kernel,
                oif,
            });
        }
    }

    routes.push(RouteSpec {
        destination: router,
        prefix_len: 32,
        gateway: None,
        source: Some(client),
        scope: RouteScope::Link,
        protocol: RouteProtocol::Dhcp,
        oif,
    });

    routes.push(RouteSpec {
        destination: Ipv4Addr::UNSPECIFIED,
        prefix_len: 0,
        gateway: Some(router),
        source: Some(client),
        scope: RouteScope::Universe,
        protocol: RouteProtocol::Dhcp,
        oif,
    });

    Ok(routes)
}

/// Replace the uplink's main-table routes with those the lease implies.
///
/// Stale routes are removed before missing ones are added. Without a
/// usable lease nothing is touched. Returns a description of each change.
pub async fn reconcile_routes<S: NetworkStack>(
    stack: &S,
    uplink_index: u32,
    dhcp4: Option<&Dhcp4Lease>,
) -> Result<Vec<String>> {
    let wanted = match dhcp4 {
        Some(lease) => derive_routes(lease, uplink_index)?,
        None => Vec::new(),
    };
    if wanted.is_empty() {
        tracing::debug!(uplink_index, "no usable DHCPv4 lease, leaving routes alone");
        return Ok(Vec::new());
    }

    let current = stack.routes(uplink_index).await?;
    let mut changes = Vec::new();

    for stale in current.iter().filter(|r| !wanted.contains(r)) {
        if stack.remove_route(stale).await?.is_applied() {
            tracing::info!(route = %stale, "removed stale route");
            changes.push(format!("removed route {}", stale));
        }
    }

    for route in wanted.iter().filter(|r| !current.contains(r)) {
        if stack.install_route(route).await?.is_applied() {
            tracing::info!(%route, "added route");
            changes.push(format!("added route {}", route));
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::fake::FakeStack;

    fn lease() -> Dhcp4Lease {
        serde_json::from_str(
            r#"{"valid_until":"2018-05-18T23:46:04.429895261+02:00","client_ip":"85.195.207.62",
                "subnet_mask":"255.255.255.128","router":"85.195.207.1",
                "dns":["77.109.128.2","213.144.129.20"]}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_derive_routes() {
        let routes = derive_routes(&lease(), 2).unwrap();
        let rendered: Vec<String> = routes.iter().map(|r| r.to_string()).collect();
        assert_eq!(
            rendered,
            [
                "85.195.207.0/25 dev 2 src 85.195.207.62",
                "85.195.207.1/32 dev 2 src 85.195.207.62",
                "default via 85.195.207.1 dev 2 src 85.195.207.62",
            ]
        );
        assert_eq!(routes[0].protocol, RouteProtocol::Kernel);
        assert_eq!(routes[2].scope, RouteScope::Universe);
    }

    #[test]
    fn test_unusable_lease_derives_nothing() {
        let no_router = Dhcp4Lease {
            router: None,
            ..lease()
        };
        assert!(derive_routes(&no_router, 2).unwrap().is_empty());

        let no_expiry = Dhcp4Lease {
            valid_until: None,
            ..lease()
        };
        assert!(derive_routes(&no_expiry, 2).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_routes_replaced() {
        let stack = FakeStack::default();
        let stale = RouteSpec {
            destination: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
            gateway: Some(Ipv4Addr::new(10, 0, 0, 1)),
            source: Some(Ipv4Addr::new(10, 0, 0, 2)),
            scope: RouteScope::Universe,
            protocol: RouteProtocol::Dhcp,
            oif: 2,
        };
        let other_link = RouteSpec { oif: 3, ..stale };
        stack.routes.lock().unwrap().extend([stale, other_link]);

        let changes = reconcile_routes(&stack, 2, Some(&lease())).await.unwrap();
        assert_eq!(changes.len(), 4);

        let routes = stack.routes.lock().unwrap().clone();
        assert!(!routes.contains(&stale));
        assert!(routes.contains(&other_link));
        assert_eq!(routes.len(), 4);
    }

    #[tokio::test]
    async fn test_second_pass_is_noop() {
        let stack = FakeStack::default();
        reconcile_routes(&stack, 2, Some(&lease())).await.unwrap();
        let before = stack.routes.lock().unwrap().clone();

        let changes = reconcile_routes(&stack, 2, Some(&lease())).await.unwrap();
        assert!(changes.is_empty());
        assert_eq!(*stack.routes.lock().unwrap(), before);
    }

    #[tokio::test]
    async fn test_no_lease_touches_nothing() {
        let stack = FakeStack::default();
        let existing = RouteSpec {
            destination: Ipv4Addr::UNSPECIFIED,
            prefix_len: 0,
            gateway: Some(Ipv4Addr::new(10, 0, 0, 1)),
            source: None,
            scope: RouteScope::Universe,
            protocol: RouteProtocol::Boot,
            oif: 2,
        };
        stack.routes.lock().unwrap().push(existing);

        assert!(reconcile_routes(&stack, 2, None).await.unwrap().is_empty());
        assert_eq!(*stack.routes.lock().unwrap(), vec![existing]);
    }
}
