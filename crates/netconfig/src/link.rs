//! Link and address reconciliation.

use crate::addr::IpPrefix;
use crate::config::InterfaceConfig;
use crate::error::{Error, Result};
use crate::lease::{Dhcp4Lease, Dhcp6Lease};
use crate::stack::{Link, NetworkStack};

/// Part an interface plays in the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    /// Externally facing; addressed by the DHCPv4 lease.
    Uplink,
    /// Internal; addressed from the DHCPv6 delegation.
    Lan,
    Other,
}

/// Result of reconciling one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledLink {
    pub index: u32,
    pub name: String,
    /// Human-readable description of each change made.
    pub changes: Vec<String>,
}

/// Locate the kernel link for an interface declaration.
///
/// Tried in order: permanent address, current address, spoofed address
/// (the link was already reprogrammed by an earlier pass), and finally
/// the configured name.
pub fn find_link<'a>(links: &'a [Link], cfg: &InterfaceConfig) -> Option<&'a Link> {
    let hw = Some(cfg.hardware_addr);

    links
        .iter()
        .find(|l| l.perm_address == hw)
        .or_else(|| links.iter().find(|l| l.address == hw))
        .or_else(|| {
            cfg.spoof_hardware_addr
                .and_then(|spoof| links.iter().find(|l| l.address == Some(spoof)))
        })
        .or_else(|| links.iter().find(|l| l.name == cfg.name))
}

/// Converge one link: hardware address, name, state and addresses.
///
/// Addresses are only ever added; existing ones are left alone.
pub async fn reconcile_link<S: NetworkStack>(
    stack: &S,
    cfg: &InterfaceConfig,
    role: LinkRole,
    dhcp4: Option<&Dhcp4Lease>,
    dhcp6: Option<&Dhcp6Lease>,
) -> Result<ReconciledLink> {
    let links = stack.links().await?;
    let link = find_link(&links, cfg).ok_or_else(|| Error::LinkNotFound {
        name: cfg.name.clone(),
        hardware_addr: cfg.hardware_addr,
    })?;

    let index = link.index;
    let mut up = link.up;
    let mut changes = Vec::new();

    if let Some(spoof) = cfg.spoof_hardware_addr.filter(|s| link.address != Some(*s)) {
        stack.set_hardware_addr(index, spoof).await?;
        tracing::info!(link = %cfg.name, address = %spoof, "set hardware address");
        changes.push(format!("set hardware address {}", spoof));
    }

    if link.name != cfg.name {
        if up {
            stack.set_link_up(index, false).await?;
            up = false;
        }
        stack.rename_link(index, &cfg.name).await?;
        tracing::info!(from = %link.name, to = %cfg.name, "renamed link");
        changes.push(format!("renamed from {}", link.name));
    }

    if !up {
        stack.set_link_up(index, true).await?;
        tracing::info!(link = %cfg.name, "brought link up");
        changes.push("set up".to_string());
    }

    let mut wanted: Vec<IpPrefix> = cfg.addr.into_iter().collect();

    match role {
        LinkRole::Uplink => {
            if let Some(lease) = dhcp4.filter(|l| l.is_valid()) {
                wanted.extend(lease.address()?);
            }
        }
        LinkRole::Lan => {
            for prefix in dhcp6.map(|l| l.prefixes.as_slice()).unwrap_or_default() {
                wanted.push(prefix.lan_address()?);
            }
        }
        LinkRole::Other => {}
    }

    for addr in wanted {
        if stack.assign_address(index, addr).await?.is_applied() {
            tracing::info!(link = %cfg.name, %addr, "added address");
            changes.push(format!("added address {}", addr));
        }
    }

    if changes.is_empty() {
        tracing::debug!(link = %cfg.name, index, "link already converged");
    }

    Ok(ReconciledLink {
        index,
        name: cfg.name.clone(),
        changes,
    })
}
