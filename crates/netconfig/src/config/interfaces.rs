//! Interface declarations (`interfaces.json`).

use serde::{Deserialize, Serialize};

use crate::addr::{IpPrefix, MacAddr};

/// Desired state of one network interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceConfig {
    /// Real hardware address; the stable key for finding the kernel link.
    pub hardware_addr: MacAddr,
    /// Operational hardware address to program instead of the real one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoof_hardware_addr: Option<MacAddr>,
    pub name: String,
    /// Static address in CIDR notation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<IpPrefix>,
}

/// Top-level shape of `interfaces.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacesDocument {
    #[serde(default)]
    pub interfaces: Vec<InterfaceConfig>,
}

impl InterfacesDocument {
    /// Find an interface by its configured name.
    pub fn by_name(&self, name: &str) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    /// Check values serde cannot: every name passes [`check_name`] and
    /// is declared once.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for iface in &self.interfaces {
            check_name(&iface.name)
                .map_err(|e| format!("interface {}: {}", iface.hardware_addr, e))?;
            if !seen.insert(iface.name.as_str()) {
                return Err(format!("interface name {:?} is declared twice", iface.name));
            }
        }
        Ok(())
    }
}

/// Accept names the kernel takes that also need no escaping in nft
/// scripts: 1 to 15 bytes of ASCII letters, digits, `-`, `_` and `.`.
pub fn check_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("empty interface name".to_string());
    }
    if name.len() >= libc::IFNAMSIZ {
        return Err(format!(
            "interface name {:?} exceeds {} bytes",
            name,
            libc::IFNAMSIZ - 1
        ));
    }
    let allowed = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.');
    if name == "." || name == ".." || !name.bytes().all(allowed) {
        return Err(format!(
            "interface name {:?} may only contain ASCII letters, digits, '-', '_' and '.'",
            name
        ));
    }
    Ok(())
}
