//! Operator-authored configuration documents and pass options.
//!
//! Documents live under a configuration root:
//!
//! - `interfaces.json` (required)
//! - `portforwardings.json` (optional; absent means no forwardings)

mod forwarding;
mod interfaces;

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;

pub use forwarding::{ForwardingsDocument, PortForwarding, PortSpec, PortSpecError, Proto};
pub use interfaces::{InterfaceConfig, InterfacesDocument, check_name};

use crate::error::{Error, Result};
use crate::ruleset::CounterState;

pub const INTERFACES_FILE: &str = "interfaces.json";
pub const FORWARDINGS_FILE: &str = "portforwardings.json";

/// Options for a reconciliation pass.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Name of the DHCP-addressed, externally facing interface.
    pub uplink: String,
    /// Name of the interface whose static address serves as resolver.
    pub lan: String,
    /// Bound on every kernel-facing request.
    pub timeout: Duration,
    /// Path of the `nft` executable.
    pub nft_binary: PathBuf,
    /// Load, validate and build, but change nothing.
    pub dry_run: bool,
    /// Value for the forwarded-traffic counter when none exists yet.
    pub default_counter: CounterState,
    /// Services database for the cosmetic ruleset listing.
    pub services_file: Option<PathBuf>,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            uplink: "uplink0".to_string(),
            lan: "lan0".to_string(),
            timeout: crate::netlink::DEFAULT_TIMEOUT,
            nft_binary: PathBuf::from("nft"),
            dry_run: false,
            default_counter: CounterState::default(),
            services_file: Some(PathBuf::from("/etc/services")),
        }
    }
}

/// Read and parse a JSON document. A missing file yields `Ok(None)`.
pub(crate) async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(path, e)),
    };

    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
}

/// Load `interfaces.json` from the configuration root.
pub async fn load_interfaces(config_root: &Path) -> Result<InterfacesDocument> {
    let path = config_root.join(INTERFACES_FILE);
    let doc: InterfacesDocument = read_document(&path).await?.ok_or_else(|| {
        Error::io(
            &path,
            io::Error::new(io::ErrorKind::NotFound, "interface configuration missing"),
        )
    })?;

    doc.validate()
        .map_err(|message| Error::InvalidConfig { path, message })?;

    tracing::debug!(count = doc.interfaces.len(), "loaded interface configuration");
    Ok(doc)
}

/// Load `portforwardings.json` from the configuration root.
pub async fn load_forwardings(config_root: &Path) -> Result<Vec<PortForwarding>> {
    let path = config_root.join(FORWARDINGS_FILE);
    let doc: ForwardingsDocument = read_document(&path).await?.unwrap_or_default();
    for fw in &doc.forwardings {
        fw.validate()?;
    }
    tracing::debug!(count = doc.forwardings.len(), "loaded port forwardings");
    Ok(doc.forwardings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_forwardings_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_forwardings(dir.path()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_interfaces_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_interfaces(dir.path()).await,
            Err(Error::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FORWARDINGS_FILE), "{\"forwardings\": [").unwrap();

        let err = load_forwardings(dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains(FORWARDINGS_FILE));
    }

    #[tokio::test]
    async fn test_range_mismatch_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(FORWARDINGS_FILE),
            r#"{"forwardings":[{"port":"8040-8060","dest_addr":"192.168.42.99","dest_port":"9000-9001"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            load_forwardings(dir.path()).await,
            Err(Error::RangeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_interfaces_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(INTERFACES_FILE),
            r#"{"interfaces":[{"hardware_addr":"02:00:00:00:00:01","name":""}]}"#,
        )
        .unwrap();

        assert!(matches!(
            load_interfaces(dir.path()).await,
            Err(Error::InvalidConfig { .. })
        ));
    }
}
