//! Resolver configuration pointing clients at the router.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Error, Result};

/// Location of the resolver file relative to the system root.
pub const RESOLV_CONF: &str = "tmp/resolv.conf";

/// Render the resolver file content.
pub fn resolver_config(nameserver: IpAddr) -> String {
    format!("nameserver {}\n", nameserver)
}

/// Replace `<system_root>/tmp/resolv.conf` with a single nameserver line.
///
/// The content goes to a temporary sibling first and is renamed into
/// place, so readers never observe a partial file.
pub async fn write_resolver_config(system_root: &Path, nameserver: IpAddr) -> Result<PathBuf> {
    let path = system_root.join(RESOLV_CONF);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;
    }

    let tmp = path.with_extension("conf.tmp");
    fs::write(&tmp, resolver_config(nameserver))
        .await
        .map_err(|e| Error::io(&tmp, e))?;
    fs::rename(&tmp, &path)
        .await
        .map_err(|e| Error::io(&path, e))?;

    tracing::debug!(path = %path.display(), %nameserver, "wrote resolver config");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_resolver_config() {
        let root = tempfile::tempdir().unwrap();
        let path = write_resolver_config(root.path(), "192.168.42.1".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(path, root.path().join("tmp/resolv.conf"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nameserver 192.168.42.1\n");
        assert!(!root.path().join("tmp/resolv.conf.tmp").exists());
    }

    #[tokio::test]
    async fn test_replaces_existing_content() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("tmp")).unwrap();
        std::fs::write(
            root.path().join(RESOLV_CONF),
            "nameserver 8.8.8.8\nnameserver 8.8.4.4\nsearch example.net\n",
        )
        .unwrap();

        write_resolver_config(root.path(), "192.168.42.1".parse().unwrap())
            .await
            .unwrap();
        write_resolver_config(root.path(), "192.168.42.1".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(root.path().join(RESOLV_CONF)).unwrap(),
            "nameserver 192.168.42.1\n"
        );
    }

    #[test]
    fn test_ipv6_nameserver() {
        assert_eq!(
            resolver_config("2a02:168:4a00::1".parse().unwrap()),
            "nameserver 2a02:168:4a00::1\n"
        );
    }
}
