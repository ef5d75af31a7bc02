//! Committing rulesets and reading counters through the `nft` CLI.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::script::render_script;
use super::{CounterKey, CounterState, ExistingCounters, Family, RulesetDescription};
use crate::error::{Error, Result};

/// Access to the kernel packet filter.
pub trait RulesetTransport: Send + Sync {
    /// JSON listing of all named counters (`nft -j list counters`).
    fn list_counters(&self) -> impl Future<Output = Result<String>> + Send;

    /// Apply a script as one transaction (`nft -f -`).
    fn commit(&self, script: &str) -> impl Future<Output = Result<()>> + Send;
}

/// [`RulesetTransport`] backed by the `nft` executable.
#[derive(Debug, Clone)]
pub struct NftTransport {
    binary: PathBuf,
    timeout: Duration,
}

impl NftTransport {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str], input: Option<&str>) -> Result<Vec<u8>> {
        let command = format!("{} {}", self.binary.display(), args.join(" "));

        let exec = async {
            let mut child = Command::new(&self.binary)
                .args(args)
                .stdin(if input.is_some() {
                    Stdio::piped()
                } else {
                    Stdio::null()
                })
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| Error::ruleset(format!("{command}: {e}")))?;

            if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .map_err(|e| Error::ruleset(format!("{command}: writing script: {e}")))?;
                // EOF ends the transaction
                drop(stdin);
            }

            child
                .wait_with_output()
                .await
                .map_err(|e| Error::ruleset(format!("{command}: {e}")))
        };

        let output = tokio::time::timeout(self.timeout, exec)
            .await
            .map_err(|_| Error::ruleset(format!("{command}: timed out after {:?}", self.timeout)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ruleset(format!(
                "{command}: {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl RulesetTransport for NftTransport {
    async fn list_counters(&self) -> Result<String> {
        let stdout = self.run(&["-j", "list", "counters"], None).await?;
        String::from_utf8(stdout).map_err(|e| Error::ruleset(format!("counter listing: {e}")))
    }

    async fn commit(&self, script: &str) -> Result<()> {
        self.run(&["-f", "-"], Some(script)).await.map(|_| ())
    }
}

#[derive(Deserialize)]
struct Listing {
    #[serde(default)]
    nftables: Vec<ListingEntry>,
}

// Each entry is a single-key object; only counters are of interest.
#[derive(Deserialize)]
struct ListingEntry {
    counter: Option<ListedCounter>,
}

#[derive(Deserialize)]
struct ListedCounter {
    family: String,
    table: String,
    name: String,
    #[serde(default)]
    packets: u64,
    #[serde(default)]
    bytes: u64,
}

/// Parse `nft -j list counters` output.
///
/// Counters outside the `ip` and `ip6` families are ignored.
pub fn parse_counters(json: &str) -> Result<ExistingCounters> {
    if json.trim().is_empty() {
        return Ok(ExistingCounters::new());
    }

    let listing: Listing = serde_json::from_str(json)
        .map_err(|e| Error::ruleset(format!("malformed counter listing: {e}")))?;

    let mut counters = ExistingCounters::new();
    for counter in listing.nftables.into_iter().filter_map(|e| e.counter) {
        let family = match counter.family.as_str() {
            "ip" => Family::Ip,
            "ip6" => Family::Ip6,
            _ => continue,
        };
        counters.insert(
            CounterKey::new(family, counter.table, counter.name),
            CounterState {
                packets: counter.packets,
                bytes: counter.bytes,
            },
        );
    }
    Ok(counters)
}

/// Read the current value of every named counter.
pub async fn read_counters<T: RulesetTransport>(transport: &T) -> Result<ExistingCounters> {
    let json = transport.list_counters().await?;
    let counters = parse_counters(&json)?;
    tracing::debug!(count = counters.len(), "read existing counters");
    Ok(counters)
}

/// Render and commit a description. Returns the committed script.
pub async fn apply_ruleset<T: RulesetTransport>(
    transport: &T,
    desc: &RulesetDescription,
) -> Result<String> {
    let script = render_script(desc);
    transport.commit(&script).await?;
    tracing::info!(tables = desc.tables.len(), "committed ruleset");
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{"nftables": [
      {"metainfo": {"version": "1.0.9", "release_name": "Old Doc Yak #3", "json_schema_version": 1}},
      {"counter": {"family": "ip", "name": "fwded", "table": "filter", "handle": 1, "packets": 23, "bytes": 42}},
      {"counter": {"family": "ip6", "name": "fwded", "table": "filter", "handle": 1, "packets": 7, "bytes": 900}},
      {"counter": {"family": "inet", "name": "other", "table": "fw", "handle": 3, "packets": 1, "bytes": 1}}
    ]}"#;

    #[test]
    fn test_parse_counters() {
        let counters = parse_counters(LISTING).unwrap();
        assert_eq!(counters.len(), 2);
        assert_eq!(
            counters[&CounterKey::new(Family::Ip, "filter", "fwded")],
            CounterState { packets: 23, bytes: 42 }
        );
        assert_eq!(
            counters[&CounterKey::new(Family::Ip6, "filter", "fwded")],
            CounterState { packets: 7, bytes: 900 }
        );
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_counters("").unwrap().is_empty());
        assert!(parse_counters(r#"{"nftables": [{"metainfo": {}}]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_counters("table ip filter {"), Err(Error::Ruleset { .. })));
    }

    #[tokio::test]
    async fn test_failed_command_is_ruleset_error() {
        let transport = NftTransport::new("false", Duration::from_secs(5));
        let err = transport.commit("flush ruleset\n").await.unwrap_err();
        assert!(matches!(err, Error::Ruleset { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_ruleset_error() {
        let transport = NftTransport::new("/nonexistent/nft", Duration::from_secs(5));
        let err = transport.list_counters().await.unwrap_err();
        assert!(err.to_string().contains("/nonexistent/nft"));
    }

    #[tokio::test]
    async fn test_hung_binary_times_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("nft");
        std::fs::write(&binary, "#!/bin/sh\nsleep 5\n").unwrap();
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();

        let transport = NftTransport::new(&binary, Duration::from_millis(100));
        let started = std::time::Instant::now();
        match transport.list_counters().await {
            Err(Error::Ruleset { message }) => assert!(message.contains("timed out"), "{message}"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
