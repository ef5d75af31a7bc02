//! Network-state reconciliation for a Linux router.
//!
//! A reconciliation pass reads declarative configuration (interfaces and
//! port forwardings) plus the documents the DHCP clients write, and
//! converges the running system onto them:
//!
//! - links are located by hardware address, renamed, optionally given a
//!   spoofed hardware address and brought up;
//! - static, DHCPv4 and DHCPv6-delegated addresses are assigned;
//! - uplink routes are replaced with the ones the DHCPv4 lease implies;
//! - `/tmp/resolv.conf` points at the router's LAN address;
//! - the nftables NAT and filter tables are replaced in one transaction,
//!   keeping traffic counters across the replacement.
//!
//! Passes are idempotent. The caller serialises them.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use netconfig::{ApplyOptions, apply_system};
//!
//! #[tokio::main]
//! async fn main() -> netconfig::Result<()> {
//!     let report = apply_system(Path::new("/perm"), Path::new("/"), &ApplyOptions::default()).await?;
//!     for line in report.summary() {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod addr;
pub mod apply;
pub mod config;
pub mod error;
pub mod lease;
pub mod link;
pub mod netlink;
pub mod resolv;
pub mod route;
pub mod ruleset;
pub mod stack;

pub use addr::{IpPrefix, MacAddr};
pub use apply::{ApplyReport, apply, apply_system, ruleset_listing};
pub use config::ApplyOptions;
pub use error::{Error, Result, Stage};
pub use ruleset::{NftTransport, RulesetTransport};
pub use stack::{NetworkStack, Outcome};
