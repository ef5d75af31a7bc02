//! Packet-filter ruleset model.
//!
//! A [`RulesetDescription`] is the complete content of every table this
//! crate manages. It is rebuilt from configuration on every pass by
//! [`build_ruleset`], rendered to an `nft` script by [`render_script`] and
//! committed as one transaction through a [`RulesetTransport`]. The only
//! state carried across passes is the value of named counters, which is
//! read back with [`read_counters`] before building.

mod build;
mod nft;
mod script;
mod services;

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub use build::{FORWARDED_COUNTER, build_ruleset};
pub use nft::{NftTransport, RulesetTransport, apply_ruleset, parse_counters, read_counters};
pub use script::{MANAGED_TABLES, render_listing, render_script};
pub use services::ServiceNames;

use crate::config::{PortSpec, Proto};

/// Address family of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Ip,
    Ip6,
}

impl Family {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Ip6 => "ip6",
        }
    }

    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::Ip,
            IpAddr::V6(_) => Self::Ip6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packet and byte totals of a named counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    pub packets: u64,
    pub bytes: u64,
}

/// Identity of a named counter object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CounterKey {
    pub family: Family,
    pub table: String,
    pub name: String,
}

impl CounterKey {
    pub fn new(family: Family, table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            family,
            table: table.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.family, self.table, self.name)
    }
}

/// Counter values read back from the kernel before a pass.
pub type ExistingCounters = HashMap<CounterKey, CounterState>;

/// Chain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainKind {
    Nat,
    Filter,
}

impl ChainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nat => "nat",
            Self::Filter => "filter",
        }
    }
}

/// Netfilter hook a base chain is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Prerouting,
    Postrouting,
    Forward,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prerouting => "prerouting",
            Self::Postrouting => "postrouting",
            Self::Forward => "forward",
        }
    }
}

/// One rule. Only the shapes the router needs are representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Redirect traffic arriving on `iifname` for `port` to `dest_addr:dest_port`.
    Dnat {
        iifname: String,
        proto: Proto,
        port: PortSpec,
        dest_addr: IpAddr,
        dest_port: PortSpec,
    },
    /// Source-NAT traffic leaving via `oifname` to the interface address.
    Masquerade { oifname: String },
    /// Account every packet in a named counter.
    Count { counter: String },
    /// Clamp the MSS of SYN packets leaving via `oifname` to the route MTU.
    ClampMss { oifname: String },
}

/// A base chain and its rules, in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub name: String,
    pub kind: ChainKind,
    pub hook: Hook,
    pub priority: i32,
    pub rules: Vec<Rule>,
}

impl Chain {
    pub fn new(name: impl Into<String>, kind: ChainKind, hook: Hook, priority: i32) -> Self {
        Self {
            name: name.into(),
            kind,
            hook,
            priority,
            rules: Vec::new(),
        }
    }
}

/// A named counter object and the value it is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub name: String,
    pub state: CounterState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub family: Family,
    pub name: String,
    pub counters: Vec<Counter>,
    pub chains: Vec<Chain>,
}

impl Table {
    pub fn new(family: Family, name: impl Into<String>) -> Self {
        Self {
            family,
            name: name.into(),
            counters: Vec::new(),
            chains: Vec::new(),
        }
    }

    pub fn chain(&self, name: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.iter().find(|c| c.name == name)
    }
}

/// Complete content of all managed tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulesetDescription {
    pub tables: Vec<Table>,
}

impl RulesetDescription {
    pub fn table(&self, family: Family, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.family == family && t.name == name)
    }
}
