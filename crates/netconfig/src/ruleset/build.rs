//! Compile port forwardings into a ruleset description.

use super::{
    Chain, ChainKind, Counter, CounterKey, CounterState, ExistingCounters, Family, Hook, Rule,
    RulesetDescription, Table,
};
use crate::config::{self, PortForwarding};
use crate::error::{Error, Result};

/// Name of the counter accounting forwarded traffic.
pub const FORWARDED_COUNTER: &str = "fwded";

/// Build the complete description of every managed table.
///
/// `existing` holds counter values read back from the kernel; a counter
/// found there keeps its value, any other starts at `default_counter`.
pub fn build_ruleset(
    forwardings: &[PortForwarding],
    uplink: &str,
    existing: &ExistingCounters,
    default_counter: CounterState,
) -> Result<RulesetDescription> {
    config::check_name(uplink).map_err(Error::ruleset)?;
    for fw in forwardings {
        fw.validate()?;
    }

    let mut tables = vec![nat_table(Family::Ip, forwardings, uplink)];

    if forwardings.iter().any(|fw| Family::of(&fw.dest_addr) == Family::Ip6) {
        tables.push(nat_table(Family::Ip6, forwardings, uplink));
    }

    for family in [Family::Ip, Family::Ip6] {
        tables.push(filter_table(family, uplink, existing, default_counter));
    }

    Ok(RulesetDescription { tables })
}

fn nat_table(family: Family, forwardings: &[PortForwarding], uplink: &str) -> Table {
    let mut prerouting = Chain::new("prerouting", ChainKind::Nat, Hook::Prerouting, 0);

    // Each rule is inserted at the head of the chain
    for fw in forwardings
        .iter()
        .filter(|fw| Family::of(&fw.dest_addr) == family)
    {
        prerouting.rules.insert(
            0,
            Rule::Dnat {
                iifname: uplink.to_string(),
                proto: fw.proto,
                port: fw.port,
                dest_addr: fw.dest_addr,
                dest_port: fw.dest_port,
            },
        );
    }

    let mut postrouting = Chain::new("postrouting", ChainKind::Nat, Hook::Postrouting, 100);
    postrouting.rules.push(Rule::Masquerade {
        oifname: uplink.to_string(),
    });

    let mut table = Table::new(family, "nat");
    table.chains = vec![prerouting, postrouting];
    table
}

fn filter_table(
    family: Family,
    uplink: &str,
    existing: &ExistingCounters,
    default_counter: CounterState,
) -> Table {
    let key = CounterKey::new(family, "filter", FORWARDED_COUNTER);
    let state = match existing.get(&key) {
        Some(state) => {
            tracing::debug!(counter = %key, packets = state.packets, bytes = state.bytes, "preserving counter");
            *state
        }
        None => default_counter,
    };

    let mut forward = Chain::new("forward", ChainKind::Filter, Hook::Forward, 0);
    forward.rules.push(Rule::Count {
        counter: FORWARDED_COUNTER.to_string(),
    });
    forward.rules.push(Rule::ClampMss {
        oifname: uplink.to_string(),
    });

    let mut table = Table::new(family, "filter");
    table.counters.push(Counter {
        name: FORWARDED_COUNTER.to_string(),
        state,
    });
    table.chains.push(forward);
    table
}
