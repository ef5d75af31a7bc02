//! Render a ruleset description in nft syntax.

use std::fmt::Write;
use std::net::IpAddr;

use super::services::ServiceNames;
use super::{Chain, Family, Rule, RulesetDescription, Table};
use crate::config::{PortSpec, Proto};

/// Every table this crate owns. Tables absent from a description are removed.
pub const MANAGED_TABLES: [(Family, &str); 4] = [
    (Family::Ip, "nat"),
    (Family::Ip6, "nat"),
    (Family::Ip, "filter"),
    (Family::Ip6, "filter"),
];

/// Render the script committed with `nft -f -`.
///
/// Each managed table is declared, deleted and re-created inside the same
/// script, so the kernel applies the whole replacement as one transaction.
pub fn render_script(desc: &RulesetDescription) -> String {
    let mut out = String::new();

    for (family, name) in MANAGED_TABLES {
        // "add" makes the following "delete" succeed on a fresh system
        let _ = writeln!(out, "add table {} {}", family, name);
        let _ = writeln!(out, "delete table {} {}", family, name);

        if let Some(table) = desc.table(family, name) {
            render_table(&mut out, table, None);
        }
    }

    out
}

/// Render the description the way `nft list ruleset` shows it.
///
/// With a services database, single destination ports are shown by name.
pub fn render_listing(desc: &RulesetDescription, names: Option<&ServiceNames>) -> String {
    let mut out = String::new();
    for table in &desc.tables {
        render_table(&mut out, table, names);
    }
    out
}

fn render_table(out: &mut String, table: &Table, names: Option<&ServiceNames>) {
    let _ = writeln!(out, "table {} {} {{", table.family, table.name);

    for counter in &table.counters {
        let _ = writeln!(out, "\tcounter {} {{", counter.name);
        let _ = writeln!(
            out,
            "\t\tpackets {} bytes {}",
            counter.state.packets, counter.state.bytes
        );
        let _ = writeln!(out, "\t}}");
    }

    for chain in &table.chains {
        render_chain(out, chain, table.family, names);
    }

    let _ = writeln!(out, "}}");
}

fn render_chain(out: &mut String, chain: &Chain, family: Family, names: Option<&ServiceNames>) {
    let _ = writeln!(out, "\tchain {} {{", chain.name);
    let _ = writeln!(
        out,
        "\t\ttype {} hook {} priority {}; policy accept;",
        chain.kind.as_str(),
        chain.hook.as_str(),
        chain.priority
    );
    for rule in &chain.rules {
        let _ = writeln!(out, "\t\t{}", render_rule(rule, family, names));
    }
    let _ = writeln!(out, "\t}}");
}

fn render_rule(rule: &Rule, family: Family, names: Option<&ServiceNames>) -> String {
    match rule {
        Rule::Dnat {
            iifname,
            proto,
            port,
            dest_addr,
            dest_port,
        } => {
            format!(
                "iifname \"{}\" {} dport {} dnat to {}:{}",
                iifname,
                proto,
                port_name(port, *proto, names),
                target_addr(dest_addr, family),
                port_name(dest_port, *proto, names)
            )
        }
        Rule::Masquerade { oifname } => format!("oifname \"{}\" masquerade", oifname),
        Rule::Count { counter } => format!("counter name \"{}\"", counter),
        Rule::ClampMss { oifname } => format!(
            "oifname \"{}\" tcp flags syn tcp option maxseg size set rt mtu",
            oifname
        ),
    }
}

/// A single port listed in `names` is shown by name; ranges stay numeric.
fn port_name(port: &PortSpec, proto: Proto, names: Option<&ServiceNames>) -> String {
    match (port, names) {
        (PortSpec::Single(p), Some(names)) => names
            .lookup(*p, proto)
            .map(str::to_string)
            .unwrap_or_else(|| p.to_string()),
        _ => port.to_string(),
    }
}

fn target_addr(addr: &IpAddr, family: Family) -> String {
    match (addr, family) {
        (IpAddr::V6(v6), Family::Ip6) => format!("[{}]", v6),
        (addr, _) => addr.to_string(),
    }
}
