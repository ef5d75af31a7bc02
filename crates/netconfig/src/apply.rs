//! A complete reconciliation pass.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::config::{self, ApplyOptions, InterfacesDocument, PortForwarding};
use crate::error::{Error, Result, Stage};
use crate::lease::{self, Dhcp4Lease, Dhcp6Lease};
use crate::link::{LinkRole, ReconciledLink, reconcile_link};
use crate::netlink::Connection;
use crate::resolv::write_resolver_config;
use crate::route::reconcile_routes;
use crate::ruleset::{
    ExistingCounters, NftTransport, RulesetDescription, RulesetTransport, ServiceNames,
    apply_ruleset, build_ruleset, read_counters, render_listing, render_script,
};
use crate::stack::NetworkStack;

/// What a pass did.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub links: Vec<ReconciledLink>,
    pub route_changes: Vec<String>,
    /// Resolver file written, if the LAN link has a static address.
    pub resolver: Option<PathBuf>,
    pub ruleset: RulesetDescription,
    /// Script committed, or that would have been in a dry run.
    pub script: String,
    pub dry_run: bool,
}

impl ApplyReport {
    /// Whether links, addresses or routes changed. The ruleset is replaced
    /// on every pass and is not counted.
    pub fn changes_made(&self) -> bool {
        !self.route_changes.is_empty() || self.links.iter().any(|l| !l.changes.is_empty())
    }

    /// One line per change, prefixed with the link name or `routes`.
    pub fn summary(&self) -> Vec<String> {
        let links = self
            .links
            .iter()
            .flat_map(|l| l.changes.iter().map(move |c| format!("{}: {}", l.name, c)));
        let routes = self.route_changes.iter().map(|c| format!("routes: {}", c));
        links.chain(routes).collect()
    }
}

struct Inputs {
    interfaces: InterfacesDocument,
    forwardings: Vec<PortForwarding>,
    dhcp4: Option<Dhcp4Lease>,
    dhcp6: Option<Dhcp6Lease>,
}

async fn load_inputs(config_root: &Path, uplink: &str) -> Result<Inputs> {
    // The uplink name is written into the ruleset; reject it before any link changes.
    config::check_name(uplink)
        .map_err(Error::ruleset)
        .map_err(|e| e.in_stage(Stage::LoadConfig))?;
    let interfaces = config::load_interfaces(config_root)
        .await
        .map_err(|e| e.in_stage(Stage::LoadConfig))?;
    let forwardings = config::load_forwardings(config_root)
        .await
        .map_err(|e| e.in_stage(Stage::LoadConfig))?;

    let dhcp4 = lease::load_dhcp4(config_root)
        .await
        .map_err(|e| e.in_stage(Stage::LoadLeases))?;
    let dhcp6 = lease::load_dhcp6(config_root)
        .await
        .map_err(|e| e.in_stage(Stage::LoadLeases))?;

    Ok(Inputs {
        interfaces,
        forwardings,
        dhcp4,
        dhcp6,
    })
}

/// Run one pass against the given collaborators.
///
/// Stages run in order and the first failure aborts the pass; changes
/// made by earlier stages are kept. Errors carry the [`Stage`] they
/// occurred in.
pub async fn apply<S, T>(
    config_root: &Path,
    system_root: &Path,
    stack: &S,
    transport: &T,
    options: &ApplyOptions,
) -> Result<ApplyReport>
where
    S: NetworkStack,
    T: RulesetTransport,
{
    let inputs = load_inputs(config_root, &options.uplink).await?;

    if options.dry_run {
        let ruleset = build_ruleset(
            &inputs.forwardings,
            &options.uplink,
            &ExistingCounters::new(),
            options.default_counter,
        )
        .map_err(|e| e.in_stage(Stage::BuildRuleset))?;
        let script = render_script(&ruleset);
        tracing::info!("dry run, nothing applied");
        return Ok(ApplyReport {
            ruleset,
            script,
            dry_run: true,
            ..Default::default()
        });
    }

    let mut report = ApplyReport::default();
    let mut uplink_index = None;

    for cfg in &inputs.interfaces.interfaces {
        let role = if cfg.name == options.uplink {
            LinkRole::Uplink
        } else if cfg.name == options.lan {
            LinkRole::Lan
        } else {
            LinkRole::Other
        };

        let link = reconcile_link(
            stack,
            cfg,
            role,
            inputs.dhcp4.as_ref(),
            inputs.dhcp6.as_ref(),
        )
        .await
        .map_err(|e| e.in_stage(Stage::Links))?;

        if role == LinkRole::Uplink {
            uplink_index = Some(link.index);
        }
        report.links.push(link);
    }

    match uplink_index {
        Some(index) => {
            report.route_changes = reconcile_routes(stack, index, inputs.dhcp4.as_ref())
                .await
                .map_err(|e| e.in_stage(Stage::Routes))?;
        }
        None => tracing::warn!(uplink = %options.uplink, "uplink not configured, skipping routes"),
    }

    let lan_addr: Option<IpAddr> = inputs
        .interfaces
        .by_name(&options.lan)
        .and_then(|cfg| cfg.addr)
        .map(|prefix| prefix.addr);
    match lan_addr {
        Some(addr) => {
            let path = write_resolver_config(system_root, addr)
                .await
                .map_err(|e| e.in_stage(Stage::Resolver))?;
            report.resolver = Some(path);
        }
        None => tracing::warn!(lan = %options.lan, "LAN link has no static address, not writing resolver config"),
    }

    let existing = read_counters(transport)
        .await
        .map_err(|e| e.in_stage(Stage::ReadCounters))?;

    report.ruleset = build_ruleset(
        &inputs.forwardings,
        &options.uplink,
        &existing,
        options.default_counter,
    )
    .map_err(|e| e.in_stage(Stage::BuildRuleset))?;

    report.script = apply_ruleset(transport, &report.ruleset)
        .await
        .map_err(|e| e.in_stage(Stage::ApplyRuleset))?;

    tracing::info!(changes = report.summary().len(), "reconciliation pass complete");
    Ok(report)
}

/// Run one pass against the running system: netlink and the `nft` binary.
pub async fn apply_system(
    config_root: &Path,
    system_root: &Path,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let conn = Connection::new()
        .map_err(Error::from)
        .map_err(|e| e.in_stage(Stage::Links))?
        .with_timeout(options.timeout);
    let nft = NftTransport::new(&options.nft_binary, options.timeout);

    apply(config_root, system_root, &conn, &nft, options).await
}

/// Render the ruleset the configuration describes, as `nft list ruleset`
/// would show it. Nothing on the system is read or changed apart from the
/// services database.
pub async fn ruleset_listing(config_root: &Path, options: &ApplyOptions) -> Result<String> {
    let forwardings = config::load_forwardings(config_root)
        .await
        .map_err(|e| e.in_stage(Stage::LoadConfig))?;
    let ruleset = build_ruleset(
        &forwardings,
        &options.uplink,
        &ExistingCounters::new(),
        options.default_counter,
    )
    .map_err(|e| e.in_stage(Stage::BuildRuleset))?;

    let names = match &options.services_file {
        Some(path) => Some(ServiceNames::load(path).await),
        None => None,
    };
    Ok(render_listing(&ruleset, names.as_ref()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::addr::MacAddr;
    use crate::stack::Link;
    use crate::stack::fake::FakeStack;

    #[derive(Default)]
    struct RecordingTransport {
        scripts: Mutex<Vec<String>>,
    }

    impl RulesetTransport for RecordingTransport {
        async fn list_counters(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn commit(&self, script: &str) -> Result<()> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn stack() -> FakeStack {
        let mac: MacAddr = "02:73:53:00:ca:fe".parse().unwrap();
        FakeStack::with_links(vec![Link {
            index: 2,
            name: "eth0".into(),
            address: Some(mac),
            perm_address: Some(mac),
            up: false,
        }])
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let config = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write(
            config.path(),
            "interfaces.json",
            r#"{"interfaces":[{"hardware_addr":"02:73:53:00:ca:fe","name":"uplink0"}]}"#,
        );

        let stack = stack();
        let transport = RecordingTransport::default();
        let options = ApplyOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = apply(config.path(), system.path(), &stack, &transport, &options)
            .await
            .unwrap();

        assert!(report.dry_run);
        assert!(report.script.contains("table ip filter {"));
        assert!(transport.scripts.lock().unwrap().is_empty());
        assert_eq!(stack.link(2).name, "eth0");
    }

    #[tokio::test]
    async fn test_missing_link_aborts_in_links_stage() {
        let config = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write(
            config.path(),
            "interfaces.json",
            r#"{"interfaces":[{"hardware_addr":"02:00:00:00:00:99","name":"lan0"}]}"#,
        );

        let transport = RecordingTransport::default();
        let err = apply(
            config.path(),
            system.path(),
            &stack(),
            &transport,
            &ApplyOptions::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Links));
        assert!(matches!(err.root(), Error::LinkNotFound { .. }));
        assert!(transport.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unquotable_uplink_aborts_before_links() {
        let config = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        write(
            config.path(),
            "interfaces.json",
            r#"{"interfaces":[{"hardware_addr":"02:73:53:00:ca:fe","name":"uplink0"}]}"#,
        );

        let stack = stack();
        let transport = RecordingTransport::default();
        let options = ApplyOptions {
            uplink: "uplink0 accept".into(),
            ..Default::default()
        };
        let err = apply(config.path(), system.path(), &stack, &transport, &options)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::LoadConfig));
        assert!(matches!(err.root(), Error::Ruleset { .. }));
        assert_eq!(stack.link(2).name, "eth0");
        assert!(transport.scripts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_summary() {
        let report = ApplyReport {
            links: vec![ReconciledLink {
                index: 2,
                name: "uplink0".into(),
                changes: vec!["set up".into()],
            }],
            route_changes: vec!["added route default via 10.0.0.1 dev 2".into()],
            ..Default::default()
        };
        assert!(report.changes_made());
        assert_eq!(
            report.summary(),
            [
                "uplink0: set up",
                "routes: added route default via 10.0.0.1 dev 2"
            ]
        );
        assert!(!ApplyReport::default().changes_made());
    }

    #[tokio::test]
    async fn test_ruleset_listing_without_services() {
        let config = tempfile::tempdir().unwrap();
        write(
            config.path(),
            "portforwardings.json",
            r#"{"forwardings":[{"proto":"udp","port":"53","dest_addr":"192.168.42.99","dest_port":"53"}]}"#,
        );
        let options = ApplyOptions {
            services_file: None,
            ..Default::default()
        };

        let listing = ruleset_listing(config.path(), &options).await.unwrap();
        assert!(listing.contains("udp dport 53 dnat to 192.168.42.99:53"));
    }
}
