//! netconfig command - apply router network configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use netconfig::ruleset::CounterState;
use netconfig::{ApplyOptions, ApplyReport};

#[derive(Parser)]
#[command(name = "netconfig", version, about = "Router network configuration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile links, routes, resolver and packet filter with the configuration.
    Apply(ApplyArgs),

    /// Print the packet filter ruleset the configuration describes.
    Ruleset(RulesetArgs),
}

#[derive(Args)]
struct ApplyArgs {
    /// Directory holding interfaces.json, portforwardings.json and leases.
    #[arg(long, default_value = "/perm")]
    config_root: PathBuf,

    /// Root under which tmp/resolv.conf is written.
    #[arg(long, default_value = "/")]
    system_root: PathBuf,

    /// Name of the uplink interface.
    #[arg(long, default_value = "uplink0")]
    uplink: String,

    /// Name of the LAN interface.
    #[arg(long, default_value = "lan0")]
    lan: String,

    /// Timeout for each kernel request, in seconds.
    #[arg(long, default_value_t = 5)]
    timeout: u64,

    /// Path of the nft executable.
    #[arg(long, default_value = "nft")]
    nft: PathBuf,

    /// Initial packet count of a newly created forwarding counter.
    #[arg(long, default_value_t = 0)]
    initial_packets: u64,

    /// Initial byte count of a newly created forwarding counter.
    #[arg(long, default_value_t = 0)]
    initial_bytes: u64,

    /// Validate and print the ruleset script without changing anything.
    #[arg(long)]
    dry_run: bool,

    /// Output JSON.
    #[arg(short = 'j', long)]
    json: bool,
}

#[derive(Args)]
struct RulesetArgs {
    /// Directory holding portforwardings.json.
    #[arg(long, default_value = "/perm")]
    config_root: PathBuf,

    /// Name of the uplink interface.
    #[arg(long, default_value = "uplink0")]
    uplink: String,

    /// Services database used to name ports.
    #[arg(long, default_value = "/etc/services")]
    services: PathBuf,

    /// Don't resolve port numbers to service names.
    #[arg(short = 'n', long)]
    numeric: bool,
}

impl ApplyArgs {
    fn options(&self) -> ApplyOptions {
        ApplyOptions {
            uplink: self.uplink.clone(),
            lan: self.lan.clone(),
            timeout: Duration::from_secs(self.timeout),
            nft_binary: self.nft.clone(),
            dry_run: self.dry_run,
            default_counter: CounterState {
                packets: self.initial_packets,
                bytes: self.initial_bytes,
            },
            ..Default::default()
        }
    }

    async fn run(&self) -> anyhow::Result<()> {
        let report =
            netconfig::apply_system(&self.config_root, &self.system_root, &self.options()).await?;

        if self.json {
            print_json(&report)?;
        } else if report.dry_run {
            print!("{}", report.script);
        } else {
            for line in report.summary() {
                println!("{}", line);
            }
        }
        Ok(())
    }
}

impl RulesetArgs {
    async fn run(&self) -> anyhow::Result<()> {
        let options = ApplyOptions {
            uplink: self.uplink.clone(),
            services_file: (!self.numeric).then(|| self.services.clone()),
            ..Default::default()
        };
        let listing = netconfig::ruleset_listing(&self.config_root, &options).await?;
        print!("{}", listing);
        Ok(())
    }
}

fn print_json(report: &ApplyReport) -> anyhow::Result<()> {
    let value = serde_json::json!({
        "dry_run": report.dry_run,
        "changes_made": report.changes_made(),
        "changes": report.summary(),
        "resolver": report.resolver.as_ref().map(|p| p.display().to_string()),
        "script": report.script,
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Apply(args) => args.run().await,
        Command::Ruleset(args) => args.run().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
