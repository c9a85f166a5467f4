mod config;
mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tcx_collector::Scraper;
use tcx_netlink::{NetworkNamespace, RtnetlinkBackend, TcBackend};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Linux traffic control statistics exporter for Prometheus.
#[derive(Parser)]
#[command(name = "tcx", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "TCX_CONFIG")]
    config: Option<PathBuf>,

    /// Logging filter, a level (trace, debug, info, warn, error) or a full `RUST_LOG` directive.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Address to serve metrics on, overrides `listen_address` from the config.
    #[arg(long)]
    listen_address: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve metrics over HTTP. This is the default.
    Serve,
    /// Print every metric family the configured collectors can produce and exit.
    Describe,
    /// Run a single scrape, print it in the Prometheus text format and exit.
    Once,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;

    fmt().with_env_filter(filter).with_target(true).init();

    let config_path = cli.config.context("--config is required (use --help for usage)")?;

    let mut cfg = Config::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    if let Some(addr) = cli.listen_address {
        cfg.listen_address = addr;
        cfg.validate()?;
    }

    let scraper = scraper(&cfg, RtnetlinkBackend::new())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Describe => {
            describe(&scraper);
            Ok(())
        }
        command => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;

            rt.block_on(async {
                match command {
                    Command::Once => once(&scraper).await,
                    _ => run(scraper, &cfg.listen_address).await,
                }
            })
        }
    }
}

/// Build a scraper for every configured namespace.
fn scraper<B: TcBackend>(cfg: &Config, backend: B) -> Result<Scraper<B>> {
    let scraper = cfg
        .namespaces
        .iter()
        .fold(Scraper::new(backend, cfg.host()), |scraper, (name, devices)| {
            scraper.with_namespace(NetworkNamespace::from_name(name.as_str()), devices.clone())
        })
        .with_collectors(cfg.sub_collectors()?)
        .with_unit_timeout(cfg.unit_timeout);

    Ok(scraper)
}

fn describe<B: TcBackend>(scraper: &Scraper<B>) {
    let registry = scraper.registry();
    for descriptor in registry.describe() {
        println!(
            "{:<32} {:<8} {:<72} {}",
            descriptor.name,
            descriptor.kind.as_str(),
            descriptor.label_names().join(","),
            descriptor.help,
        );
    }
}

async fn once<B: TcBackend>(scraper: &Scraper<B>) -> Result<()> {
    let samples = scraper.collect().await;
    let text = scraper.registry().encode_text(&samples).context("encoding samples")?;

    print!("{text}");
    Ok(())
}

async fn run<B: TcBackend>(scraper: Scraper<B>, addr: &str) -> Result<()> {
    let cancel = CancellationToken::new();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        host = scraper.host(),
        namespaces = scraper.targets().len(),
        collectors = ?scraper.collectors(),
        "starting tcx",
    );

    // Populate the device snapshots before the first scrape arrives.
    scraper.refresh_devices().await;

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    tracing::error!(error = %e, "failed to register SIGTERM handler");
                    return;
                }
            };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }

        shutdown.cancel();
    });

    server::serve(scraper, addr, cancel).await?;

    tracing::info!("tcx stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraper_from_config() {
        let cfg = Config::parse(
            r#"
host: edge-1
interfaces: [eth0]
namespaces:
  blue: [veth-blue]
  /var/run/netns/red: []
collectors: [qdisc, class]
unit_timeout: 1s
"#,
        )
        .unwrap();

        let scraper = scraper(&cfg, RtnetlinkBackend::new()).unwrap();
        let names: Vec<_> = scraper.targets().iter().map(|t| t.namespace.name()).collect();

        assert_eq!(scraper.host(), "edge-1");
        assert_eq!(names, ["/var/run/netns/red", "blue", "default"]);
        assert_eq!(scraper.targets()[2].devices, ["eth0"]);
        assert_eq!(scraper.collectors().len(), 2);
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "tcx",
            "--config",
            "/etc/tcx.yaml",
            "--listen-address",
            "127.0.0.1:1",
            "once",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/tcx.yaml")));
        assert_eq!(cli.listen_address.as_deref(), Some("127.0.0.1:1"));
        assert!(matches!(cli.command, Some(Command::Once)));
    }
}
