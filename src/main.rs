mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use watch_dir::config::HostConfig;
use watch_dir::manifest::HostManifest;
use watch_dir::{WatchRoot, host};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(extension_id) = cli.print_manifest {
        let exe = std::env::current_exe().context("cannot locate this executable")?;
        println!("{}", HostManifest::new(&exe, &extension_id).to_json()?);
        return Ok(());
    }

    init_logging(cli.log_level.as_deref());

    let location = WatchRoot::default_location().context("cannot determine the home directory")?;
    let root = WatchRoot::prepare(&location)
        .with_context(|| format!("cannot prepare {}", location.display()))?;
    let config = HostConfig::load(root.path());

    debug!("browser arguments: {:?}", cli.browser_args);
    info!("watch-dir {} serving {}", env!("CARGO_PKG_VERSION"), root.path().display());

    let runtime = tokio::runtime::Runtime::new().context("cannot start the async runtime")?;
    let result = runtime.block_on(host::run(root, &config));
    // A dispatch thread left blocked on stdout must not hold the process.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

/// Diagnostics go to stderr; stdout carries the protocol.
fn init_logging(level: Option<&str>) {
    let filter = level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
