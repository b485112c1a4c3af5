#[macro_use]
extern crate tracing;

use std::path::PathBuf;

use structopt::StructOpt;
use tokio::runtime::Builder;

use dmxctl::models::Config;

mod cli;

#[derive(Debug, StructOpt)]
#[structopt(about = "DMX512 lighting controller")]
struct Opts {
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    /// Path to the configuration file
    #[structopt(short, long = "config")]
    config_path: Option<PathBuf>,
    #[structopt(subcommand)]
    command: cli::Command,
}

async fn load_config(opts: &Opts) -> color_eyre::eyre::Result<Config> {
    if let Some(config_path) = opts.config_path.as_deref() {
        return Ok(Config::load_file(config_path).await?);
    }

    match Config::default_path() {
        Some(path) if path.exists() => Ok(Config::load_file(&path).await?),
        _ => {
            debug!("no configuration file, using defaults");
            Ok(Config::default())
        }
    }
}

async fn run(opts: Opts) -> color_eyre::eyre::Result<()> {
    debug!(
        version = %option_env!("DMXCTL_VERSION_ID").unwrap_or(env!("CARGO_PKG_VERSION")),
        "starting"
    );

    let config = load_config(&opts).await?;
    opts.command.run(config).await
}

fn install_tracing(opts: &Opts) -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let fmt_layer = fmt::layer();

    let filter_layer = EnvFilter::try_from_env("DMXCTL_LOG").unwrap_or_else(|_| {
        EnvFilter::new(match opts.verbose {
            0 => "dmxctl=info",
            1 => "dmxctl=debug",
            _ => "dmxctl=trace",
        })
    });

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init()
}

#[paw::main]
fn main(opts: Opts) -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    install_tracing(&opts)?;

    // Create tokio runtime
    let thd_count = match num_cpus::get() {
        1 => 2,
        other => other.min(4),
    };

    let rt = Builder::new_multi_thread()
        .worker_threads(thd_count)
        .enable_all()
        .build()?;
    rt.block_on(run(opts))
}
