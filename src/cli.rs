//! Subcommands of the dmxctl binary

use std::future::Future;

use color_eyre::eyre::Result;
use futures::future::{self, Either};
use structopt::StructOpt;
use tokio::signal;

use dmxctl::models::Config;

mod check;
mod demo;
mod list_devices;
mod run;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Transmit the configured rig until interrupted
    Run,
    /// List the serial ports DMX adapters can be attached to
    ListDevices,
    /// Play sine waves on the color channels of every fixture
    Demo(demo::DemoOpts),
    /// Sweep every function of the patched fixtures
    Check(check::CheckOpts),
    /// Print the effective configuration
    DumpConfig,
}

impl Command {
    pub async fn run(self, config: Config) -> Result<()> {
        match self {
            Command::Run => run::run(config).await,
            Command::ListDevices => list_devices::run(),
            Command::Demo(opts) => demo::run(config, opts).await,
            Command::Check(opts) => check::run(config, opts).await,
            Command::DumpConfig => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
        }
    }
}

/// Run `task` until it completes or Ctrl+C is pressed. Returns `None` if interrupted.
async fn until_interrupted<T>(task: impl Future<Output = T>) -> Result<Option<T>> {
    futures::pin_mut!(task);
    let ctrl_c = signal::ctrl_c();
    futures::pin_mut!(ctrl_c);

    match future::select(task, ctrl_c).await {
        Either::Left((value, _)) => Ok(Some(value)),
        Either::Right((result, _)) => {
            result?;
            info!("interrupted");
            Ok(None)
        }
    }
}
