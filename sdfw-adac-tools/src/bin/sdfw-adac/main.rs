mod cmd;
mod util;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use probe_rs::probe::list::Lister;

use crate::util::{
    config::Config,
    logging::{setup_logging, LevelFilter},
};

#[derive(clap::Parser)]
#[clap(
    name = "sdfw-adac",
    about = "Talk to the Secure Domain Firmware through the CTRL-AP mailbox",
    version
)]
struct Cli {
    /// Configuration file
    ///
    /// Defaults to `sdfw-adac.toml` in the working directory, if it exists.
    /// Values can also be set through `SDFW_ADAC_*` environment variables.
    #[clap(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Location for log file
    ///
    /// The file receives every event down to TRACE, including each mailbox register access.
    #[clap(long, global = true, help_heading = "LOG CONFIGURATION")]
    log_file: Option<PathBuf>,

    /// Console log level. Overrides `RUST_LOG` and the configuration.
    #[clap(long, global = true, value_enum, help_heading = "LOG CONFIGURATION")]
    log_level: Option<LevelFilter>,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

impl Cli {
    fn run(self, config: &Config) -> Result<()> {
        let lister = Lister::new();
        match self.subcommand {
            Subcommand::List(cmd) => cmd.run(&lister),
            Subcommand::Adac(cmd) => cmd.run(&lister, config),
            Subcommand::Ssf(cmd) => cmd.run(&lister, config),
            Subcommand::Raw(cmd) => cmd.run(&lister, config),
        }
    }
}

#[derive(clap::Subcommand)]
enum Subcommand {
    /// List all connected debug probes
    List(cmd::list::Cmd),
    Adac(cmd::adac::Cmd),
    Ssf(cmd::ssf::Cmd),
    Raw(cmd::raw::Cmd),
}

fn main() -> Result<()> {
    // Parse the commandline options.
    let matches = Cli::parse();

    let config = Config::load(matches.config.as_deref())
        .context("Failed to load configuration.")?;

    let _log_file = setup_logging(
        matches.log_file.clone(),
        matches.log_level.or(config.log_level),
    )?;

    matches.run(&config)
}
