//! audioseg CLI
//!
//! Command-line front end for the audioseg library.

use clap::Parser;
use env_logger::Env;
use log::debug;

use audioseg::cli::commands::{self, Session};
use audioseg::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    debug!("audioseg v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => {
            let session = Session::open(cli.config.as_deref())?;
            commands::run(&session, cmd)
        }
        None => {
            println!("audioseg v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}
