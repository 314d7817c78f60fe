//! teazer - parameter sweeps for trajectory simulations on SGE clusters
//!
//! Entry point of the command-line tool; see [`teazer_cli::cli`] for the
//! available subcommands.

use anyhow::Result;
use clap::Parser;
use teazer_cli::cli;
use teazer_cli::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
