//! DockVault CLI - Vault for your Docker images
//!
//! Export/import Docker images giữa local daemon, thư mục local và
//! BDFS (Baidu netdisk). Mọi thao tác nặng đều ủy quyền cho `docker`
//! binary và xpan REST API; tool chỉ orchestrate tuần tự.

mod cli;
mod cloud;
mod config;
mod docker;
mod naming;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export {
            destination,
            cloud,
            grep,
        } => cli::commands::export(destination, cloud, &grep),
        Commands::Import {
            source,
            cloud,
            grep,
        } => cli::commands::import(source, cloud, &grep),
        Commands::Delete { grep } => cli::commands::delete(&grep),
        Commands::Clean => cli::commands::clean(),
        Commands::Version => {
            cli::commands::version();
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("{} {:#}", "[x]".red(), e);
        std::process::exit(1);
    }
}
