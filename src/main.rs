mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;

use cli::context::AppContext;
use cli::{Cli, Commands};

fn main() {
    let args = Cli::parse();

    let result = AppContext::from_cli(&args).and_then(|ctx| match &args.command {
        Commands::Init => cli::commands::init::execute(&ctx),
        Commands::Save => cli::commands::save::execute(&ctx),
        Commands::Check => cli::commands::check::execute(&ctx),
        Commands::Mount { target } => cli::commands::mount::execute(&ctx, target.as_deref()),
        Commands::Unmount { target } => cli::commands::unmount::execute(&ctx, target.as_deref()),
        Commands::Restore { destination } => cli::commands::restore::execute(&ctx, destination),
        Commands::List { json } => cli::commands::list::execute(&ctx, *json),
        Commands::Sync { remote } => cli::commands::sync::execute(&ctx, remote.as_deref()),
        Commands::Recover {
            remote,
            destination,
        } => cli::commands::recover::execute(&ctx, remote, destination),
        Commands::Status => cli::commands::status::execute(&ctx),
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            cli::output::error(&format!("Error: {e}"));
            std::process::exit(1);
        }
    }
}
