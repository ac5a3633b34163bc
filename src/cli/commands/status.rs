use colored::Colorize;

use crate::adapters::process::command_runner::CommandRunner;
use crate::cli::context::AppContext;
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::manifest::TransferManifest;
use crate::core::models::repository::Repository;
use crate::core::services::mount_manager::MountState;

/// Execute the `loft status` command.
///
/// Read-only overview of every selected repository: storage, sources,
/// remotes, mount state and the last sync recorded on reachable remotes.
pub fn execute(ctx: &AppContext) -> Result<bool> {
    output::header(&format!("loft v{}", env!("CARGO_PKG_VERSION")));
    println!("  Data root: {}", ctx.data_root.display());

    for repo in ctx.repositories()? {
        print_repository(ctx, &repo);
    }
    Ok(true)
}

fn print_repository(ctx: &AppContext, repo: &Repository) {
    output::header(&format!("{} ({})", repo.name, repo.backend_kind));

    let storage = if repo.path.is_dir() {
        "present".green()
    } else {
        "missing".red()
    };
    println!("  Storage: {} [{storage}]", repo.path.display());
    let engine = if CommandRunner::is_available(repo.backend.name()) {
        "installed".green()
    } else {
        "not found on PATH".red()
    };
    println!("  Engine:  {} [{engine}]", repo.backend.name());

    println!("\n{}", "  Sources".bold());
    for source in &repo.sources {
        let exclusions = if source.excluded_extensions.is_empty() {
            String::new()
        } else {
            format!(
                " (excludes {})",
                source
                    .excluded_extensions
                    .iter()
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        };
        let marker = if source.target_dir.is_dir() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "    {marker} {} → {}{}",
            source.name,
            source.target_dir.display(),
            exclusions.dimmed()
        );
    }

    println!("\n{}", "  Mount".bold());
    match ctx.mounts().state(repo, &repo.temp_dir) {
        Ok(MountState::Mounted) => {
            println!("    {} at {}", "mounted".green(), repo.temp_dir.display());
        }
        Ok(state) => println!("    {state} ({})", repo.temp_dir.display()),
        Err(e) => output::warning(&format!("mount state unknown: {e}")),
    }

    println!("\n{}", "  Remotes".bold());
    if repo.remotes.is_empty() {
        println!("    {}", "none configured".dimmed());
    }
    let resolver = ctx.resolver(repo);
    for spec in &repo.remotes {
        let remote = resolver.resolve(&spec.name);
        let flags = format!(
            "known={} cloud={}",
            remote.is_known(),
            remote.is_cloud()
        );
        let last = remote
            .local_destination(&repo.name)
            .and_then(|path| TransferManifest::read_from(&path).ok().flatten())
            .map(|m| format!(", last synced {}", m.synced_at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        let marker = if remote.is_known() {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("    {marker} {remote} [{flags}]{}", last.dimmed());
    }
}
