use colored::Colorize;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::core::errors::Result;
use crate::core::models::outcome::LineKind;
use crate::core::models::snapshot::Snapshot;
use crate::core::traits::reporter::Reporter;

#[derive(Serialize)]
struct RepositoryListing {
    repository: String,
    backend: String,
    success: bool,
    snapshots: Vec<Snapshot>,
}

/// Execute the `loft list` command.
pub fn execute(ctx: &AppContext, json: bool) -> Result<bool> {
    let mut all_ok = true;
    let mut listings = Vec::new();

    for repo in ctx.repositories()? {
        let (outcome, snapshots) = match ctx.backup().list(&repo) {
            Ok(result) => result,
            Err(e) => {
                ctx.reporter.error(&e.to_string());
                all_ok = false;
                continue;
            }
        };
        all_ok &= outcome.success;
        for line in outcome.findings() {
            match line.kind {
                LineKind::Warning => ctx.reporter.warning(&line.text),
                LineKind::Fatal => ctx.reporter.error(&line.text),
                _ => {}
            }
        }

        if json {
            listings.push(RepositoryListing {
                repository: repo.name.clone(),
                backend: repo.backend_kind.to_string(),
                success: outcome.success,
                snapshots,
            });
            continue;
        }

        ctx.reporter
            .header(&format!("{} ({})", repo.name, repo.backend_kind));
        for source in &repo.sources {
            let own: Vec<&Snapshot> = snapshots.iter().filter(|s| s.source == source.name).collect();
            println!("  {} ({} snapshot(s))", source.name.bold(), own.len());
            for snapshot in own {
                match &snapshot.time {
                    Some(time) => println!("    {}  {}", snapshot.id, time.dimmed()),
                    None => println!("    {}", snapshot.id),
                }
            }
        }
    }

    if json {
        let text = serde_json::to_string_pretty(&listings).map_err(std::io::Error::other)?;
        println!("{text}");
    }
    Ok(all_ok)
}
