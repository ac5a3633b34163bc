use std::path::Path;

use crate::cli::commands::single_repository;
use crate::cli::context::AppContext;
use crate::core::errors::Result;
use crate::core::models::outcome::Outcome;

/// Execute the `loft recover` command.
///
/// Rebuilds the storage of one repository at `destination` from a remote
/// it was synced to. Point the repository's `path` at `destination` to
/// restore from it.
pub fn execute(ctx: &AppContext, remote: &str, destination: &Path) -> Result<bool> {
    let repo = single_repository(ctx)?;
    ctx.reporter
        .header(&format!("{} ({})", repo.name, repo.backend_kind));

    let source = ctx.resolver(&repo).resolve(remote);
    let outcome = if source.is_known() {
        ctx.sync().recover(&repo, &source, destination)?
    } else {
        Outcome::failed(format!(
            "remote '{remote}' is not known: not a path, a mounted disk label or a {} alias",
            ctx.transfer_name()
        ))
    };
    ctx.reporter.outcome(
        &format!("Recovered {} from {remote} into {}", repo.name, destination.display()),
        &outcome,
    );
    Ok(outcome.success)
}
