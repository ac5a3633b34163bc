use std::path::Path;

use crate::cli::commands::{for_each_repository, per_repository};
use crate::cli::context::AppContext;
use crate::core::errors::Result;

/// Execute the `loft restore` command.
///
/// Each source lands in `<destination>/<source>`, or in
/// `<destination>/<repository>/<source>` when several repositories are
/// selected.
pub fn execute(ctx: &AppContext, destination: &Path) -> Result<bool> {
    let shared = ctx.repositories()?.len() > 1;
    for_each_repository(ctx, "Restored", |repo| {
        ctx.backup()
            .restore(repo, &per_repository(destination, repo, shared))
    })
}
