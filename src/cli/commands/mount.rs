use std::path::Path;

use crate::cli::commands::{for_each_repository, per_repository};
use crate::cli::context::AppContext;
use crate::core::errors::Result;

/// Execute the `loft mount` command.
///
/// Mounts at `--target` when given (one subdirectory per repository if
/// several are selected), otherwise at each repository's `temp_dir`.
pub fn execute(ctx: &AppContext, target: Option<&Path>) -> Result<bool> {
    let shared = ctx.repositories()?.len() > 1;
    for_each_repository(ctx, "Mounted", |repo| {
        let target = match target {
            Some(base) => per_repository(base, repo, shared),
            None => repo.temp_dir.clone(),
        };
        ctx.mounts().mount(repo, &target)
    })
}
