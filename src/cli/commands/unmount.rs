use std::path::Path;

use crate::cli::commands::{for_each_repository, per_repository};
use crate::cli::context::AppContext;
use crate::core::errors::Result;

/// Execute the `loft unmount` command. Succeeds on targets that are not
/// mounted.
pub fn execute(ctx: &AppContext, target: Option<&Path>) -> Result<bool> {
    let shared = ctx.repositories()?.len() > 1;
    for_each_repository(ctx, "Unmounted", |repo| {
        let target = match target {
            Some(base) => per_repository(base, repo, shared),
            None => repo.temp_dir.clone(),
        };
        ctx.mounts().unmount(repo, &target)
    })
}
