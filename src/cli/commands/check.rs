use crate::cli::commands::for_each_repository;
use crate::cli::context::AppContext;
use crate::core::errors::Result;

/// Execute the `loft check` command.
pub fn execute(ctx: &AppContext) -> Result<bool> {
    for_each_repository(ctx, "Repository is consistent", |repo| {
        ctx.backup().check(repo)
    })
}
