use crate::cli::commands::for_each_repository;
use crate::cli::context::AppContext;
use crate::core::errors::Result;

/// Execute the `loft save` command.
///
/// Backs up every source of each selected repository. The number of
/// files that survived the exclusion policy is part of the report.
pub fn execute(ctx: &AppContext) -> Result<bool> {
    for_each_repository(ctx, "Backup saved", |repo| ctx.backup().save(repo))
}
