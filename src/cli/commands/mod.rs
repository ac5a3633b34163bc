pub mod check;
pub mod init;
pub mod list;
pub mod mount;
pub mod recover;
pub mod restore;
pub mod save;
pub mod status;
pub mod sync;
pub mod unmount;

use std::path::{Path, PathBuf};

use crate::cli::context::AppContext;
use crate::core::errors::{LoftError, Result};
use crate::core::models::outcome::Outcome;
use crate::core::models::repository::Repository;
use crate::core::traits::reporter::Reporter;

/// Run `op` on every selected repository and print each verdict.
///
/// A precondition error on one repository is reported and counted as a
/// failure; the remaining repositories still run. Returns whether every
/// repository succeeded.
pub fn for_each_repository<F>(ctx: &AppContext, what: &str, mut op: F) -> Result<bool>
where
    F: FnMut(&Repository) -> Result<Outcome>,
{
    let repos = ctx.repositories()?;
    let mut all_ok = true;
    for repo in &repos {
        ctx.reporter
            .header(&format!("{} ({})", repo.name, repo.backend_kind));
        match op(repo) {
            Ok(outcome) => {
                ctx.reporter.outcome(what, &outcome);
                all_ok &= outcome.success;
            }
            Err(e) => {
                ctx.reporter.error(&e.to_string());
                all_ok = false;
            }
        }
    }
    Ok(all_ok)
}

/// The single selected repository.
pub fn single_repository(ctx: &AppContext) -> Result<Repository> {
    let mut repos = ctx.repositories()?;
    if repos.len() != 1 {
        return Err(LoftError::AmbiguousRepository {
            available: ctx.config.repository_names().join(", "),
        });
    }
    Ok(repos.remove(0))
}

/// `base` itself for a single repository, `base/<name>` when several
/// repositories share one command-line path.
pub fn per_repository(base: &Path, repo: &Repository, shared: bool) -> PathBuf {
    if shared {
        base.join(&repo.name)
    } else {
        base.to_path_buf()
    }
}
