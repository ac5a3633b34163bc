use crate::cli::context::AppContext;
use crate::core::errors::Result;
use crate::core::models::outcome::Outcome;
use crate::core::traits::reporter::Reporter;

/// Execute the `loft sync` command.
///
/// With a remote identifier, syncs every selected repository to it.
/// Without one, syncs each repository to all of its configured remotes.
pub fn execute(ctx: &AppContext, remote: Option<&str>) -> Result<bool> {
    let mut all_ok = true;
    for repo in ctx.repositories()? {
        ctx.reporter
            .header(&format!("{} ({})", repo.name, repo.backend_kind));

        let identifiers: Vec<String> = match remote {
            Some(id) => vec![id.to_string()],
            None => repo.remotes.iter().map(|r| r.name.clone()).collect(),
        };
        if identifiers.is_empty() {
            ctx.reporter
                .warning("no remotes configured; pass a folder path, disk label or cloud alias");
            continue;
        }

        let resolver = ctx.resolver(&repo);
        for identifier in identifiers {
            let target = resolver.resolve(&identifier);
            let outcome = if target.is_known() {
                ctx.reporter.detail(&format!("resolved {target}"));
                match ctx.sync().sync(&repo, &target) {
                    Ok(outcome) => outcome,
                    Err(e) => Outcome::failed(e.to_string()),
                }
            } else {
                Outcome::failed(format!(
                    "remote '{identifier}' is not known: not a path, a mounted disk label or a {} alias",
                    ctx.transfer_name()
                ))
            };
            ctx.reporter.outcome(&format!("Synced to {identifier}"), &outcome);
            all_ok &= outcome.success;
        }
    }
    Ok(all_ok)
}
