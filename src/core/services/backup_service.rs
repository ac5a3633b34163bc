use std::path::Path;

use crate::core::errors::Result;
use crate::core::models::outcome::Outcome;
use crate::core::models::repository::Repository;
use crate::core::models::snapshot::Snapshot;
use crate::core::traits::reporter::Reporter;

/// Repository operations that go straight to the backend once the
/// preconditions hold.
pub struct BackupService<'a> {
    pub reporter: &'a dyn Reporter,
}

impl BackupService<'_> {
    /// Create the repository storage. Creates missing parent directories
    /// but never the storage directory itself, which the engine owns.
    pub fn init(&self, repo: &Repository) -> Result<Outcome> {
        if let Some(parent) = repo.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        self.reporter.info(&format!(
            "Initializing {} repository {} at {}",
            repo.backend.name(),
            repo.name,
            repo.path.display()
        ));
        Ok(self.finish(repo.backend.init(&repo.store())))
    }

    pub fn save(&self, repo: &Repository) -> Result<Outcome> {
        repo.require_storage()?;
        self.reporter
            .info(&format!("Saving {} source(s) into {}", repo.sources.len(), repo.name));
        Ok(self.finish(repo.backend.save(&repo.store(), &repo.sources)))
    }

    pub fn check(&self, repo: &Repository) -> Result<Outcome> {
        repo.require_storage()?;
        self.reporter.info(&format!("Checking {}", repo.name));
        Ok(self.finish(repo.backend.check_and_repair(&repo.store())))
    }

    /// Restore the latest state of every source into `destination/<source>`.
    pub fn restore(&self, repo: &Repository, destination: &Path) -> Result<Outcome> {
        repo.require_storage()?;
        self.reporter.info(&format!(
            "Restoring {} into {}",
            repo.name,
            destination.display()
        ));
        Ok(self.finish(repo.backend.restore(&repo.store(), &repo.sources, destination)))
    }

    pub fn list(&self, repo: &Repository) -> Result<(Outcome, Vec<Snapshot>)> {
        repo.require_storage()?;
        let (outcome, snapshots) = repo.backend.list(&repo.store(), &repo.sources);
        Ok((self.finish(outcome), snapshots))
    }

    fn finish(&self, outcome: Outcome) -> Outcome {
        self.reporter.finish_progress();
        outcome
    }
}
