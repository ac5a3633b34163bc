use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::core::services::mirror;
use crate::core::errors::{LoftError, Result};
use crate::core::models::manifest::{MANIFEST_FILE, TransferManifest};
use crate::core::models::outcome::{LogLine, Outcome};
use crate::core::models::remote::Remote;
use crate::core::models::repository::Repository;
use crate::core::traits::cipher::ArtifactCipher;
use crate::core::traits::cloud_transfer::CloudTransfer;
use crate::core::traits::reporter::Reporter;

/// Directory under the data root holding encrypted view configurations.
pub const VIEW_CONFIG_DIR: &str = "view_configs";

/// Copies repository storage to remotes and back.
///
/// Folder and disk remotes are mirrored natively; cloud remotes go
/// through the `CloudTransfer` port. A successful sync always leaves a
/// `TransferManifest` at the remote root.
pub struct SyncService<'a> {
    pub reporter: &'a dyn Reporter,
    pub transfer: &'a dyn CloudTransfer,
    pub cipher: &'a dyn ArtifactCipher,
    /// Per-user application data root.
    pub data_root: &'a Path,
}

impl SyncService<'_> {
    /// Copy `repo`'s storage to `remote`.
    ///
    /// An unresolved remote fails immediately without touching anything.
    pub fn sync(&self, repo: &Repository, remote: &Remote) -> Result<Outcome> {
        if !remote.is_known() {
            return Ok(Outcome::failed(format!("remote '{}' is not known", remote.name)));
        }
        repo.require_storage()?;

        if let Some(destination) = remote.local_destination(&repo.name) {
            self.sync_local(repo, remote, &destination)
        } else if let Some(destination) = remote.cloud_destination(&repo.name) {
            self.sync_cloud(repo, remote, &destination)
        } else {
            Ok(Outcome::failed(format!("remote '{}' has no destination", remote.name)))
        }
    }

    /// Rebuild a repository's storage at `destination` from `remote`.
    ///
    /// The result is a usable repository: `restore` and `list` work
    /// against it as against the original. The manifest is not copied.
    pub fn recover(&self, repo: &Repository, remote: &Remote, destination: &Path) -> Result<Outcome> {
        if !remote.is_known() {
            return Ok(Outcome::failed(format!("remote '{}' is not known", remote.name)));
        }

        if let Some(source) = remote.local_destination(&repo.name) {
            self.recover_local(remote, &source, destination)
        } else if let Some(source) = remote.cloud_destination(&repo.name) {
            self.reporter
                .info(&format!("Downloading {source} to {}", destination.display()));
            std::fs::create_dir_all(destination)?;
            let outcome = self.transfer.pull_dir(&source, destination, &[MANIFEST_FILE]);
            self.reporter.finish_progress();
            Ok(outcome)
        } else {
            Ok(Outcome::failed(format!("remote '{}' has no source", remote.name)))
        }
    }

    /// Location of the encrypted view configuration of `repository`.
    pub fn view_config_artifact(&self, repository: &str) -> PathBuf {
        self.data_root
            .join(VIEW_CONFIG_DIR)
            .join(format!("{repository}.xml.{}", self.cipher.extension()))
    }

    fn sync_local(&self, repo: &Repository, remote: &Remote, destination: &Path) -> Result<Outcome> {
        self.reporter.info(&format!(
            "Mirroring {} to {}",
            repo.path.display(),
            destination.display()
        ));
        let stats = match mirror::mirror(&repo.path, destination, &[MANIFEST_FILE]) {
            Ok(stats) => stats,
            Err(e) => return Ok(Outcome::failed(format!("mirror to {} failed: {e}", destination.display()))),
        };

        let manifest = self.manifest(repo, remote, &stats.listing);
        let path = manifest.write_to(destination)?;
        self.reporter.detail(&format!("wrote {}", path.display()));

        let mut outcome = Outcome::ok().with_info(format!(
            "{} file(s) copied, {} unchanged, {} bytes transferred",
            stats.copied, stats.unchanged, stats.bytes
        ));
        warn_skipped(&mut outcome, &stats.skipped);
        Ok(outcome.with_files(manifest.files))
    }

    fn sync_cloud(&self, repo: &Repository, remote: &Remote, destination: &str) -> Result<Outcome> {
        let mut outcome = Outcome::ok();
        if let Some(view_config) = &repo.view_config {
            let artifact = self.protect_view_config(repo, view_config)?;
            outcome = outcome.with_info(format!("view configuration saved to {}", artifact.display()));
        }

        self.reporter.info(&format!(
            "Copying {} to {destination} with {}",
            repo.path.display(),
            self.transfer.name()
        ));
        outcome.absorb(self.transfer.push_dir(&repo.path, destination));
        self.reporter.finish_progress();
        if !outcome.success {
            return Ok(outcome);
        }

        let listing = mirror::listing(&repo.path, &[MANIFEST_FILE])?;
        let manifest = self.manifest(repo, remote, &listing);
        let staging = tempfile::tempdir()?;
        let local = manifest.write_to(staging.path())?;
        let target = format!("{}/{MANIFEST_FILE}", destination.trim_end_matches('/'));
        outcome.absorb(self.transfer.push_file(&local, &target));
        Ok(outcome.with_files(manifest.files))
    }

    fn protect_view_config(&self, repo: &Repository, view_config: &Path) -> Result<PathBuf> {
        let plaintext = std::fs::read(view_config).map_err(|e| LoftError::Cipher {
            reason: format!("cannot read {}: {e}", view_config.display()),
        })?;
        let ciphertext = self.cipher.encrypt(&plaintext, &repo.passphrase)?;

        let artifact = self.view_config_artifact(&repo.name);
        let dir = self.data_root.join(VIEW_CONFIG_DIR);
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&ciphertext)?;
        tmp.persist(&artifact).map_err(|e| LoftError::Cipher {
            reason: format!("cannot write {}: {e}", artifact.display()),
        })?;
        self.reporter.detail(&format!("encrypted {}", view_config.display()));
        Ok(artifact)
    }

    fn recover_local(&self, remote: &Remote, source: &Path, destination: &Path) -> Result<Outcome> {
        let mut outcome = Outcome::ok();
        match TransferManifest::read_from(source) {
            Ok(Some(manifest)) => {
                outcome = outcome.with_info(format!(
                    "{} last synced {} ({} files)",
                    remote.name,
                    manifest.synced_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    manifest.files
                ));
            }
            Ok(None) => outcome.log.push(LogLine::warning(format!(
                "no {MANIFEST_FILE} in {}: the last sync may not have completed",
                source.display()
            ))),
            Err(e) => outcome.log.push(LogLine::warning(e.to_string())),
        }

        self.reporter.info(&format!(
            "Copying {} to {}",
            source.display(),
            destination.display()
        ));
        match mirror::mirror(source, destination, &[MANIFEST_FILE]) {
            Ok(stats) => {
                outcome = outcome.with_info(format!("{} file(s) recovered", stats.listing.len()));
                warn_skipped(&mut outcome, &stats.skipped);
                Ok(outcome.with_files(stats.listing.len() as u64))
            }
            Err(e) => {
                outcome.fail(format!("copy from {} failed: {e}", source.display()));
                Ok(outcome)
            }
        }
    }

    fn manifest(&self, repo: &Repository, remote: &Remote, listing: &[(PathBuf, u64)]) -> TransferManifest {
        TransferManifest {
            repository: repo.name.clone(),
            backend: repo.backend_kind.to_string(),
            remote: remote.name.clone(),
            synced_at: Utc::now(),
            files: listing.len() as u64,
            bytes: listing.iter().map(|(_, size)| size).sum(),
            digest: TransferManifest::digest_listing(listing),
        }
    }
}

/// Only regular files are mirrored; anything else is left behind loudly.
fn warn_skipped(outcome: &mut Outcome, skipped: &[PathBuf]) {
    for path in skipped {
        outcome.log.push(LogLine::warning(format!(
            "skipped {}: not a regular file",
            path.display()
        )));
    }
}
