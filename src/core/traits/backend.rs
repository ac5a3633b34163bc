use std::path::Path;

use age::secrecy::SecretString;

use crate::core::models::outcome::Outcome;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::source::Source;

/// A repository's storage as a backend sees it: where it lives and the
/// secret that unlocks it.
pub struct Store<'a> {
    pub path: &'a Path,
    pub passphrase: &'a SecretString,
}

/// Port for backup engines.
///
/// Implementations live in `adapters::backends` (e.g. BupBackend,
/// ArchiverBackend). Each method maps one common operation onto the
/// engine's own CLI. Methods never return errors: any failure comes back
/// as an unsuccessful `Outcome` carrying the captured process output.
pub trait BackupBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "bup", "borg").
    fn name(&self) -> &str;

    /// Filesystem tag identifying this backend's mounts in the mount table.
    fn mount_tag(&self) -> &str;

    /// Create an empty repository at `store.path`.
    fn init(&self, store: &Store<'_>) -> Outcome;

    /// Back up every source, honouring each source's exclusion policy.
    fn save(&self, store: &Store<'_>, sources: &[Source]) -> Outcome;

    /// Verify the repository and repair what the engine can repair.
    fn check_and_repair(&self, store: &Store<'_>) -> Outcome;

    /// Expose `<target>/<source>/latest` for every source.
    fn mount(&self, store: &Store<'_>, sources: &[Source], target: &Path) -> Outcome;

    /// Detach a single mount point created by `mount`.
    fn unmount(&self, mount_point: &Path) -> Outcome;

    /// Restore the latest state of every source into `destination/<source>`,
    /// reading from a repository located at `location` rather than the
    /// repository's own path.
    fn recover(&self, location: &Store<'_>, sources: &[Source], destination: &Path) -> Outcome;

    /// Restore the latest state of every source into `destination/<source>`.
    fn restore(&self, store: &Store<'_>, sources: &[Source], destination: &Path) -> Outcome {
        self.recover(store, sources, destination)
    }

    /// Snapshots available per source, oldest first.
    fn list(&self, store: &Store<'_>, sources: &[Source]) -> (Outcome, Vec<Snapshot>);
}
