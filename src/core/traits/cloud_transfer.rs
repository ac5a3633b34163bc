use std::path::Path;

use crate::core::errors::Result;
use crate::core::models::outcome::Outcome;

/// Port for the external tool moving data to and from cloud containers.
///
/// Transfers are one-way copies: nothing is deleted on the receiving side.
pub trait CloudTransfer: Send + Sync {
    /// Human-readable name of the tool (e.g. "rclone").
    fn name(&self) -> &str;

    /// Aliases configured in the tool, without trailing colon.
    fn aliases(&self) -> Result<Vec<String>>;

    /// Copy the contents of `local` into `remote`.
    fn push_dir(&self, local: &Path, remote: &str) -> Outcome;

    /// Copy a single file to the exact `remote` path.
    fn push_file(&self, local: &Path, remote: &str) -> Outcome;

    /// Copy the contents of `remote` into `local`, skipping root-level
    /// files named in `exclude`.
    fn pull_dir(&self, remote: &str, local: &Path, exclude: &[&str]) -> Outcome;
}
