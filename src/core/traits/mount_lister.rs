use crate::core::errors::Result;
use crate::core::models::mount_table::MountTable;

/// Port for reading the live system mount list.
///
/// Mounts can outlive the process that created them, so mount state is
/// always read from here rather than remembered.
pub trait MountLister: Send + Sync {
    fn snapshot(&self) -> Result<MountTable>;
}
