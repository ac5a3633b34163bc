pub mod archiver_backend;
pub mod bup_backend;
pub mod duplicity_backend;

use std::path::{Path, PathBuf};

use crate::adapters::process::command_runner::{CommandRunner, CommandSpec};
use crate::core::models::repository::BackendKind;
use crate::core::traits::backend::BackupBackend;

use archiver_backend::{ArchiverBackend, ATTIC, BORG};
use bup_backend::BupBackend;
use duplicity_backend::DuplicityBackend;

/// Build the adapter for a backend kind. Called once per repository.
pub fn build(kind: BackendKind, runner: CommandRunner) -> Box<dyn BackupBackend> {
    match kind {
        BackendKind::Bup => Box::new(BupBackend::new(runner)),
        BackendKind::Borg => Box::new(ArchiverBackend::new(&BORG, runner)),
        BackendKind::Attic => Box::new(ArchiverBackend::new(&ATTIC, runner)),
        BackendKind::Duplicity => Box::new(DuplicityBackend::new(runner)),
    }
}

/// Absolute form of `path`, without touching the filesystem.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Command detaching a FUSE mount point.
pub(crate) fn fuse_unmount(mount_point: &Path) -> CommandSpec<'static> {
    if cfg!(target_os = "linux") {
        CommandSpec::new("fusermount").arg("-u").arg(mount_point)
    } else {
        CommandSpec::new("umount").arg(mount_point)
    }
}
