use std::path::Path;
use std::process::{Command, Stdio};

use crate::core::errors::{LoftError, Result};
use crate::core::models::mount_table::MountTable;
use crate::core::traits::mount_lister::MountLister;

const PROC_MOUNTS: &str = "/proc/self/mounts";

/// Reads the live mount list: `/proc/self/mounts` where the kernel
/// provides it, otherwise the output of `mount` with no arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMountLister;

impl SystemMountLister {
    fn run_mount() -> Result<MountTable> {
        let output = Command::new("mount")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| LoftError::MountTable {
                detail: format!("cannot run mount: {e}"),
            })?;
        if !output.status.success() {
            return Err(LoftError::MountTable {
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(MountTable::parse(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl MountLister for SystemMountLister {
    fn snapshot(&self) -> Result<MountTable> {
        if Path::new(PROC_MOUNTS).exists() {
            let text = std::fs::read_to_string(PROC_MOUNTS).map_err(|e| LoftError::MountTable {
                detail: format!("read {PROC_MOUNTS}: {e}"),
            })?;
            return Ok(MountTable::parse_proc(&text));
        }
        Self::run_mount()
    }
}
