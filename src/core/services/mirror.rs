use std::fs::{self, File};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::errors::{LoftError, Result};

/// What a mirror pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    pub copied: u64,
    pub unchanged: u64,
    pub bytes: u64,
    /// Every file now mirrored, relative to the mirror root, with its size.
    pub listing: Vec<(PathBuf, u64)>,
    /// Symlinks, sockets and other entries that are not regular files.
    pub skipped: Vec<PathBuf>,
}

/// Copy the tree under `source` into `destination`.
///
/// A file is copied when it is missing on the destination or differs in
/// size or modification time; copies keep the source's modification
/// time so the next pass skips them. Nothing on the destination is ever
/// deleted. Root-level entries named in `skip_root` are ignored.
pub fn mirror(source: &Path, destination: &Path, skip_root: &[&str]) -> Result<MirrorStats> {
    if !source.is_dir() {
        return Err(LoftError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", source.display()),
        )));
    }
    fs::create_dir_all(destination)?;

    let mut stats = MirrorStats::default();
    let walker = WalkDir::new(source).min_depth(1).sort_by_file_name().into_iter();
    let walker = walker.filter_entry(|entry| {
        entry.depth() != 1 || !skip_root.iter().any(|name| entry.file_name() == *name)
    });

    for entry in walker {
        let entry = entry.map_err(|e| LoftError::Io(e.into()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| LoftError::Io(std::io::Error::other(e)))?
            .to_path_buf();
        let target = destination.join(&relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if !entry.file_type().is_file() {
            stats.skipped.push(relative);
            continue;
        }

        let meta = entry.metadata().map_err(|e| LoftError::Io(e.into()))?;
        let size = meta.len();
        if is_current(&target, size, &meta)? {
            stats.unchanged += 1;
        } else {
            copy_file(entry.path(), &target, &meta)?;
            stats.copied += 1;
            stats.bytes += size;
        }
        stats.listing.push((relative, size));
    }

    Ok(stats)
}

/// Files under `root` with their sizes, relative to `root` and sorted,
/// skipping root-level entries named in `skip_root`.
pub fn listing(root: &Path, skip_root: &[&str]) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root).min_depth(1).sort_by_file_name().into_iter();
    for entry in walker.filter_entry(|e| e.depth() != 1 || !skip_root.iter().any(|n| e.file_name() == *n)) {
        let entry = entry.map_err(|e| LoftError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let size = entry.metadata().map_err(|e| LoftError::Io(e.into()))?.len();
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push((relative.to_path_buf(), size));
        }
    }
    Ok(files)
}

fn is_current(target: &Path, size: u64, source_meta: &fs::Metadata) -> Result<bool> {
    let Ok(existing) = fs::metadata(target) else {
        return Ok(false);
    };
    if !existing.is_file() || existing.len() != size {
        return Ok(false);
    }
    Ok(existing.modified()? == source_meta.modified()?)
}

fn copy_file(from: &Path, to: &Path, meta: &fs::Metadata) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    File::options().write(true).open(to)?.set_modified(meta.modified()?)?;
    Ok(())
}
