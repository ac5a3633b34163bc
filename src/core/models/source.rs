use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A folder backed up into a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub target_dir: PathBuf,
    /// File suffixes (without the leading dot) never included in a backup.
    pub excluded_extensions: Vec<String>,
}

impl Source {
    /// Returns true if the exclusion policy keeps `path` out of backups.
    pub fn excludes(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        self.excluded_extensions
            .iter()
            .any(|ext| name.ends_with(&format!(".{ext}")))
    }

    /// Regular files under `target_dir` that survive the exclusion policy,
    /// relative to `target_dir` and sorted.
    pub fn included_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.target_dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| !self.excludes(entry.path()))
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(&self.target_dir)
                    .ok()
                    .map(Path::to_path_buf)
            })
            .collect();
        files.sort();
        files
    }
}
