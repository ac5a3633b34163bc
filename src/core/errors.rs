use std::path::PathBuf;

/// All domain errors for loft.
///
/// These cover precondition and configuration failures only. A backend
/// or transfer tool that runs and fails is reported through an
/// `Outcome`, never through this type.
#[derive(Debug, thiserror::Error)]
pub enum LoftError {
    #[error(
        "Config file not found: {path}\n\n  \
         Create it, or point loft at another file:\n    \
         → loft --config path/to/config.toml <command>\n    \
         → LOFT_CONFIG=path/to/config.toml loft <command>"
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {detail}")]
    InvalidConfig { detail: String },

    #[error(
        "Repository '{name}' not found\n\n  \
         Available repositories: {available}"
    )]
    RepositoryNotFound { name: String, available: String },

    #[error(
        "This command works on one repository at a time\n\n  \
         Pick one with -r: {available}"
    )]
    AmbiguousRepository { available: String },

    #[error(
        "Repository storage for '{name}' does not exist: {path}\n\n  \
         Solutions:\n    \
         → Create it: loft init -r {name}\n    \
         → Or recover it from a remote: loft recover <remote> {path} -r {name}"
    )]
    RepositoryMissing { name: String, path: PathBuf },

    #[error(
        "{path} is already mounted\n\n  \
         A previous mount may have outlived the process that created it.\n  \
         Unmount it first: loft unmount --target {path}"
    )]
    AlreadyMounted { path: PathBuf },

    #[error(
        "Mount target is not empty: {path}\n\n  \
         loft only mounts on a missing or empty directory."
    )]
    TargetNotEmpty { path: PathBuf },

    #[error("Mount table unavailable: {detail}")]
    MountTable { detail: String },

    #[error("View configuration cipher failed: {reason}")]
    Cipher { reason: String },

    #[error("Manifest error in {path}: {detail}")]
    Manifest { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LoftError>;
