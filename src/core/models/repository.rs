use std::fmt;
use std::path::PathBuf;

use age::secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::core::errors::{LoftError, Result};
use crate::core::models::remote::RemoteSpec;
use crate::core::models::source::Source;
use crate::core::traits::backend::{BackupBackend, Store};

/// Supported backup engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Bup,
    Borg,
    Attic,
    Duplicity,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bup => "bup",
            Self::Borg => "borg",
            Self::Attic => "attic",
            Self::Duplicity => "duplicity",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named repository: one backend, its storage, what goes in, and
/// where copies go.
///
/// Built once from configuration; the backend is selected at that point
/// and never re-dispatched.
pub struct Repository {
    pub name: String,
    pub backend_kind: BackendKind,
    pub backend: Box<dyn BackupBackend>,
    pub path: PathBuf,
    pub passphrase: SecretString,
    pub sources: Vec<Source>,
    pub remotes: Vec<RemoteSpec>,
    /// Mount scratch directory. Created on first mount, removed on unmount.
    pub temp_dir: PathBuf,
    /// Encrypted-filesystem configuration to protect on cloud syncs.
    pub view_config: Option<PathBuf>,
}

impl Repository {
    pub fn store(&self) -> Store<'_> {
        Store {
            path: &self.path,
            passphrase: &self.passphrase,
        }
    }

    /// Fails unless the repository storage exists. Every operation except
    /// `init` checks this before starting any process.
    pub fn require_storage(&self) -> Result<()> {
        if self.path.is_dir() {
            Ok(())
        } else {
            Err(LoftError::RepositoryMissing {
                name: self.name.clone(),
                path: self.path.clone(),
            })
        }
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("backend", &self.backend_kind)
            .field("path", &self.path)
            .field("passphrase", &"<redacted>")
            .field("sources", &self.sources)
            .field("remotes", &self.remotes)
            .field("temp_dir", &self.temp_dir)
            .field("view_config", &self.view_config)
            .finish()
    }
}
