use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Optional hint on a configured remote, narrowing how it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    Folder,
    Disk,
    Cloud,
}

/// A remote as declared in a repository's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub name: String,
    pub kind: Option<RemoteKind>,
    /// Fixed destination for folder remotes.
    pub path: Option<PathBuf>,
    /// rclone container (`alias:` or `alias:bucket/prefix`) for cloud remotes.
    pub container: Option<String>,
}

/// Where a resolved remote actually lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteLocation {
    /// A local (or network-mounted) directory.
    Folder(PathBuf),
    /// A removable disk found in the mount table by its volume label.
    Disk { label: String, mount_point: PathBuf },
    /// A container reachable through the cloud transfer tool.
    Cloud { alias: String, container: String },
}

/// A transfer destination. `location` is `None` when the identifier did
/// not resolve; such a remote must never be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub location: Option<RemoteLocation>,
}

impl Remote {
    pub fn unknown(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    pub fn is_known(&self) -> bool {
        self.location.is_some()
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.location, Some(RemoteLocation::Cloud { .. }))
    }

    /// Local directory backing this remote (folder or disk).
    pub fn local_path(&self) -> Option<&Path> {
        match &self.location {
            Some(RemoteLocation::Folder(path)) => Some(path),
            Some(RemoteLocation::Disk { mount_point, .. }) => Some(mount_point),
            _ => None,
        }
    }

    /// Directory holding `repository` on a folder or disk remote. Every
    /// repository gets its own, so several can share one remote.
    pub fn local_destination(&self, repository: &str) -> Option<PathBuf> {
        self.local_path().map(|root| root.join(repository))
    }

    /// rclone destination for `repository` on a cloud remote.
    pub fn cloud_destination(&self, repository: &str) -> Option<String> {
        match &self.location {
            Some(RemoteLocation::Cloud { container, .. }) => {
                if container.ends_with(':') || container.ends_with('/') {
                    Some(format!("{container}{repository}"))
                } else {
                    Some(format!("{container}/{repository}"))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(RemoteLocation::Folder(path)) => write!(f, "{} (folder {})", self.name, path.display()),
            Some(RemoteLocation::Disk { mount_point, .. }) => {
                write!(f, "{} (disk {})", self.name, mount_point.display())
            }
            Some(RemoteLocation::Cloud { container, .. }) => {
                write!(f, "{} (cloud {container})", self.name)
            }
            None => write!(f, "{} (unknown)", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud(container: &str) -> Remote {
        Remote {
            name: "hubic".into(),
            location: Some(RemoteLocation::Cloud {
                alias: "hubic".into(),
                container: container.into(),
            }),
        }
    }

    #[test]
    fn flags_follow_location() {
        let unknown = Remote::unknown("pof");
        assert!(!unknown.is_known());
        assert!(!unknown.is_cloud());

        let c = cloud("hubic:");
        assert!(c.is_known());
        assert!(c.is_cloud());
        assert!(c.local_path().is_none());
    }

    #[test]
    fn local_destination_is_per_repository() {
        let nas = Remote {
            name: "/mnt/nas".into(),
            location: Some(RemoteLocation::Folder(PathBuf::from("/mnt/nas"))),
        };
        assert_eq!(nas.local_destination("test1"), Some(PathBuf::from("/mnt/nas/test1")));
        assert!(cloud("hubic:").local_destination("test1").is_none());
    }

    #[test]
    fn cloud_destination_joins_repository() {
        assert_eq!(cloud("hubic:").cloud_destination("test1").unwrap(), "hubic:test1");
        assert_eq!(
            cloud("hubic:backups").cloud_destination("test1").unwrap(),
            "hubic:backups/test1"
        );
        assert!(Remote::unknown("x").cloud_destination("test1").is_none());
    }
}
