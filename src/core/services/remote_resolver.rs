use std::path::{Component, Path, PathBuf};

use crate::core::models::mount_table::MountTable;
use crate::core::models::remote::{Remote, RemoteKind, RemoteLocation, RemoteSpec};
use crate::core::traits::cloud_transfer::CloudTransfer;
use crate::core::traits::mount_lister::MountLister;
use crate::core::traits::reporter::Reporter;

/// Turns a free-form remote identifier into a `Remote`.
///
/// Tried in order: a filesystem path, the volume label of a mounted
/// removable disk, a cloud alias. Resolution only reads state (the mount
/// list and the transfer tool's configuration); it never creates a
/// directory or starts a transfer, so a mistyped identifier is harmless.
pub struct RemoteResolver<'a> {
    configured: &'a [RemoteSpec],
    lister: &'a dyn MountLister,
    media_roots: &'a [PathBuf],
    transfer: &'a dyn CloudTransfer,
    reporter: &'a dyn Reporter,
}

impl<'a> RemoteResolver<'a> {
    pub fn new(
        configured: &'a [RemoteSpec],
        lister: &'a dyn MountLister,
        media_roots: &'a [PathBuf],
        transfer: &'a dyn CloudTransfer,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            configured,
            lister,
            media_roots,
            transfer,
            reporter,
        }
    }

    pub fn resolve(&self, identifier: &str) -> Remote {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Remote::unknown(identifier);
        }
        let spec = self.configured.iter().find(|r| r.name == identifier);
        let kind = spec.and_then(|s| s.kind);

        let location = match kind {
            Some(RemoteKind::Folder) => Some(self.folder(identifier, spec)),
            Some(RemoteKind::Disk) => self.disk(identifier),
            Some(RemoteKind::Cloud) => Some(self.configured_cloud(identifier, spec)),
            None => self
                .path(identifier, spec)
                .or_else(|| self.disk(identifier))
                .or_else(|| self.cloud(identifier)),
        };

        match location {
            Some(location) => Remote {
                name: identifier.to_string(),
                location: Some(location),
            },
            None => Remote::unknown(identifier),
        }
    }

    /// Whether `identifier` reads as a filesystem path rather than a name.
    pub fn looks_like_path(identifier: &str) -> bool {
        let path = Path::new(identifier);
        if path.is_absolute() || identifier.starts_with('~') {
            return true;
        }
        match path.components().next() {
            Some(Component::CurDir | Component::ParentDir) => true,
            // `alias:bucket/prefix` is a cloud container, not a relative path.
            Some(Component::Normal(first)) => {
                !first.to_string_lossy().contains(':') && path.components().count() > 1
            }
            _ => false,
        }
    }

    fn folder(&self, identifier: &str, spec: Option<&RemoteSpec>) -> RemoteLocation {
        let path = spec
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| expand_home(identifier));
        RemoteLocation::Folder(path)
    }

    fn path(&self, identifier: &str, spec: Option<&RemoteSpec>) -> Option<RemoteLocation> {
        if let Some(path) = spec.and_then(|s| s.path.clone()) {
            return Some(RemoteLocation::Folder(path));
        }
        if Self::looks_like_path(identifier) || Path::new(identifier).is_dir() {
            return Some(RemoteLocation::Folder(expand_home(identifier)));
        }
        None
    }

    fn disk(&self, label: &str) -> Option<RemoteLocation> {
        if Self::looks_like_path(label) || self.media_roots.is_empty() {
            return None;
        }
        let table: MountTable = match self.lister.snapshot() {
            Ok(table) => table,
            Err(e) => {
                self.reporter.detail(&format!("mount list unavailable: {e}"));
                return None;
            }
        };
        self.media_roots
            .iter()
            .map(|root| root.join(label))
            .find(|candidate| table.has_mount_point(candidate))
            .map(|mount_point| RemoteLocation::Disk {
                label: label.to_string(),
                mount_point,
            })
    }

    fn cloud(&self, identifier: &str) -> Option<RemoteLocation> {
        let alias = identifier.split_once(':').map_or(identifier, |(alias, _)| alias);
        let aliases = match self.transfer.aliases() {
            Ok(aliases) => aliases,
            Err(e) => {
                self.reporter
                    .detail(&format!("{} configuration unreadable: {e}", self.transfer.name()));
                return None;
            }
        };
        aliases.iter().any(|a| a == alias).then(|| RemoteLocation::Cloud {
            alias: alias.to_string(),
            container: if identifier.contains(':') {
                identifier.to_string()
            } else {
                format!("{identifier}:")
            },
        })
    }

    fn configured_cloud(&self, identifier: &str, spec: Option<&RemoteSpec>) -> RemoteLocation {
        let container = spec
            .and_then(|s| s.container.clone())
            .unwrap_or_else(|| format!("{identifier}:"));
        let alias = container
            .split_once(':')
            .map_or(identifier, |(alias, _)| alias)
            .to_string();
        RemoteLocation::Cloud { alias, container }
    }
}

fn expand_home(identifier: &str) -> PathBuf {
    if let Some(rest) = identifier.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(identifier)
}
