use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use age::secrecy::SecretString;

use crate::adapters::backends;
use crate::adapters::process::command_runner::CommandRunner;
use crate::core::errors::{LoftError, Result};
use crate::core::models::remote::{RemoteKind, RemoteSpec};
use crate::core::models::repository::{BackendKind, Repository};
use crate::core::models::source::Source;

/// Top-level loft configuration, read from `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub loft: LoftSection,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// The optional `[loft]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoftSection {
    /// Root for per-user application data (encrypted side artifacts).
    pub data_dir: Option<PathBuf>,
    /// Parent of the default per-repository mount directories.
    pub temp_root: Option<PathBuf>,
    /// rclone configuration file holding the cloud aliases.
    pub rclone_config: Option<PathBuf>,
}

/// A `[[repositories]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryEntry {
    pub name: String,
    pub backend: BackendKind,
    pub path: PathBuf,
    #[serde(default)]
    pub passphrase: String,
    pub view_config: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub remotes: Vec<RemoteEntry>,
}

/// A `[[repositories.sources]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceEntry {
    pub name: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub excluded_extensions: Vec<String>,
}

/// A `[[repositories.remotes]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: Option<RemoteKind>,
    pub path: Option<PathBuf>,
    pub container: Option<String>,
}

impl AppConfig {
    /// Default config location: `<user config dir>/loft/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| LoftError::InvalidConfig {
            detail: "Could not determine config directory".into(),
        })?;
        Ok(config_dir.join("loft").join("config.toml"))
    }

    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(LoftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let base_dir = std::path::absolute(path)?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&content, base_dir).map_err(|e| match e {
            LoftError::InvalidConfig { detail } => LoftError::InvalidConfig {
                detail: format!("{}: {detail}", path.display()),
            },
            other => other,
        })
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str, base_dir: PathBuf) -> Result<Self> {
        let mut config: Self = toml::from_str(content).map_err(|e| LoftError::InvalidConfig {
            detail: format!("Failed to parse config: {e}"),
        })?;
        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    fn validate(&mut self) -> Result<()> {
        if self.repositories.is_empty() {
            return Err(invalid("no [[repositories]] defined"));
        }

        let mut names = HashSet::new();
        for repo in &mut self.repositories {
            validate_name(&repo.name, "repository")?;
            if !names.insert(repo.name.clone()) {
                return Err(invalid(format!("duplicate repository '{}'", repo.name)));
            }
            if repo.sources.is_empty() {
                return Err(invalid(format!("repository '{}' has no sources", repo.name)));
            }

            let mut sources = HashSet::new();
            for source in &mut repo.sources {
                validate_name(&source.name, "source")?;
                if !sources.insert(source.name.clone()) {
                    return Err(invalid(format!(
                        "duplicate source '{}' in repository '{}'",
                        source.name, repo.name
                    )));
                }
                for ext in &mut source.excluded_extensions {
                    let bare = ext.trim().trim_start_matches('.').to_string();
                    if bare.is_empty() || bare.contains('/') {
                        return Err(invalid(format!(
                            "invalid excluded extension '{ext}' in source '{}'",
                            source.name
                        )));
                    }
                    *ext = bare;
                }
            }

            let mut remotes = HashSet::new();
            for remote in &repo.remotes {
                if remote.name.trim().is_empty() {
                    return Err(invalid(format!("empty remote name in repository '{}'", repo.name)));
                }
                if !remotes.insert(remote.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate remote '{}' in repository '{}'",
                        remote.name, repo.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve a configured path: `~/` is the home directory, other
    /// relative paths are relative to the config file.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if let Ok(rest) = path.strip_prefix("~")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(rest);
        }
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Data root: `override_dir`, else `[loft] data_dir`, else
    /// `<user data dir>/loft`.
    pub fn data_root(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir {
            return Ok(dir.to_path_buf());
        }
        if let Some(dir) = &self.loft.data_dir {
            return Ok(self.resolve_path(dir));
        }
        let data_dir = dirs::data_dir().ok_or_else(|| LoftError::InvalidConfig {
            detail: "Could not determine data directory".into(),
        })?;
        Ok(data_dir.join("loft"))
    }

    /// `[loft] rclone_config`, resolved. `None` leaves the choice to rclone.
    pub fn rclone_config(&self) -> Option<PathBuf> {
        self.loft.rclone_config.as_deref().map(|p| self.resolve_path(p))
    }

    pub fn temp_root(&self) -> PathBuf {
        self.loft
            .temp_root
            .as_deref()
            .map(|p| self.resolve_path(p))
            .unwrap_or_else(|| std::env::temp_dir().join("loft"))
    }

    pub fn repository_names(&self) -> Vec<&str> {
        self.repositories.iter().map(|r| r.name.as_str()).collect()
    }

    /// Build the named repositories, or all of them when `names` is empty.
    /// Each repository gets its backend adapter here, once.
    pub fn build_repositories(&self, names: &[String], runner: &CommandRunner) -> Result<Vec<Repository>> {
        for name in names {
            if !self.repositories.iter().any(|r| &r.name == name) {
                return Err(LoftError::RepositoryNotFound {
                    name: name.clone(),
                    available: self.repository_names().join(", "),
                });
            }
        }
        Ok(self
            .repositories
            .iter()
            .filter(|r| names.is_empty() || names.contains(&r.name))
            .map(|entry| self.build(entry, runner))
            .collect())
    }

    fn build(&self, entry: &RepositoryEntry, runner: &CommandRunner) -> Repository {
        Repository {
            name: entry.name.clone(),
            backend_kind: entry.backend,
            backend: backends::build(entry.backend, runner.clone()),
            path: self.resolve_path(&entry.path),
            passphrase: SecretString::from(entry.passphrase.clone()),
            sources: entry
                .sources
                .iter()
                .map(|s| Source {
                    name: s.name.clone(),
                    target_dir: self.resolve_path(&s.dir),
                    excluded_extensions: s.excluded_extensions.clone(),
                })
                .collect(),
            remotes: entry
                .remotes
                .iter()
                .map(|r| RemoteSpec {
                    name: r.name.clone(),
                    kind: r.kind,
                    path: r.path.as_deref().map(|p| self.resolve_path(p)),
                    container: r.container.clone(),
                })
                .collect(),
            temp_dir: entry
                .temp_dir
                .as_deref()
                .map(|p| self.resolve_path(p))
                .unwrap_or_else(|| self.temp_root().join(&entry.name)),
            view_config: entry.view_config.as_deref().map(|p| self.resolve_path(p)),
        }
    }
}

fn invalid(detail: impl Into<String>) -> LoftError {
    LoftError::InvalidConfig {
        detail: detail.into(),
    }
}

/// Names become directory and archive names, so they must be a single
/// plain path component.
fn validate_name(name: &str, what: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', ':'])
        || name.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid(format!("invalid {what} name '{name}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use age::secrecy::ExposeSecret;

    use super::*;
    use crate::core::traits::reporter::SilentReporter;

    const SAMPLE: &str = r#"
[loft]
temp_root = "scratch"

[[repositories]]
name = "test1"
backend = "bup"
path = "backup/bup_test1"
passphrase = "test1_passphrase"

[[repositories.sources]]
name = "folder1"
dir = "folder1"
excluded_extensions = [".ignored"]

[[repositories.sources]]
name = "folder2"
dir = "/data/folder2"

[[repositories.remotes]]
name = "hubic"
kind = "cloud"
container = "hubic:default"

[[repositories]]
name = "test2"
backend = "borg"
path = "backup/borg_test2"
temp_dir = "/tmp/borg_mount"

[[repositories.sources]]
name = "folder1"
dir = "folder1"
"#;

    fn runner() -> CommandRunner {
        CommandRunner::new(Arc::new(SilentReporter))
    }

    #[test]
    fn parse_and_build_sample() {
        let config = AppConfig::parse(SAMPLE, PathBuf::from("/etc/loft")).unwrap();
        assert_eq!(config.repository_names(), vec!["test1", "test2"]);

        let repos = config.build_repositories(&[], &runner()).unwrap();
        let test1 = &repos[0];
        assert_eq!(test1.backend.name(), "bup");
        assert_eq!(test1.path, PathBuf::from("/etc/loft/backup/bup_test1"));
        assert_eq!(test1.passphrase.expose_secret(), "test1_passphrase");
        assert_eq!(test1.sources[0].target_dir, PathBuf::from("/etc/loft/folder1"));
        assert_eq!(test1.sources[0].excluded_extensions, vec!["ignored"]);
        assert_eq!(test1.sources[1].target_dir, PathBuf::from("/data/folder2"));
        assert_eq!(test1.temp_dir, PathBuf::from("/etc/loft/scratch/test1"));
        assert_eq!(test1.remotes[0].kind, Some(RemoteKind::Cloud));

        let test2 = &repos[1];
        assert_eq!(test2.backend.name(), "borg");
        assert_eq!(test2.temp_dir, PathBuf::from("/tmp/borg_mount"));
    }

    #[test]
    fn duplicity_backend_is_selected_by_name() {
        let config = AppConfig::parse(&SAMPLE.replace("\"borg\"", "\"duplicity\""), PathBuf::new()).unwrap();
        let repos = config.build_repositories(&["test2".into()], &runner()).unwrap();
        assert_eq!(repos[0].backend_kind, BackendKind::Duplicity);
        assert_eq!(repos[0].backend.name(), "duplicity");
    }

    #[test]
    fn build_selected_repositories() {
        let config = AppConfig::parse(SAMPLE, PathBuf::from("/etc/loft")).unwrap();
        let repos = config.build_repositories(&["test2".into()], &runner()).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "test2");

        let err = config
            .build_repositories(&["nope".into()], &runner())
            .unwrap_err();
        assert!(matches!(err, LoftError::RepositoryNotFound { .. }));
        assert!(err.to_string().contains("test1, test2"));
    }

    #[test]
    fn rejects_repository_without_sources() {
        let text = "[[repositories]]\nname = \"r\"\nbackend = \"bup\"\npath = \"p\"\n";
        let err = AppConfig::parse(text, PathBuf::new()).unwrap_err();
        assert!(err.to_string().contains("has no sources"));
    }

    #[test]
    fn rejects_path_like_names() {
        let text = r#"
[[repositories]]
name = "../escape"
backend = "bup"
path = "p"
[[repositories.sources]]
name = "s"
dir = "s"
"#;
        assert!(AppConfig::parse(text, PathBuf::new()).is_err());
    }

    #[test]
    fn rejects_duplicate_sources() {
        let text = r#"
[[repositories]]
name = "r"
backend = "attic"
path = "p"
[[repositories.sources]]
name = "s"
dir = "a"
[[repositories.sources]]
name = "s"
dir = "b"
"#;
        let err = AppConfig::parse(text, PathBuf::new()).unwrap_err();
        assert!(err.to_string().contains("duplicate source 's'"));
    }

    #[test]
    fn rejects_unknown_backend_and_keys() {
        assert!(AppConfig::parse(&SAMPLE.replace("\"borg\"", "\"restic\""), PathBuf::new()).is_err());
        assert!(AppConfig::parse(&SAMPLE.replace("temp_root", "tmp_root"), PathBuf::new()).is_err());
        assert!(AppConfig::parse("", PathBuf::new()).is_err());
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(err, LoftError::ConfigNotFound { .. }));
    }

    #[test]
    fn load_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.base_dir, dir.path());
        assert_eq!(config.temp_root(), dir.path().join("scratch"));
        assert_eq!(
            config.data_root(Some(Path::new("/override"))).unwrap(),
            PathBuf::from("/override")
        );
        assert_eq!(config.rclone_config(), None);
    }

    #[test]
    fn rclone_config_resolves_like_other_paths() {
        let content = SAMPLE.replace(
            "temp_root = \"scratch\"",
            "temp_root = \"scratch\"\nrclone_config = \"rclone.conf\"",
        );
        let config = AppConfig::parse(&content, PathBuf::from("/etc/loft")).unwrap();
        assert_eq!(config.rclone_config(), Some(PathBuf::from("/etc/loft/rclone.conf")));
    }
}
