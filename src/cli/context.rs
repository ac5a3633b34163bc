use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::cipher::age_artifact_cipher::AgeArtifactCipher;
use crate::adapters::process::command_runner::CommandRunner;
use crate::adapters::system::mount_lister::SystemMountLister;
use crate::adapters::transfer::rclone::RcloneTransfer;
use crate::cli::Cli;
use crate::cli::output::{ConsoleReporter, Verbosity};
use crate::config::app_config::AppConfig;
use crate::core::errors::Result;
use crate::core::models::repository::Repository;
use crate::core::services::backup_service::BackupService;
use crate::core::services::mount_manager::MountManager;
use crate::core::services::remote_resolver::RemoteResolver;
use crate::core::services::sync_service::SyncService;
use crate::core::traits::cloud_transfer::CloudTransfer;

/// Everything a command needs, built once at startup and passed down.
pub struct AppContext {
    pub reporter: Arc<ConsoleReporter>,
    pub runner: CommandRunner,
    pub config: AppConfig,
    pub data_root: PathBuf,
    /// Directories removable disks are mounted under, by volume label.
    pub media_roots: Vec<PathBuf>,
    pub lister: SystemMountLister,
    pub transfer: RcloneTransfer,
    pub cipher: AgeArtifactCipher,
    selected: Vec<String>,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let verbosity = if cli.quiet {
            Verbosity::Quiet
        } else if cli.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        let reporter = Arc::new(ConsoleReporter::new(verbosity));
        let runner = CommandRunner::new(reporter.clone());

        let config_path = match &cli.config {
            Some(path) => path.clone(),
            None => AppConfig::default_path()?,
        };
        let config = AppConfig::load(&config_path)?;
        let data_root = config.data_root(cli.data_dir.as_deref())?;

        Ok(Self {
            transfer: RcloneTransfer::new(config.rclone_config(), runner.clone()),
            reporter,
            runner,
            config,
            data_root,
            media_roots: default_media_roots(),
            lister: SystemMountLister,
            cipher: AgeArtifactCipher::new(),
            selected: cli.repository.clone(),
        })
    }

    /// Repositories selected with `-r`, or all configured ones.
    pub fn repositories(&self) -> Result<Vec<Repository>> {
        self.config.build_repositories(&self.selected, &self.runner)
    }

    pub fn backup(&self) -> BackupService<'_> {
        BackupService {
            reporter: self.reporter.as_ref(),
        }
    }

    pub fn mounts(&self) -> MountManager<'_> {
        MountManager {
            lister: &self.lister,
            reporter: self.reporter.as_ref(),
        }
    }

    pub fn sync(&self) -> SyncService<'_> {
        SyncService {
            reporter: self.reporter.as_ref(),
            transfer: &self.transfer,
            cipher: &self.cipher,
            data_root: &self.data_root,
        }
    }

    pub fn transfer_name(&self) -> &str {
        self.transfer.name()
    }

    pub fn resolver<'a>(&'a self, repo: &'a Repository) -> RemoteResolver<'a> {
        RemoteResolver::new(
            &repo.remotes,
            &self.lister,
            &self.media_roots,
            &self.transfer,
            self.reporter.as_ref(),
        )
    }
}

/// `/run/media/<user>` (udisks2), `/media/<user>`, `/media`, `/Volumes`.
fn default_media_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(user) = std::env::var_os("USER").or_else(|| std::env::var_os("LOGNAME")) {
        roots.push(PathBuf::from("/run/media").join(&user));
        roots.push(PathBuf::from("/media").join(&user));
    }
    roots.push(PathBuf::from("/media"));
    roots.push(PathBuf::from("/Volumes"));
    roots
}
