use std::fmt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::core::errors::{LoftError, Result};
use crate::core::models::outcome::{LogLine, Outcome};
use crate::core::models::repository::Repository;
use crate::core::traits::mount_lister::MountLister;
use crate::core::traits::reporter::Reporter;

/// Lifecycle of a repository's mount view.
///
/// `Mounting` and `Unmounting` only exist while a call is in flight; at
/// rest a target is either mounted or not, as the live mount list says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
}

impl fmt::Display for MountState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unmounted => "unmounted",
            Self::Mounting => "mounting",
            Self::Mounted => "mounted",
            Self::Unmounting => "unmounting",
        })
    }
}

/// Mounts and unmounts repository views, trusting only the system mount
/// list for what is mounted.
pub struct MountManager<'a> {
    pub lister: &'a dyn MountLister,
    pub reporter: &'a dyn Reporter,
}

impl MountManager<'_> {
    /// `Mounted` when any of the backend's mounts sits at or under `target`.
    pub fn state(&self, repo: &Repository, target: &Path) -> Result<MountState> {
        let table = self.lister.snapshot()?;
        if table.mounted_under(repo.backend.mount_tag(), &canonical(target)).is_empty() {
            Ok(MountState::Unmounted)
        } else {
            Ok(MountState::Mounted)
        }
    }

    /// Mount the latest state of every source under `target`.
    ///
    /// Fails before running anything when the storage is missing, the
    /// target is already mounted or the target holds files.
    pub fn mount(&self, repo: &Repository, target: &Path) -> Result<Outcome> {
        repo.require_storage()?;
        let target = canonical(target);
        if self.state(repo, &target)? == MountState::Mounted {
            return Err(LoftError::AlreadyMounted { path: target });
        }
        if target.exists() && !is_empty_tree(&target) {
            return Err(LoftError::TargetNotEmpty { path: target });
        }
        std::fs::create_dir_all(&target)?;

        self.transition(repo, MountState::Mounting, &target);
        let mut outcome = repo.backend.mount(&repo.store(), &repo.sources, &target);
        self.reporter.finish_progress();

        let table = self.lister.snapshot()?;
        let mounted = table.mounted_under(repo.backend.mount_tag(), &target);
        if outcome.success && mounted.is_empty() {
            outcome.fail(format!("nothing is mounted at {} after mount", target.display()));
        }
        if !outcome.success {
            // Leave the target as it was found.
            for point in &mounted {
                outcome.absorb(repo.backend.unmount(point));
                outcome.log.push(LogLine::info(format!("rolled back {}", point.display())));
            }
            remove_empty_dirs(&target);
            self.transition(repo, MountState::Unmounted, &target);
            return Ok(outcome);
        }

        self.transition(repo, MountState::Mounted, &target);
        Ok(outcome.with_info(format!("{} mounted at {}", repo.name, target.display())))
    }

    /// Detach every mount of `repo` under `target`, then remove the empty
    /// target tree. Unmounting an unmounted target succeeds and does nothing
    /// beyond that cleanup.
    pub fn unmount(&self, repo: &Repository, target: &Path) -> Result<Outcome> {
        let target = canonical(target);
        let tag = repo.backend.mount_tag();
        let mounted = self.lister.snapshot()?.mounted_under(tag, &target);

        let mut outcome = Outcome::ok();
        if mounted.is_empty() {
            self.reporter
                .detail(&format!("{} is not mounted", target.display()));
        } else {
            self.transition(repo, MountState::Unmounting, &target);
            for point in &mounted {
                outcome.absorb(repo.backend.unmount(point));
            }
            let still = self.lister.snapshot()?.mounted_under(tag, &target);
            for point in &still {
                outcome.fail(format!("{} is still mounted", point.display()));
            }
            if !still.is_empty() {
                return Ok(outcome);
            }
        }

        remove_empty_dirs(&target);
        if target.exists() {
            outcome.log.push(LogLine::warning(format!(
                "{} was left in place: it holds files that are not part of the mount",
                target.display()
            )));
        }
        self.transition(repo, MountState::Unmounted, &target);
        Ok(outcome)
    }

    fn transition(&self, repo: &Repository, state: MountState, target: &Path) {
        self.reporter
            .detail(&format!("{}: {state} {}", repo.name, target.display()));
    }
}

/// Absolute, symlink-free form of `path`, the way the kernel reports
/// mount points. Trailing components that do not exist yet are kept as
/// given.
fn canonical(path: &Path) -> PathBuf {
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut missing = Vec::new();
    let mut existing = path.as_path();
    loop {
        if let Ok(real) = existing.canonicalize() {
            return missing.iter().rev().fold(real, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path,
        }
    }
}

/// True when `dir` contains directories only.
fn is_empty_tree(dir: &Path) -> bool {
    WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .all(|e| e.file_type().is_dir())
}

/// Remove `root` and every directory below it that is empty, deepest first.
fn remove_empty_dirs(root: &Path) {
    for entry in WalkDir::new(root)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        // Fails on non-empty directories, which stay.
        let _ = std::fs::remove_dir(entry.path());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use age::secrecy::SecretString;

    use super::*;
    use crate::core::models::repository::BackendKind;
    use crate::core::models::snapshot::Snapshot;
    use crate::core::models::source::Source;
    use crate::core::services::remote_resolver::test_support::FakeLister;
    use crate::core::traits::backend::{BackupBackend, Store};
    use crate::core::traits::reporter::SilentReporter;

    /// Backend whose mounts are lines in a shared fake mount list.
    struct FuseDouble {
        mounts: Arc<FakeLister>,
        fail_mount: bool,
        daemon_dies: bool,
    }

    impl FuseDouble {
        fn line(point: &Path) -> String {
            format!("fuse-double on {} type fuse.fuse-double (ro)", point.display())
        }
    }

    impl BackupBackend for FuseDouble {
        fn name(&self) -> &str {
            "double"
        }
        fn mount_tag(&self) -> &str {
            "fuse-double"
        }
        fn init(&self, _: &Store<'_>) -> Outcome {
            Outcome::ok()
        }
        fn save(&self, _: &Store<'_>, _: &[Source]) -> Outcome {
            Outcome::ok()
        }
        fn check_and_repair(&self, _: &Store<'_>) -> Outcome {
            Outcome::ok()
        }
        fn mount(&self, _: &Store<'_>, sources: &[Source], target: &Path) -> Outcome {
            let mut lines = self.mounts.lines.lock().unwrap();
            for source in sources {
                let point = target.join(&source.name).join("latest");
                std::fs::create_dir_all(&point).unwrap();
                lines.push(Self::line(&point));
            }
            if self.fail_mount {
                return Outcome::failed("fuse: device not found");
            }
            if self.daemon_dies {
                lines.clear();
            }
            Outcome::ok()
        }
        fn unmount(&self, mount_point: &Path) -> Outcome {
            let line = Self::line(mount_point);
            self.mounts.lines.lock().unwrap().retain(|l| *l != line);
            Outcome::ok()
        }
        fn recover(&self, _: &Store<'_>, _: &[Source], _: &Path) -> Outcome {
            Outcome::ok()
        }
        fn list(&self, _: &Store<'_>, _: &[Source]) -> (Outcome, Vec<Snapshot>) {
            (Outcome::ok(), Vec::new())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        base: PathBuf,
        lister: Arc<FakeLister>,
        repo: Repository,
    }

    fn fixture(fail_mount: bool, daemon_dies: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        let lister = Arc::new(FakeLister::default());
        let path = base.join("repo");
        std::fs::create_dir_all(&path).unwrap();
        let repo = Repository {
            name: "test1".into(),
            backend_kind: BackendKind::Bup,
            backend: Box::new(FuseDouble {
                mounts: Arc::clone(&lister),
                fail_mount,
                daemon_dies,
            }),
            path,
            passphrase: SecretString::from(String::new()),
            sources: ["folder1", "folder2"]
                .iter()
                .map(|name| Source {
                    name: name.to_string(),
                    target_dir: base.join(name),
                    excluded_extensions: vec![],
                })
                .collect(),
            remotes: vec![],
            temp_dir: base.join("tmp/test1"),
            view_config: None,
        };
        Fixture {
            _dir: dir,
            base,
            lister,
            repo,
        }
    }

    impl Fixture {
        fn manager(&self) -> MountManager<'_> {
            MountManager {
                lister: self.lister.as_ref(),
                reporter: &SilentReporter,
            }
        }
    }

    #[test]
    fn mount_then_unmount_leaves_nothing_behind() {
        let fx = fixture(false, false);
        let target = fx.repo.temp_dir.clone();

        let outcome = fx.manager().mount(&fx.repo, &target).unwrap();
        assert!(outcome.success, "{:?}", outcome.log);
        assert_eq!(fx.manager().state(&fx.repo, &target).unwrap(), MountState::Mounted);
        assert!(target.join("folder1/latest").is_dir());

        let outcome = fx.manager().unmount(&fx.repo, &target).unwrap();
        assert!(outcome.success, "{:?}", outcome.log);
        assert_eq!(fx.manager().state(&fx.repo, &target).unwrap(), MountState::Unmounted);
        assert!(fx.lister.lines.lock().unwrap().is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn unmount_is_idempotent() {
        let fx = fixture(false, false);
        let target = fx.repo.temp_dir.clone();

        let first = fx.manager().unmount(&fx.repo, &target).unwrap();
        let second = fx.manager().unmount(&fx.repo, &target).unwrap();
        assert!(first.success && second.success);
        assert!(second.findings().is_empty());
    }

    #[test]
    fn mount_refuses_a_target_mounted_by_an_earlier_run() {
        let fx = fixture(false, false);
        let target = fx.repo.temp_dir.clone();
        fx.lister
            .lines
            .lock()
            .unwrap()
            .push(FuseDouble::line(&target.join("folder1/latest")));

        let result = fx.manager().mount(&fx.repo, &target);
        assert!(matches!(result, Err(LoftError::AlreadyMounted { .. })));
    }

    #[test]
    fn mount_refuses_a_non_empty_target() {
        let fx = fixture(false, false);
        let target = fx.base.join("busy");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("keep.txt"), "x").unwrap();

        let result = fx.manager().mount(&fx.repo, &target);
        assert!(matches!(result, Err(LoftError::TargetNotEmpty { .. })));
        assert!(fx.lister.lines.lock().unwrap().is_empty());
    }

    #[test]
    fn mount_requires_storage() {
        let fx = fixture(false, false);
        std::fs::remove_dir_all(&fx.repo.path).unwrap();

        let result = fx.manager().mount(&fx.repo, &fx.repo.temp_dir);
        assert!(matches!(result, Err(LoftError::RepositoryMissing { .. })));
        assert!(!fx.repo.temp_dir.exists());
    }

    #[test]
    fn failed_mount_is_rolled_back() {
        let fx = fixture(true, false);
        let target = fx.repo.temp_dir.clone();

        let outcome = fx.manager().mount(&fx.repo, &target).unwrap();
        assert!(!outcome.success);
        assert!(fx.lister.lines.lock().unwrap().is_empty());
        assert!(!target.exists());
    }

    #[test]
    fn mount_that_vanishes_is_reported_as_failure() {
        let fx = fixture(false, true);
        let target = fx.repo.temp_dir.clone();

        let outcome = fx.manager().mount(&fx.repo, &target).unwrap();
        assert!(!outcome.success);
        assert!(outcome.fatals().any(|l| l.text.starts_with("nothing is mounted")));
    }

    #[test]
    fn unmount_keeps_foreign_files() {
        let fx = fixture(false, false);
        let target = fx.repo.temp_dir.clone();
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("notes.txt"), "mine").unwrap();

        let outcome = fx.manager().unmount(&fx.repo, &target).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.warnings().count(), 1);
        assert!(target.join("notes.txt").exists());
    }

    #[test]
    fn mount_points_with_spaces_are_tracked() {
        let fx = fixture(false, false);
        let target = fx.base.join("my backups/test1");

        let outcome = fx.manager().mount(&fx.repo, &target).unwrap();
        assert!(outcome.success, "{:?}", outcome.log);
        assert_eq!(fx.manager().state(&fx.repo, &target).unwrap(), MountState::Mounted);

        let outcome = fx.manager().unmount(&fx.repo, &target).unwrap();
        assert!(outcome.success, "{:?}", outcome.log);
        assert!(fx.lister.lines.lock().unwrap().is_empty());
        assert!(!target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn target_behind_a_symlink_matches_the_kernel_path() {
        let fx = fixture(false, false);
        let real = fx.base.join("real");
        std::fs::create_dir_all(&real).unwrap();
        let link = fx.base.join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        fx.lister
            .lines
            .lock()
            .unwrap()
            .push(FuseDouble::line(&real.join("test1/folder1/latest")));

        let target = link.join("test1");
        assert_eq!(fx.manager().state(&fx.repo, &target).unwrap(), MountState::Mounted);
        assert!(matches!(
            fx.manager().mount(&fx.repo, &target),
            Err(LoftError::AlreadyMounted { .. })
        ));

        let outcome = fx.manager().unmount(&fx.repo, &target).unwrap();
        assert!(outcome.success, "{:?}", outcome.log);
        assert!(fx.lister.lines.lock().unwrap().is_empty());
    }

    #[test]
    fn canonical_keeps_missing_components() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        assert_eq!(canonical(&base.join("a/b")), base.join("a/b"));
        assert_eq!(canonical(&base), base);
    }
}
