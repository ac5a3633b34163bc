use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{NaiveDateTime, Utc};

use crate::adapters::backends::{absolute, fuse_unmount};
use crate::adapters::process::command_runner::{CommandRunner, CommandSpec, OutputRules};
use crate::core::models::outcome::Outcome;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::source::Source;
use crate::core::traits::backend::{BackupBackend, Store};

/// Timestamp suffix of every archive name.
const ARCHIVE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// CLI vocabulary of an attic-family archiver.
///
/// borg forked from attic and kept its command set, so both engines are
/// driven by the same adapter and differ only in these details.
#[derive(Debug)]
pub struct ArchiverDialect {
    pub name: &'static str,
    pub binary: &'static str,
    pub passphrase_var: &'static str,
    pub mount_tag: &'static str,
    pub init_args: &'static [&'static str],
    /// Extra environment for unattended runs, including access to a
    /// repository copied to a new location.
    pub unattended_env: &'static [(&'static str, &'static str)],
    /// Variable confirming `check --repair` without a prompt.
    pub repair_confirmation: Option<(&'static str, &'static str)>,
}

pub static BORG: ArchiverDialect = ArchiverDialect {
    name: "borg",
    binary: "borg",
    passphrase_var: "BORG_PASSPHRASE",
    mount_tag: "borgfs",
    init_args: &["init", "--encryption=repokey"],
    unattended_env: &[
        ("BORG_RELOCATED_REPO_ACCESS_IS_OK", "yes"),
        ("BORG_UNKNOWN_UNENCRYPTED_REPO_ACCESS_IS_OK", "yes"),
    ],
    repair_confirmation: Some(("BORG_CHECK_I_KNOW_WHAT_I_AM_DOING", "YES")),
};

pub static ATTIC: ArchiverDialect = ArchiverDialect {
    name: "attic",
    binary: "attic",
    passphrase_var: "ATTIC_PASSPHRASE",
    mount_tag: "atticfs",
    init_args: &["init", "--encryption=passphrase"],
    unattended_env: &[],
    repair_confirmation: None,
};

static ARCHIVER_RULES: LazyLock<OutputRules> = LazyLock::new(|| {
    OutputRules::new(
        &[
            r"^\s*[\d.]+ [kMGT]?B O [\d.]+ [kMGT]?B C",
            r"^(Checking segments|Analyzing archive|Extracting|Initializing cache|Calculating statistics)",
        ],
        &[
            r"^-{10,}$",
            r"^(Archive name|Archive fingerprint|Time \(start\)|Time \(end\)|Duration|Number of files|Utilization of max)",
            r"^\s*(Original size|This archive|All archives|Unique chunks|Chunk index)",
            r"^(Starting repository check|Starting archive consistency check|Repository check complete|Archive consistency check complete)",
            r"^Synchronizing chunks cache",
        ],
        &[
            r"(?i)^(\w+: )?error: ",
            r"^Repository .* does not exist",
            r"^passphrase supplied in \w+ is incorrect",
            r"^Traceback ",
        ],
    )
    .expect("archiver output patterns are valid")
});

/// borg/attic backend: one archive per source and save, named
/// `<source>-<UTC timestamp>`, created from inside the source directory
/// so archive paths are relative to it.
pub struct ArchiverBackend {
    dialect: &'static ArchiverDialect,
    binary: PathBuf,
    runner: CommandRunner,
}

impl ArchiverBackend {
    pub fn new(dialect: &'static ArchiverDialect, runner: CommandRunner) -> Self {
        Self::with_path(dialect, PathBuf::from(dialect.binary), runner)
    }

    pub fn with_path(dialect: &'static ArchiverDialect, binary: PathBuf, runner: CommandRunner) -> Self {
        Self {
            dialect,
            binary,
            runner,
        }
    }

    fn command<'a>(&self, store: &Store<'a>) -> CommandSpec<'a> {
        let mut spec = CommandSpec::new(&self.binary).secret(self.dialect.passphrase_var, store.passphrase);
        for (key, value) in self.dialect.unattended_env {
            spec = spec.env(key, value);
        }
        spec
    }

    fn run(&self, spec: CommandSpec<'_>) -> Outcome {
        self.runner.run(&spec, &ARCHIVER_RULES).into_outcome()
    }

    fn archive_ref(store: &Store<'_>, archive: &str) -> String {
        format!("{}::{archive}", absolute(store.path).display())
    }

    fn archive_name(source: &Source) -> String {
        format!("{}-{}", source.name, Utc::now().format(ARCHIVE_TIME_FORMAT))
    }

    /// Whether `id` is exactly `<source>-<timestamp>`, so that `data` does
    /// not claim the archives of `data-old`.
    fn is_archive_of(id: &str, source: &Source) -> bool {
        id.strip_prefix(source.name.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|stamp| NaiveDateTime::parse_from_str(stamp, ARCHIVE_TIME_FORMAT).is_ok())
    }

    /// `--exclude` patterns (fnmatch, full path) for a source's policy.
    fn exclude_patterns(source: &Source) -> Vec<String> {
        source
            .excluded_extensions
            .iter()
            .map(|ext| format!("*.{ext}"))
            .collect()
    }

    /// Parse `list` output: archive name first, creation time after it.
    fn parse_listing(lines: impl Iterator<Item = impl AsRef<str>>, sources: &[Source]) -> Vec<Snapshot> {
        lines
            .filter_map(|line| {
                let line = line.as_ref().trim();
                let (id, time) = match line.split_once(char::is_whitespace) {
                    Some((id, rest)) => (id, Some(rest.trim().to_string())),
                    None if !line.is_empty() => (line, None),
                    None => return None,
                };
                let source = sources.iter().find(|s| Self::is_archive_of(id, s))?;
                Some(Snapshot {
                    source: source.name.clone(),
                    id: id.to_string(),
                    time: time.filter(|t| !t.is_empty()),
                })
            })
            .collect()
    }

    /// Latest archive of `source`, given a listing in creation order.
    fn latest_for<'s>(snapshots: &'s [Snapshot], source: &Source) -> Option<&'s Snapshot> {
        snapshots.iter().rev().find(|s| s.source == source.name)
    }

    fn save_source(&self, store: &Store<'_>, source: &Source) -> Outcome {
        if !source.target_dir.is_dir() {
            return Outcome::failed(format!(
                "source '{}' directory does not exist: {}",
                source.name,
                source.target_dir.display()
            ));
        }

        let mut create = self.command(store).args(["create", "--stats"]);
        for pattern in Self::exclude_patterns(source) {
            create = create.arg("--exclude").arg(pattern);
        }
        let create = create
            .arg(Self::archive_ref(store, &Self::archive_name(source)))
            .arg(".")
            .current_dir(&source.target_dir);

        let outcome = self.run(create);
        if !outcome.success {
            return outcome;
        }
        let files = source.included_files().len() as u64;
        outcome
            .with_info(format!("{}: {files} file(s) backed up", source.name))
            .with_files(files)
    }
}

impl BackupBackend for ArchiverBackend {
    fn name(&self) -> &str {
        self.dialect.name
    }

    fn mount_tag(&self) -> &str {
        self.dialect.mount_tag
    }

    fn init(&self, store: &Store<'_>) -> Outcome {
        self.run(
            self.command(store)
                .args(self.dialect.init_args)
                .arg(absolute(store.path)),
        )
    }

    fn save(&self, store: &Store<'_>, sources: &[Source]) -> Outcome {
        let mut total = Outcome::ok();
        for source in sources {
            total.absorb(self.save_source(store, source));
        }
        total
    }

    fn check_and_repair(&self, store: &Store<'_>) -> Outcome {
        let check = self.run(self.command(store).arg("check").arg(absolute(store.path)));
        if check.success {
            return check;
        }
        let Some((key, value)) = self.dialect.repair_confirmation else {
            return check;
        };
        let mut outcome = check;
        let repair = self.run(
            self.command(store)
                .env(key, value)
                .args(["check", "--repair"])
                .arg(absolute(store.path)),
        );
        outcome.success = repair.success;
        outcome.log.extend(repair.log);
        outcome
    }

    fn mount(&self, store: &Store<'_>, sources: &[Source], target: &Path) -> Outcome {
        let (mut outcome, snapshots) = self.list(store, sources);
        if !outcome.success {
            return outcome;
        }
        for source in sources {
            let Some(latest) = Self::latest_for(&snapshots, source) else {
                outcome.fail(format!("no archive for source '{}'", source.name));
                continue;
            };
            let mount_point = absolute(&target.join(&source.name).join("latest"));
            if let Err(e) = std::fs::create_dir_all(&mount_point) {
                outcome.fail(format!("cannot create {}: {e}", mount_point.display()));
                continue;
            }
            outcome.absorb(
                self.run(
                    self.command(store)
                        .arg("mount")
                        .arg(Self::archive_ref(store, &latest.id))
                        .arg(&mount_point),
                ),
            );
        }
        outcome
    }

    fn unmount(&self, mount_point: &Path) -> Outcome {
        self.run(fuse_unmount(mount_point))
    }

    fn recover(&self, location: &Store<'_>, sources: &[Source], destination: &Path) -> Outcome {
        let (mut outcome, snapshots) = self.list(location, sources);
        if !outcome.success {
            return outcome;
        }
        for source in sources {
            let Some(latest) = Self::latest_for(&snapshots, source) else {
                outcome.fail(format!("no archive for source '{}'", source.name));
                continue;
            };
            let dest = destination.join(&source.name);
            if let Err(e) = std::fs::create_dir_all(&dest) {
                outcome.fail(format!("cannot create {}: {e}", dest.display()));
                continue;
            }
            outcome.absorb(
                self.run(
                    self.command(location)
                        .arg("extract")
                        .arg(Self::archive_ref(location, &latest.id))
                        .current_dir(&dest),
                ),
            );
        }
        outcome
    }

    fn list(&self, store: &Store<'_>, sources: &[Source]) -> (Outcome, Vec<Snapshot>) {
        let output = self.runner.run(
            &self.command(store).arg("list").arg(absolute(store.path)),
            &ARCHIVER_RULES,
        );
        let snapshots = Self::parse_listing(output.info_lines(), sources);
        (output.into_outcome(), snapshots)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use age::secrecy::SecretString;

    use super::*;
    use crate::adapters::backends::test_support::{fake_tool, recorded_calls};
    use crate::core::traits::reporter::SilentReporter;

    const LISTING: &str = "\
folder1-2026-01-01T10:00:00          Thu, 2026-01-01 10:00:00 [aa11]
folder2-2026-01-01T10:00:01          Thu, 2026-01-01 10:00:01 [bb22]
folder1-2026-01-02T10:00:00          Fri, 2026-01-02 10:00:00 [cc33]
stray-archive                        Fri, 2026-01-02 11:00:00 [dd44]
";

    fn backend(dialect: &'static ArchiverDialect, bin: PathBuf) -> ArchiverBackend {
        ArchiverBackend::with_path(dialect, bin, CommandRunner::new(Arc::new(SilentReporter)))
    }

    fn sources(root: &Path) -> Vec<Source> {
        ["folder1", "folder2"]
            .iter()
            .map(|name| {
                let dir = root.join(name);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(dir.join("a.txt"), "a").unwrap();
                std::fs::write(dir.join("b.ignored"), "b").unwrap();
                Source {
                    name: name.to_string(),
                    target_dir: dir,
                    excluded_extensions: if *name == "folder1" { vec!["ignored".into()] } else { vec![] },
                }
            })
            .collect()
    }

    #[test]
    fn dialects_have_distinct_vocabulary() {
        assert_eq!(BORG.mount_tag, "borgfs");
        assert_eq!(ATTIC.mount_tag, "atticfs");
        assert_ne!(BORG.passphrase_var, ATTIC.passphrase_var);
    }

    #[test]
    fn parse_listing_maps_archives_to_sources() {
        let dir = tempfile::tempdir().unwrap();
        let srcs = sources(dir.path());
        let snapshots = ArchiverBackend::parse_listing(LISTING.lines(), &srcs);

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].source, "folder1");
        assert_eq!(snapshots[0].time.as_deref(), Some("Thu, 2026-01-01 10:00:00 [aa11]"));
        assert_eq!(
            ArchiverBackend::latest_for(&snapshots, &srcs[0]).unwrap().id,
            "folder1-2026-01-02T10:00:00"
        );
        assert_eq!(
            ArchiverBackend::latest_for(&snapshots, &srcs[1]).unwrap().id,
            "folder2-2026-01-01T10:00:01"
        );
    }

    #[test]
    fn source_names_sharing_a_prefix_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let srcs: Vec<Source> = ["data", "data-old"]
            .iter()
            .map(|name| Source {
                name: name.to_string(),
                target_dir: dir.path().join(name),
                excluded_extensions: vec![],
            })
            .collect();
        let listing = "\
data-2026-01-01T10:00:00             Thu, 2026-01-01 10:00:00 [aa11]
data-old-2026-01-02T10:00:00         Fri, 2026-01-02 10:00:00 [bb22]
data-latest                          Fri, 2026-01-02 11:00:00 [cc33]
";
        let snapshots = ArchiverBackend::parse_listing(listing.lines(), &srcs);

        assert_eq!(snapshots.len(), 2);
        assert_eq!(
            ArchiverBackend::latest_for(&snapshots, &srcs[0]).unwrap().id,
            "data-2026-01-01T10:00:00"
        );
        assert_eq!(
            ArchiverBackend::latest_for(&snapshots, &srcs[1]).unwrap().id,
            "data-old-2026-01-02T10:00:00"
        );
    }

    #[test]
    fn save_passes_passphrase_by_environment_only() {
        let dir = tempfile::tempdir().unwrap();
        let (bin, log) = fake_tool(dir.path(), "borg", "exit 0");
        let srcs = sources(dir.path());
        let repo = dir.path().join("repo");
        let pass = SecretString::from("test1_passphrase".to_string());
        let store = Store { path: &repo, passphrase: &pass };

        let outcome = backend(&BORG, bin).save(&store, &srcs);
        assert!(outcome.success, "{:?}", outcome.log);
        assert_eq!(outcome.files, Some(3));
        assert!(outcome.log.iter().all(|l| !l.text.contains("test1_passphrase")));

        let calls = recorded_calls(&log);
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert!(call.contains("BORG_PASSPHRASE=test1_passphrase "));
            let argv = call.split(" :: ").nth(1).unwrap();
            assert!(!argv.contains("test1_passphrase"));
        }
        assert!(calls[0].contains("create --stats --exclude *.ignored"));
        assert!(calls[0].contains(&format!("PWD={}", srcs[0].target_dir.display())));
        assert!(calls[0].contains(&format!("{}::folder1-", repo.display())));
        assert!(calls[0].ends_with(" ."));
        assert!(!calls[1].contains("--exclude"));
    }

    #[test]
    fn attic_uses_its_own_passphrase_variable() {
        let dir = tempfile::tempdir().unwrap();
        let (bin, log) = fake_tool(dir.path(), "attic", "exit 0");
        let repo = dir.path().join("repo");
        let pass = SecretString::from("s3cret".to_string());
        let store = Store { path: &repo, passphrase: &pass };

        assert!(backend(&ATTIC, bin).init(&store).success);
        let calls = recorded_calls(&log);
        assert!(calls[0].contains("ATTIC_PASSPHRASE=s3cret "));
        assert!(calls[0].contains("BORG_PASSPHRASE= "));
        assert!(calls[0].contains("init --encryption=passphrase"));
    }

    #[test]
    fn stats_on_stderr_are_not_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let (bin, _log) = fake_tool(
            dir.path(),
            "borg",
            "echo '------------------------------------------------------------------------------' >&2; \
             echo 'Archive name: folder1-2026' >&2; echo 'Number of files: 1' >&2",
        );
        let srcs = sources(dir.path());
        let repo = dir.path().join("repo");
        let pass = SecretString::from(String::new());
        let store = Store { path: &repo, passphrase: &pass };

        let outcome = backend(&BORG, bin).save(&store, &srcs[..1]);
        assert!(outcome.success);
        assert_eq!(outcome.warnings().count(), 0);
    }

    #[test]
    fn recover_extracts_latest_archive_per_source() {
        let dir = tempfile::tempdir().unwrap();
        let listing = dir.path().join("listing.txt");
        std::fs::write(&listing, LISTING).unwrap();
        let (bin, log) = fake_tool(
            dir.path(),
            "borg",
            &format!("case \"$1\" in list) cat '{}';; esac; exit 0", listing.display()),
        );
        let srcs = sources(dir.path());
        let copy = dir.path().join("copy");
        let dest = dir.path().join("restored");
        let pass = SecretString::from(String::new());
        let store = Store { path: &copy, passphrase: &pass };

        let outcome = backend(&BORG, bin).recover(&store, &srcs, &dest);
        assert!(outcome.success, "{:?}", outcome.log);

        let calls = recorded_calls(&log);
        assert_eq!(calls.len(), 3);
        assert!(calls[1].contains(&format!("extract {}::folder1-2026-01-02T10:00:00", copy.display())));
        assert!(calls[1].contains(&format!("PWD={}", dest.join("folder1").display())));
        assert!(calls[2].contains("::folder2-2026-01-01T10:00:01"));
    }

    #[test]
    fn mount_fails_for_source_without_archive() {
        let dir = tempfile::tempdir().unwrap();
        let (bin, log) = fake_tool(
            dir.path(),
            "borg",
            "case \"$1\" in list) echo 'folder1-2026-01-01T10:00:00  Thu, 2026-01-01 10:00:00';; esac; exit 0",
        );
        let srcs = sources(dir.path());
        let repo = dir.path().join("repo");
        let target = dir.path().join("mnt");
        let pass = SecretString::from(String::new());
        let store = Store { path: &repo, passphrase: &pass };

        let outcome = backend(&BORG, bin).mount(&store, &srcs, &target);
        assert!(!outcome.success);
        assert!(outcome.fatals().any(|l| l.text == "no archive for source 'folder2'"));
        assert!(target.join("folder1/latest").is_dir());

        let calls = recorded_calls(&log);
        assert!(calls[1].contains("mount"));
        assert!(calls[1].ends_with(&target.join("folder1/latest").display().to_string()));
    }
}
