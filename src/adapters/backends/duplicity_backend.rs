use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use age::secrecy::ExposeSecret;
use chrono::NaiveDateTime;
use regex::Regex;

use crate::adapters::backends::absolute;
use crate::adapters::process::command_runner::{CommandRunner, CommandSpec, OutputRules};
use crate::core::models::outcome::Outcome;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::source::Source;
use crate::core::traits::backend::{BackupBackend, Store};

/// At `-v8` duplicity prints one `Processed volume ...` line per volume.
static DUPLICITY_RULES: LazyLock<OutputRules> = LazyLock::new(|| {
    OutputRules::new(
        &[r"^Processed"],
        &[r"(?i)warning"],
        &[r"^Traceback ", r"(?i)^error", r"GPGError", r"^Fatal"],
    )
    .expect("duplicity output patterns are valid")
});

/// A backup set line of `collection-status`:
/// `Full         Thu Jan  1 10:00:00 2026                 1`.
static SET_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(Full|Incremental)\s+(\w{3} \w{3}\s+\d{1,2} \d{2}:\d{2}:\d{2} \d{4})\s+\d+\s*$")
        .expect("collection-status pattern is valid")
});

/// duplicity backend: one backup chain per source, stored as
/// `file://<repository>/<source>`.
///
/// duplicity has no browsable view, so `mount` always fails and the
/// latest state is reached through `restore` instead.
pub struct DuplicityBackend {
    binary: PathBuf,
    runner: CommandRunner,
}

impl DuplicityBackend {
    pub fn new(runner: CommandRunner) -> Self {
        Self::with_path(PathBuf::from("duplicity"), runner)
    }

    pub fn with_path(binary: PathBuf, runner: CommandRunner) -> Self {
        Self { binary, runner }
    }

    /// An empty passphrase means the chain is stored unencrypted.
    fn command<'a>(&self, store: &Store<'a>) -> CommandSpec<'a> {
        let spec = CommandSpec::new(&self.binary).arg("-v8");
        if store.passphrase.expose_secret().is_empty() {
            spec.arg("--no-encryption")
        } else {
            spec.secret("PASSPHRASE", store.passphrase)
        }
    }

    fn run(&self, spec: CommandSpec<'_>) -> Outcome {
        self.runner.run(&spec, &DUPLICITY_RULES).into_outcome()
    }

    fn chain_url(store: &Store<'_>, chain: &str) -> String {
        format!("file://{}", absolute(store.path).join(chain).display())
    }

    /// `--exclude` globs for a source's exclusion policy.
    fn exclude_patterns(source: &Source) -> Vec<String> {
        source
            .excluded_extensions
            .iter()
            .map(|ext| format!("**/*.{ext}"))
            .collect()
    }

    fn parse_status(lines: impl Iterator<Item = impl AsRef<str>>, source: &Source) -> Vec<Snapshot> {
        lines
            .filter_map(|line| {
                let caps = SET_LINE.captures(line.as_ref())?;
                let raw = caps[2].split_whitespace().collect::<Vec<_>>().join(" ");
                let id = NaiveDateTime::parse_from_str(&raw, "%a %b %d %H:%M:%S %Y")
                    .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string())
                    .unwrap_or_else(|_| raw.clone());
                Some(Snapshot {
                    source: source.name.clone(),
                    id,
                    time: Some(format!("{raw} ({})", caps[1].to_lowercase())),
                })
            })
            .collect()
    }

    fn check_chain(&self, store: &Store<'_>, chain: &str) -> Outcome {
        let url = Self::chain_url(store, chain);
        let status = self.run(self.command(store).arg("collection-status").arg(&url));
        if status.success {
            return status;
        }
        // cleanup only drops orphaned volumes of an interrupted run; the
        // second status is the verdict.
        let mut outcome = status;
        let cleanup = self.run(self.command(store).args(["cleanup", "--force"]).arg(&url));
        outcome.log.extend(cleanup.log);
        let recheck = self.run(self.command(store).arg("collection-status").arg(&url));
        outcome.success = recheck.success;
        outcome.log.extend(recheck.log);
        outcome
    }
}

impl BackupBackend for DuplicityBackend {
    fn name(&self) -> &str {
        "duplicity"
    }

    fn mount_tag(&self) -> &str {
        "duplicity"
    }

    fn init(&self, store: &Store<'_>) -> Outcome {
        // Chains are created by the first backup; only the root is needed.
        match std::fs::create_dir_all(store.path) {
            Ok(()) => Outcome::ok().with_info(format!("created {}", store.path.display())),
            Err(e) => Outcome::failed(format!("cannot create {}: {e}", store.path.display())),
        }
    }

    fn save(&self, store: &Store<'_>, sources: &[Source]) -> Outcome {
        let mut total = Outcome::ok();
        for source in sources {
            let dir = absolute(&source.target_dir);
            if !dir.is_dir() {
                total.fail(format!(
                    "source '{}' directory does not exist: {}",
                    source.name,
                    dir.display()
                ));
                continue;
            }
            let mut backup = self.command(store);
            for pattern in Self::exclude_patterns(source) {
                backup = backup.arg("--exclude").arg(pattern);
            }
            let mut outcome = self.run(backup.arg(&dir).arg(Self::chain_url(store, &source.name)));
            if outcome.success {
                let files = source.included_files().len() as u64;
                outcome = outcome
                    .with_info(format!("{}: {files} file(s) backed up", source.name))
                    .with_files(files);
            }
            total.absorb(outcome);
        }
        total
    }

    fn check_and_repair(&self, store: &Store<'_>) -> Outcome {
        let mut total = Outcome::ok();
        let Ok(entries) = std::fs::read_dir(store.path) else {
            return Outcome::failed(format!("cannot read {}", store.path.display()));
        };
        let mut chains: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(str::to_string))
            .collect();
        chains.sort();
        for chain in &chains {
            total.absorb(self.check_chain(store, chain));
        }
        total
    }

    fn mount(&self, _store: &Store<'_>, _sources: &[Source], _target: &Path) -> Outcome {
        Outcome::failed("duplicity has no mount view; use restore instead")
    }

    fn unmount(&self, mount_point: &Path) -> Outcome {
        Outcome::ok().with_info(format!("nothing mounted by duplicity at {}", mount_point.display()))
    }

    fn recover(&self, location: &Store<'_>, sources: &[Source], destination: &Path) -> Outcome {
        let mut total = Outcome::ok();
        if let Err(e) = std::fs::create_dir_all(destination) {
            return Outcome::failed(format!("cannot create {}: {e}", destination.display()));
        }
        for source in sources {
            let restore = self
                .command(location)
                .args(["restore", "--force"])
                .arg(Self::chain_url(location, &source.name))
                .arg(absolute(&destination.join(&source.name)));
            total.absorb(self.run(restore));
        }
        total
    }

    fn list(&self, store: &Store<'_>, sources: &[Source]) -> (Outcome, Vec<Snapshot>) {
        let mut total = Outcome::ok();
        let mut snapshots = Vec::new();
        for source in sources {
            let output = self.runner.run(
                &self
                    .command(store)
                    .arg("collection-status")
                    .arg(Self::chain_url(store, &source.name)),
                &DUPLICITY_RULES,
            );
            snapshots.extend(Self::parse_status(output.info_lines(), source));
            total.absorb(output.into_outcome());
        }
        (total, snapshots)
    }
}
