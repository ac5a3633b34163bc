use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::adapters::backends::{absolute, fuse_unmount};
use crate::adapters::process::command_runner::{CommandRunner, CommandSpec, OutputRules};
use crate::core::models::outcome::Outcome;
use crate::core::models::snapshot::Snapshot;
use crate::core::models::source::Source;
use crate::core::traits::backend::{BackupBackend, Store};

static BUP_RULES: LazyLock<OutputRules> = LazyLock::new(|| {
    OutputRules::new(
        &[r"^(Indexing|Reading index|Saving|Restoring|bloom|Checking|fsck):"],
        &[r"^Receiving index from server", r"^\d+ objects? (verified|checked)"],
        &[r"^error: ", r"^Traceback ", r"^fatal: ", r"^bup: .*error"],
    )
    .expect("bup output patterns are valid")
});

/// bup backend: one branch per source, saved with the source directory
/// stripped so `bup fuse` shows `<source>/latest/<files>`.
///
/// bup repositories are not encrypted, so the passphrase is unused.
pub struct BupBackend {
    /// Path to the bup binary (defaults to "bup").
    bup_path: PathBuf,
    runner: CommandRunner,
}

impl BupBackend {
    /// Create a new backend using the default `bup` binary.
    pub fn new(runner: CommandRunner) -> Self {
        Self::with_path(PathBuf::from("bup"), runner)
    }

    /// Create a new backend with a custom bup binary path.
    pub fn with_path(bup_path: PathBuf, runner: CommandRunner) -> Self {
        Self { bup_path, runner }
    }

    fn command<'a>(&self, store: &Store<'_>) -> CommandSpec<'a> {
        CommandSpec::new(&self.bup_path).env("BUP_DIR", store.path)
    }

    fn run(&self, spec: CommandSpec<'_>) -> Outcome {
        self.runner.run(&spec, &BUP_RULES).into_outcome()
    }

    /// `--exclude-rx` patterns for a source's exclusion policy.
    fn exclude_patterns(source: &Source) -> Vec<String> {
        source
            .excluded_extensions
            .iter()
            .map(|ext| format!(r"\.{}$", regex::escape(ext)))
            .collect()
    }

    fn save_source(&self, store: &Store<'_>, source: &Source) -> Outcome {
        let dir = absolute(&source.target_dir);
        if !dir.is_dir() {
            return Outcome::failed(format!(
                "source '{}' directory does not exist: {}",
                source.name,
                dir.display()
            ));
        }

        let mut index = self.command(store).arg("index");
        for pattern in Self::exclude_patterns(source) {
            index = index.arg("--exclude-rx").arg(pattern);
        }
        let mut outcome = self.run(index.arg(&dir));
        if !outcome.success {
            return outcome;
        }

        let save = self
            .command(store)
            .args(["save", "-n", source.name.as_str(), "--strip"])
            .arg(&dir);
        outcome.absorb(self.run(save));
        if outcome.success {
            let files = source.included_files().len() as u64;
            outcome = outcome
                .with_info(format!("{}: {files} file(s) backed up", source.name))
                .with_files(files);
        }
        outcome
    }
}

impl BackupBackend for BupBackend {
    fn name(&self) -> &str {
        "bup"
    }

    fn mount_tag(&self) -> &str {
        "bup"
    }

    fn init(&self, store: &Store<'_>) -> Outcome {
        self.run(self.command(store).arg("init"))
    }

    fn save(&self, store: &Store<'_>, sources: &[Source]) -> Outcome {
        let mut total = Outcome::ok();
        for source in sources {
            total.absorb(self.save_source(store, source));
        }
        total
    }

    fn check_and_repair(&self, store: &Store<'_>) -> Outcome {
        let quick = self.run(self.command(store).args(["fsck", "--quick"]));
        if quick.success {
            return quick;
        }
        // Repair needs par2 recovery blocks; a failure here is the verdict.
        let mut outcome = quick;
        let repair = self.run(self.command(store).args(["fsck", "-r"]));
        outcome.success = repair.success;
        outcome.log.extend(repair.log);
        outcome
    }

    fn mount(&self, store: &Store<'_>, _sources: &[Source], target: &Path) -> Outcome {
        // bup fuse daemonizes once the filesystem is up.
        self.run(self.command(store).arg("fuse").arg(absolute(target)))
    }

    fn unmount(&self, mount_point: &Path) -> Outcome {
        self.runner.run(&fuse_unmount(mount_point), &BUP_RULES).into_outcome()
    }

    fn recover(&self, location: &Store<'_>, sources: &[Source], destination: &Path) -> Outcome {
        let mut total = Outcome::ok();
        for source in sources {
            let dest = destination.join(&source.name);
            if let Err(e) = std::fs::create_dir_all(&dest) {
                total.fail(format!("cannot create {}: {e}", dest.display()));
                continue;
            }
            let restore = self
                .command(location)
                .arg("restore")
                .arg("-C")
                .arg(absolute(&dest))
                .arg(format!("/{}/latest/.", source.name));
            total.absorb(self.run(restore));
        }
        total
    }

    fn list(&self, store: &Store<'_>, sources: &[Source]) -> (Outcome, Vec<Snapshot>) {
        let mut total = Outcome::ok();
        let mut snapshots = Vec::new();
        for source in sources {
            let output = self.runner.run(
                &self.command(store).arg("ls").arg(format!("/{}", source.name)),
                &BUP_RULES,
            );
            snapshots.extend(
                output
                    .info_lines()
                    .map(str::trim)
                    .filter(|name| !name.is_empty() && *name != "latest")
                    .map(|name| Snapshot {
                        source: source.name.clone(),
                        id: name.to_string(),
                        time: None,
                    }),
            );
            total.absorb(output.into_outcome());
        }
        (total, snapshots)
    }
}
