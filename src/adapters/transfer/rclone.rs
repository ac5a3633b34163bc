use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::adapters::process::command_runner::{CommandRunner, CommandSpec, OutputRules};
use crate::core::errors::Result;
use crate::core::models::outcome::Outcome;
use crate::core::traits::cloud_transfer::CloudTransfer;

static RCLONE_RULES: LazyLock<OutputRules> = LazyLock::new(|| {
    OutputRules::new(
        &[
            r"^Transferred:",
            r"^(Checks|Elapsed time|Errors|Deleted|Renamed):",
            r"^ \* ",
        ],
        &[r"NOTICE: ", r"^\s*$"],
        &[r"ERROR : ", r"^Failed to ", r"CRITICAL: "],
    )
    .expect("rclone output patterns are valid")
});

/// Cloud transfer through rclone.
///
/// Aliases are read from rclone's configuration file rather than by
/// running rclone, so resolving a remote never starts a process.
pub struct RcloneTransfer {
    binary: PathBuf,
    /// Explicit config file; `None` uses `RCLONE_CONFIG` or rclone's default.
    config: Option<PathBuf>,
    runner: CommandRunner,
}

impl RcloneTransfer {
    pub fn new(config: Option<PathBuf>, runner: CommandRunner) -> Self {
        Self::with_binary(PathBuf::from("rclone"), config, runner)
    }

    pub fn with_binary(binary: PathBuf, config: Option<PathBuf>, runner: CommandRunner) -> Self {
        Self {
            binary,
            config,
            runner,
        }
    }

    /// Config file rclone itself would use.
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        if let Some(path) = std::env::var_os("RCLONE_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join("rclone").join("rclone.conf"))
    }

    /// Section names of an rclone INI config.
    pub fn parse_aliases(content: &str) -> Vec<String> {
        content
            .lines()
            .filter_map(|line| {
                line.trim()
                    .strip_prefix('[')
                    .and_then(|rest| rest.strip_suffix(']'))
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
            })
            .collect()
    }

    fn command(&self) -> CommandSpec<'static> {
        let spec = CommandSpec::new(&self.binary);
        match &self.config {
            Some(path) => spec.arg("--config").arg(path),
            None => spec,
        }
    }

    fn run(&self, spec: CommandSpec<'_>) -> Outcome {
        self.runner.run(&spec, &RCLONE_RULES).into_outcome()
    }
}

impl CloudTransfer for RcloneTransfer {
    fn name(&self) -> &str {
        "rclone"
    }

    fn aliases(&self) -> Result<Vec<String>> {
        let Some(path) = self.config_path() else {
            return Ok(Vec::new());
        };
        if !path.is_file() {
            return Ok(Vec::new());
        }
        Ok(Self::parse_aliases(&std::fs::read_to_string(path)?))
    }

    fn push_dir(&self, local: &Path, remote: &str) -> Outcome {
        self.run(self.command().args(["copy", "--stats=10s"]).arg(local).arg(remote))
    }

    fn push_file(&self, local: &Path, remote: &str) -> Outcome {
        self.run(self.command().arg("copyto").arg(local).arg(remote))
    }

    fn pull_dir(&self, remote: &str, local: &Path, exclude: &[&str]) -> Outcome {
        let mut spec = self.command().args(["copy", "--stats=10s"]).arg(remote).arg(local);
        for name in exclude {
            spec = spec.arg("--exclude").arg(format!("/{name}"));
        }
        self.run(spec)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::backends::test_support::{fake_tool, recorded_calls};
    use crate::core::traits::reporter::SilentReporter;

    const CONF: &str = "\
[hubic]
type = hubic

[ backup-s3 ]
type = s3
provider = AWS
";

    fn transfer(dir: &Path, body: &str) -> (RcloneTransfer, PathBuf) {
        let (bin, log) = fake_tool(dir, "rclone", body);
        let conf = dir.join("rclone.conf");
        std::fs::write(&conf, CONF).unwrap();
        let runner = CommandRunner::new(Arc::new(SilentReporter));
        (RcloneTransfer::with_binary(bin, Some(conf), runner), log)
    }

    #[test]
    fn aliases_come_from_config_sections() {
        let dir = tempfile::tempdir().unwrap();
        let (rclone, log) = transfer(dir.path(), "exit 0");

        assert_eq!(rclone.aliases().unwrap(), vec!["hubic", "backup-s3"]);
        assert!(recorded_calls(&log).is_empty());
    }

    #[test]
    fn missing_config_means_no_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let runner = CommandRunner::new(Arc::new(SilentReporter));
        let rclone = RcloneTransfer::new(Some(dir.path().join("absent.conf")), runner);
        assert!(rclone.aliases().unwrap().is_empty());
    }

    #[test]
    fn push_and_pull_use_copy_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let (rclone, log) = transfer(dir.path(), "exit 0");
        let local = dir.path().join("repo");

        assert!(rclone.push_dir(&local, "hubic:default/test1").success);
        assert!(rclone.push_file(&local.join("x"), "hubic:default/x").success);
        assert!(rclone.pull_dir("hubic:default/test1", &local, &["last_synced.toml"]).success);

        let calls = recorded_calls(&log);
        assert!(calls[0].contains(" copy --stats=10s "));
        assert!(calls[0].ends_with(&format!("{} hubic:default/test1", local.display())));
        assert!(calls[1].contains(" copyto "));
        assert!(calls[2].ends_with("--exclude /last_synced.toml"));
        assert!(calls.iter().all(|c| !c.contains(" sync ")));
    }

    #[test]
    fn error_lines_fail_the_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let (rclone, _log) = transfer(
            dir.path(),
            "echo '2026/01/01 10:00:00 ERROR : object not found' >&2; exit 3",
        );
        let outcome = rclone.push_dir(dir.path(), "hubic:nowhere");
        assert!(!outcome.success);
        assert!(outcome.fatals().any(|l| l.text.contains("object not found")));
    }
}
