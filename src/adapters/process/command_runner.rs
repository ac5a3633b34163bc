use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use age::secrecy::{ExposeSecret, SecretString};
use regex::Regex;

use crate::core::models::outcome::{LineKind, LogLine, Outcome};
use crate::core::traits::reporter::Reporter;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Per-tool rules for classifying output lines.
///
/// Checked in order: progress, fatal, benign. Anything else is `Info` on
/// stdout and `Warning` on stderr.
#[derive(Debug, Clone, Default)]
pub struct OutputRules {
    progress: Vec<Regex>,
    benign: Vec<Regex>,
    fatal: Vec<Regex>,
}

impl OutputRules {
    pub fn new(progress: &[&str], benign: &[&str], fatal: &[&str]) -> Result<Self, regex::Error> {
        let compile = |patterns: &[&str]| -> Result<Vec<Regex>, regex::Error> {
            patterns.iter().map(|p| Regex::new(p)).collect()
        };
        Ok(Self {
            progress: compile(progress)?,
            benign: compile(benign)?,
            fatal: compile(fatal)?,
        })
    }

    pub fn classify(&self, stream: Stream, line: &str) -> LineKind {
        if self.progress.iter().any(|r| r.is_match(line)) {
            LineKind::Progress
        } else if self.fatal.iter().any(|r| r.is_match(line)) {
            LineKind::Fatal
        } else if self.benign.iter().any(|r| r.is_match(line)) {
            LineKind::Info
        } else {
            match stream {
                Stream::Stdout => LineKind::Info,
                Stream::Stderr => LineKind::Warning,
            }
        }
    }
}

/// An external command to run.
///
/// Secrets are kept apart from the regular environment: they reach the
/// child's environment and nothing else. `Display` renders the command
/// line only, so it is safe to log.
pub struct CommandSpec<'a> {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    secrets: Vec<(&'static str, &'a SecretString)>,
    current_dir: Option<PathBuf>,
}

impl<'a> CommandSpec<'a> {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: Vec::new(),
            secrets: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Pass a secret through the child's environment.
    pub fn secret(mut self, key: &'static str, value: &'a SecretString) -> Self {
        self.secrets.push((key, value));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .unwrap_or(&self.program)
            .to_string_lossy()
            .into_owned()
    }
}

impl fmt::Display for CommandSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process never ran or died from a signal.
    pub status: Option<i32>,
    pub exited_ok: bool,
    /// Every non-progress line, classified.
    pub lines: Vec<LogLine>,
    /// Number of progress lines that were collapsed.
    pub progress_lines: usize,
}

impl ProcessOutput {
    /// Exit status 0 and no fatal-pattern line.
    pub fn succeeded(&self) -> bool {
        self.exited_ok && !self.lines.iter().any(|l| l.kind == LineKind::Fatal)
    }

    /// Text of the `Info` lines, skipping the echoed command line.
    pub fn info_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .skip(1)
            .filter(|l| l.kind == LineKind::Info)
            .map(|l| l.text.as_str())
    }

    pub fn into_outcome(self) -> Outcome {
        Outcome {
            success: self.succeeded(),
            log: self.lines,
            files: None,
        }
    }
}

/// Runs external commands, draining stdout and stderr concurrently and
/// reporting lines as they arrive.
#[derive(Clone)]
pub struct CommandRunner {
    reporter: Arc<dyn Reporter>,
}

impl CommandRunner {
    pub fn new(reporter: Arc<dyn Reporter>) -> Self {
        Self { reporter }
    }

    /// Check if `program` can be started at all.
    pub fn is_available(program: impl AsRef<OsStr>) -> bool {
        Command::new(program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    /// Run `spec` to completion. Never fails: a command that cannot be
    /// started, exits non-zero, dies from a signal or prints a fatal
    /// pattern yields an unsuccessful output with the reason attached.
    pub fn run(&self, spec: &CommandSpec<'_>, rules: &OutputRules) -> ProcessOutput {
        let rendered = spec.to_string();
        let name = spec.program_name();
        self.reporter.detail(&format!("$ {rendered}"));

        let mut output = ProcessOutput::default();
        output.lines.push(LogLine::info(format!("$ {rendered}")));

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        for (key, value) in &spec.secrets {
            cmd.env(key, value.expose_secret());
        }
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let reason = format!("failed to start {name}: {e}");
                self.reporter.detail(&reason);
                output.lines.push(LogLine::fatal(reason));
                return output;
            }
        };

        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, Stream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, Stream::Stderr, tx.clone()));
        }
        // The loop below ends once both readers hang up.
        drop(tx);

        for (stream, text) in rx {
            let kind = rules.classify(stream, &text);
            if kind == LineKind::Progress {
                output.progress_lines += 1;
                self.reporter.progress(&text);
                continue;
            }
            let line = LogLine { kind, text };
            self.reporter.detail(&line.to_string());
            output.lines.push(line);
        }
        for reader in readers {
            let _ = reader.join();
        }
        self.reporter.finish_progress();

        match child.wait() {
            Ok(status) => {
                output.status = status.code();
                output.exited_ok = status.success();
                if !status.success() {
                    output
                        .lines
                        .push(LogLine::fatal(describe_failure(&name, status)));
                }
            }
            Err(e) => output
                .lines
                .push(LogLine::fatal(format!("failed to wait for {name}: {e}"))),
        }

        output
    }
}

fn spawn_reader<R>(stream: R, which: Stream, tx: Sender<(Stream, String)>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    // Progress meters redraw with '\r'; each redraw is a line.
                    let text = String::from_utf8_lossy(&buf);
                    for segment in text.split(['\r', '\n']) {
                        let segment = segment.trim_end();
                        if segment.is_empty() {
                            continue;
                        }
                        if tx.send((which, segment.to_string())).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    })
}

fn describe_failure(name: &str, status: std::process::ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("{name} exited with status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("{name} terminated by signal {signal}");
        }
    }
    format!("{name} terminated abnormally")
}
