use std::fmt;

/// How a captured line of output was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Heartbeat output (percentages, transfer stats). Collapsed, not kept verbatim.
    Progress,
    /// Regular output or a known-benign message.
    Info,
    /// Unexpected stderr output. Surfaced, but does not fail the operation.
    Warning,
    /// Output matching a fatal pattern. Fails the operation even on exit 0.
    Fatal,
}

/// One line of diagnostic output attached to an `Outcome`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub kind: LineKind,
    pub text: String,
}

impl LogLine {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Warning,
            text: text.into(),
        }
    }

    pub fn fatal(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Fatal,
            text: text.into(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LineKind::Warning => write!(f, "\t !!! {}", self.text),
            LineKind::Fatal => write!(f, "\t XXX {}", self.text),
            _ => write!(f, "{}", self.text),
        }
    }
}

/// Result of an operation that runs external tools.
///
/// `success` is the caller-facing verdict; `log` always carries the
/// captured output so a failure can be inspected without re-running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub log: Vec<LogLine>,
    /// Files covered by the operation, when the operation counts them.
    pub files: Option<u64>,
}

impl Outcome {
    /// An empty successful outcome.
    pub fn ok() -> Self {
        Self {
            success: true,
            log: Vec::new(),
            files: None,
        }
    }

    /// A failed outcome with a single fatal diagnostic.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            log: vec![LogLine::fatal(reason)],
            files: None,
        }
    }

    pub fn with_info(mut self, text: impl Into<String>) -> Self {
        self.log.push(LogLine::info(text));
        self
    }

    pub fn with_files(mut self, files: u64) -> Self {
        self.files = Some(files);
        self
    }

    /// Record a fatal diagnostic and mark the outcome failed.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.success = false;
        self.log.push(LogLine::fatal(reason));
    }

    /// Fold another step into this one. Any failed step fails the whole.
    pub fn absorb(&mut self, step: Outcome) {
        self.success &= step.success;
        self.log.extend(step.log);
        if let Some(n) = step.files {
            self.files = Some(self.files.unwrap_or(0) + n);
        }
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter().filter(|l| l.kind == LineKind::Warning)
    }

    pub fn fatals(&self) -> impl Iterator<Item = &LogLine> {
        self.log.iter().filter(|l| l.kind == LineKind::Fatal)
    }

    /// Warnings and fatal lines, the part of the log an operator must read.
    pub fn findings(&self) -> Vec<&LogLine> {
        self.log
            .iter()
            .filter(|l| matches!(l.kind, LineKind::Warning | LineKind::Fatal))
            .collect()
    }
}
