use std::sync::Mutex;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::core::models::outcome::{LineKind, Outcome};
use crate::core::traits::reporter::Reporter;

/// Print a success message.
pub fn success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("  {} {}", "✗".red(), msg);
}

/// Print a header line.
pub fn header(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Print an indented detail line.
pub fn detail(msg: &str) {
    println!("    {}", msg.dimmed());
}

/// How much the console shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

/// Terminal reporter. Progress lines from long-running tools collapse
/// into one spinner that is cleared before any other output.
pub struct ConsoleReporter {
    verbosity: Verbosity,
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            spinner: Mutex::new(None),
        }
    }

    fn shows(&self, level: Verbosity) -> bool {
        match level {
            Verbosity::Quiet => true,
            Verbosity::Normal => self.verbosity != Verbosity::Quiet,
            Verbosity::Verbose => self.verbosity == Verbosity::Verbose,
        }
    }

    fn clear_spinner(&self) {
        if let Ok(mut spinner) = self.spinner.lock()
            && let Some(bar) = spinner.take()
        {
            bar.finish_and_clear();
        }
    }

    /// Section header, hidden in quiet mode.
    pub fn header(&self, msg: &str) {
        if self.shows(Verbosity::Normal) {
            self.clear_spinner();
            header(msg);
        }
    }

    /// Print the verdict of an outcome: summary lines, then warnings, then
    /// fatal lines. Raw process output was already echoed live in verbose
    /// mode.
    pub fn outcome(&self, what: &str, outcome: &Outcome) {
        self.clear_spinner();
        outcome
            .log
            .iter()
            .filter(|l| l.kind == LineKind::Info && !l.text.starts_with("$ "))
            .for_each(|l| self.info(&l.text));
        outcome.warnings().for_each(|l| self.warning(&l.text));
        outcome.fatals().for_each(|l| self.error(&l.text));
        if outcome.success {
            self.success(what);
        } else {
            self.error(&format!("{what} failed"));
        }
    }
}

impl Reporter for ConsoleReporter {
    fn info(&self, msg: &str) {
        if self.shows(Verbosity::Normal) {
            self.clear_spinner();
            println!("  {msg}");
        }
    }

    fn detail(&self, msg: &str) {
        if self.shows(Verbosity::Verbose) {
            self.clear_spinner();
            detail(msg);
        }
    }

    fn success(&self, msg: &str) {
        if self.shows(Verbosity::Normal) {
            self.clear_spinner();
            success(msg);
        }
    }

    fn warning(&self, msg: &str) {
        if self.shows(Verbosity::Normal) {
            self.clear_spinner();
            warning(msg);
        }
    }

    fn error(&self, msg: &str) {
        self.clear_spinner();
        error(msg);
    }

    fn progress(&self, msg: &str) {
        if !self.shows(Verbosity::Normal) {
            return;
        }
        let Ok(mut spinner) = self.spinner.lock() else {
            return;
        };
        let bar = spinner.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("  {spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        });
        bar.set_message(msg.trim().to_string());
    }

    fn finish_progress(&self) {
        self.clear_spinner();
    }
}
