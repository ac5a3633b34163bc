/// Port for operator-facing output.
///
/// Passed explicitly to everything that reports progress; there is no
/// global logger.
pub trait Reporter: Send + Sync {
    fn info(&self, msg: &str);

    /// Verbose-only detail (commands run, per-file notes).
    fn detail(&self, msg: &str);

    fn success(&self, msg: &str);

    fn warning(&self, msg: &str);

    fn error(&self, msg: &str);

    /// A heartbeat line from a long-running process. Collapsed into one
    /// indicator rather than printed verbatim.
    fn progress(&self, msg: &str);

    /// Clear the progress indicator, if one is showing.
    fn finish_progress(&self);
}

/// Reporter that drops everything.
#[cfg(test)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

#[cfg(test)]
impl Reporter for SilentReporter {
    fn info(&self, _msg: &str) {}
    fn detail(&self, _msg: &str) {}
    fn success(&self, _msg: &str) {}
    fn warning(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
    fn progress(&self, _msg: &str) {}
    fn finish_progress(&self) {}
}
