// Job Console Port
// What the person who started the run sees. Diagnostics go through tracing.

use std::io::Write;

pub trait JobConsole: Send + Sync {
    /// Print one line (a trailing newline is added)
    fn line(&self, text: &str);

    fn blank(&self) {
        self.line("");
    }
}

/// Console writing to the process stdout (production)
pub struct StdoutConsole;

impl JobConsole for StdoutConsole {
    fn line(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        // A closed stdout must not abort the run
        let _ = writeln!(out, "{}", text);
    }
}
