use std::sync::Mutex;

/// Target used for diagnostics emitted through `tracing`. The layer skips
/// events with this target so the sink never ships its own failures.
pub const SELF_LOG_TARGET: &str = "loggly_sink::selflog";

/// Free-text channel receiving descriptions of shipping failures.
pub trait SelfLog: Send + Sync {
    fn write_line(&self, message: &str);
}

/// Forwards diagnostics to `tracing` at `WARN`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSelfLog;

impl SelfLog for TracingSelfLog {
    fn write_line(&self, message: &str) {
        tracing::warn!(target: SELF_LOG_TARGET, "{}", message);
    }
}

/// Prints diagnostics to stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrSelfLog;

impl SelfLog for StderrSelfLog {
    fn write_line(&self, message: &str) {
        eprintln!("{}", message);
    }
}

/// Keeps every line in memory. Handy in tests and for embedders that
/// want to surface failures themselves.
#[derive(Debug, Default)]
pub struct MemorySelfLog {
    lines: Mutex<Vec<String>>,
}

impl MemorySelfLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl SelfLog for MemorySelfLog {
    fn write_line(&self, message: &str) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        lines.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn memory_self_log_keeps_lines_in_order() {
        let log = MemorySelfLog::new();
        log.write_line("first");
        log.write_line("second");
        assert_eq!(log.lines(), ["first", "second"]);
    }

    #[traced_test]
    #[test]
    fn tracing_self_log_emits_warning() {
        TracingSelfLog.write_line("Exception posting to loggly boom");
        assert!(logs_contain("Exception posting to loggly boom"));
    }
}
