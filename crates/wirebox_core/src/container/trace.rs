//! Debug trace buffer for container operations.

use log::debug;

/// In-memory trace of container operations, active only in debug mode.
#[derive(Debug, Default)]
pub(crate) struct DebugTrace {
    enabled: bool,
    lines: Vec<String>,
}

impl DebugTrace {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn enabled(&self) -> bool {
        self.enabled
    }

    /// Emits one trace line and keeps `message` in the buffer.
    pub(crate) fn record(&mut self, container: &str, message: String) {
        if !self.enabled {
            return;
        }
        debug!("event=container_trace module=container container={container} message={message}");
        self.lines.push(message);
    }

    pub(crate) fn lines(&self) -> &[String] {
        &self.lines
    }

    pub(crate) fn flush(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::DebugTrace;

    #[test]
    fn records_only_when_enabled() {
        let mut trace = DebugTrace::new(false);
        trace.record("Container", "bind `a`".to_string());
        assert!(trace.lines().is_empty());

        trace.set_enabled(true);
        trace.record("Container", "bind `b`".to_string());
        assert_eq!(trace.lines(), ["bind `b`"]);

        assert_eq!(trace.flush(), vec!["bind `b`"]);
        assert!(trace.lines().is_empty());
    }
}
