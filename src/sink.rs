//! Destinations for rendered log lines.

use std::{
    io::{self, Write},
    sync::{Arc, Mutex},
};
use tracing::info;

/// A byte sink receiving one finished line per call.
///
/// Lines are written verbatim; any framing (such as the trailing newline)
/// comes from the template.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &[u8]) -> io::Result<()>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        (**self).write_line(line)
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        (**self).write_line(line)
    }
}

/// Writes lines to standard output, one locked write per line.
///
/// The write and flush block the thread that finalizes the response, which
/// is a runtime worker. For production traffic prefer [`TracingSink`] behind
/// a non-blocking writer such as `tracing_appender::non_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(line)?;
        out.flush()
    }
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far, lossily decoded.
    pub fn lines(&self) -> Vec<String> {
        self.lock()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    pub fn contents(&self) -> String {
        self.lines().concat()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written line.
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        self.lock().push(line.to_vec());
        Ok(())
    }
}

/// Forwards lines as `tracing` events on the `access_log` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn write_line(&self, line: &[u8]) -> io::Result<()> {
        let line = String::from_utf8_lossy(line);
        info!(target: "access_log", "{}", line.trim_end_matches(['\r', '\n']));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_buffer() {
        let sink = MemorySink::new();
        let handle: Arc<dyn LogSink> = Arc::new(sink.clone());

        handle.write_line(b"one\n").unwrap();
        handle.write_line(b"two\n").unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.lines(), vec!["one\n", "two\n"]);
        assert_eq!(sink.contents(), "one\ntwo\n");

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_stdout_sink_writes_whole_line() {
        let sink: Box<dyn LogSink> = Box::new(StdoutSink);
        assert!(sink.write_line(b"").is_ok());
        assert!(sink.write_line(b"{\"status\":404}\n").is_ok());
    }

    #[test]
    fn test_tracing_sink_never_fails() {
        assert!(TracingSink.write_line(b"{\"status\":500}\n").is_ok());
        assert!(TracingSink.write_line(&[0xff, 0xfe]).is_ok());
    }
}
