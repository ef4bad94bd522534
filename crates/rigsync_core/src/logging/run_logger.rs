//! Per-run logger with file and observer output.
//!
//! Each capture run gets its own logger that writes a dedicated log file,
//! forwards lines to an optional observer callback, and keeps a tail
//! buffer of external-tool output for error diagnosis.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::{LogConfig, LogLevel, MessagePrefix};

/// Observer callback receiving each formatted line.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Per-run logger with dual output (file + observer).
pub struct RunLogger {
    run_name: String,
    log_path: PathBuf,
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    callback: Arc<Mutex<Option<LogCallback>>>,
    config: LogConfig,
    tail_buffer: Arc<Mutex<VecDeque<String>>>,
}

impl RunLogger {
    /// Create a new run logger.
    ///
    /// # Arguments
    /// * `run_name` - name of the run (used in the log filename)
    /// * `log_dir` - directory to write the log file to
    /// * `config` - logging configuration
    /// * `callback` - optional observer for mirrored output
    pub fn new(
        run_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let run_name = run_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;
        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&run_name)));

        let file = File::create(&log_path)?;
        let file_writer = BufWriter::new(file);

        Ok(Self {
            run_name,
            log_path,
            file_writer: Arc::new(Mutex::new(Some(file_writer))),
            callback: Arc::new(Mutex::new(callback)),
            config,
            tail_buffer: Arc::new(Mutex::new(VecDeque::with_capacity(100))),
        })
    }

    /// Get the run name.
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message at the specified level.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }
        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Log a debug message.
    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    /// Log a warning.
    pub fn warn(&self, message: &str) {
        let msg = MessagePrefix::Warning.format(message);
        self.log(LogLevel::Warn, &msg);
    }

    /// Log an error.
    pub fn error(&self, message: &str) {
        let msg = MessagePrefix::Error.format(message);
        self.log(LogLevel::Error, &msg);
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        let msg = MessagePrefix::Command.format(command);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a phase marker.
    pub fn phase(&self, phase_name: &str) {
        let msg = MessagePrefix::Phase.format(phase_name);
        self.log(LogLevel::Info, &msg);
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        let msg = MessagePrefix::Success.format(message);
        self.log(LogLevel::Info, &msg);
    }

    /// Record one line of external-tool output in the tail buffer.
    pub fn output_line(&self, line: &str) {
        let mut buffer = self.tail_buffer.lock();
        if buffer.len() >= self.config.error_tail {
            buffer.pop_front();
        }
        buffer.push_back(line.to_string());
    }

    /// Show the tail buffer (typically after an error).
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }
        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// Format a message with timestamp (if enabled).
    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%H:%M:%S%.3f");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    /// Write a formatted line to file and observer.
    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
            let _ = writer.flush();
        }
        if let Some(ref callback) = *self.callback.lock() {
            callback(formatted);
        }
    }
}

impl Drop for RunLogger {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Strip path separators and other awkward characters from a run name.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_lines_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            RunLogger::new("capture_test", dir.path(), LogConfig::default(), None).unwrap();
        logger.phase("Discovery");
        logger.info("found 3 devices");
        logger.warn("one device slow to answer");
        logger.close();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("=== Discovery ==="));
        assert!(content.contains("found 3 devices"));
        assert!(content.contains("[WARNING] one device slow to answer"));
    }

    #[test]
    fn level_filter_drops_debug_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let logger = RunLogger::new("run", dir.path(), LogConfig::default(), None).unwrap();
        logger.debug("hidden");
        logger.info("visible");
        logger.close();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(!content.contains("hidden"));
        assert!(content.contains("visible"));
    }

    #[test]
    fn observer_sees_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: LogCallback = Box::new(move |line| sink.lock().push(line.to_string()));

        let logger =
            RunLogger::new("run", dir.path(), LogConfig::default(), Some(callback)).unwrap();
        logger.info("first");
        logger.success("second");

        let lines = seen.lock();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[SUCCESS] second"));
    }

    #[test]
    fn tail_buffer_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            error_tail: 3,
            ..LogConfig::default()
        };
        let logger = RunLogger::new("run", dir.path(), config, None).unwrap();
        for i in 0..10 {
            logger.output_line(&format!("line {}", i));
        }
        logger.show_tail("prober");
        logger.close();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(!content.contains("line 6"));
        assert!(content.contains("line 7"));
        assert!(content.contains("line 9"));
    }

    #[test]
    fn run_name_is_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let logger =
            RunLogger::new("run/with:odd chars", dir.path(), LogConfig::default(), None).unwrap();
        let file_name = logger.log_path().file_name().unwrap().to_string_lossy();
        assert_eq!(file_name, "run_with_odd_chars.log");
    }
}
