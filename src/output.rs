// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress messages and build log lines
    Normal,
    /// Final results only
    Quiet,
    /// JSON lines for scripting
    Json,
}

impl OutputMode {
    pub fn from_flags(quiet: bool, json: bool) -> Self {
        match (quiet, json) {
            (_, true) => OutputMode::Json,
            (true, false) => OutputMode::Quiet,
            (false, false) => OutputMode::Normal,
        }
    }
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    fn elapsed_secs(&self) -> Option<f64> {
        self.start_time.map(|t| t.elapsed().as_secs_f64())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one build log line, as a `log` event in JSON mode.
    pub fn log_line(&self, number: u64, line: &str) {
        match self.mode {
            OutputMode::Normal => println!("  {line}"),
            OutputMode::Quiet => {}
            OutputMode::Json => self.emit(&LogEvent {
                event: "log",
                line_number: number,
                line,
            }),
        }
    }

    /// Print a success message with timing when a timer runs.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.elapsed_secs() {
                Some(elapsed) => println!("{message} ({:.1}s)", elapsed),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => self.emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.elapsed_secs(),
            }),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.elapsed_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a structured value: pretty JSON for people, one line otherwise.
    pub fn value<T: Serialize>(&self, value: &T) {
        let rendered = match self.mode {
            OutputMode::Normal => serde_json::to_string_pretty(value),
            OutputMode::Quiet | OutputMode::Json => serde_json::to_string(value),
        };
        match rendered {
            Ok(json) => println!("{json}"),
            Err(e) => self.error(&format!("failed to encode output: {e}")),
        }
    }

    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(json) = serde_json::to_string(event) {
            println!("{json}");
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct LogEvent<'a> {
    event: &'a str,
    line_number: u64,
    line: &'a str,
}
