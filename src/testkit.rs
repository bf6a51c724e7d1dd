//! Scripted command runner for tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! `ScriptedRunner` answers each command from the first rule whose pattern
//! is a substring of the space-joined argv, and records every invocation.
//! Commands matching no rule succeed with empty output.
//!
//! Patterns are substrings, so order matters when one pattern contains
//! another: `"pm2 start"` also matches `pm2 startup`; use `"pm2 start index.js"`.
//!
//! `capture_logs` collects everything logged on the current thread while a
//! closure runs, as plain text.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::command_runner::{CommandOutput, CommandRunner};
use crate::error::Result;

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// The argv joined with spaces.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    /// Consumed front to back; the last response repeats.
    responses: RefCell<VecDeque<CommandOutput>>,
}

impl Rule {
    fn next_response(&self) -> CommandOutput {
        let mut responses = self.responses.borrow_mut();
        if responses.len() > 1 {
            responses.pop_front().unwrap_or_default()
        } else {
            responses.front().cloned().unwrap_or_default()
        }
    }
}

/// Fake `CommandRunner` that returns scripted results.
#[derive(Debug)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: RefCell<Vec<Invocation>>,
    fallback: CommandOutput,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: RefCell::new(Vec::new()),
            fallback: CommandOutput::ok(""),
        }
    }

    /// Answer every command containing `pattern` with `output`.
    pub fn on(self, pattern: &str, output: CommandOutput) -> Self {
        self.on_sequence(pattern, vec![output])
    }

    /// Answer successive matching commands with `outputs` in order; the last
    /// one repeats.
    pub fn on_sequence(mut self, pattern: &str, outputs: Vec<CommandOutput>) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            responses: RefCell::new(outputs.into()),
        });
        self
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    /// Every command line so far, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Invocation::command_line).collect()
    }

    /// Whether any command containing `pattern` ran.
    pub fn was_called(&self, pattern: &str) -> bool {
        self.position(pattern).is_some()
    }

    /// Index of the first command containing `pattern`.
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.command_lines()
            .iter()
            .position(|line| line.contains(pattern))
    }

    /// Number of commands containing `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.command_lines()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        let invocation = Invocation {
            argv: argv.to_vec(),
            cwd: cwd.map(Path::to_path_buf),
        };
        let line = invocation.command_line();
        self.calls.borrow_mut().push(invocation);

        let output = self
            .rules
            .iter()
            .find(|rule| line.contains(&rule.pattern))
            .map(Rule::next_response)
            .unwrap_or_else(|| self.fallback.clone());
        Ok(output)
    }
}

// =============================================================================
// Log capture
// =============================================================================

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return its result plus the
/// formatted log output (debug and above, no ANSI colors).
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_target(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().map(|b| b.clone()).unwrap_or_default();
    (result, String::from_utf8_lossy(&bytes).into_owned())
}
