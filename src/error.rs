//! Error handling module for vpsdeploy
//!
//! Every step either succeeds or returns one of these errors. The sequencer
//! never retries; the first error aborts the remaining steps.

use crate::command_runner::CommandOutput;
use std::fmt;
use thiserror::Error;

/// A single external command that exited unsuccessfully.
///
/// Carries everything needed to log the failure before it propagates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// The argv that was run, program first.
    pub argv: Vec<String>,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandFailure {
    /// Build a failure record from a finished command.
    pub fn new(argv: &[String], output: &CommandOutput) -> Self {
        Self {
            argv: argv.to_vec(),
            exit_code: output.exit_code,
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        }
    }

    /// The command line as a single display string.
    pub fn command_line(&self) -> String {
        self.argv.join(" ")
    }

    /// Emit the failure at error level: command, exit code, captured output.
    pub fn log(&self) {
        tracing::error!("Command failed: {}", self.command_line());
        match self.exit_code {
            Some(code) => tracing::error!("Error: Return code {}", code),
            None => tracing::error!("Error: terminated by signal"),
        }
        tracing::error!("Output: {}", self.stdout.trim());
        tracing::error!("Error output: {}", self.stderr.trim());
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        write!(f, "`{}` exited with {}", self.command_line(), code)?;
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {}", stderr)?;
        }
        Ok(())
    }
}

/// Main error type for vpsdeploy
#[derive(Error, Debug)]
pub enum DeployError {
    /// A setup or install command failed (nvm, node, pm2)
    #[error("Tool install failed: {context}: {failure}")]
    ToolInstall {
        context: String,
        failure: CommandFailure,
    },

    /// Clone, pull, ownership fix, dependency install or process start failed
    #[error("Deploy failed: {context}: {failure}")]
    Deploy {
        context: String,
        failure: CommandFailure,
    },

    /// The shell profile could not be appended to
    #[error("Could not write shell profile {path}: {source}")]
    ConfigWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// IO errors (spawning commands, filesystem probes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stage state machine transition errors
    #[error("Stage transition error: {0}")]
    Transition(String),
}

/// Result type alias for vpsdeploy operations
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Create a tool install error
    pub fn tool_install(context: impl Into<String>, failure: CommandFailure) -> Self {
        Self::ToolInstall {
            context: context.into(),
            failure,
        }
    }

    /// Create a deploy error
    pub fn deploy(context: impl Into<String>, failure: CommandFailure) -> Self {
        Self::Deploy {
            context: context.into(),
            failure,
        }
    }

    /// Create a profile write error
    pub fn config_write(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::ConfigWrite {
            path: path.into(),
            source,
        }
    }

    /// The failed command, when the error came from one.
    pub fn failure(&self) -> Option<&CommandFailure> {
        match self {
            Self::ToolInstall { failure, .. } | Self::Deploy { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
