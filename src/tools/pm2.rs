//! Type-safe commands for the pm2 process manager, plus classification of
//! `pm2 restart` results.

use std::path::PathBuf;

use crate::command_runner::CommandOutput;
use crate::tool_traits::ToolCommand;

/// `pm2 -v`
#[derive(Debug, Clone, Copy)]
pub struct Pm2Version;

impl ToolCommand for Pm2Version {
    fn program(&self) -> String {
        "pm2".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["-v".to_string()]
    }
}

/// `pm2 startup` (registers pm2 as a boot-time service)
#[derive(Debug, Clone, Copy)]
pub struct Pm2Startup;

impl ToolCommand for Pm2Startup {
    fn program(&self) -> String {
        "pm2".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["startup".to_string()]
    }
}

/// `pm2 restart <name>`
#[derive(Debug, Clone)]
pub struct Pm2Restart {
    pub name: String,
}

impl ToolCommand for Pm2Restart {
    fn program(&self) -> String {
        "pm2".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["restart".to_string(), self.name.clone()]
    }
}

/// `pm2 start <script> --name <name> --cwd <dir>`
#[derive(Debug, Clone)]
pub struct Pm2Start {
    /// Entry script, relative to `cwd`.
    pub script: String,
    pub name: String,
    pub cwd: PathBuf,
}

impl ToolCommand for Pm2Start {
    fn program(&self) -> String {
        "pm2".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "start".to_string(),
            self.script.clone(),
            "--name".to_string(),
            self.name.clone(),
            "--cwd".to_string(),
            self.cwd.display().to_string(),
        ]
    }
}

/// What a `pm2 restart` attempt tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The process was known and has been restarted.
    Restarted,
    /// pm2 has no process registered under that name.
    NotRegistered,
    /// Any other failure.
    Failed,
}

/// Exit status bash uses when the program itself is missing.
const COMMAND_NOT_FOUND_EXIT: i32 = 127;

/// The report pm2 prints when a restart targets an unknown name, e.g.
/// `[PM2][ERROR] Process or Namespace backend not found`.
fn unknown_name_report(name: &str) -> String {
    format!("process or namespace {} not found", name.to_lowercase())
}

/// Classify the output of `pm2 restart <name>`.
///
/// Only pm2's own unknown-name report for `name` counts as `NotRegistered`.
/// Every other non-zero exit is `Failed`, including a shell that could not
/// find `pm2` at all.
pub fn classify_restart(output: &CommandOutput, name: &str) -> RestartOutcome {
    if output.success() {
        return RestartOutcome::Restarted;
    }
    if output.exit_code == Some(COMMAND_NOT_FOUND_EXIT) {
        return RestartOutcome::Failed;
    }
    let reported = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    if reported.contains(&unknown_name_report(name)) {
        RestartOutcome::NotRegistered
    } else {
        RestartOutcome::Failed
    }
}
