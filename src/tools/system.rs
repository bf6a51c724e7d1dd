//! Type-safe commands for OS utilities: port listing, process termination,
//! ownership and directory removal, shell profile sourcing.

use std::path::PathBuf;

use crate::command_runner::CommandOutput;
use crate::tool_traits::{shell_quote, ToolCommand};

// ============================================================================
// Port listeners
// ============================================================================

/// `lsof -ti:<port>`: terse PID list of processes bound to a TCP/UDP port.
#[derive(Debug, Clone, Copy)]
pub struct ListPortListeners {
    pub port: u16,
}

impl ToolCommand for ListPortListeners {
    fn program(&self) -> String {
        "lsof".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![format!("-ti:{}", self.port)]
    }
}

/// Interpret `lsof -t` output.
///
/// lsof exits 1 with empty stdout when nothing matches; that is an empty
/// listener set, not an error. Returns `None` for any other failure.
pub fn listener_pids(output: &CommandOutput) -> Option<Vec<u32>> {
    if output.success() {
        return Some(parse_pids(&output.stdout));
    }
    if output.exit_code == Some(1) && output.stdout.trim().is_empty() {
        return Some(Vec::new());
    }
    None
}

/// One PID per line; blank or non-numeric lines are skipped.
pub fn parse_pids(stdout: &str) -> Vec<u32> {
    let mut pids = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<u32>() {
            Ok(pid) if !pids.contains(&pid) => pids.push(pid),
            Ok(_) => {}
            Err(_) => tracing::debug!("Ignoring non-PID lsof line: {:?}", line),
        }
    }
    pids
}

// ============================================================================
// Process termination
// ============================================================================

/// `kill -9 <pid>`
#[derive(Debug, Clone, Copy)]
pub struct ForceKill {
    pub pid: u32,
}

impl ToolCommand for ForceKill {
    fn program(&self) -> String {
        "kill".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["-9".to_string(), self.pid.to_string()]
    }
}

// ============================================================================
// Filesystem
// ============================================================================

/// `chown -R <owner>:<owner> <path>`
#[derive(Debug, Clone)]
pub struct ChownRecursive {
    /// User name; also used as the group.
    pub owner: String,
    pub path: PathBuf,
}

impl ToolCommand for ChownRecursive {
    fn program(&self) -> String {
        "chown".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-R".to_string(),
            format!("{0}:{0}", self.owner),
            self.path.display().to_string(),
        ]
    }
}

/// `rm -rf <path>`
#[derive(Debug, Clone)]
pub struct RemoveTree {
    pub path: PathBuf,
}

impl ToolCommand for RemoveTree {
    fn program(&self) -> String {
        "rm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["-rf".to_string(), self.path.display().to_string()]
    }
}

/// `bash -c 'source <profile>'`
#[derive(Debug, Clone)]
pub struct SourceProfile {
    pub profile: PathBuf,
}

impl ToolCommand for SourceProfile {
    fn program(&self) -> String {
        "bash".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            format!("source {}", shell_quote(&self.profile.display().to_string())),
        ]
    }
}
