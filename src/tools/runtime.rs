//! Type-safe commands for the Node.js runtime and its version manager.
//!
//! - `NvmInstallScript` fetches and runs the nvm installer
//! - `NvmVersion`, `NvmInstall`, `NvmUse` drive nvm (shell function; wrap in `NvmShell`)
//! - `NodeVersion`, `NpmVersion` query the active runtime
//! - `NpmInstallGlobal`, `NpmInstallProduction` install packages

use crate::tool_traits::{shell_quote, ToolCommand};

// ============================================================================
// nvm
// ============================================================================

/// `curl -o- <url> | bash`, run through `bash -c` with pipefail so a failed
/// download is not masked by the shell reading empty input.
#[derive(Debug, Clone)]
pub struct NvmInstallScript {
    /// URL of nvm's `install.sh`.
    pub url: String,
}

impl ToolCommand for NvmInstallScript {
    fn program(&self) -> String {
        "bash".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "-c".to_string(),
            format!("set -o pipefail; curl -o- {} | bash", shell_quote(&self.url)),
        ]
    }
}

/// `nvm --version`
#[derive(Debug, Clone, Copy)]
pub struct NvmVersion;

impl ToolCommand for NvmVersion {
    fn program(&self) -> String {
        "nvm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["--version".to_string()]
    }
}

/// `nvm install <version>`
#[derive(Debug, Clone)]
pub struct NvmInstall {
    pub version: String,
}

impl ToolCommand for NvmInstall {
    fn program(&self) -> String {
        "nvm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["install".to_string(), self.version.clone()]
    }
}

/// `nvm use <version>`
#[derive(Debug, Clone)]
pub struct NvmUse {
    pub version: String,
}

impl ToolCommand for NvmUse {
    fn program(&self) -> String {
        "nvm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["use".to_string(), self.version.clone()]
    }
}

// ============================================================================
// node / npm
// ============================================================================

/// `node -v`
#[derive(Debug, Clone, Copy)]
pub struct NodeVersion;

impl ToolCommand for NodeVersion {
    fn program(&self) -> String {
        "node".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["-v".to_string()]
    }
}

/// `npm -v`
#[derive(Debug, Clone, Copy)]
pub struct NpmVersion;

impl ToolCommand for NpmVersion {
    fn program(&self) -> String {
        "npm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["-v".to_string()]
    }
}

/// `npm install -g <package>`
#[derive(Debug, Clone)]
pub struct NpmInstallGlobal {
    pub package: String,
}

impl ToolCommand for NpmInstallGlobal {
    fn program(&self) -> String {
        "npm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["install".to_string(), "-g".to_string(), self.package.clone()]
    }
}

/// `npm install --omit=dev`, run in the project directory.
#[derive(Debug, Clone, Copy)]
pub struct NpmInstallProduction;

impl ToolCommand for NpmInstallProduction {
    fn program(&self) -> String {
        "npm".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["install".to_string(), "--omit=dev".to_string()]
    }
}
