//! Shell profile edits.
//!
//! The profile is only ever appended to; existing content is never rewritten.

use crate::error::{DeployError, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// nvm init lines, appended when `nvm --version` fails after install.
pub const NVM_BLOCK: &str = concat!(
    "\n# NVM Configuration\n",
    "export NVM_DIR=\"$HOME/.nvm\"\n",
    "[ -s \"$NVM_DIR/nvm.sh\" ] && \\. \"$NVM_DIR/nvm.sh\"\n",
    "[ -s \"$NVM_DIR/bash_completion\" ] && \\. \"$NVM_DIR/bash_completion\"\n",
);

/// pm2 home and PATH lines.
pub const PM2_BLOCK: &str = concat!(
    "\n# PM2 Configuration\n",
    "export PM2_HOME=\"$HOME/.pm2\"\n",
    "export PATH=\"$PATH:$HOME/node_modules/.bin\"\n",
);

/// Append `block` to the profile, creating the file if needed.
pub fn append_block(profile: &Path, block: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile)
        .map_err(|e| DeployError::config_write(profile.display().to_string(), e))?;
    file.write_all(block.as_bytes())
        .map_err(|e| DeployError::config_write(profile.display().to_string(), e))
}

/// Whether the profile already carries nvm init lines.
///
/// A missing or unreadable profile counts as unconfigured.
pub fn has_nvm_config(profile: &Path) -> bool {
    match std::fs::read_to_string(profile) {
        Ok(content) => content.contains("# NVM Configuration") || content.contains("NVM_DIR"),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", profile.display(), e);
            false
        }
    }
}

/// Whether the profile already mentions pm2.
///
/// A missing or unreadable profile counts as unconfigured.
pub fn has_pm2_config(profile: &Path) -> bool {
    match std::fs::read_to_string(profile) {
        Ok(content) => content.contains("PM2_HOME") || content.contains("pm2"),
        Err(e) => {
            tracing::debug!("Could not read {}: {}", profile.display(), e);
            false
        }
    }
}
