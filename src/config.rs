//! Deployment configuration
//!
//! Everything the sequencer needs to know is fixed at compile time and
//! resolved once against the invoking user's home directory and name. The
//! resulting `DeployConfig` is handed to the sequencer by value and never
//! mutated afterwards.

use std::path::{Path, PathBuf};

/// Where the backend is checked out.
pub const PROJECT_DIR: &str = "/var/www/backend";
/// Repository cloned on a fresh machine.
pub const GIT_URL: &str = "https://github.com/DeepeshKalura/creating-cd-ci-for-vps-nodejs";
pub const GIT_REMOTE: &str = "origin";
pub const GIT_BRANCH: &str = "main";
/// Node.js major version installed through nvm.
pub const NODE_VERSION: &str = "22";
pub const NVM_INSTALL_URL: &str = "https://raw.githubusercontent.com/nvm-sh/nvm/v0.40.2/install.sh";
/// pm2 process name for the backend.
pub const PROCESS_NAME: &str = "backend";
pub const ENTRY_SCRIPT: &str = "index.js";
/// Port the backend listens on; stale listeners are killed before a clone.
pub const APP_PORT: u16 = 3000;
pub const PM2_PACKAGE: &str = "pm2";

/// Immutable deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub project_dir: PathBuf,
    pub git_url: String,
    pub git_remote: String,
    pub git_branch: String,
    pub node_version: String,
    /// nvm install marker; its existence means nvm is installed.
    pub nvm_dir: PathBuf,
    pub nvm_install_url: String,
    /// Shell profile that receives nvm and pm2 init lines (append only).
    pub shell_profile: PathBuf,
    pub process_name: String,
    pub entry_script: String,
    pub app_port: u16,
    pub pm2_package: String,
    /// Owner (user and group) applied to the checkout.
    pub owner: String,
}

impl DeployConfig {
    /// Compiled-in settings for a user with the given home and name.
    pub fn for_user(home: &Path, owner: impl Into<String>) -> Self {
        Self {
            project_dir: PathBuf::from(PROJECT_DIR),
            git_url: GIT_URL.to_string(),
            git_remote: GIT_REMOTE.to_string(),
            git_branch: GIT_BRANCH.to_string(),
            node_version: NODE_VERSION.to_string(),
            nvm_dir: home.join(".nvm"),
            nvm_install_url: NVM_INSTALL_URL.to_string(),
            shell_profile: home.join(".bashrc"),
            process_name: PROCESS_NAME.to_string(),
            entry_script: ENTRY_SCRIPT.to_string(),
            app_port: APP_PORT,
            pm2_package: PM2_PACKAGE.to_string(),
            owner: owner.into(),
        }
    }

    /// Compiled-in settings resolved for the user running this process.
    pub fn from_environment() -> std::io::Result<Self> {
        let home = home::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            )
        })?;
        let owner = invoking_user()?;
        Ok(Self::for_user(&home, owner))
    }

    /// Replace the project directory.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Replace the git remote URL.
    pub fn with_git_url(mut self, url: impl Into<String>) -> Self {
        self.git_url = url.into();
        self
    }

    /// `<project>/.git`, the checkout sentinel.
    pub fn git_marker(&self) -> PathBuf {
        self.project_dir.join(".git")
    }

    /// `<project>/.env`, observed but never created.
    pub fn env_file(&self) -> PathBuf {
        self.project_dir.join(".env")
    }
}

/// Name of the user running the deployment.
///
/// `$USER`, then `$USERNAME`, then the passwd entry for the real uid.
pub fn invoking_user() -> std::io::Result<String> {
    for var in ["USER", "USERNAME"] {
        if let Ok(name) = std::env::var(var) {
            if !name.is_empty() {
                return Ok(name);
            }
        }
    }

    let uid = nix::unistd::getuid();
    match nix::unistd::User::from_uid(uid) {
        Ok(Some(user)) => Ok(user.name),
        Ok(None) => Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no passwd entry for uid {}", uid),
        )),
        Err(e) => Err(std::io::Error::other(e)),
    }
}
