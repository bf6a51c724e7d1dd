//! Deployment sequencer
//!
//! Runs the provisioning steps in a fixed order against a `CommandRunner`:
//!
//! 1. nvm present (install and profile fix-up if needed)
//! 2. Node.js installed and selected
//! 3. pm2 installed
//! 4. pm2 configured in the shell profile, boot service registered
//! 5. project cloned or updated, dependencies installed, process (re)started
//! 6. `.env` presence checked
//!
//! Every step is idempotent and re-derives state from the filesystem and the
//! tools themselves. The first failure aborts the run. Two conditions are
//! deliberately not failures: `pm2 startup` failing (warning) and pm2 not
//! knowing the process name on restart (fresh start instead).

use std::path::Path;

use strum::Display;
use tracing::{error, info, warn};

use crate::command_runner::{CommandOutput, CommandRunner};
use crate::config::DeployConfig;
use crate::deploy_state::{DeployContext, DeployStage};
use crate::error::{CommandFailure, DeployError, Result};
use crate::profile::{self, NVM_BLOCK, PM2_BLOCK};
use crate::tool_traits::{NvmShell, Sudo, ToolCommand};
use crate::tools::git::{GitClone, GitPull};
use crate::tools::pm2::{
    classify_restart, Pm2Restart, Pm2Start, Pm2Startup, Pm2Version, RestartOutcome,
};
use crate::tools::runtime::{
    NodeVersion, NpmInstallGlobal, NpmInstallProduction, NpmVersion, NvmInstall,
    NvmInstallScript, NvmUse, NvmVersion,
};
use crate::tools::system::{
    listener_pids, ChownRecursive, ForceKill, ListPortListeners, RemoveTree, SourceProfile,
};

/// Result of the nvm step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeManagerStatus {
    /// The install script ran during this deployment.
    pub installed_now: bool,
    /// nvm init lines were appended to the shell profile.
    pub profile_updated: bool,
}

/// Versions reported after selecting the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVersions {
    pub node: String,
    pub npm: String,
}

/// Result of the pm2 install step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessManagerStatus {
    pub version: String,
    pub installed_now: bool,
}

/// Result of the pm2 profile step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileStatus {
    AlreadyConfigured,
    Configured {
        /// Whether `pm2 startup` succeeded.
        boot_registered: bool,
    },
}

/// Which path `deploy_project` took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DeployBranch {
    /// Existing checkout: pull and restart.
    #[strum(serialize = "update")]
    Update,
    /// No checkout: clear the port and clone fresh.
    #[strum(serialize = "clone")]
    Clone,
}

/// How the managed process ended up running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessLaunch {
    Restarted,
    Started,
}

/// Result of the project step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDeployment {
    pub branch: DeployBranch,
    /// PIDs killed on the app port before cloning (always empty on update).
    pub killed_pids: Vec<u32>,
    pub launch: ProcessLaunch,
}

/// Summary of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub runtime_manager: RuntimeManagerStatus,
    pub runtime: RuntimeVersions,
    pub process_manager: ProcessManagerStatus,
    pub profile: ProfileStatus,
    pub project: ProjectDeployment,
    pub env_file_present: bool,
}

/// Which error a failed command becomes.
#[derive(Debug, Clone, Copy)]
enum FailureKind {
    ToolInstall,
    Deploy,
}

impl FailureKind {
    fn wrap(self, context: &str, failure: CommandFailure) -> DeployError {
        match self {
            Self::ToolInstall => DeployError::tool_install(context, failure),
            Self::Deploy => DeployError::deploy(context, failure),
        }
    }
}

/// Runs the deployment steps in order.
pub struct Sequencer<R> {
    config: DeployConfig,
    runner: R,
    context: DeployContext,
}

impl<R: CommandRunner> Sequencer<R> {
    pub fn new(config: DeployConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            context: DeployContext::new(),
        }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Stage tracking for the current run.
    pub fn context(&self) -> &DeployContext {
        &self.context
    }

    /// Run every step. Stops at the first failure.
    pub fn run(&mut self) -> Result<DeployReport> {
        info!("Starting deployment process...");

        match self.run_steps() {
            Ok(report) => {
                self.context.transition_to(DeployStage::Done)?;
                info!("Deployment complete.");
                Ok(report)
            }
            Err(e) => {
                let reached = self.context.current_stage();
                if let Err(transition) = self.context.fail() {
                    warn!("Could not record failure: {}", transition);
                }
                error!("Deployment failed after stage '{}': {}", reached, e);
                Err(e)
            }
        }
    }

    fn run_steps(&mut self) -> Result<DeployReport> {
        let runtime_manager = self.ensure_runtime_manager()?;
        self.context.transition_to(DeployStage::RuntimeManagerReady)?;

        let runtime = self.ensure_runtime_installed()?;
        self.context.transition_to(DeployStage::RuntimeInstalled)?;

        let process_manager = self.ensure_process_manager()?;
        self.context.transition_to(DeployStage::ProcessManagerReady)?;

        let profile = self.ensure_process_manager_configured()?;
        self.context
            .transition_to(DeployStage::ProcessManagerConfigured)?;

        let project = self.deploy_project()?;
        self.context.transition_to(DeployStage::ProjectDeployed)?;

        let env_file_present = self.check_env_file();
        self.context.transition_to(DeployStage::EnvChecked)?;

        Ok(DeployReport {
            runtime_manager,
            runtime,
            process_manager,
            profile,
            project,
            env_file_present,
        })
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Install nvm if its directory is missing, then make sure it answers.
    pub fn ensure_runtime_manager(&self) -> Result<RuntimeManagerStatus> {
        info!("Checking NVM installation...");

        let installed_now = if self.config.nvm_dir.exists() {
            info!("NVM already installed.");
            false
        } else {
            info!("Installing NVM...");
            let script = NvmInstallScript {
                url: self.config.nvm_install_url.clone(),
            };
            self.require(&script, None, FailureKind::ToolInstall, "nvm install")?;
            info!("NVM installed successfully.");
            true
        };

        let (_, verify) = self.query(&self.nvm(NvmVersion), None)?;
        if verify.success() {
            info!("NVM is properly configured ({}).", verify.trimmed_stdout());
            return Ok(RuntimeManagerStatus {
                installed_now,
                profile_updated: false,
            });
        }

        warn!("NVM is installed but not configured properly in the shell profile.");
        let profile_path = &self.config.shell_profile;
        let profile_updated = if profile::has_nvm_config(profile_path) {
            info!("NVM configuration already present in {}", profile_path.display());
            false
        } else {
            info!("Adding NVM configuration to {}...", profile_path.display());
            profile::append_block(profile_path, NVM_BLOCK)?;
            info!("NVM configuration added to {}", profile_path.display());
            true
        };

        let source = SourceProfile {
            profile: self.config.shell_profile.clone(),
        };
        self.require(&source, None, FailureKind::ToolInstall, "re-source shell profile")?;

        Ok(RuntimeManagerStatus {
            installed_now,
            profile_updated,
        })
    }

    /// Install and select the configured Node.js major version.
    pub fn ensure_runtime_installed(&self) -> Result<RuntimeVersions> {
        let version = self.config.node_version.clone();
        info!("Installing Node.js v{}...", version);

        self.require(
            &self.nvm(NvmInstall {
                version: version.clone(),
            }),
            None,
            FailureKind::ToolInstall,
            "node install",
        )?;
        self.require(
            &self.nvm(NvmUse { version }),
            None,
            FailureKind::ToolInstall,
            "node activate",
        )?;

        let node = self.require(
            &self.nvm(NodeVersion),
            None,
            FailureKind::ToolInstall,
            "node version",
        )?;
        let npm = self.require(
            &self.nvm(NpmVersion),
            None,
            FailureKind::ToolInstall,
            "npm version",
        )?;

        let versions = RuntimeVersions {
            node: node.trimmed_stdout().to_string(),
            npm: npm.trimmed_stdout().to_string(),
        };
        info!("Node version: {}", versions.node);
        info!("NPM version: {}", versions.npm);
        Ok(versions)
    }

    /// Install pm2 globally unless it already answers `pm2 -v`.
    pub fn ensure_process_manager(&self) -> Result<ProcessManagerStatus> {
        info!("Checking PM2...");

        let (_, probe) = self.query(&self.nvm(Pm2Version), None)?;
        if probe.success() {
            let version = probe.trimmed_stdout().to_string();
            info!("PM2 is already installed: {}", version);
            return Ok(ProcessManagerStatus {
                version,
                installed_now: false,
            });
        }

        info!("PM2 not found. Installing...");
        let install = NpmInstallGlobal {
            package: self.config.pm2_package.clone(),
        };
        self.require(&self.nvm(install), None, FailureKind::ToolInstall, "pm2 install")?;
        let verify = self.require(
            &self.nvm(Pm2Version),
            None,
            FailureKind::ToolInstall,
            "pm2 verify",
        )?;

        let version = verify.trimmed_stdout().to_string();
        info!("PM2 installed successfully: {}", version);
        Ok(ProcessManagerStatus {
            version,
            installed_now: true,
        })
    }

    /// Append pm2 settings to the shell profile and register the boot service.
    ///
    /// Boot registration failures are logged and ignored.
    pub fn ensure_process_manager_configured(&self) -> Result<ProfileStatus> {
        info!("Checking PM2 configuration...");
        let profile_path = &self.config.shell_profile;

        if profile::has_pm2_config(profile_path) {
            info!("PM2 already configured in {}", profile_path.display());
            return Ok(ProfileStatus::AlreadyConfigured);
        }

        info!("Adding PM2 configuration to {}...", profile_path.display());
        profile::append_block(profile_path, PM2_BLOCK)?;

        let boot_registered = match self.query(&self.nvm(Pm2Startup), None) {
            Ok((_, out)) if out.success() => {
                info!("PM2 configured to start on boot");
                true
            }
            Ok((argv, out)) => {
                warn!(
                    "Could not setup PM2 startup: {}",
                    CommandFailure::new(&argv, &out)
                );
                false
            }
            Err(e) => {
                warn!("Could not setup PM2 startup: {}", e);
                false
            }
        };

        Ok(ProfileStatus::Configured { boot_registered })
    }

    /// Update the existing checkout, or clone a fresh one.
    pub fn deploy_project(&self) -> Result<ProjectDeployment> {
        info!("Checking if project exists...");

        if self.config.git_marker().exists() {
            self.update_project()
        } else {
            self.clone_project()
        }
    }

    /// Warn when `<project>/.env` is missing. Never fails.
    pub fn check_env_file(&self) -> bool {
        info!("Checking for .env file...");
        let env_path = self.config.env_file();

        if env_path.exists() {
            info!(".env file exists");
            true
        } else {
            warn!(".env file not found at {}", env_path.display());
            info!("Please create a .env file manually in the project directory");
            false
        }
    }

    // ========================================================================
    // Deploy branches
    // ========================================================================

    fn update_project(&self) -> Result<ProjectDeployment> {
        let dir = self.config.project_dir.as_path();
        info!("Project exists, pulling latest...");

        let pull = GitPull {
            remote: self.config.git_remote.clone(),
            branch: self.config.git_branch.clone(),
        };
        self.require(&pull, Some(dir), FailureKind::Deploy, "git pull")?;

        self.fix_ownership()?;
        self.install_dependencies()?;

        info!("Restarting with PM2...");
        let restart = self.nvm(Pm2Restart {
            name: self.config.process_name.clone(),
        });
        let (argv, out) = self.query(&restart, None)?;

        let launch = match classify_restart(&out, &self.config.process_name) {
            RestartOutcome::Restarted => {
                info!("Application restarted successfully");
                ProcessLaunch::Restarted
            }
            RestartOutcome::NotRegistered => {
                info!("Application not yet in PM2, starting fresh...");
                self.start_process()?;
                ProcessLaunch::Started
            }
            RestartOutcome::Failed => {
                let failure = CommandFailure::new(&argv, &out);
                failure.log();
                return Err(DeployError::deploy("pm2 restart", failure));
            }
        };

        Ok(ProjectDeployment {
            branch: DeployBranch::Update,
            killed_pids: Vec::new(),
            launch,
        })
    }

    fn clone_project(&self) -> Result<ProjectDeployment> {
        let killed_pids = self.clear_app_port()?;

        info!("Project not found, cloning fresh...");
        let dir = self.config.project_dir.clone();

        if std::fs::symlink_metadata(&dir).is_ok() {
            info!("Removing existing non-repository directory {}", dir.display());
            let remove = Sudo(RemoveTree { path: dir.clone() });
            self.require(&remove, None, FailureKind::Deploy, "remove stale directory")?;
        }

        let clone = Sudo(GitClone {
            url: self.config.git_url.clone(),
            dest: dir,
        });
        self.require(&clone, None, FailureKind::Deploy, "git clone")?;

        self.fix_ownership()?;
        self.install_dependencies()?;

        info!("Starting with PM2...");
        self.start_process()?;

        Ok(ProjectDeployment {
            branch: DeployBranch::Clone,
            killed_pids,
            launch: ProcessLaunch::Started,
        })
    }

    /// Kill every process bound to the app port. Returns the killed PIDs.
    fn clear_app_port(&self) -> Result<Vec<u32>> {
        let port = self.config.app_port;
        info!("Checking if any process is listening on port {}...", port);

        let (argv, out) = self.query(&ListPortListeners { port }, None)?;
        let pids = match listener_pids(&out) {
            Some(pids) => pids,
            None => {
                let failure = CommandFailure::new(&argv, &out);
                failure.log();
                return Err(DeployError::deploy("port listener scan", failure));
            }
        };

        if pids.is_empty() {
            info!("No processes found on port {}.", port);
            return Ok(pids);
        }

        info!(
            "Found process(es) using port {}: {:?}. Terminating them...",
            port, pids
        );
        for &pid in &pids {
            self.require(
                &Sudo(ForceKill { pid }),
                None,
                FailureKind::Deploy,
                "terminate port listener",
            )?;
        }
        info!("Existing processes on port {} terminated.", port);
        Ok(pids)
    }

    fn fix_ownership(&self) -> Result<()> {
        info!("Fixing permissions...");
        let chown = Sudo(ChownRecursive {
            owner: self.config.owner.clone(),
            path: self.config.project_dir.clone(),
        });
        self.require(&chown, None, FailureKind::Deploy, "ownership fix")?;
        Ok(())
    }

    fn install_dependencies(&self) -> Result<()> {
        info!("Installing dependencies...");
        self.require(
            &self.nvm(NpmInstallProduction),
            Some(self.config.project_dir.as_path()),
            FailureKind::Deploy,
            "dependency install",
        )?;
        Ok(())
    }

    fn start_process(&self) -> Result<()> {
        let start = self.nvm(Pm2Start {
            script: self.config.entry_script.clone(),
            name: self.config.process_name.clone(),
            cwd: self.config.project_dir.clone(),
        });
        self.require(&start, None, FailureKind::Deploy, "pm2 start")?;
        info!("Application started as '{}'", self.config.process_name);
        Ok(())
    }

    // ========================================================================
    // Command plumbing
    // ========================================================================

    fn nvm<T>(&self, cmd: T) -> NvmShell<T> {
        NvmShell::new(self.config.nvm_dir.clone(), cmd)
    }

    /// Run a command and hand back its argv and output, whatever the exit code.
    fn query<T: ToolCommand>(
        &self,
        cmd: &T,
        cwd: Option<&Path>,
    ) -> Result<(Vec<String>, CommandOutput)> {
        let argv = cmd.argv();
        let output = self.runner.run(&argv, cwd)?;
        Ok((argv, output))
    }

    /// Run a command that must succeed; log and convert the failure otherwise.
    fn require<T: ToolCommand>(
        &self,
        cmd: &T,
        cwd: Option<&Path>,
        kind: FailureKind,
        context: &str,
    ) -> Result<CommandOutput> {
        let (argv, output) = self.query(cmd, cwd)?;
        match output.ensure_success(&argv) {
            Ok(()) => Ok(output),
            Err(failure) => {
                failure.log();
                Err(kind.wrap(context, failure))
            }
        }
    }
}
