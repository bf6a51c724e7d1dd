//! vpsdeploy Library
//!
//! Provisions nvm, Node.js and pm2 on a single host, then clones or updates
//! the backend repository and (re)starts it under pm2.

pub mod cli;
pub mod command_runner;
pub mod config;
pub mod deploy_state;
pub mod error;
pub mod interrupt;
pub mod profile;
pub mod sequencer;
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
pub mod tool_traits;
pub mod tools;

// Re-export main types for convenience
pub use command_runner::{CommandOutput, CommandRunner, SystemRunner};
pub use config::DeployConfig;
pub use deploy_state::{DeployContext, DeployStage, StageTransitionError};
pub use error::{CommandFailure, DeployError};
pub use sequencer::{
    DeployBranch, DeployReport, ProcessLaunch, ProfileStatus, ProjectDeployment, Sequencer,
};
pub use tool_traits::{NvmShell, Sudo, ToolCommand};
