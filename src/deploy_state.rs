//! Deployment State Machine
//!
//! Tracks how far the current run has progressed. Stages only move forward,
//! one at a time, and any non-terminal stage may fail.
//!
//! # Stage Flow
//!
//! ```text
//! Start
//!     ↓
//! RuntimeManagerReady
//!     ↓
//! RuntimeInstalled
//!     ↓
//! ProcessManagerReady
//!     ↓
//! ProcessManagerConfigured
//!     ↓
//! ProjectDeployed
//!     ↓
//! EnvChecked
//!     ↓
//! Done
//!
//! (Any stage can transition to Failed)
//! ```
//!
//! Nothing here is persisted; each run starts again at `Start` and re-derives
//! external state by querying the machine.

use std::fmt;
use strum::EnumIter;
use thiserror::Error;

/// Deployment stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[repr(u8)]
pub enum DeployStage {
    Start = 0,
    /// nvm present and answering `nvm --version`
    RuntimeManagerReady = 1,
    /// Node.js installed and selected
    RuntimeInstalled = 2,
    /// pm2 installed
    ProcessManagerReady = 3,
    /// pm2 lines present in the shell profile
    ProcessManagerConfigured = 4,
    /// Project cloned or updated and running under pm2
    ProjectDeployed = 5,
    EnvChecked = 6,
    /// Terminal success
    Done = 7,
    /// Terminal failure
    Failed = 255,
}

impl DeployStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true for Done and Failed
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns the next stage in the sequence, or None at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::RuntimeManagerReady),
            Self::RuntimeManagerReady => Some(Self::RuntimeInstalled),
            Self::RuntimeInstalled => Some(Self::ProcessManagerReady),
            Self::ProcessManagerReady => Some(Self::ProcessManagerConfigured),
            Self::ProcessManagerConfigured => Some(Self::ProjectDeployed),
            Self::ProjectDeployed => Some(Self::EnvChecked),
            Self::EnvChecked => Some(Self::Done),
            Self::Done | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Start => "Not started",
            Self::RuntimeManagerReady => "Runtime manager ready",
            Self::RuntimeInstalled => "Runtime installed",
            Self::ProcessManagerReady => "Process manager ready",
            Self::ProcessManagerConfigured => "Process manager configured",
            Self::ProjectDeployed => "Project deployed",
            Self::EnvChecked => "Environment file checked",
            Self::Done => "Deployment complete",
            Self::Failed => "Deployment failed",
        }
    }

    /// All stages in order (excluding Failed)
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::Start,
            Self::RuntimeManagerReady,
            Self::RuntimeInstalled,
            Self::ProcessManagerReady,
            Self::ProcessManagerConfigured,
            Self::ProjectDeployed,
            Self::EnvChecked,
            Self::Done,
        ]
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageTransitionError {
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage { from: DeployStage, to: DeployStage },

    #[error("Cannot go backwards from {from} to {to} (deployment is forward-only)")]
    BackwardTransition { from: DeployStage, to: DeployStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: DeployStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: DeployStage },
}

/// Owns the current stage of one deployment run.
///
/// ```
/// use vpsdeploy::deploy_state::{DeployContext, DeployStage};
///
/// let mut ctx = DeployContext::new();
/// ctx.transition_to(DeployStage::RuntimeManagerReady).unwrap();
/// assert!(ctx.transition_to(DeployStage::ProjectDeployed).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct DeployContext {
    current: DeployStage,
    failed_at: Option<DeployStage>,
    /// (stage, unix timestamp) for every stage entered
    stage_history: Vec<(DeployStage, u64)>,
}

impl Default for DeployContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeployContext {
    pub fn new() -> Self {
        Self {
            current: DeployStage::Start,
            failed_at: None,
            stage_history: Vec::with_capacity(DeployStage::all_stages().len()),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> DeployStage {
        self.current
    }

    /// Stage that was current when `fail()` was called
    #[inline]
    pub fn failed_at(&self) -> Option<DeployStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.current == DeployStage::Done
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == DeployStage::Failed
    }

    pub fn stage_history(&self) -> &[(DeployStage, u64)] {
        &self.stage_history
    }

    /// Advance to the next stage in sequence.
    pub fn advance(&mut self) -> Result<DeployStage, StageTransitionError> {
        let next = self
            .current
            .next()
            .ok_or(StageTransitionError::FromTerminalState { from: self.current })?;
        self.record_stage_transition(next);
        self.current = next;
        Ok(next)
    }

    /// Transition to `target`, which must be exactly the next stage.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if current is Done or Failed
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    pub fn transition_to(
        &mut self,
        target: DeployStage,
    ) -> Result<DeployStage, StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(StageTransitionError::AlreadyAtStage { stage: target });
        }

        // Failed is only reachable through fail()
        if target == DeployStage::Failed {
            return Err(StageTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(StageTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(StageTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record_stage_transition(target);
        self.current = target;
        Ok(target)
    }

    /// Mark the run as failed at the current stage.
    pub fn fail(&mut self) -> Result<(), StageTransitionError> {
        if self.current.is_terminal() {
            return Err(StageTransitionError::FromTerminalState { from: self.current });
        }

        self.failed_at = Some(self.current);
        self.record_stage_transition(DeployStage::Failed);
        self.current = DeployStage::Failed;
        Ok(())
    }

    fn record_stage_transition(&mut self, stage: DeployStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.stage_history.push((stage, timestamp));
    }
}

impl From<StageTransitionError> for crate::error::DeployError {
    fn from(err: StageTransitionError) -> Self {
        crate::error::DeployError::Transition(err.to_string())
    }
}
