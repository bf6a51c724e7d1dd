//! Typed argv builders for every external tool the sequencer invokes.

pub mod git;
pub mod pm2;
pub mod runtime;
pub mod system;
