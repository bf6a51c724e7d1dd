//! Property-Based Tests for vpsdeploy
//!
//! These tests verify:
//! - lsof PID parsing and the "nothing listening" convention
//! - pm2 restart classification
//! - Shell quoting used by `NvmShell`
//! - Forward-only stage transitions

use proptest::prelude::*;
use strum::IntoEnumIterator;

use vpsdeploy::command_runner::CommandOutput;
use vpsdeploy::deploy_state::{DeployContext, DeployStage};
use vpsdeploy::tool_traits::shell_quote;
use vpsdeploy::tools::pm2::{classify_restart, RestartOutcome};
use vpsdeploy::tools::system::{listener_pids, parse_pids};

// =============================================================================
// PID parsing
// =============================================================================

fn dedup_in_order(pids: &[u32]) -> Vec<u32> {
    let mut seen = Vec::new();
    for &pid in pids {
        if !seen.contains(&pid) {
            seen.push(pid);
        }
    }
    seen
}

proptest! {
    /// Every numeric line is returned once, in first-seen order
    #[test]
    fn parse_pids_keeps_first_occurrence(pids in prop::collection::vec(1u32..4_194_304, 0..12)) {
        let stdout: String = pids.iter().map(|p| format!("{}\n", p)).collect();
        prop_assert_eq!(parse_pids(&stdout), dedup_in_order(&pids));
    }

    /// Blank and non-numeric lines never produce PIDs
    #[test]
    fn parse_pids_ignores_noise(noise in "[a-z :]{0,20}") {
        let stdout = format!("\n{}\n   \n", noise);
        prop_assert!(parse_pids(&stdout).is_empty());
    }

    /// lsof's exit 1 with empty stdout is an empty listener set, whatever stderr says
    #[test]
    fn lsof_exit_one_means_no_listeners(stderr in ".{0,40}") {
        let out = CommandOutput { stdout: String::new(), stderr, exit_code: Some(1) };
        prop_assert_eq!(listener_pids(&out), Some(vec![]));
    }

    /// Any other non-zero exit is not interpreted as a listener set
    #[test]
    fn lsof_other_failures_are_errors(code in 2i32..256) {
        let out = CommandOutput::failed(code, "lsof: unsupported option");
        prop_assert_eq!(listener_pids(&out), None);
    }
}

// =============================================================================
// pm2 restart classification
// =============================================================================

proptest! {
    /// Exit 0 is always a restart, regardless of what pm2 printed
    #[test]
    fn restart_success_is_restarted(stdout in ".{0,60}", stderr in ".{0,60}") {
        let out = CommandOutput { stdout, stderr, exit_code: Some(0) };
        prop_assert_eq!(classify_restart(&out, "backend"), RestartOutcome::Restarted);
    }

    /// A failure without pm2's unknown-name report is a hard failure
    #[test]
    fn restart_failure_without_report_is_failed(
        stderr in "[A-Za-z0-9 \\[\\]:/._-]{0,60}",
        code in 1i32..256,
    ) {
        prop_assume!(!stderr.to_lowercase().contains("namespace backend not found"));
        let out = CommandOutput::failed(code, stderr);
        prop_assert_eq!(classify_restart(&out, "backend"), RestartOutcome::Failed);
    }

    /// The shell's "command not found" never passes for an unknown process
    #[test]
    fn restart_missing_binary_is_failed(prefix in "(bash|sh)(: line [0-9]{1,3})?") {
        let out = CommandOutput::failed(127, format!("{}: pm2: command not found", prefix));
        prop_assert_eq!(classify_restart(&out, "backend"), RestartOutcome::Failed);
    }

    /// Exit 127 is a missing program even if the text mentions the name
    #[test]
    fn restart_exit_127_is_failed(name in "[a-z][a-z0-9-]{0,15}") {
        let report = format!("[PM2][ERROR] Process or Namespace {} not found", name);
        let out = CommandOutput::failed(127, report);
        prop_assert_eq!(classify_restart(&out, &name), RestartOutcome::Failed);
    }

    /// The unknown-name report is recognised wherever it appears
    #[test]
    fn restart_not_found_is_not_registered(
        name in "[a-z][a-z0-9-]{0,15}",
        on_stdout in any::<bool>(),
    ) {
        let report = format!("[PM2][ERROR] Process or Namespace {} not found", name);
        let out = if on_stdout {
            CommandOutput { stdout: report, stderr: String::new(), exit_code: Some(1) }
        } else {
            CommandOutput::failed(1, report)
        };
        prop_assert_eq!(classify_restart(&out, &name), RestartOutcome::NotRegistered);
    }
}

// =============================================================================
// Shell quoting
// =============================================================================

/// Inverse of `shell_quote` for its own output.
fn unquote(quoted: &str) -> String {
    match quoted.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => quoted.to_string(),
    }
}

proptest! {
    /// Quoting is reversible
    #[test]
    fn shell_quote_roundtrip(word in ".{0,40}") {
        prop_assert_eq!(unquote(&shell_quote(&word)), word);
    }

    /// Plain words pass through untouched
    #[test]
    fn shell_quote_plain_identity(word in "[A-Za-z0-9@%+=:,./_-]{1,40}") {
        prop_assert_eq!(shell_quote(&word), word);
    }

    /// Anything with a space or shell metacharacter gets quoted
    #[test]
    fn shell_quote_wraps_specials(prefix in "[a-z]{0,5}", special in "[ $`\"'&|;<>()*?!~#]") {
        let word = format!("{}{}", prefix, special);
        let quoted = shell_quote(&word);
        prop_assert!(quoted.starts_with('\''));
        prop_assert!(quoted.ends_with('\''));
    }
}

// =============================================================================
// Stage transitions
// =============================================================================

fn stage_strategy() -> impl Strategy<Value = DeployStage> {
    prop::sample::select(DeployStage::all_stages().to_vec())
}

fn context_at(stage: DeployStage) -> DeployContext {
    let mut ctx = DeployContext::new();
    while ctx.current_stage() != stage {
        ctx.advance().expect("stage should be reachable");
    }
    ctx
}

proptest! {
    /// transition_to succeeds exactly for the immediate successor
    #[test]
    fn only_next_stage_is_reachable(from in stage_strategy(), to in stage_strategy()) {
        let mut ctx = context_at(from);
        let result = ctx.transition_to(to);
        prop_assert_eq!(result.is_ok(), from.next() == Some(to));
    }

    /// Failing records the stage that was current
    #[test]
    fn fail_records_current_stage(at in stage_strategy()) {
        prop_assume!(!at.is_terminal());
        let mut ctx = context_at(at);
        ctx.fail().expect("non-terminal stage can fail");
        prop_assert_eq!(ctx.failed_at(), Some(at));
        prop_assert!(ctx.is_failed());
    }
}

#[test]
fn every_stage_but_failed_is_in_sequence() {
    let listed: Vec<DeployStage> = DeployStage::iter()
        .filter(|s| *s != DeployStage::Failed)
        .collect();
    assert_eq!(listed, DeployStage::all_stages().to_vec());
}
