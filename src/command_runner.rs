//! Command execution seam.
//!
//! All external programs run through a `CommandRunner`. The sequencer only
//! sees exit codes and captured output, never `std::process` directly, so it
//! can be driven by a scripted runner in tests.
//!
//! `SystemRunner` is the production implementation. It blocks until the child
//! exits; there is no timeout. Each child's PID sits in the interrupt
//! registry between spawn and wait.

use crate::error::{CommandFailure, Result};
use crate::interrupt;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Output from a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// A successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// A failed run with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    /// Whether the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout with surrounding whitespace removed.
    pub fn trimmed_stdout(&self) -> &str {
        self.stdout.trim()
    }

    /// Return the failure record if the command did not succeed.
    pub fn ensure_success(&self, argv: &[String]) -> std::result::Result<(), CommandFailure> {
        if self.success() {
            Ok(())
        } else {
            Err(CommandFailure::new(argv, self))
        }
    }
}

/// Runs one external command to completion.
///
/// `Err` is reserved for failures to run the command at all (spawn errors,
/// empty argv). A command that runs and exits non-zero is `Ok` with
/// `exit_code` set; callers decide what that means.
pub trait CommandRunner {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        (**self).run(argv, cwd)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        (**self).run(argv, cwd)
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], cwd: Option<&Path>) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;

        debug!("run: {:?} cwd={:?}", argv, cwd);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn()?;
        let pid = child.id();
        interrupt::register_child(pid);
        let waited = child.wait_with_output();
        interrupt::unregister_child(pid);

        let output = waited?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };

        debug!("{} exited with {:?}", program, result.exit_code);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_system_runner_captures_stdout() {
        let out = SystemRunner
            .run(&argv(&["bash", "-c", "echo hello"]), None)
            .expect("bash should run");
        assert!(out.success());
        assert_eq!(out.trimmed_stdout(), "hello");
    }

    #[test]
    fn test_system_runner_captures_failure() {
        let out = SystemRunner
            .run(&argv(&["bash", "-c", "echo oops >&2; exit 3"]), None)
            .expect("bash should run");
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn test_system_runner_honors_cwd() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = SystemRunner
            .run(&argv(&["pwd"]), Some(dir.path()))
            .expect("pwd should run");
        let reported = std::fs::canonicalize(out.trimmed_stdout()).expect("canonical");
        let expected = std::fs::canonicalize(dir.path()).expect("canonical");
        assert_eq!(reported, expected);
    }

    #[test]
    fn test_system_runner_rejects_empty_argv() {
        assert!(SystemRunner.run(&[], None).is_err());
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let missing = argv(&["this_binary_definitely_does_not_exist_12345"]);
        let result = SystemRunner.run(&missing, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_child_is_unregistered_after_exit() {
        let out = SystemRunner
            .run(&argv(&["bash", "-c", "echo $$"]), None)
            .expect("bash should run");
        let pid: u32 = out.trimmed_stdout().parse().expect("pid");

        let registry = interrupt::ChildRegistry::global().lock().expect("lock");
        assert!(!registry.contains(pid));
    }

    #[test]
    fn test_child_is_registered_while_running() {
        use std::time::{Duration, Instant};

        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; sleep 2", pid_file.display());
        let handle =
            std::thread::spawn(move || SystemRunner.run(&argv(&["bash", "-c", &script]), None));

        let is_registered = |pid: u32| {
            interrupt::ChildRegistry::global()
                .lock()
                .map(|registry| registry.contains(pid))
                .unwrap_or(false)
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            seen = std::fs::read_to_string(&pid_file)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok())
                .is_some_and(is_registered);
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(seen, "running child was never found in the registry");

        let out = handle.join().expect("join").expect("bash should run");
        assert!(out.success());
    }

    #[test]
    fn test_ensure_success_reports_argv() {
        let out = CommandOutput::failed(2, "bad");
        let failure = out.ensure_success(&argv(&["git", "pull"])).unwrap_err();
        assert_eq!(failure.command_line(), "git pull");
        assert_eq!(failure.exit_code, Some(2));
        assert_eq!(failure.stderr, "bad");
    }
}
