//! Type-safe external tool invocations.
//!
//! Every external program the sequencer runs is described by a struct that
//! implements `ToolCommand`. The struct definition IS the argv contract: flag
//! spelling is fixed here, once, instead of being assembled from strings at
//! each call site.
//!
//! Two wrappers compose with any command:
//!
//! - `Sudo` prefixes the argv with `sudo`.
//! - `NvmShell` runs the command inside `bash -c` after sourcing `nvm.sh`,
//!   which is required for `nvm` itself (a shell function) and for anything
//!   installed under the nvm-managed Node (`node`, `npm`, `pm2`).
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use vpsdeploy::tool_traits::{NvmShell, ToolCommand};
//! use vpsdeploy::tools::pm2::Pm2Restart;
//!
//! let restart = Pm2Restart { name: "backend".into() };
//! let cmd = NvmShell::new(PathBuf::from("/home/deploy/.nvm"), restart);
//! assert_eq!(
//!     cmd.argv(),
//!     vec![
//!         "bash".to_string(),
//!         "-c".to_string(),
//!         "source /home/deploy/.nvm/nvm.sh && pm2 restart backend".to_string(),
//!     ]
//! );
//! ```

use std::path::PathBuf;

/// Trait for typed tool invocations.
///
/// # Contract
///
/// - `program()`: the executable name as looked up on PATH.
/// - `to_args()`: arguments exactly as the tool expects them.
///
/// Implementors never perform IO; they only describe the command.
pub trait ToolCommand {
    /// Executable name (e.g., "git").
    fn program(&self) -> String;

    /// Arguments, not including the program.
    fn to_args(&self) -> Vec<String>;

    /// Full argv, program first.
    fn argv(&self) -> Vec<String> {
        let mut argv = vec![self.program()];
        argv.extend(self.to_args());
        argv
    }

    /// The argv rendered as a single shell-safe line.
    fn shell_line(&self) -> String {
        self.argv()
            .iter()
            .map(|arg| shell_quote(arg))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run the wrapped command with elevated privileges.
#[derive(Debug, Clone)]
pub struct Sudo<T>(pub T);

impl<T: ToolCommand> ToolCommand for Sudo<T> {
    fn program(&self) -> String {
        "sudo".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        self.0.argv()
    }
}

/// Run the wrapped command in a bash that has sourced `nvm.sh`.
#[derive(Debug, Clone)]
pub struct NvmShell<T> {
    /// nvm install directory (contains `nvm.sh`).
    pub nvm_dir: PathBuf,
    pub inner: T,
}

impl<T> NvmShell<T> {
    pub fn new(nvm_dir: PathBuf, inner: T) -> Self {
        Self { nvm_dir, inner }
    }
}

impl<T: ToolCommand> ToolCommand for NvmShell<T> {
    fn program(&self) -> String {
        "bash".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        let nvm_sh = self.nvm_dir.join("nvm.sh");
        vec![
            "-c".to_string(),
            format!(
                "source {} && {}",
                shell_quote(&nvm_sh.display().to_string()),
                self.inner.shell_line()
            ),
        ]
    }
}

/// Quote a word for POSIX shells.
///
/// Words made only of characters that no shell treats specially are returned
/// unchanged so logged command lines stay readable.
pub fn shell_quote(word: &str) -> String {
    let is_plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if is_plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(Vec<&'static str>);

    impl ToolCommand for Echo {
        fn program(&self) -> String {
            "echo".to_string()
        }

        fn to_args(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    #[test]
    fn test_shell_quote_plain_words_unchanged() {
        assert_eq!(shell_quote("--omit=dev"), "--omit=dev");
        assert_eq!(shell_quote("/var/www/backend"), "/var/www/backend");
        assert_eq!(shell_quote("deploy:deploy"), "deploy:deploy");
    }

    #[test]
    fn test_shell_quote_special_words() {
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn test_sudo_prefixes_argv() {
        let cmd = Sudo(Echo(vec!["hi"]));
        assert_eq!(cmd.argv(), vec!["sudo", "echo", "hi"]);
    }

    #[test]
    fn test_nvm_shell_quotes_inner_command() {
        let cmd = NvmShell::new(PathBuf::from("/root/.nvm"), Echo(vec!["a b"]));
        assert_eq!(
            cmd.to_args(),
            vec!["-c", "source /root/.nvm/nvm.sh && echo 'a b'"]
        );
    }

    #[test]
    fn test_nvm_shell_quotes_dir_with_spaces() {
        let cmd = NvmShell::new(PathBuf::from("/home/my user/.nvm"), Echo(vec![]));
        assert_eq!(
            cmd.to_args()[1],
            "source '/home/my user/.nvm/nvm.sh' && echo"
        );
    }
}
