//! Type-safe git commands.

use std::path::PathBuf;

use crate::tool_traits::ToolCommand;

/// `git pull <remote> <branch>`, run inside the checkout.
#[derive(Debug, Clone)]
pub struct GitPull {
    pub remote: String,
    pub branch: String,
}

impl ToolCommand for GitPull {
    fn program(&self) -> String {
        "git".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec!["pull".to_string(), self.remote.clone(), self.branch.clone()]
    }
}

/// `git clone <url> <dest>`
#[derive(Debug, Clone)]
pub struct GitClone {
    pub url: String,
    pub dest: PathBuf,
}

impl ToolCommand for GitClone {
    fn program(&self) -> String {
        "git".to_string()
    }

    fn to_args(&self) -> Vec<String> {
        vec![
            "clone".to_string(),
            self.url.clone(),
            self.dest.display().to_string(),
        ]
    }
}
