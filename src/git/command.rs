//! Thin async wrapper around the `git` executable

use crate::error::GitError;
use std::path::Path;
use tokio::process::Command;

/// Invokes the version-control tool against a repository directory
#[derive(Debug, Clone)]
pub struct GitCommand {
    binary: String,
}

impl GitCommand {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run `git -C <repo> <args>` and return stdout
    ///
    /// A non-zero exit is reported as `GitError::CommandFailed` carrying the
    /// trimmed stderr. Output is decoded lossily; paths and subjects that are not
    /// valid UTF-8 keep their replacement characters.
    pub async fn output(&self, repo: &Path, args: &[&str]) -> Result<String, GitError> {
        let rendered = args.join(" ");
        tracing::debug!("git -C {} {}", repo.display(), rendered);

        let output = Command::new(&self.binary)
            .arg("-C")
            .arg(repo)
            .args(["-c", "core.quotepath=off", "-c", "color.ui=never"])
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_PAGER", "cat")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GitError::Spawn(format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!("git {} failed: {}", rendered, stderr);
            return Err(GitError::CommandFailed {
                args: rendered,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for GitCommand {
    fn default() -> Self {
        Self::new("git")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let git = GitCommand::new("definitely-not-a-git-binary");
        let err = git.output(dir.path(), &["status"]).await.unwrap_err();
        assert!(matches!(err, GitError::Spawn(_)));
    }

    #[tokio::test]
    async fn test_non_repository_is_command_failure() {
        let dir = TempDir::new().unwrap();
        let git = GitCommand::default();
        let err = git.output(dir.path(), &["log", "-1"]).await.unwrap_err();
        assert!(matches!(err, GitError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_version_succeeds() {
        let dir = TempDir::new().unwrap();
        let git = GitCommand::default();
        let out = git.output(dir.path(), &["--version"]).await.unwrap();
        assert!(out.starts_with("git version"));
    }
}
