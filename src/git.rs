use crate::error::CommitError;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::PathBuf;
use std::process::Command as GitCommand;

/// Version-control capabilities the generator needs.
pub trait VcsProvider {
    /// Fail with [`CommitError::MissingDependency`] unless the tool is installed
    /// and we are inside a repository.
    fn ensure_available(&self) -> Result<()>;

    /// The diff to describe; empty when there is nothing to commit.
    fn diff(&self) -> Result<String>;

    /// Hand the accepted message to the commit-message field.
    fn write_commit_message(&self, message: &str) -> Result<()>;
}

/// File under the git dir holding the accepted message. Git never rewrites it,
/// unlike COMMIT_EDITMSG which every `git commit` regenerates.
pub const MESSAGE_FILE: &str = "AICOMMIT_EDITMSG";

/// `git` executable driven as a subprocess.
#[derive(Debug, Clone)]
pub struct GitCli {
    work_dir: Option<PathBuf>,
    commit: bool,
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli { work_dir: None, commit: true }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git inside `dir` instead of the current directory.
    #[cfg(test)]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        GitCli { work_dir: Some(dir.into()), ..Self::default() }
    }

    /// Whether the accepted message is committed (`true`, the default) or only
    /// kept in [`MESSAGE_FILE`] for a later `git commit -e -F`.
    pub fn committing(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    fn command(&self) -> GitCommand {
        let mut cmd = GitCommand::new("git");
        if let Some(dir) = &self.work_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run a git command and capture stdout as String.
    pub fn git_output(&self, args: &[&str]) -> Result<String> {
        let output = self
            .command()
            .args(args)
            .output()
            .with_context(|| format!("failed to run git {:?}", args))?;

        if !output.status.success() {
            return Err(anyhow!(
                "git {:?} exited with status {:?}: {}",
                args,
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Get the path to the Git directory (e.g. .git)
    pub fn git_dir(&self) -> Result<PathBuf> {
        let dir = PathBuf::from(self.git_output(&["rev-parse", "--git-dir"])?.trim());
        match (&self.work_dir, dir.is_relative()) {
            (Some(base), true) => Ok(base.join(dir)),
            _ => Ok(dir),
        }
    }

    /// Get the full staged diff.
    pub fn staged_diff(&self) -> Result<String> {
        self.git_output(&["diff", "--cached"])
    }

    /// Get unstaged changes in tracked files.
    pub fn working_diff(&self) -> Result<String> {
        self.git_output(&["diff"])
    }

    /// Path of the kept message file inside the git dir.
    pub fn message_file(&self) -> Result<PathBuf> {
        Ok(self.git_dir()?.join(MESSAGE_FILE))
    }

    /// Write the commit message into .git/AICOMMIT_EDITMSG, ready for `git commit -F`.
    pub fn write_message_file(&self, message: &str) -> Result<PathBuf> {
        let path = self.message_file()?;
        fs::write(&path, format!("{}\n", message.trim_end()))
            .with_context(|| format!("failed to write commit message to {:?}", path))?;
        Ok(path)
    }
}

impl VcsProvider for GitCli {
    fn ensure_available(&self) -> Result<()> {
        which::which("git").map_err(|_| {
            CommitError::MissingDependency("git was not found on PATH".to_string())
        })?;

        let inside = self
            .git_output(&["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false);
        if !inside {
            return Err(CommitError::MissingDependency(
                "not inside a git work tree".to_string(),
            )
            .into());
        }
        Ok(())
    }

    fn diff(&self) -> Result<String> {
        let staged = self.staged_diff()?;
        if !staged.trim().is_empty() {
            return Ok(staged);
        }

        log::info!("Nothing staged; using unstaged changes");
        self.working_diff()
    }

    fn write_commit_message(&self, message: &str) -> Result<()> {
        let path = self.write_message_file(message)?;
        log::info!("Wrote commit message to {}", path.display());

        if !self.commit {
            return Ok(());
        }

        let file = path.to_string_lossy().to_string();
        let out = self.git_output(&["commit", "-F", &file]).with_context(|| {
            format!("git commit failed; the message is kept in {}", path.display())
        })?;
        log::info!("{}", out.trim());

        if let Err(e) = fs::remove_file(&path) {
            log::warn!("Could not remove {}: {e}", path.display());
        }
        Ok(())
    }
}
