//! Review of a generated commit message in a scratch file.
//!
//! The message is written to a temporary file below a `# ... #` header and shown
//! to the user. Saving accepts it (possibly edited), closing without saving
//! cancels. Whichever of the two events arrives first decides the outcome, and
//! the scratch file is removed before [`approve`] returns on every path.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process::Command;
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, SystemTime};
use tempfile::NamedTempFile;

pub const HEADER: &str =
    "# Save to accept this commit message, close without saving to cancel #";

const COMMENT_MARKER: char = '#';

/// Something the user did with the scratch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScratchEvent {
    Saved,
    Closed,
}

/// Result of one review. Both accepted variants carry the stripped, trimmed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Accepted(String),
    AcceptedEdited(String),
    Cancelled,
}

impl ApprovalOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, ApprovalOutcome::Cancelled)
    }

    pub fn is_edited(&self) -> bool {
        matches!(self, ApprovalOutcome::AcceptedEdited(_))
    }

    pub fn final_text(&self) -> Option<&str> {
        match self {
            ApprovalOutcome::Accepted(t) | ApprovalOutcome::AcceptedEdited(t) => Some(t),
            ApprovalOutcome::Cancelled => None,
        }
    }
}

/// Displays a scratch file and reports save/close events.
///
/// Implementations may send events from another thread and may keep sending
/// after the first one; only the first is observed.
pub trait ScratchViewer {
    fn present(&self, path: &Path, events: Sender<ScratchEvent>) -> Result<()>;
}

/// Show `generated` to the user and wait for them to accept, edit, or cancel it.
pub fn approve(generated: &str, viewer: &dyn ScratchViewer) -> Result<ApprovalOutcome> {
    let mut scratch = tempfile::Builder::new()
        .prefix("aicommit-")
        .suffix(".txt")
        .rand_bytes(8)
        .tempfile()
        .context("failed to create scratch file")?;

    write!(scratch, "{HEADER}\n\n{generated}\n").context("failed to write scratch file")?;
    scratch.flush()?;

    log::debug!("Scratch file: {}", scratch.path().display());

    let outcome = review(&scratch, generated, viewer);
    let cleanup = discard(scratch);

    let outcome = outcome?;
    cleanup?;
    Ok(outcome)
}

fn review(
    scratch: &NamedTempFile,
    generated: &str,
    viewer: &dyn ScratchViewer,
) -> Result<ApprovalOutcome> {
    let (tx, rx) = mpsc::channel();
    viewer.present(scratch.path(), tx)?;

    // First event wins; dropping the receiver detaches whatever fires later.
    let first = rx.recv().ok();
    drop(rx);

    match first {
        Some(ScratchEvent::Saved) => {
            let content = fs::read_to_string(scratch.path())
                .context("failed to read back scratch file")?;
            Ok(outcome_for(&content, generated))
        }
        Some(ScratchEvent::Closed) | None => Ok(ApprovalOutcome::Cancelled),
    }
}

fn outcome_for(saved_content: &str, generated: &str) -> ApprovalOutcome {
    let text = strip_comment_lines(saved_content);
    if text.is_empty() {
        ApprovalOutcome::Cancelled
    } else if text == generated.trim() {
        ApprovalOutcome::Accepted(text)
    } else {
        ApprovalOutcome::AcceptedEdited(text)
    }
}

fn discard(scratch: NamedTempFile) -> Result<()> {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => Ok(()),
        // The editor may have moved or deleted it already.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}

/// Drop `# ... #` lines and trim what is left.
pub fn strip_comment_lines(content: &str) -> String {
    let kept: String = content
        .split_inclusive('\n')
        .filter(|line| !is_comment_line(line))
        .collect();
    kept.trim().to_string()
}

fn is_comment_line(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 2 && line.starts_with(COMMENT_MARKER) && line.ends_with(COMMENT_MARKER)
}

const BACKDATE: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq)]
struct Snapshot {
    modified: Option<SystemTime>,
    content: Vec<u8>,
}

impl Snapshot {
    /// Push the file's mtime into the past so a save in the same second still
    /// registers on filesystems with one- or two-second timestamps (HFS+, FAT).
    fn backdate(path: &Path) -> Result<()> {
        let file = fs::File::options().write(true).open(path)?;
        file.set_modified(SystemTime::now() - BACKDATE)?;
        Ok(())
    }

    fn take(path: &Path) -> Result<Self> {
        let meta = fs::metadata(path)?;
        Ok(Snapshot {
            modified: meta.modified().ok(),
            content: fs::read(path)?,
        })
    }
}

/// Opens the scratch file in the user's editor and waits for it to exit.
pub struct EditorViewer {
    command: Vec<String>,
}

impl EditorViewer {
    /// `$VISUAL`, then `$EDITOR`, then `vi`. The value may carry arguments (`code --wait`).
    pub fn from_env() -> Self {
        let cmd = ["VISUAL", "EDITOR"]
            .iter()
            .filter_map(|name| env::var(name).ok())
            .find(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "vi".to_string());

        Self::with_command(cmd.split_whitespace())
    }

    pub fn with_command<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EditorViewer {
            command: command.into_iter().map(Into::into).collect(),
        }
    }
}

impl ScratchViewer for EditorViewer {
    fn present(&self, path: &Path, events: Sender<ScratchEvent>) -> Result<()> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("no editor configured; set $EDITOR"))?;

        if let Err(e) = Snapshot::backdate(path) {
            log::debug!("Could not backdate {}: {e}", path.display());
        }
        let before = Snapshot::take(path)?;

        log::debug!("Opening {} with {:?}", path.display(), self.command);
        let status = Command::new(program)
            .args(args)
            .arg(path)
            .status()
            .with_context(|| format!("failed to launch editor {program:?}"))?;

        if !status.success() {
            // Like git, a failing editor aborts.
            log::warn!("Editor exited with {status}; discarding the message");
        } else if Snapshot::take(path).is_ok_and(|after| after != before) {
            let _ = events.send(ScratchEvent::Saved);
        }

        let _ = events.send(ScratchEvent::Closed);
        Ok(())
    }
}
