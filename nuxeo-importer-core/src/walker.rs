//! Tree walker: lists one level of the local tree and reports what it finds.
//!
//! The walker never recurses by itself. A folder's children are only listed
//! once the scheduler has created the folder remotely and asks for it, which
//! is what keeps parents ahead of their children on the remote side.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use futures::FutureExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::metadata::{parse_filename, ParseError};

/// One local entry to materialize under a remote parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub local_path: PathBuf,
    pub remote_parent_path: String,
}

impl Task {
    pub fn basename(&self) -> String {
        basename_of(&self.local_path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum EntryKind {
    File,
    Folder,
}

impl EntryKind {
    pub fn of(metadata: &Metadata) -> Self {
        if metadata.is_dir() {
            EntryKind::Folder
        } else {
            EntryKind::File
        }
    }

    pub fn is_folder(self) -> bool {
        self == EntryKind::Folder
    }
}

/// An entry whose name does not follow the filename grammar. Never queued.
#[derive(Debug)]
pub struct Rejection {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub error: ParseError,
}

/// Messages sent from a walk to the scheduler.
#[derive(Debug)]
pub enum Discovery {
    Task(Task),
    Rejected(Rejection),
    /// Always the last message of a walk. `error` is set when the entry could
    /// not be inspected or listed.
    Finished {
        path: PathBuf,
        error: Option<io::Error>,
    },
}

/// Makes a relative root absolute against `cwd`.
pub fn resolve_local_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn basename_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Walks `local_path` one level deep. A file yields a single task; a directory
/// yields one task per immediate child, all targeting `remote_parent_path`.
/// Ends with [`Discovery::Finished`], also when the walk panics.
pub async fn walk(local_path: PathBuf, remote_parent_path: String, tx: UnboundedSender<Discovery>) {
    let listed = std::panic::AssertUnwindSafe(list(&local_path, &remote_parent_path, &tx))
        .catch_unwind()
        .await;

    let error = match listed {
        Ok(Ok(count)) => {
            debug!(path = %local_path.display(), remote = %remote_parent_path, count, "[WALK] Listed entries");
            None
        }
        Ok(Err(e)) => {
            error!(path = %local_path.display(), error = ?e, "[WALK] Failed to list entries");
            Some(e)
        }
        Err(_) => {
            error!(path = %local_path.display(), "[WALK] Walk panicked");
            Some(io::Error::other("walk panicked"))
        }
    };

    // A closed channel means the scheduler is gone; nothing left to report to.
    let _ = tx.send(Discovery::Finished {
        path: local_path,
        error,
    });
}

async fn list(
    local_path: &Path,
    remote_parent_path: &str,
    tx: &UnboundedSender<Discovery>,
) -> io::Result<usize> {
    let metadata = tokio::fs::metadata(local_path).await?;
    if !metadata.is_dir() {
        discover(local_path.to_path_buf(), EntryKind::of(&metadata), remote_parent_path, tx);
        return Ok(1);
    }

    let mut entries = tokio::fs::read_dir(local_path).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // Follows symlinks. A dangling one is queued as a file and fails at execution.
        let kind = match tokio::fs::metadata(&path).await {
            Ok(metadata) => EntryKind::of(&metadata),
            Err(e) => {
                warn!(path = %path.display(), error = ?e, "[WALK] Cannot inspect entry, assuming file");
                EntryKind::File
            }
        };
        discover(path, kind, remote_parent_path, tx);
        count += 1;
    }
    Ok(count)
}

fn discover(path: PathBuf, kind: EntryKind, remote_parent_path: &str, tx: &UnboundedSender<Discovery>) {
    let discovery = match parse_filename(&basename_of(&path), kind.is_folder()) {
        Ok(_) => {
            debug!(path = %path.display(), remote = %remote_parent_path, "[WALK] Discovered entry");
            Discovery::Task(Task {
                local_path: path,
                remote_parent_path: remote_parent_path.to_string(),
            })
        }
        Err(error) => {
            warn!(path = %path.display(), error = %error, "[WALK] Wrong filename format, entry skipped");
            Discovery::Rejected(Rejection { path, kind, error })
        }
    };
    let _ = tx.send(discovery);
}
