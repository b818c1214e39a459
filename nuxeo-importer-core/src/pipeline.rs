//! Per-task pipeline: the ordered chain of remote calls that materializes one
//! local entry.
//!
//! create document → (files only) stage blob → attach blob → follow transition
//! → grant Read ACE. Each step runs only when the previous one succeeded; the
//! first failure ends the task with a [`PipelineError`] naming the step.

use thiserror::Error;
use tracing::{debug, warn};

use crate::contract::{NewDocument, RemoteDocument, Repository, RepositoryError};
use crate::metadata::{parse_filename, DocumentMetadata, ParseError, NOTE_CONTENT};
use crate::walker::{EntryKind, Task};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("cannot inspect local entry: {0}")]
    Inspect(std::io::Error),
    #[error("cannot read note contents: {0}")]
    ReadNote(std::io::Error),
    #[error("document creation failed: {0}")]
    Create(RepositoryError),
    #[error("blob upload failed: {0}")]
    Upload(RepositoryError),
    #[error("blob attach failed: {0}")]
    Attach(RepositoryError),
    #[error("lifecycle transition '{transition}' failed: {error}")]
    Transition {
        transition: String,
        error: RepositoryError,
    },
    #[error("setting Read ACE for '{principal}' failed: {error}")]
    Ace {
        principal: String,
        error: RepositoryError,
    },
    #[error("pipeline panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Short name of the step that failed, used in the report.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Parse(_) => "parse",
            PipelineError::Inspect(_) => "inspect",
            PipelineError::ReadNote(_) => "read",
            PipelineError::Create(_) => "create",
            PipelineError::Upload(_) => "upload",
            PipelineError::Attach(_) => "attach",
            PipelineError::Transition { .. } => "transition",
            PipelineError::Ace { .. } => "ace",
            PipelineError::Panicked(_) => "panic",
        }
    }

    /// True when the failure happened after the remote document was created.
    pub fn document_exists(&self) -> bool {
        matches!(
            self,
            PipelineError::Upload(_)
                | PipelineError::Attach(_)
                | PipelineError::Transition { .. }
                | PipelineError::Ace { .. }
        )
    }
}

/// Result of running the pipeline for one task.
#[derive(Debug)]
pub struct TaskOutcome {
    pub task: Task,
    /// Kind observed at execution time, not at discovery.
    pub kind: EntryKind,
    pub result: Result<RemoteDocument, PipelineError>,
}

/// Runs the full pipeline for `task`. Never fails as a whole: every error is
/// captured in the returned outcome.
pub async fn execute<R>(repository: &R, task: Task, ace_principal: &str) -> TaskOutcome
where
    R: Repository + ?Sized,
{
    debug!(path = %task.local_path.display(), "[PIPELINE] Started task");

    let kind = match tokio::fs::metadata(&task.local_path).await {
        Ok(metadata) => EntryKind::of(&metadata),
        Err(e) => {
            warn!(path = %task.local_path.display(), error = ?e, "[PIPELINE] Entry vanished before execution");
            return TaskOutcome {
                task,
                kind: EntryKind::File,
                result: Err(PipelineError::Inspect(e)),
            };
        }
    };

    let result = run_steps(repository, &task, kind, ace_principal).await;
    match &result {
        Ok(document) => {
            debug!(path = %task.local_path.display(), remote = %document.path, "[PIPELINE] Finished task")
        }
        Err(e) => {
            warn!(path = %task.local_path.display(), stage = e.stage(), error = %e, "[PIPELINE] Task in error")
        }
    }

    TaskOutcome { task, kind, result }
}

async fn run_steps<R>(
    repository: &R,
    task: &Task,
    kind: EntryKind,
    ace_principal: &str,
) -> Result<RemoteDocument, PipelineError>
where
    R: Repository + ?Sized,
{
    let mut metadata = parse_filename(&task.basename(), kind.is_folder())?;

    let is_note_file = kind == EntryKind::File && metadata.is_note();
    if is_note_file {
        let bytes = tokio::fs::read(&task.local_path)
            .await
            .map_err(PipelineError::ReadNote)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        metadata.properties.insert(NOTE_CONTENT.to_string(), content);
    }

    let document = create(repository, task, &metadata).await?;

    if kind == EntryKind::File && !is_note_file {
        attach_content(repository, task, &document).await?;
    }

    let document = follow_transition(repository, document, &metadata).await?;
    set_ace(repository, document, &metadata, ace_principal).await
}

async fn create<R>(
    repository: &R,
    task: &Task,
    metadata: &DocumentMetadata,
) -> Result<RemoteDocument, PipelineError>
where
    R: Repository + ?Sized,
{
    debug!(
        path = %task.local_path.display(),
        parent = %task.remote_parent_path,
        doc_type = %metadata.doc_type,
        "[PIPELINE] Creating document"
    );
    let request = NewDocument {
        doc_type: metadata.doc_type.clone(),
        name: metadata.filename.clone(),
        properties: metadata.properties.clone(),
    };
    let document = repository
        .create_document(&task.remote_parent_path, request)
        .await
        .map_err(PipelineError::Create)?;
    debug!(remote = %document.path, uid = %document.uid, "[PIPELINE] Created remote document");
    Ok(document)
}

async fn attach_content<R>(
    repository: &R,
    task: &Task,
    document: &RemoteDocument,
) -> Result<(), PipelineError>
where
    R: Repository + ?Sized,
{
    debug!(path = %task.local_path.display(), "[PIPELINE] Uploading blob");
    let staged = repository
        .upload_blob(&task.local_path)
        .await
        .map_err(PipelineError::Upload)?;

    repository
        .attach_blob(document, &staged)
        .await
        .map_err(PipelineError::Attach)?;
    debug!(remote = %document.path, batch_id = %staged.batch_id, "[PIPELINE] Attached blob");
    Ok(())
}

async fn follow_transition<R>(
    repository: &R,
    document: RemoteDocument,
    metadata: &DocumentMetadata,
) -> Result<RemoteDocument, PipelineError>
where
    R: Repository + ?Sized,
{
    let Some(transition) = metadata.transition.as_deref() else {
        debug!(remote = %document.path, "[PIPELINE] Not following transition");
        return Ok(document);
    };

    debug!(remote = %document.path, transition, "[PIPELINE] Following transition");
    let updated = repository
        .follow_transition(&document, transition)
        .await
        .map_err(|error| PipelineError::Transition {
            transition: transition.to_string(),
            error,
        })?;
    debug!(remote = %updated.path, transition, state = ?updated.state, "[PIPELINE] Followed transition");
    Ok(updated)
}

async fn set_ace<R>(
    repository: &R,
    document: RemoteDocument,
    metadata: &DocumentMetadata,
    principal: &str,
) -> Result<RemoteDocument, PipelineError>
where
    R: Repository + ?Sized,
{
    if !metadata.is_obsolete() {
        debug!(remote = %document.path, "[PIPELINE] Not setting ACE");
        return Ok(document);
    }

    debug!(remote = %document.path, principal, "[PIPELINE] Setting Read ACE");
    let updated = repository
        .set_read_ace(&document, principal)
        .await
        .map_err(|error| PipelineError::Ace {
            principal: principal.to_string(),
            error,
        })?;
    debug!(remote = %updated.path, principal, "[PIPELINE] Set Read ACE");
    Ok(updated)
}
