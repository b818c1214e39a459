//! # contract: the remote repository as seen by the import pipeline
//!
//! This module defines a single trait ([`Repository`]) and the plain data types
//! it exchanges. The pipeline only ever talks to the remote side through it;
//! the wire protocol lives in the implementor (the CLI crate ships a Nuxeo
//! REST/Automation client).
//!
//! ## Error Handling
//! - All methods return [`RepositoryError`], a boxed error, so implementors can
//!   surface transport, HTTP status and decoding failures without a shared enum.
//! - The pipeline records `to_string()` as the failure reason and the `Debug`
//!   rendering as the verbose detail.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests get a `MockRepository` with
//!   the `test-export-mocks` feature (on by default).

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use mockall::automock;

/// Boxed error returned by every remote call.
pub type RepositoryError = Box<dyn std::error::Error + Send + Sync>;

/// The minimal data needed to create a document under a parent path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    /// Remote document type, e.g. `File`, `Folder`, `Note`.
    pub doc_type: String,
    /// Name of the document in its parent (last path segment).
    pub name: String,
    /// Schema-prefixed properties, e.g. `dc:title`.
    pub properties: BTreeMap<String, String>,
}

/// Handle of a document that exists remotely.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteDocument {
    pub uid: String,
    pub path: String,
    /// Current lifecycle state as reported by the server, when known.
    #[serde(default)]
    pub state: Option<String>,
}

/// A blob sitting in the remote staging area, not yet attached to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedBlob {
    pub batch_id: String,
    pub file_index: u32,
    pub file_name: String,
}

/// Remote repository operations consumed by the pipeline.
///
/// Blob upload is deliberately split in two calls: [`Repository::upload_blob`]
/// stages the bytes, [`Repository::attach_blob`] binds them to a document. The
/// two are not atomic; a failed attach leaves a document without content.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Create a document under `parent_path`.
    async fn create_document(
        &self,
        parent_path: &str,
        doc: NewDocument,
    ) -> Result<RemoteDocument, RepositoryError>;

    /// Stage the contents of a local file for a later attach.
    async fn upload_blob(&self, file: &Path) -> Result<StagedBlob, RepositoryError>;

    /// Attach a staged blob as the main content of `document`.
    async fn attach_blob(
        &self,
        document: &RemoteDocument,
        blob: &StagedBlob,
    ) -> Result<(), RepositoryError>;

    /// Follow a named lifecycle transition on `document`.
    async fn follow_transition(
        &self,
        document: &RemoteDocument,
        transition: &str,
    ) -> Result<RemoteDocument, RepositoryError>;

    /// Grant Read on `document` to `principal`.
    async fn set_read_ace(
        &self,
        document: &RemoteDocument,
        principal: &str,
    ) -> Result<RemoteDocument, RepositoryError>;
}
