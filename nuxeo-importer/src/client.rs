#![doc = "Nuxeo REST/Automation client: the network-facing implementation of the core `Repository` trait."]
//
//! # Nuxeo client (CLI <-> Core)
//!
//! This module wires the [`Repository`] trait of `nuxeo-importer-core` to a real Nuxeo
//! server over HTTP, using `reqwest` with basic authentication.
//!
//! | Operation            | Endpoint                                                     |
//! |----------------------|--------------------------------------------------------------|
//! | login check          | `POST /api/v1/automation/login`                              |
//! | create document      | `POST /api/v1/path/{parent}`                                 |
//! | stage blob           | `POST /api/v1/upload`, then `POST /api/v1/upload/{batch}/0`  |
//! | attach blob          | `POST /api/v1/upload/{batch}/0/execute/Blob.Attach`          |
//! | lifecycle transition | `POST /api/v1/automation/Document.FollowLifecycleTransition` |
//! | Read ACE             | `POST /api/v1/automation/Document.SetACE`                    |
//!
//! Non-2xx responses become a [`RemoteError`], carrying the message of the Nuxeo
//! exception entity when the server sent one.

use async_trait::async_trait;
use nuxeo_importer_core::config::ConnectionConfig;
use nuxeo_importer_core::contract::{
    NewDocument, RemoteDocument, Repository, RepositoryError, StagedBlob,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;

const OCTET_STREAM: &str = "application/octet-stream";
const BLOB_XPATH: &str = "file:content";

/// A non-success HTTP answer from the server.
#[derive(Debug)]
pub struct RemoteError {
    pub status: u16,
    pub message: String,
    pub body: String,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}: {}", self.status, self.message)
    }
}

impl std::error::Error for RemoteError {}

#[derive(Deserialize)]
struct ExceptionEntity {
    message: Option<String>,
}

#[derive(Deserialize)]
struct BatchEntity {
    #[serde(rename = "batchId")]
    batch_id: String,
}

#[derive(Deserialize)]
struct LoginEntity {
    username: String,
}

pub struct NuxeoClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
}

impl NuxeoClient {
    pub fn new(config: &ConnectionConfig) -> Result<Self, RepositoryError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            tracing::error!(error = ?e, "Failed to build HTTP client");
            e
        })?;
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            tracing::error!(error = ?e, base_url = %config.base_url, "Invalid base_url");
            format!("invalid base_url {:?}: {e}", config.base_url)
        })?;
        if base_url.cannot_be_a_base() {
            return Err(format!("base_url {:?} cannot be used as a base URL", config.base_url).into());
        }

        tracing::info!(
            base_url = %base_url,
            username = %config.username,
            timeout_ms = ?config.timeout_ms,
            "Initialized NuxeoClient"
        );
        Ok(NuxeoClient {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// `{base}/api/v1/{segments..}`, each segment percent-encoded.
    pub fn api_url<'a, I>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["api", "v1"]).extend(segments);
        }
        url
    }

    /// URL addressing a repository path, e.g. `/default-domain/workspaces`.
    pub fn path_url(&self, repository_path: &str) -> Url {
        let mut segments: Vec<&str> = repository_path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.is_empty() {
            // The repository root is addressed with a trailing slash.
            segments.push("");
        }
        self.api_url(std::iter::once("path").chain(segments))
    }

    fn post(&self, url: Url) -> RequestBuilder {
        self.http
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
    }

    /// Checks the credentials against the server and returns the logged-in user.
    pub async fn login(&self) -> Result<String, RepositoryError> {
        let url = self.api_url(["automation", "login"]);
        tracing::info!(url = %url, "Checking repository credentials");
        let response = send(self.post(url)).await?;
        let login: LoginEntity = response.json().await?;
        tracing::info!(username = %login.username, "Logged in to repository");
        Ok(login.username)
    }

    async fn automation(
        &self,
        operation: &str,
        document: &RemoteDocument,
        params: serde_json::Value,
    ) -> Result<RemoteDocument, RepositoryError> {
        let url = self.api_url(["automation", operation]);
        let body = json!({
            "input": format!("doc:{}", document.uid),
            "params": params,
        });
        let response = send(self.post(url).json(&body)).await.map_err(|e| {
            tracing::error!(error = %e, operation, path = %document.path, "Automation operation failed");
            e
        })?;
        Ok(response.json::<RemoteDocument>().await?)
    }
}

/// Sends the request and turns any non-2xx status into a [`RemoteError`].
async fn send(request: RequestBuilder) -> Result<Response, RepositoryError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ExceptionEntity>(&body)
        .ok()
        .and_then(|entity| entity.message)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(Box::new(RemoteError {
        status: status.as_u16(),
        message,
        body,
    }))
}

/// Unreserved URL characters stay readable in the `X-File-Name` header.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_header_value(value: &str) -> String {
    utf8_percent_encode(value, FILE_NAME).to_string()
}

#[async_trait]
impl Repository for NuxeoClient {
    async fn create_document(
        &self,
        parent_path: &str,
        doc: NewDocument,
    ) -> Result<RemoteDocument, RepositoryError> {
        let url = self.path_url(parent_path);
        tracing::debug!(url = %url, doc_type = %doc.doc_type, name = %doc.name, "Creating document");
        let body = json!({
            "entity-type": "document",
            "type": doc.doc_type,
            "name": doc.name,
            "properties": doc.properties,
        });
        let response = send(self.post(url).json(&body)).await.map_err(|e| {
            tracing::error!(error = %e, parent = parent_path, name = %doc.name, "Failed to create document");
            e
        })?;
        let created: RemoteDocument = response.json().await?;
        tracing::debug!(uid = %created.uid, path = %created.path, "Created document");
        Ok(created)
    }

    async fn upload_blob(&self, file: &Path) -> Result<StagedBlob, RepositoryError> {
        let content = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let batch: BatchEntity = send(self.post(self.api_url(["upload"])))
            .await?
            .json()
            .await?;

        let url = self.api_url(["upload", batch.batch_id.as_str(), "0"]);
        tracing::debug!(url = %url, file = %file.display(), size = content.len(), "Staging blob");
        send(
            self.post(url)
                .header(CONTENT_TYPE, OCTET_STREAM)
                .header("X-File-Name", encode_header_value(&file_name))
                .header("X-File-Type", OCTET_STREAM)
                .header("X-File-Size", content.len().to_string())
                .body(content),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, file = %file.display(), "Error while uploading file");
            e
        })?;

        Ok(StagedBlob {
            batch_id: batch.batch_id,
            file_index: 0,
            file_name,
        })
    }

    async fn attach_blob(
        &self,
        document: &RemoteDocument,
        blob: &StagedBlob,
    ) -> Result<(), RepositoryError> {
        let index = blob.file_index.to_string();
        let url = self.api_url([
            "upload",
            blob.batch_id.as_str(),
            index.as_str(),
            "execute",
            "Blob.Attach",
        ]);
        let body = json!({
            "params": {
                "document": document.uid,
                "save": true,
                "xpath": BLOB_XPATH,
            }
        });
        send(self.post(url).json(&body)).await.map_err(|e| {
            tracing::error!(error = %e, path = %document.path, "Error while attaching blob");
            e
        })?;
        tracing::debug!(path = %document.path, file = %blob.file_name, "Attached blob");
        Ok(())
    }

    async fn follow_transition(
        &self,
        document: &RemoteDocument,
        transition: &str,
    ) -> Result<RemoteDocument, RepositoryError> {
        self.automation(
            "Document.FollowLifecycleTransition",
            document,
            json!({ "value": transition }),
        )
        .await
    }

    async fn set_read_ace(
        &self,
        document: &RemoteDocument,
        principal: &str,
    ) -> Result<RemoteDocument, RepositoryError> {
        self.automation(
            "Document.SetACE",
            document,
            json!({ "user": principal, "permission": "Read", "grant": true }),
        )
        .await
    }
}
