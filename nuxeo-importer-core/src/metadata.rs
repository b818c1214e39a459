//! Filename grammar: derives the remote document type and lifecycle metadata
//! from a local basename.
//!
//! Format: `Type_source_lifecycleState_validDate_creator_filename.ext`, split on
//! `_`. Two degenerate forms are accepted as well:
//! - `filename.ext`: plain `File` (or `Folder` for a directory)
//! - `Type_filename.ext`: explicit type, no lifecycle metadata
//!
//! Any other segment count below six is rejected. Segments past the sixth are
//! ignored, so an underscore inside the title truncates it.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const TITLE: &str = "dc:title";
pub const SOURCE: &str = "dc:source";
pub const VALID: &str = "dc:valid";
pub const CREATOR: &str = "dc:creator";
pub const NOTE_CONTENT: &str = "note:note";

/// Document type whose body is stored inline in [`NOTE_CONTENT`] instead of
/// as a binary attachment.
pub const NOTE_TYPE: &str = "Note";

/// Lifecycle state that additionally grants Read to the configured principal.
pub const OBSOLETE_STATE: &str = "obsolete";

const SEPARATOR: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed filename: {basename} ({segments} segments, expected 1, 2 or at least 6)")]
    Malformed { basename: String, segments: usize },
}

/// Everything the pipeline needs to create one remote document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub doc_type: String,
    pub filename: String,
    pub properties: BTreeMap<String, String>,
    pub lifecycle_state: Option<String>,
    pub transition: Option<String>,
}

impl DocumentMetadata {
    pub fn is_note(&self) -> bool {
        self.doc_type == NOTE_TYPE
    }

    pub fn is_obsolete(&self) -> bool {
        self.lifecycle_state.as_deref() == Some(OBSOLETE_STATE)
    }
}

/// Maps a lifecycle state token to the transition that reaches it.
pub fn transition_for(state: &str) -> Option<&'static str> {
    match state {
        "approved" => Some("approve"),
        "obsolete" => Some("obsolete"),
        "deleted" => Some("delete"),
        _ => None,
    }
}

/// Parses a basename into document metadata. Pure: no filesystem access.
pub fn parse_filename(basename: &str, is_directory: bool) -> Result<DocumentMetadata, ParseError> {
    let segments: Vec<&str> = basename.split(SEPARATOR).collect();
    let mut properties = BTreeMap::new();

    match segments.as_slice() {
        [name] => {
            properties.insert(TITLE.to_string(), name.to_string());
            Ok(DocumentMetadata {
                doc_type: if is_directory { "Folder" } else { "File" }.to_string(),
                filename: name.to_string(),
                properties,
                lifecycle_state: None,
                transition: None,
            })
        }
        [doc_type, name] => {
            properties.insert(TITLE.to_string(), name.to_string());
            Ok(DocumentMetadata {
                doc_type: doc_type.to_string(),
                filename: name.to_string(),
                properties,
                lifecycle_state: None,
                transition: None,
            })
        }
        [doc_type, source, state, valid, creator, name, ..] => {
            for (key, value) in [(SOURCE, source), (VALID, valid), (CREATOR, creator)] {
                if !value.is_empty() {
                    properties.insert(key.to_string(), value.to_string());
                }
            }
            properties.insert(TITLE.to_string(), name.to_string());
            Ok(DocumentMetadata {
                doc_type: doc_type.to_string(),
                filename: name.to_string(),
                properties,
                lifecycle_state: Some(state.to_string()),
                transition: transition_for(state).map(str::to_string),
            })
        }
        _ => Err(ParseError::Malformed {
            basename: basename.to_string(),
            segments: segments.len(),
        }),
    }
}
