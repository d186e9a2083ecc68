//! core::payload
//!
//! JSON wire form of replicated revisions.
//!
//! A payload is a list of revisions, one per ref:
//!
//! ```json
//! [
//!   {
//!     "label": "origin-site",
//!     "ref_name": "refs/heads/main",
//!     "event_created_on": "2024-05-01T12:00:00Z",
//!     "revision_data": {
//!       "commit_object": { "sha1": "…", "type": 1, "content": "74726565…" },
//!       "tree_object":   { "sha1": "…", "type": 2, "content": "" },
//!       "blobs":         [ { "sha1": "…", "type": 3, "content": "68690a" } ]
//!     }
//!   }
//! ]
//! ```
//!
//! Object `type` uses git's numeric codes (1 commit, 2 tree, 3 blob) and
//! `content` is the hex-encoded object body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::revision::{ObjectKind, RawObject, RefUpdateRequest, RevisionBundle, RevisionError};
use super::types::{ObjectId, RefName, TypeError};

/// Errors from decoding a payload.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid payload json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidValue(#[from] TypeError),

    #[error("object {id} has non-hex content: {message}")]
    InvalidContent { id: String, message: String },

    #[error("revision for {0} carries a commit without a tree")]
    MissingTree(String),

    #[error("revision for {0} carries a tree without a commit")]
    TreeWithoutCommit(String),

    #[error(transparent)]
    Revision(#[from] RevisionError),
}

/// One replicated object on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInput {
    pub sha1: String,
    #[serde(rename = "type")]
    pub type_code: u8,
    pub content: String,
}

impl ObjectInput {
    /// Encode a raw object for the wire.
    pub fn from_raw(object: &RawObject) -> Self {
        Self {
            sha1: object.id.to_string(),
            type_code: object.kind.type_code(),
            content: hex::encode(&object.content),
        }
    }

    /// Decode into a raw object.
    pub fn into_raw(self) -> Result<RawObject, PayloadError> {
        let id = ObjectId::new(&self.sha1)?;
        let kind = ObjectKind::from_type_code(self.type_code)?;
        let content = hex::decode(&self.content).map_err(|e| PayloadError::InvalidContent {
            id: self.sha1.clone(),
            message: e.to_string(),
        })?;
        Ok(RawObject::new(id, kind, content))
    }
}

/// Objects of one revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_object: Option<ObjectInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_object: Option<ObjectInput>,
    #[serde(default)]
    pub blobs: Vec<ObjectInput>,
}

/// One ref update on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionInput {
    /// Label of the replication source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub ref_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_created_on: Option<DateTime<Utc>>,
    pub revision_data: RevisionData,
}

impl RevisionInput {
    /// Encode a request for the wire.
    pub fn from_request(request: &RefUpdateRequest) -> Self {
        let bundle = &request.bundle;
        Self {
            label: request.source.clone(),
            ref_name: request.ref_name.to_string(),
            event_created_on: request.event_created_on,
            revision_data: RevisionData {
                commit_object: bundle.commit_raw().map(ObjectInput::from_raw),
                tree_object: bundle.tree().map(ObjectInput::from_raw),
                blobs: bundle.blobs().iter().map(ObjectInput::from_raw).collect(),
            },
        }
    }

    /// Decode into a domain request.
    pub fn into_request(self) -> Result<RefUpdateRequest, PayloadError> {
        let ref_name = RefName::new(&self.ref_name)?;
        let data = self.revision_data;

        let blobs = data
            .blobs
            .into_iter()
            .map(ObjectInput::into_raw)
            .collect::<Result<Vec<_>, _>>()?;

        let bundle = match (data.commit_object, data.tree_object) {
            (Some(commit), Some(tree)) => {
                RevisionBundle::commit(commit.into_raw()?, tree.into_raw()?, blobs)?
            }
            (Some(_), None) => return Err(PayloadError::MissingTree(self.ref_name)),
            (None, Some(_)) => return Err(PayloadError::TreeWithoutCommit(self.ref_name)),
            (None, None) => RevisionBundle::content(blobs)?,
        };

        let mut request = RefUpdateRequest::new(ref_name, bundle);
        request.source = self.label;
        request.event_created_on = self.event_created_on;
        Ok(request)
    }
}

/// Parse a JSON payload into ref update requests, preserving order.
pub fn parse_requests(json: &str) -> Result<Vec<RefUpdateRequest>, PayloadError> {
    let inputs: Vec<RevisionInput> = serde_json::from_str(json)?;
    inputs.into_iter().map(RevisionInput::into_request).collect()
}
