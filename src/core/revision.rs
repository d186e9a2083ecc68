//! core::revision
//!
//! Revision bundles: the objects needed to realize one replicated ref update.
//!
//! # Shapes
//!
//! A [`RevisionBundle`] is one of:
//! - **Commit-bearing**: a commit, its root tree, and any blobs. The commit's
//!   tree and parent ids are parsed from the commit object itself.
//! - **Content-only**: one or more blobs and nothing else (e.g. a ref that
//!   points directly at a blob).
//!
//! The constructors enforce these shapes, so the insertion engine and the
//! graph validator never see a half-formed bundle.
//!
//! # Example
//!
//! ```
//! use revsync::core::revision::{ObjectKind, RawObject, RevisionBundle};
//!
//! let blob = RawObject::hashed(ObjectKind::Blob, b"hello\n".to_vec());
//! let bundle = RevisionBundle::content(vec![blob]).unwrap();
//! assert!(!bundle.is_commit());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::types::{ObjectId, RefName};

/// Errors from building or parsing revision bundles.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RevisionError {
    /// The commit object could not be parsed.
    #[error("malformed commit {id}: {message}")]
    MalformedCommit {
        /// Id of the offending commit
        id: ObjectId,
        /// What was wrong
        message: String,
    },

    /// An object of the wrong kind was supplied for a bundle slot.
    #[error("object {id} is a {actual}, expected a {expected}")]
    WrongKind {
        /// Id of the offending object
        id: ObjectId,
        /// Kind the slot requires
        expected: ObjectKind,
        /// Kind that was supplied
        actual: ObjectKind,
    },

    /// The supplied tree is not the tree the commit declares.
    #[error("commit declares tree {declared} but bundle carries tree {supplied}")]
    TreeMismatch {
        /// Tree id from the commit header
        declared: ObjectId,
        /// Id of the tree object in the bundle
        supplied: ObjectId,
    },

    /// A content-only bundle without any blobs.
    #[error("revision bundle carries no objects")]
    EmptyBundle,

    /// Unknown numeric object type code.
    #[error("unsupported object type code {0}")]
    UnknownTypeCode(u8),
}

/// Kind of an immutable git object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
}

impl ObjectKind {
    /// Object type name as it appears in the loose object header.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
        }
    }

    /// Numeric type code used in pack files and on the wire.
    pub fn type_code(&self) -> u8 {
        match self {
            ObjectKind::Commit => 1,
            ObjectKind::Tree => 2,
            ObjectKind::Blob => 3,
        }
    }

    /// Decode a numeric type code. Tags (4) are not replicated by bundles.
    pub fn from_type_code(code: u8) -> Result<Self, RevisionError> {
        match code {
            1 => Ok(ObjectKind::Commit),
            2 => Ok(ObjectKind::Tree),
            3 => Ok(ObjectKind::Blob),
            other => Err(RevisionError::UnknownTypeCode(other)),
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hash function of a repository's object format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashKind {
    #[default]
    Sha1,
    Sha256,
}

impl HashKind {
    /// Compute the content address of an object: the hash of
    /// `"<kind> <len>\0<content>"`.
    pub fn object_id(&self, kind: ObjectKind, content: &[u8]) -> ObjectId {
        let header = format!("{} {}\0", kind.as_str(), content.len());
        match self {
            HashKind::Sha1 => {
                let mut hasher = Sha1::new();
                hasher.update(header.as_bytes());
                hasher.update(content);
                ObjectId::from_digest(&hasher.finalize())
            }
            HashKind::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(header.as_bytes());
                hasher.update(content);
                ObjectId::from_digest(&hasher.finalize())
            }
        }
    }
}

/// A raw object as received from the replication source.
///
/// `content` is the object body without the loose-object header.
#[derive(Clone, PartialEq, Eq)]
pub struct RawObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub content: Vec<u8>,
}

impl RawObject {
    /// Wrap received bytes under the id the source declared for them.
    pub fn new(id: ObjectId, kind: ObjectKind, content: Vec<u8>) -> Self {
        Self { id, kind, content }
    }

    /// Build an object whose id is computed from its content (SHA-1).
    pub fn hashed(kind: ObjectKind, content: Vec<u8>) -> Self {
        let id = HashKind::Sha1.object_id(kind, &content);
        Self { id, kind, content }
    }
}

impl std::fmt::Debug for RawObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("len", &self.content.len())
            .finish()
    }
}

/// The graph-relevant header of a commit: its tree and parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitObject {
    pub id: ObjectId,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
}

impl CommitObject {
    /// Parse the header of a raw commit body.
    ///
    /// Only the `tree` and `parent` lines are read; the header ends at the
    /// first non-reference line or the blank line before the message.
    ///
    /// # Example
    ///
    /// ```
    /// use revsync::core::revision::CommitObject;
    /// use revsync::core::types::ObjectId;
    ///
    /// let id = ObjectId::new("1111111111111111111111111111111111111111").unwrap();
    /// let body = b"tree 4b825dc642cb6eb9a060e54bf8d69288fbee4904\n\
    /// parent 2222222222222222222222222222222222222222\n\
    /// author A <a@example.com> 0 +0000\n\
    /// committer A <a@example.com> 0 +0000\n\nmsg\n";
    ///
    /// let commit = CommitObject::parse(id, body).unwrap();
    /// assert_eq!(commit.parents.len(), 1);
    /// ```
    pub fn parse(id: ObjectId, content: &[u8]) -> Result<Self, RevisionError> {
        let malformed = |message: String| RevisionError::MalformedCommit {
            id: id.clone(),
            message,
        };

        let mut tree = None;
        let mut parents = Vec::new();

        for line in content.split(|b| *b == b'\n') {
            if line.is_empty() {
                break;
            }
            if let Some(hex) = line.strip_prefix(b"tree ") {
                if tree.is_some() {
                    return Err(malformed("multiple tree lines".into()));
                }
                tree = Some(parse_header_id(hex).map_err(malformed)?);
            } else if let Some(hex) = line.strip_prefix(b"parent ") {
                if tree.is_none() {
                    return Err(malformed("parent line before tree line".into()));
                }
                parents.push(parse_header_id(hex).map_err(malformed)?);
            } else {
                break;
            }
        }

        let tree = tree.ok_or_else(|| malformed("missing tree line".into()))?;
        Ok(Self { id, tree, parents })
    }
}

fn parse_header_id(raw: &[u8]) -> Result<ObjectId, String> {
    let text = std::str::from_utf8(raw).map_err(|_| "non-utf8 object id".to_string())?;
    ObjectId::new(text.trim_end_matches('\r')).map_err(|e| e.to_string())
}

/// The objects needed to realize one ref update.
#[derive(Debug, Clone)]
pub struct RevisionBundle {
    commit: Option<(RawObject, CommitObject)>,
    tree: Option<RawObject>,
    blobs: Vec<RawObject>,
}

impl RevisionBundle {
    /// Build a commit-bearing bundle.
    ///
    /// The commit header is parsed here; the supplied tree must be the one
    /// the commit declares.
    pub fn commit(
        commit: RawObject,
        tree: RawObject,
        blobs: Vec<RawObject>,
    ) -> Result<Self, RevisionError> {
        expect_kind(&commit, ObjectKind::Commit)?;
        expect_kind(&tree, ObjectKind::Tree)?;
        for blob in &blobs {
            expect_kind(blob, ObjectKind::Blob)?;
        }

        let parsed = CommitObject::parse(commit.id.clone(), &commit.content)?;
        if parsed.tree != tree.id {
            return Err(RevisionError::TreeMismatch {
                declared: parsed.tree,
                supplied: tree.id,
            });
        }

        Ok(Self {
            commit: Some((commit, parsed)),
            tree: Some(tree),
            blobs,
        })
    }

    /// Build a content-only bundle from one or more blobs.
    pub fn content(blobs: Vec<RawObject>) -> Result<Self, RevisionError> {
        if blobs.is_empty() {
            return Err(RevisionError::EmptyBundle);
        }
        for blob in &blobs {
            expect_kind(blob, ObjectKind::Blob)?;
        }
        Ok(Self {
            commit: None,
            tree: None,
            blobs,
        })
    }

    /// Whether this bundle introduces a commit (graph-linked update).
    pub fn is_commit(&self) -> bool {
        self.commit.is_some()
    }

    /// The parsed commit header, for commit-bearing bundles.
    pub fn commit_object(&self) -> Option<&CommitObject> {
        self.commit.as_ref().map(|(_, parsed)| parsed)
    }

    /// The raw commit object, for commit-bearing bundles.
    pub fn commit_raw(&self) -> Option<&RawObject> {
        self.commit.as_ref().map(|(raw, _)| raw)
    }

    /// The root tree object, for commit-bearing bundles.
    pub fn tree(&self) -> Option<&RawObject> {
        self.tree.as_ref()
    }

    /// The blobs carried by this bundle.
    pub fn blobs(&self) -> &[RawObject] {
        &self.blobs
    }

    /// Ids recorded in the idempotency cache once this bundle is applied:
    /// the commit id, or every blob id for content-only bundles.
    pub fn applied_ids(&self) -> Vec<ObjectId> {
        match &self.commit {
            Some((raw, _)) => vec![raw.id.clone()],
            None => self.blobs.iter().map(|b| b.id.clone()).collect(),
        }
    }

    /// Consume the bundle, yielding its objects in dependency order:
    /// blobs, then the tree, then the commit.
    pub fn into_objects(self) -> (Vec<RawObject>, Option<CommitObject>) {
        let mut objects = self.blobs;
        objects.extend(self.tree);
        let parsed = match self.commit {
            Some((raw, parsed)) => {
                objects.push(raw);
                Some(parsed)
            }
            None => None,
        };
        (objects, parsed)
    }
}

fn expect_kind(object: &RawObject, expected: ObjectKind) -> Result<(), RevisionError> {
    if object.kind != expected {
        return Err(RevisionError::WrongKind {
            id: object.id.clone(),
            expected,
            actual: object.kind,
        });
    }
    Ok(())
}

/// A request to move one ref to the target carried by a bundle.
#[derive(Debug, Clone)]
pub struct RefUpdateRequest {
    pub ref_name: RefName,
    pub bundle: RevisionBundle,
    /// Label of the replication source the objects came from.
    pub source: Option<String>,
    /// When the source emitted the update; recorded in the idempotency cache.
    pub event_created_on: Option<DateTime<Utc>>,
}

impl RefUpdateRequest {
    /// Create a request without provenance.
    pub fn new(ref_name: RefName, bundle: RevisionBundle) -> Self {
        Self {
            ref_name,
            bundle,
            source: None,
            event_created_on: None,
        }
    }

    /// Attach the label of the replication source.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the source event timestamp.
    pub fn with_event_created_on(mut self, at: DateTime<Utc>) -> Self {
        self.event_created_on = Some(at);
        self
    }
}
