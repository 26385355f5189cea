//! The single error type returned by every `minigit-core` operation.
//!
//! [`Error`] uses rich enum variants so callers can match on specific
//! failure modes (missing object, ambiguous short id, merge conflict, ...)
//! without parsing error messages. The variant grouping mirrors the layers
//! in spec.md §7.

use std::path::PathBuf;

use thiserror::Error as ThisError;

use crate::types::ObjectId;

/// Errors returned by `minigit-core` operations.
#[derive(Debug, ThisError)]
pub enum Error {
    // -- Object store (L1) --
    /// A requested object was not found in the object database.
    #[error("object not found: {id}")]
    NotFound { id: String },

    /// An object's on-disk framing was malformed or its length didn't match.
    #[error("corrupt object: {message}")]
    Corrupt { message: String },

    /// An object was read as one kind but expected to be another.
    #[error("wrong object kind: expected {expected}, got {got}")]
    WrongKind { expected: String, got: String },

    /// A short id prefix matched more than one object.
    #[error("ambiguous short id '{prefix}'")]
    Ambiguous { prefix: String },

    // -- Ref store (L2) --
    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("ref already exists: {0}")]
    RefExists(String),

    #[error("invalid ref name '{value}': {reason}")]
    InvalidRefName { value: String, reason: String },

    #[error("ref '{0}' is not symbolic")]
    NotSymbolic(String),

    #[error("cyclic ref chain starting at '{0}'")]
    CyclicRef(String),

    // -- Revision resolver (L3) --
    #[error("unknown revision '{0}'")]
    UnknownRevision(String),

    #[error("'{rev}' has no parent #{n}")]
    NoSuchParent { rev: String, n: u32 },

    #[error("path '{path}' not found in tree {tree}")]
    PathNotFound { tree: ObjectId, path: String },

    #[error("invalid OID '{value}': {reason}")]
    InvalidOid { value: String, reason: String },

    // -- Index (L4) --
    #[error("bad index signature (expected \"DIRC\")")]
    BadSignature,

    #[error("unsupported index version {0}")]
    UnsupportedVersion(u32),

    #[error("index file truncated: {0}")]
    Truncated(String),

    #[error("index checksum mismatch")]
    ChecksumMismatch,

    // -- Merge (L5) --
    #[error("no common ancestor between {a} and {b}")]
    NoMergeBase { a: ObjectId, b: ObjectId },

    #[error("merge conflict in {} file(s)", .0.len())]
    MergeConflict(Vec<String>),

    #[error("not currently merging (no MERGE_HEAD)")]
    NotInMerge,

    // -- Working tree (L6) --
    #[error("would clobber uncommitted changes in '{0}'")]
    WouldClobber(String),

    // -- Ambient --
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{message}")]
    BackendError { message: String },

    #[error("path error at {}: {message}", path.display())]
    PathError { path: PathBuf, message: String },
}
