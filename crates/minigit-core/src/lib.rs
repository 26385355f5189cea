//! A file-backed, content-addressed version control engine.
//!
//! [`Repository`] is the single entry point: it owns the on-disk git
//! directory and working tree, and exposes every layer of the engine as
//! methods defined across the other modules in this crate (object store,
//! reference store, revision resolver, staging index, merge engine,
//! working-tree synchronizer). Callers never touch those modules' free
//! functions directly except for the value types and [`Error`] they share.
//!
//! # Crate layout
//!
//! - [`repo`] — the [`Repository`] value and atomic-write helper.
//! - [`hash`] — SHA-1 framing and zlib compression (L0).
//! - [`objects`] — the content-addressed object store (L1).
//! - [`refs`] — the reference store (L2).
//! - [`revision`] — the revision grammar resolver (L3).
//! - [`index`] — the binary staging index (L4).
//! - [`merge`] — ancestry queries and the three-way merge engine (L5).
//! - [`worktree`] — the working-tree synchronizer (L6).
//! - [`identity`] — author/committer/clock collaborators.
//! - [`diff`] — the presentation-layer diff collaborator interface.
//! - [`error`] — the [`Error`] enum returned by every operation.
//! - [`types`] — value types shared across layers.

pub mod diff;
pub mod error;
pub mod hash;
pub mod identity;
pub mod index;
pub mod merge;
pub mod objects;
pub mod refs;
pub mod repo;
pub mod revision;
pub mod types;
pub mod worktree;

pub use error::Error;
pub use index::Index;
pub use merge::MergeOutcome;
pub use refs::RefTarget;
pub use repo::Repository;
pub use types::{
    Commit, EntryMode, Identity, IndexEntry, ObjectId, ObjectKind, ShortName, Tag, TreeEntry,
};
