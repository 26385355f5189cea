//! The collaborator interface a presentation layer implements to render
//! human-readable diffs. The core's own three-way line merge (`merge.rs`)
//! does not use this trait — it compares lines directly, since conflict
//! markers are a wire format, not a display concern.

/// A rendered diff between two byte buffers.
pub trait DiffEngine {
    /// An intermediate representation of the computed diff, opaque to the
    /// core but meaningful to `format`.
    type EditScript;

    /// Compute the diff between `old` and `new`.
    fn diff(&self, old: &[u8], new: &[u8]) -> Self::EditScript;

    /// Render an edit script as unified-diff-style text.
    fn format(&self, script: &Self::EditScript, old_path: &str, new_path: &str) -> String;
}
