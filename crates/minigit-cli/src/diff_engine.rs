//! The CLI's [`DiffEngine`] implementation, rendering unified diffs with
//! `similar`. The core's three-way line merge does not use this type —
//! this is presentation only.

use minigit_core::diff::DiffEngine;
use similar::{ChangeTag, TextDiff};

pub struct UnifiedDiff;

impl DiffEngine for UnifiedDiff {
    type EditScript = String;

    fn diff(&self, old: &[u8], new: &[u8]) -> Self::EditScript {
        let old_text = String::from_utf8_lossy(old);
        let new_text = String::from_utf8_lossy(new);
        let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());

        let mut out = String::new();
        for change in diff.iter_all_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => '-',
                ChangeTag::Insert => '+',
                ChangeTag::Equal => ' ',
            };
            out.push(sign);
            out.push_str(change.as_str().unwrap_or_default());
            if !change.as_str().unwrap_or_default().ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    fn format(&self, script: &Self::EditScript, old_path: &str, new_path: &str) -> String {
        if script.is_empty() {
            return String::new();
        }
        format!("--- {old_path}\n+++ {new_path}\n{script}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_content_produces_no_diff() {
        let engine = UnifiedDiff;
        let script = engine.diff(b"same\n", b"same\n");
        assert_eq!(script.trim(), " same");
    }

    #[test]
    fn added_line_shows_plus_marker() {
        let engine = UnifiedDiff;
        let script = engine.diff(b"a\n", b"a\nb\n");
        assert!(script.contains("+b"));
    }

    #[test]
    fn format_is_empty_for_empty_script() {
        let engine = UnifiedDiff;
        assert_eq!(engine.format(&String::new(), "a", "b"), "");
    }
}
