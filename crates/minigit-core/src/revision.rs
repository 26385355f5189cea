//! L3: the revision grammar resolver.
//!
//! Parses and resolves `HEAD | name | hex-prefix | rev^[N] | rev~N |
//! rev^{tree} | rev:path` (spec.md §4.3). A bare `name` prefers a branch
//! over a tag when both exist, then falls back to a short object id.

use crate::error::Error;
use crate::types::{ObjectId, ObjectKind};

impl crate::repo::Repository {
    /// Resolve a revision expression to an object id.
    ///
    /// For `rev^{tree}` the returned id names a tree object directly,
    /// rather than the commit/tag it was dereferenced from.
    pub fn resolve_rev(&self, expr: &str) -> Result<ObjectId, Error> {
        if let Some((base, path)) = split_path_suffix(expr) {
            let id = self.resolve_rev(base)?;
            let tree = self.tree_of(id)?;
            return self.resolve_path_in_tree(tree, path);
        }
        if let Some(base) = expr.strip_suffix("^{tree}") {
            let id = self.resolve_rev(base)?;
            return self.tree_of(id);
        }
        if let Some((base, rest)) = split_trailing_op(expr, '~') {
            let n: u32 = rest.parse().map_err(|_| Error::UnknownRevision(expr.to_owned()))?;
            let id = self.resolve_rev(base)?;
            return self.nth_ancestor(&id, expr, n);
        }
        if let Some((base, rest)) = split_trailing_op(expr, '^') {
            let n: u32 = if rest.is_empty() { 1 } else { rest.parse().map_err(|_| Error::UnknownRevision(expr.to_owned()))? };
            let id = self.resolve_rev(base)?;
            return self.nth_parent(&id, base, n);
        }
        self.resolve_base(expr)
    }

    /// Resolve the innermost name/HEAD/hex-prefix with no `^`/`~`/`:` suffix.
    fn resolve_base(&self, expr: &str) -> Result<ObjectId, Error> {
        if expr == "HEAD" {
            return self.resolve_ref("HEAD");
        }
        let branch_ref = format!("refs/heads/{expr}");
        if self.ref_exists(&branch_ref) {
            return self.resolve_ref(&branch_ref);
        }
        let tag_ref = format!("refs/tags/{expr}");
        if self.ref_exists(&tag_ref) {
            return self.deref_tag_chain(self.resolve_ref(&tag_ref)?);
        }
        if expr.len() >= 4 && expr.len() <= 40 && expr.bytes().all(|b| b.is_ascii_hexdigit()) {
            return self.expand_short(expr);
        }
        Err(Error::UnknownRevision(expr.to_owned()))
    }

    /// Follow a chain of tag objects down to the commit/tree/blob they
    /// ultimately denote, returning the id of that final object (not
    /// necessarily a tree — unlike `tree_of`, which always yields a tree).
    fn deref_tag_chain(&self, id: ObjectId) -> Result<ObjectId, Error> {
        let (kind, payload) = self.read_object(id)?;
        if kind == ObjectKind::Tag {
            let tag = Self::parse_tag(&payload)?;
            self.deref_tag_chain(tag.object)
        } else {
            Ok(id)
        }
    }

    fn nth_parent(&self, id: &ObjectId, rev_label: &str, n: u32) -> Result<ObjectId, Error> {
        if n == 0 {
            return Ok(*id);
        }
        let (kind, payload) = self.read_object(*id)?;
        if kind != ObjectKind::Commit {
            return Err(Error::WrongKind {
                expected: "commit".to_owned(),
                got: kind.to_string(),
            });
        }
        let commit = Self::parse_commit(&payload)?;
        commit
            .parents
            .get((n - 1) as usize)
            .copied()
            .ok_or_else(|| Error::NoSuchParent {
                rev: rev_label.to_owned(),
                n,
            })
    }

    fn nth_ancestor(&self, id: &ObjectId, rev_label: &str, n: u32) -> Result<ObjectId, Error> {
        let mut current = *id;
        for _ in 0..n {
            current = self.nth_parent(&current, rev_label, 1)?;
        }
        Ok(current)
    }

    fn resolve_path_in_tree(&self, tree: ObjectId, path: &str) -> Result<ObjectId, Error> {
        let mut current = tree;
        let mut consumed = String::new();
        for component in path.split('/') {
            if component.is_empty() {
                continue;
            }
            if !consumed.is_empty() {
                consumed.push('/');
            }
            consumed.push_str(component);
            let (kind, payload) = self.read_object(current)?;
            if kind != ObjectKind::Tree {
                return Err(Error::PathNotFound {
                    tree,
                    path: path.to_owned(),
                });
            }
            let entries = Self::parse_tree(&payload)?;
            let entry = entries
                .into_iter()
                .find(|e| e.name == component)
                .ok_or_else(|| Error::PathNotFound {
                    tree,
                    path: path.to_owned(),
                })?;
            current = entry.id;
        }
        Ok(current)
    }
}

/// Split `rev:path` at the first unescaped `:`, since paths may themselves
/// contain no further grammar.
fn split_path_suffix(expr: &str) -> Option<(&str, &str)> {
    expr.split_once(':')
}

/// Split a trailing run of `op` + digits (e.g. `foo~2`, `foo^`, `foo^3`)
/// from its base revision. Only the *last* occurrence at the end is
/// peeled per call; repeated application unwinds chained suffixes like
/// `foo~1~1`.
fn split_trailing_op(expr: &str, op: char) -> Option<(&str, &str)> {
    let idx = expr.rfind(op)?;
    let (base, rest) = expr.split_at(idx);
    let rest = &rest[op.len_utf8()..];
    if rest.chars().all(|c| c.is_ascii_digit()) && !base.is_empty() {
        Some((base, rest))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::Repository;
    use crate::types::{Commit, Identity, ShortName, TreeEntry};

    fn ident() -> Identity {
        Identity {
            name: "Tester".to_owned(),
            email: "t@example.com".to_owned(),
            timestamp: 1_700_000_000,
            tz_offset: "+0000".to_owned(),
        }
    }

    fn commit_chain(repo: &Repository, len: usize) -> Vec<ObjectId> {
        let blob = repo.write_object(ObjectKind::Blob, b"x").unwrap();
        let tree = repo
            .write_object(
                ObjectKind::Tree,
                &Repository::serialize_tree(&[TreeEntry {
                    name: "f".into(),
                    mode: crate::types::EntryMode::Regular,
                    id: blob,
                }]),
            )
            .unwrap();
        let mut ids = Vec::new();
        let mut parent = None;
        for _ in 0..len {
            let commit = Commit {
                tree,
                parents: parent.into_iter().collect(),
                author: ident(),
                committer: ident(),
                message: "msg\n".to_owned(),
            };
            let id = repo.write_object(ObjectKind::Commit, &Repository::serialize_commit(&commit)).unwrap();
            ids.push(id);
            parent = Some(id);
        }
        ids
    }

    #[test]
    fn resolves_head_and_branch_name() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = commit_chain(&repo, 1);
        repo.update_branch(&ShortName::new("main").unwrap(), ids[0]).unwrap();
        assert_eq!(repo.resolve_rev("HEAD").unwrap(), ids[0]);
        assert_eq!(repo.resolve_rev("main").unwrap(), ids[0]);
    }

    #[test]
    fn caret_and_tilde_walk_parents() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = commit_chain(&repo, 3);
        repo.update_branch(&ShortName::new("main").unwrap(), ids[2]).unwrap();
        assert_eq!(repo.resolve_rev("main^").unwrap(), ids[1]);
        assert_eq!(repo.resolve_rev("main~2").unwrap(), ids[0]);
        assert_eq!(repo.resolve_rev("main^1").unwrap(), ids[1]);
    }

    #[test]
    fn caret_tree_dereferences_to_tree() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = commit_chain(&repo, 1);
        repo.update_branch(&ShortName::new("main").unwrap(), ids[0]).unwrap();
        let tree_id = repo.resolve_rev("main^{tree}").unwrap();
        let (kind, _) = repo.read_object(tree_id).unwrap();
        assert_eq!(kind, ObjectKind::Tree);
    }

    #[test]
    fn colon_path_resolves_blob() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = commit_chain(&repo, 1);
        repo.update_branch(&ShortName::new("main").unwrap(), ids[0]).unwrap();
        let blob_id = repo.resolve_rev("main:f").unwrap();
        let (kind, payload) = repo.read_object(blob_id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"x");
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let ids = commit_chain(&repo, 1);
        repo.update_branch(&ShortName::new("main").unwrap(), ids[0]).unwrap();
        assert!(matches!(repo.resolve_rev("main^"), Err(Error::NoSuchParent { .. })));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(repo.resolve_rev("nonexistent"), Err(Error::UnknownRevision(_))));
    }
}
