//! L2: the reference store.
//!
//! Refs are loose files under `<git-dir>/refs/{heads,tags}/<name>`, plus
//! `HEAD` at the git-dir root. A ref file holds either a 40-hex object id
//! followed by `\n`, or a symbolic indirection `"ref: <target>\n"`.

use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::repo::{Repository, write_atomic};
use crate::types::{ObjectId, ShortName};

/// A resolved ref's on-disk form before any chasing of symbolic indirection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefTarget {
    Direct(ObjectId),
    Symbolic(String),
}

/// Cap on symbolic ref chase depth before declaring a cycle (spec.md
/// Design Notes).
const MAX_SYMBOLIC_DEPTH: u32 = 8;

impl Repository {
    fn ref_path(&self, full_name: &str) -> PathBuf {
        self.git_dir.join(full_name)
    }

    /// The full ref name (`refs/heads/<name>`) for a branch short name.
    #[must_use]
    pub fn branch_ref_name(name: &ShortName) -> String {
        format!("refs/heads/{name}")
    }

    /// The full ref name (`refs/tags/<name>`) for a tag short name.
    #[must_use]
    pub fn tag_ref_name(name: &ShortName) -> String {
        format!("refs/tags/{name}")
    }

    /// Read a ref file's raw content and parse it as direct or symbolic.
    pub fn read_ref_file(&self, full_name: &str) -> Result<RefTarget, Error> {
        let path = self.ref_path(full_name);
        let contents = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::RefNotFound(full_name.to_owned())
            } else {
                Error::IoError(e)
            }
        })?;
        let trimmed = contents.trim_end_matches('\n');
        if let Some(target) = trimmed.strip_prefix("ref: ") {
            Ok(RefTarget::Symbolic(target.trim().to_owned()))
        } else {
            let id: ObjectId = trimmed.trim().parse()?;
            Ok(RefTarget::Direct(id))
        }
    }

    /// Write a ref file to point directly at `id`.
    pub fn write_ref_direct(&self, full_name: &str, id: ObjectId) -> Result<(), Error> {
        write_atomic(&self.ref_path(full_name), format!("{id}\n").as_bytes())
    }

    /// Write a ref file as a symbolic indirection to `target`.
    pub fn write_ref_symbolic(&self, full_name: &str, target: &str) -> Result<(), Error> {
        write_atomic(&self.ref_path(full_name), format!("ref: {target}\n").as_bytes())
    }

    /// Delete a ref file. Errors if it does not exist.
    pub fn delete_ref_file(&self, full_name: &str) -> Result<(), Error> {
        let path = self.ref_path(full_name);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::RefNotFound(full_name.to_owned())
            } else {
                Error::IoError(e)
            }
        })
    }

    #[must_use]
    pub fn ref_exists(&self, full_name: &str) -> bool {
        self.ref_path(full_name).is_file()
    }

    /// Resolve `HEAD` (or any ref name) to the object id it ultimately
    /// points at, chasing symbolic indirection up to a bounded depth.
    pub fn resolve_ref(&self, full_name: &str) -> Result<ObjectId, Error> {
        self.resolve_ref_depth(full_name, 0)
    }

    fn resolve_ref_depth(&self, full_name: &str, depth: u32) -> Result<ObjectId, Error> {
        if depth > MAX_SYMBOLIC_DEPTH {
            return Err(Error::CyclicRef(full_name.to_owned()));
        }
        match self.read_ref_file(full_name)? {
            RefTarget::Direct(id) => Ok(id),
            RefTarget::Symbolic(target) => self.resolve_ref_depth(&target, depth + 1),
        }
    }

    /// Is `HEAD` currently detached (pointing directly at an object id
    /// rather than a branch)?
    pub fn is_detached(&self) -> Result<bool, Error> {
        Ok(matches!(self.read_ref_file("HEAD")?, RefTarget::Direct(_)))
    }

    /// The branch short name `HEAD` points at, if not detached.
    pub fn current_branch(&self) -> Result<Option<ShortName>, Error> {
        match self.read_ref_file("HEAD")? {
            RefTarget::Symbolic(target) => {
                let name = target.strip_prefix("refs/heads/").ok_or_else(|| Error::Corrupt {
                    message: format!("HEAD points outside refs/heads/: {target}"),
                })?;
                Ok(Some(ShortName::new(name)?))
            }
            RefTarget::Direct(_) => Ok(None),
        }
    }

    /// Point `HEAD` at a branch (updates the symbolic indirection, not
    /// the branch's own target).
    pub fn set_head_to_branch(&self, name: &ShortName) -> Result<(), Error> {
        self.write_ref_symbolic("HEAD", &Self::branch_ref_name(name))
    }

    /// Detach `HEAD` to point directly at `id`.
    pub fn set_head_detached(&self, id: ObjectId) -> Result<(), Error> {
        self.write_ref_direct("HEAD", id)
    }

    /// Create or move a branch to point at `id`.
    pub fn update_branch(&self, name: &ShortName, id: ObjectId) -> Result<(), Error> {
        self.write_ref_direct(&Self::branch_ref_name(name), id)
    }

    /// Create a branch, failing if it already exists.
    pub fn create_branch(&self, name: &ShortName, id: ObjectId) -> Result<(), Error> {
        let full = Self::branch_ref_name(name);
        if self.ref_exists(&full) {
            return Err(Error::RefExists(full));
        }
        self.write_ref_direct(&full, id)
    }

    /// Delete a branch.
    pub fn delete_branch(&self, name: &ShortName) -> Result<(), Error> {
        self.delete_ref_file(&Self::branch_ref_name(name))
    }

    /// Create a lightweight tag (a direct ref under `refs/tags/`).
    pub fn create_tag(&self, name: &ShortName, id: ObjectId) -> Result<(), Error> {
        let full = Self::tag_ref_name(name);
        if self.ref_exists(&full) {
            return Err(Error::RefExists(full));
        }
        self.write_ref_direct(&full, id)
    }

    /// List all branch short names, sorted.
    pub fn list_branches(&self) -> Result<Vec<ShortName>, Error> {
        self.list_refs_under("refs/heads")
    }

    /// List all tag short names, sorted.
    pub fn list_tags(&self) -> Result<Vec<ShortName>, Error> {
        self.list_refs_under("refs/tags")
    }

    fn list_refs_under(&self, prefix: &str) -> Result<Vec<ShortName>, Error> {
        let mut names = Vec::new();
        let root = self.git_dir.join(prefix);
        if root.is_dir() {
            collect_ref_names(&root, &root, &mut names)?;
        }
        let mut short_names = names
            .into_iter()
            .map(|n| ShortName::new(&n))
            .collect::<Result<Vec<_>, _>>()?;
        short_names.sort();
        Ok(short_names)
    }
}

fn collect_ref_names(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), Error> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_ref_names(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            if let Some(name) = rel.to_str() {
                out.push(name.replace(std::path::MAIN_SEPARATOR, "/"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectKind;

    fn some_id(repo: &Repository) -> ObjectId {
        repo.write_object(ObjectKind::Blob, b"whatever").unwrap()
    }

    #[test]
    fn head_starts_symbolic_at_main() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(!repo.is_detached().unwrap());
        assert_eq!(repo.current_branch().unwrap().unwrap().as_str(), "main");
    }

    #[test]
    fn resolve_ref_chases_symbolic_head() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = some_id(&repo);
        let main = ShortName::new("main").unwrap();
        repo.update_branch(&main, id).unwrap();
        assert_eq!(repo.resolve_ref("HEAD").unwrap(), id);
    }

    #[test]
    fn detach_then_reattach() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = some_id(&repo);
        repo.set_head_detached(id).unwrap();
        assert!(repo.is_detached().unwrap());
        assert_eq!(repo.current_branch().unwrap(), None);
        let main = ShortName::new("main").unwrap();
        repo.set_head_to_branch(&main).unwrap();
        assert!(!repo.is_detached().unwrap());
    }

    #[test]
    fn create_branch_rejects_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = some_id(&repo);
        let feature = ShortName::new("feature").unwrap();
        repo.create_branch(&feature, id).unwrap();
        assert!(matches!(repo.create_branch(&feature, id), Err(Error::RefExists(_))));
    }

    #[test]
    fn list_branches_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = some_id(&repo);
        for name in ["zeta", "alpha", "mid"] {
            repo.create_branch(&ShortName::new(name).unwrap(), id).unwrap();
        }
        let branches: Vec<String> = repo.list_branches().unwrap().iter().map(ToString::to_string).collect();
        assert_eq!(branches, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn cyclic_symbolic_refs_detected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.write_ref_symbolic("refs/heads/a", "refs/heads/b").unwrap();
        repo.write_ref_symbolic("refs/heads/b", "refs/heads/a").unwrap();
        assert!(matches!(repo.resolve_ref("refs/heads/a"), Err(Error::CyclicRef(_))));
    }
}
