//! L6: the working-tree synchronizer (spec.md §4.6).
//!
//! Projects a tree object onto the filesystem: deletes paths the target
//! tree no longer has, writes paths it does, prunes directories left empty,
//! and rebuilds the index to match. [`Repository::can_safely_project`] is a
//! precheck that refuses to clobber working-tree edits the index or target
//! tree doesn't already know about.

use std::path::Path;

use crate::error::Error;
use crate::index::Index;
use crate::repo::Repository;
use crate::types::{EntryMode, IndexEntry, ObjectId};

impl Repository {
    /// Would projecting `target_tree` silently discard working-tree state
    /// the index doesn't already track?
    ///
    /// A path is unsafe to overwrite when its on-disk content disagrees
    /// with the index (a dirty edit, or an untracked file already sitting
    /// where the target tree wants to write) *and* the target tree would
    /// change or remove it.
    pub fn can_safely_project(&self, target_tree: ObjectId) -> Result<(), Error> {
        let index = self.read_index()?;
        let target_files = self.walk_tree(target_tree)?;

        for entry in index.sorted_entries() {
            let abs = self.workdir.join(&entry.path);
            let Some(disk_id) = self.hash_disk_file(&abs, entry.mode)? else {
                continue; // deleted on disk; deletions never clobber anything
            };
            if disk_id == entry.id {
                continue; // clean relative to the index
            }
            let target_matches = target_files.get(&entry.path) == Some(&(entry.id, entry.mode));
            if !target_matches {
                return Err(Error::WouldClobber(entry.path.clone()));
            }
        }

        for (path, (target_id, target_mode)) in &target_files {
            if index.contains(path) {
                continue;
            }
            let abs = self.workdir.join(path);
            if let Some(disk_id) = self.hash_disk_file(&abs, *target_mode)? {
                if disk_id != *target_id {
                    return Err(Error::WouldClobber(path.clone()));
                }
            }
        }
        Ok(())
    }

    /// Project `target_tree` onto the working tree and rebuild the index
    /// to match it. Runs [`Self::can_safely_project`] first.
    pub fn project_tree(&self, target_tree: ObjectId) -> Result<(), Error> {
        self.can_safely_project(target_tree)?;

        let current_index = self.read_index()?;
        let target_files = self.walk_tree(target_tree)?;

        let current_paths: Vec<String> = current_index.sorted_entries().map(|e| e.path.clone()).collect();
        for path in &current_paths {
            if !target_files.contains_key(path) {
                let abs = self.workdir.join(path);
                if abs.is_file() || is_symlink(&abs) {
                    std::fs::remove_file(&abs)?;
                }
            }
        }
        prune_empty_dirs(&self.workdir, &self.workdir)?;

        let mut new_index = Index::new();
        for (path, (id, mode)) in &target_files {
            let entry = self.materialize(path, *id, *mode)?;
            new_index.upsert(entry);
        }
        self.write_index(&new_index)?;
        tracing::debug!(tree = %target_tree, files = new_index.len(), "projected tree onto working tree");
        Ok(())
    }

    fn materialize(&self, path: &str, id: ObjectId, mode: EntryMode) -> Result<IndexEntry, Error> {
        let abs = self.workdir.join(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let (_, content) = self.read_object(id)?;

        match mode {
            EntryMode::Symlink => {
                let target = String::from_utf8_lossy(&content).into_owned();
                if abs.is_symlink() || abs.exists() {
                    std::fs::remove_file(&abs)?;
                }
                write_symlink(&target, &abs)?;
            }
            EntryMode::Regular | EntryMode::Executable => {
                std::fs::write(&abs, &content)?;
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let perm_bits = if mode == EntryMode::Executable { 0o755 } else { 0o644 };
                    std::fs::set_permissions(&abs, std::fs::Permissions::from_mode(perm_bits))?;
                }
            }
            EntryMode::Tree => {
                return Err(Error::WrongKind {
                    expected: "blob".to_owned(),
                    got: "tree".to_owned(),
                });
            }
        }

        self.stage_file(path, &abs)
    }

    fn hash_disk_file(&self, abs: &Path, mode: EntryMode) -> Result<Option<ObjectId>, Error> {
        let Ok(metadata) = std::fs::symlink_metadata(abs) else {
            return Ok(None);
        };
        let content = if mode == EntryMode::Symlink || metadata.file_type().is_symlink() {
            match std::fs::read_link(abs) {
                Ok(target) => target.to_string_lossy().into_owned().into_bytes(),
                Err(_) => return Ok(None),
            }
        } else {
            match std::fs::read(abs) {
                Ok(bytes) => bytes,
                Err(_) => return Ok(None),
            }
        };
        Ok(Some(Self::hash_object(crate::types::ObjectKind::Blob, &content)))
    }
}

#[cfg(unix)]
fn write_symlink(target: &str, dest: &Path) -> Result<(), Error> {
    std::os::unix::fs::symlink(target, dest)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(target: &str, dest: &Path) -> Result<(), Error> {
    // No portable symlink primitive; fall back to a plain file holding the
    // link target, matching git's own behavior with core.symlinks=false.
    std::fs::write(dest, target)?;
    Ok(())
}

fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
}

/// Recursively remove directories left empty after deleting tracked
/// files, never descending into or removing the repository metadata dir.
fn prune_empty_dirs(root: &Path, dir: &Path) -> Result<bool, Error> {
    if dir.file_name().is_some_and(|n| n == crate::repo::GIT_DIR_NAME) {
        return Ok(false);
    }
    let mut is_empty = true;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if prune_empty_dirs(root, &path)? {
                std::fs::remove_dir(&path)?;
            } else {
                is_empty = false;
            }
        } else {
            is_empty = false;
        }
    }
    Ok(is_empty && dir != root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjectKind, TreeEntry};

    fn tree_with(repo: &Repository, files: &[(&str, &[u8])]) -> ObjectId {
        let entries: Vec<TreeEntry> = files
            .iter()
            .map(|(name, content)| TreeEntry {
                name: (*name).to_owned(),
                mode: EntryMode::Regular,
                id: repo.write_object(ObjectKind::Blob, content).unwrap(),
            })
            .collect();
        repo.write_object(ObjectKind::Tree, &Repository::serialize_tree(&entries)).unwrap()
    }

    #[test]
    fn project_tree_writes_files_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree = tree_with(&repo, &[("a.txt", b"hello\n")]);
        repo.project_tree(tree).unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hello\n");
        let index = repo.read_index().unwrap();
        assert!(index.contains("a.txt"));
    }

    #[test]
    fn project_tree_removes_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree1 = tree_with(&repo, &[("a.txt", b"one\n"), ("sub/b.txt", b"two\n")]);
        repo.project_tree(tree1).unwrap();
        assert!(dir.path().join("sub").join("b.txt").is_file());

        let tree2 = tree_with(&repo, &[("a.txt", b"one\n")]);
        repo.project_tree(tree2).unwrap();
        assert!(!dir.path().join("sub").join("b.txt").exists());
        assert!(!dir.path().join("sub").exists());
    }

    #[test]
    fn project_tree_refuses_to_clobber_dirty_file() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree1 = tree_with(&repo, &[("a.txt", b"one\n")]);
        repo.project_tree(tree1).unwrap();

        std::fs::write(dir.path().join("a.txt"), b"dirty edit\n").unwrap();

        let tree2 = tree_with(&repo, &[("a.txt", b"two\n")]);
        assert!(matches!(repo.project_tree(tree2), Err(Error::WouldClobber(_))));
    }

    #[test]
    fn project_tree_allows_rewriting_unchanged_content() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let tree1 = tree_with(&repo, &[("a.txt", b"one\n")]);
        repo.project_tree(tree1).unwrap();
        // Re-projecting the same tree must never be blocked by its own
        // previous materialization.
        repo.project_tree(tree1).unwrap();
    }
}
