//! [`Repository`] — the value that owns a repository's on-disk state.
//!
//! Every layer operation (object store, ref store, revision resolver,
//! index, merge, working-tree sync) is a method on `Repository` or a
//! free function taking `&Repository`, split one file per concern
//! (`objects.rs`, `refs.rs`, `revision.rs`, `index.rs`, `merge.rs`,
//! `worktree.rs`) and re-assembled here via `impl Repository` blocks in
//! each of those files. There is only one backend (the filesystem), so,
//! unlike a pluggable-backend abstraction, `Repository` is a concrete
//! struct rather than a trait object.

use std::path::{Path, PathBuf};

use crate::error::Error;

/// The conventional repository metadata directory name.
pub const GIT_DIR_NAME: &str = ".minigit";

/// Owns a repository's git directory and working-tree root.
#[derive(Clone, Debug)]
pub struct Repository {
    pub(crate) git_dir: PathBuf,
    pub(crate) workdir: PathBuf,
}

impl Repository {
    /// Initialize a new repository rooted at `workdir`.
    ///
    /// Creates `<workdir>/.minigit` with an empty object store, an empty
    /// `refs/heads` and `refs/tags`, a `HEAD` symbolic ref pointing at
    /// `refs/heads/main`, and a reserved empty `config` file. Safe to call
    /// on a directory that already contains a repository (idempotent: it
    /// does not overwrite an existing `HEAD`).
    pub fn init(workdir: &Path) -> Result<Self, Error> {
        let git_dir = workdir.join(GIT_DIR_NAME);
        std::fs::create_dir_all(git_dir.join("objects").join("info"))?;
        std::fs::create_dir_all(git_dir.join("objects").join("pack"))?;
        std::fs::create_dir_all(git_dir.join("refs").join("heads"))?;
        std::fs::create_dir_all(git_dir.join("refs").join("tags"))?;

        let head_path = git_dir.join("HEAD");
        if !head_path.exists() {
            write_atomic(&head_path, b"ref: refs/heads/main\n")?;
        }
        let config_path = git_dir.join("config");
        if !config_path.exists() {
            write_atomic(&config_path, b"")?;
        }

        tracing::debug!(workdir = %workdir.display(), "initialized repository");
        Ok(Self {
            git_dir,
            workdir: workdir.to_path_buf(),
        })
    }

    /// Open a repository by discovering `.minigit` at `start` or any
    /// ancestor directory.
    pub fn open(start: &Path) -> Result<Self, Error> {
        let start = std::fs::canonicalize(start)?;
        let mut dir = start.as_path();
        loop {
            let candidate = dir.join(GIT_DIR_NAME);
            if candidate.is_dir() {
                return Ok(Self {
                    git_dir: candidate,
                    workdir: dir.to_path_buf(),
                });
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(Error::BackendError {
                        message: format!(
                            "no {GIT_DIR_NAME} directory found in '{}' or any ancestor",
                            start.display()
                        ),
                    });
                }
            }
        }
    }

    /// Open a repository rooted at exactly `workdir` (no ancestor discovery).
    pub fn open_at(workdir: &Path) -> Result<Self, Error> {
        let git_dir = workdir.join(GIT_DIR_NAME);
        if !git_dir.is_dir() {
            return Err(Error::BackendError {
                message: format!("not a repository: {}", git_dir.display()),
            });
        }
        Ok(Self {
            git_dir,
            workdir: workdir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    #[must_use]
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Relative path of `<git-dir>/MERGE_HEAD`.
    pub(crate) fn merge_head_path(&self) -> PathBuf {
        self.git_dir.join("MERGE_HEAD")
    }

    /// Relative path of `<git-dir>/MERGE_MSG`.
    pub(crate) fn merge_msg_path(&self) -> PathBuf {
        self.git_dir.join("MERGE_MSG")
    }

    /// Is `path` excluded from working-tree scans (spec.md §3 "Working
    /// tree")? Only the metadata directory itself is excluded.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|n| n == GIT_DIR_NAME)
    }
}

/// Write `contents` to `path` via write-to-temp-then-rename, so a crash
/// mid-write never leaves a malformed file in place (spec.md §3 "Lifecycle").
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Error> {
    let parent = path.parent().ok_or_else(|| Error::PathError {
        path: path.to_path_buf(),
        message: "path has no parent directory".to_owned(),
    })?;
    std::fs::create_dir_all(parent)?;
    let tmp_name = format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("write"),
        std::process::id()
    );
    let tmp_path = parent.join(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
