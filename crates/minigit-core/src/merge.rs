//! L5: ancestry queries and the three-way merge engine (spec.md §4.5).
//!
//! Merge bases use the "any common ancestor" strategy: a full lowest-common-
//! ancestor computation is not attempted. Per-path resolution is table-driven
//! over the three-way presence/absence/identity of a path in base/ours/theirs,
//! falling back to a line-level merge with conflict markers for files that
//! changed on both sides.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::error::Error;
use crate::repo::Repository;
use crate::types::{Commit, EntryMode, Identity, ObjectId, ObjectKind};

/// The outcome of a merge attempt.
pub enum MergeOutcome {
    /// Nothing to do: `ours` already contains `theirs`.
    AlreadyUpToDate,
    /// `ours` was an ancestor of `theirs`; the branch ref was moved, no
    /// merge commit was created.
    FastForward { to: ObjectId },
    /// A clean merge commit was created.
    Merged { commit: ObjectId },
    /// One or more paths conflicted; `MERGE_HEAD`/`MERGE_MSG` were written
    /// and the working tree holds conflict markers.
    Conflicted { paths: Vec<String> },
}

/// How a single path resolved during a three-way merge.
enum PathResolution {
    /// Take this blob/mode pair as-is, no conflict.
    Take(ObjectId, EntryMode),
    /// Path should not exist in the result.
    Remove,
    /// Both sides changed the content; `markers` holds the merged bytes
    /// (with `<<<<<<<`/`=======`/`>>>>>>>` markers if conflicting).
    Lines { content: Vec<u8>, mode: EntryMode, conflicted: bool },
    /// Non-text conflict (binary content, or mode-only disagreement) with
    /// no sensible line merge.
    Opaque { conflicted: bool, content: Vec<u8>, mode: EntryMode },
}

const CONFLICT_BINARY_CHECK_BYTES: usize = 8000;

impl Repository {
    /// All ancestors of `id`, including `id` itself.
    pub fn ancestors(&self, id: ObjectId) -> Result<HashSet<ObjectId>, Error> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let (kind, payload) = self.read_object(current)?;
            if kind == ObjectKind::Commit {
                for parent in Self::parse_commit(&payload)?.parents {
                    queue.push_back(parent);
                }
            }
        }
        Ok(seen)
    }

    /// Is `maybe_ancestor` an ancestor of (or equal to) `id`?
    pub fn is_ancestor(&self, maybe_ancestor: ObjectId, id: ObjectId) -> Result<bool, Error> {
        Ok(self.ancestors(id)?.contains(&maybe_ancestor))
    }

    /// The first common ancestor found by breadth-first search from `b`
    /// against the full ancestor set of `a`. Not the lowest common ancestor
    /// in general, but sufficient for the merges this engine performs.
    pub fn merge_base(&self, a: ObjectId, b: ObjectId) -> Result<ObjectId, Error> {
        let ancestors_of_a = self.ancestors(a)?;
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([b]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if ancestors_of_a.contains(&current) {
                return Ok(current);
            }
            let (kind, payload) = self.read_object(current)?;
            if kind == ObjectKind::Commit {
                for parent in Self::parse_commit(&payload)?.parents {
                    queue.push_back(parent);
                }
            }
        }
        Err(Error::NoMergeBase { a, b })
    }

    /// Merge `theirs` into the current `HEAD`, writing a merge commit on
    /// success or leaving conflict state (`MERGE_HEAD`/`MERGE_MSG`, markered
    /// files in the working tree, conflicted paths left unstaged) on
    /// conflict. `branch_label` names `theirs` for the closing
    /// `>>>>>>> <branch_label>` conflict marker.
    ///
    /// On a clean merge the caller is responsible for projecting the
    /// resulting tree onto the working tree
    /// ([`Repository::project_tree`] — see `worktree.rs`); on conflict this
    /// method writes the working tree itself, since the merge result never
    /// becomes a committed tree.
    pub fn merge(&self, theirs: ObjectId, branch_label: &str, message: &str) -> Result<MergeOutcome, Error> {
        let ours = self.resolve_ref("HEAD")?;
        if ours == theirs || self.is_ancestor(theirs, ours)? {
            return Ok(MergeOutcome::AlreadyUpToDate);
        }
        if self.is_ancestor(ours, theirs)? {
            self.fast_forward_head(theirs)?;
            return Ok(MergeOutcome::FastForward { to: theirs });
        }

        let base = self.merge_base(ours, theirs)?;
        let base_tree = self.tree_of(base)?;
        let ours_tree = self.tree_of(ours)?;
        let theirs_tree = self.tree_of(theirs)?;

        let base_files = self.walk_tree(base_tree)?;
        let ours_files = self.walk_tree(ours_tree)?;
        let theirs_files = self.walk_tree(theirs_tree)?;

        let mut paths: Vec<&String> = base_files
            .keys()
            .chain(ours_files.keys())
            .chain(theirs_files.keys())
            .collect();
        paths.sort();
        paths.dedup();

        let mut result_files: BTreeMap<String, (ObjectId, EntryMode)> = BTreeMap::new();
        let mut conflict_contents: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        let mut conflicted_paths = Vec::new();

        for path in paths {
            let base_entry = base_files.get(path).copied();
            let ours_entry = ours_files.get(path).copied();
            let theirs_entry = theirs_files.get(path).copied();

            match self.resolve_path(branch_label, path, base_entry, ours_entry, theirs_entry)? {
                PathResolution::Take(id, mode) => {
                    result_files.insert(path.clone(), (id, mode));
                }
                PathResolution::Remove => {}
                PathResolution::Lines { content, mode, conflicted } | PathResolution::Opaque { conflicted, content, mode } => {
                    let id = self.write_object(ObjectKind::Blob, &content)?;
                    result_files.insert(path.clone(), (id, mode));
                    if conflicted {
                        conflicted_paths.push(path.clone());
                        conflict_contents.insert(path.clone(), content);
                    }
                }
            }
        }

        if conflicted_paths.is_empty() {
            let merged_tree = self.build_tree_from_files(&result_files)?;
            let commit = self.create_merge_commit(merged_tree, &[ours, theirs], message)?;
            self.update_current_branch_or_head(commit)?;
            self.clear_merge_state()?;
            Ok(MergeOutcome::Merged { commit })
        } else {
            crate::repo::write_atomic(&self.merge_head_path(), format!("{theirs}\n").as_bytes())?;
            crate::repo::write_atomic(&self.merge_msg_path(), message.as_bytes())?;
            self.write_merge_worktree(&result_files, &conflict_contents)?;
            let clean_files: BTreeMap<String, (ObjectId, EntryMode)> = result_files
                .into_iter()
                .filter(|(path, _)| !conflict_contents.contains_key(path))
                .collect();
            self.rebuild_index_from_files(&clean_files)?;
            Ok(MergeOutcome::Conflicted { paths: conflicted_paths })
        }
    }

    /// Abort an in-progress merge, clearing `MERGE_HEAD`/`MERGE_MSG`. The
    /// caller is responsible for restoring the working tree to `HEAD`.
    pub fn abort_merge(&self) -> Result<(), Error> {
        if !self.merge_head_path().is_file() {
            return Err(Error::NotInMerge);
        }
        self.clear_merge_state()
    }

    fn clear_merge_state(&self) -> Result<(), Error> {
        for path in [self.merge_head_path(), self.merge_msg_path()] {
            if path.is_file() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn fast_forward_head(&self, target: ObjectId) -> Result<(), Error> {
        self.update_current_branch_or_head(target)
    }

    fn update_current_branch_or_head(&self, target: ObjectId) -> Result<(), Error> {
        match self.current_branch()? {
            Some(branch) => self.update_branch(&branch, target),
            None => self.set_head_detached(target),
        }
    }

    fn resolve_path(
        &self,
        branch_label: &str,
        path: &str,
        base: Option<(ObjectId, EntryMode)>,
        ours: Option<(ObjectId, EntryMode)>,
        theirs: Option<(ObjectId, EntryMode)>,
    ) -> Result<PathResolution, Error> {
        match (base, ours, theirs) {
            // Unchanged from base on at least one side: take the side that differs.
            (_, o, t) if o == t => Ok(match o {
                Some((id, mode)) => PathResolution::Take(id, mode),
                None => PathResolution::Remove,
            }),
            (b, o, t) if b == o => Ok(match t {
                Some((id, mode)) => PathResolution::Take(id, mode),
                None => PathResolution::Remove,
            }),
            (b, o, t) if b == t => Ok(match o {
                Some((id, mode)) => PathResolution::Take(id, mode),
                None => PathResolution::Remove,
            }),
            // Both sides added the same path independently of base, with
            // different content: line-merge (add/add).
            (None, Some((oid, omode)), Some((tid, tmode))) => {
                self.line_merge(branch_label, &[], oid, tid, None, omode, tmode)
            }
            // One side deleted, the other modified: conflict, keep the
            // modified content as the marker-free opaque payload.
            (Some(_), None, Some((tid, tmode))) => {
                let (_, content) = self.read_object(tid)?;
                Ok(PathResolution::Opaque { conflicted: true, content, mode: tmode })
            }
            (Some(_), Some((oid, omode)), None) => {
                let (_, content) = self.read_object(oid)?;
                Ok(PathResolution::Opaque { conflicted: true, content, mode: omode })
            }
            // Both sides deleted: clean removal.
            (Some(_), None, None) => Ok(PathResolution::Remove),
            // Both sides modified from base: line-merge.
            (Some((bid, bmode)), Some((oid, omode)), Some((tid, tmode))) => {
                let (_, base_content) = self.read_object(bid)?;
                self.line_merge(branch_label, &base_content, oid, tid, Some(bmode), omode, tmode)
            }
            // Nothing ever existed here.
            (None, None, None) => Ok(PathResolution::Remove),
            // Unreachable: (None, None, Some(_)) satisfies the `b == o` guard
            // above, and (None, Some(_), None) satisfies the `b == t` guard
            // above, since `base` and `ours`/`theirs` are both `None` here.
            (None, None, Some(_)) | (None, Some(_), None) => unreachable!(),
        }
    }

    fn line_merge(
        &self,
        branch_label: &str,
        base_content: &[u8],
        ours_id: ObjectId,
        theirs_id: ObjectId,
        base_mode: Option<EntryMode>,
        ours_mode: EntryMode,
        theirs_mode: EntryMode,
    ) -> Result<PathResolution, Error> {
        let (_, ours_content) = self.read_object(ours_id)?;
        let (_, theirs_content) = self.read_object(theirs_id)?;
        let (mode, mode_conflicted) = reconcile_mode(base_mode, ours_mode, theirs_mode);

        if is_binary(base_content) || is_binary(&ours_content) || is_binary(&theirs_content) {
            return Ok(PathResolution::Opaque {
                conflicted: true,
                content: ours_content,
                mode,
            });
        }

        let (merged, content_conflicted) = merge_lines(branch_label, base_content, &ours_content, &theirs_content);
        Ok(PathResolution::Lines { content: merged, mode, conflicted: content_conflicted || mode_conflicted })
    }

    fn build_tree_from_files(&self, files: &BTreeMap<String, (ObjectId, EntryMode)>) -> Result<ObjectId, Error> {
        let mut index = crate::index::Index::new();
        for (path, (id, mode)) in files {
            index.upsert(crate::types::IndexEntry {
                ctime_s: 0,
                ctime_ns: 0,
                mtime_s: 0,
                mtime_ns: 0,
                dev: 0,
                ino: 0,
                mode: *mode,
                uid: 0,
                gid: 0,
                size: 0,
                id: *id,
                path: path.clone(),
            });
        }
        self.build_root_tree(&index)
    }

    fn rebuild_index_from_files(&self, files: &BTreeMap<String, (ObjectId, EntryMode)>) -> Result<(), Error> {
        let mut index = crate::index::Index::new();
        for (path, (id, mode)) in files {
            index.upsert(crate::types::IndexEntry {
                ctime_s: 0,
                ctime_ns: 0,
                mtime_s: 0,
                mtime_ns: 0,
                dev: 0,
                ino: 0,
                mode: *mode,
                uid: 0,
                gid: 0,
                size: 0,
                id: *id,
                path: path.clone(),
            });
        }
        self.write_index(&index)
    }

    /// Write every path in `files` to the working tree directly, bypassing
    /// the index: paths present in `conflict_contents` get that markered
    /// payload, everything else gets its resolved blob's content. Used only
    /// on a conflicted merge, where the result never becomes a committed
    /// tree for [`Repository::project_tree`] to project.
    fn write_merge_worktree(
        &self,
        files: &BTreeMap<String, (ObjectId, EntryMode)>,
        conflict_contents: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), Error> {
        for (path, (id, mode)) in files {
            let abs = self.workdir.join(path);
            if let Some(parent) = abs.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = match conflict_contents.get(path) {
                Some(bytes) => bytes.clone(),
                None => self.read_object(*id)?.1,
            };
            std::fs::write(&abs, &content)?;
            #[cfg(unix)]
            if !conflict_contents.contains_key(path) && *mode == EntryMode::Executable {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&abs, std::fs::Permissions::from_mode(0o755))?;
            }
        }
        Ok(())
    }

    fn create_merge_commit(&self, tree: ObjectId, parents: &[ObjectId], message: &str) -> Result<ObjectId, Error> {
        let author = crate::identity::author(&self.git_dir)?;
        let committer = crate::identity::committer(&self.git_dir)?;
        let commit = Commit {
            tree,
            parents: parents.to_vec(),
            author,
            committer,
            message: message.to_owned(),
        };
        self.write_object(ObjectKind::Commit, &Self::serialize_commit(&commit))
    }
}

fn is_binary(content: &[u8]) -> bool {
    content[..content.len().min(CONFLICT_BINARY_CHECK_BYTES)].contains(&0)
}

/// Mode tie-break (spec.md §4.5 step 3): if only one side changed the mode
/// from base, take that side's mode; if both changed to the same mode,
/// take it; if both changed to different modes, conflict (the caller still
/// needs *a* mode to store, so `ours_mode` is returned alongside `true`).
fn reconcile_mode(base_mode: Option<EntryMode>, ours_mode: EntryMode, theirs_mode: EntryMode) -> (EntryMode, bool) {
    let Some(base_mode) = base_mode else {
        return if ours_mode == theirs_mode { (ours_mode, false) } else { (ours_mode, true) };
    };
    match (ours_mode == base_mode, theirs_mode == base_mode) {
        (true, true) | (true, false) => (theirs_mode, false),
        (false, true) => (ours_mode, false),
        (false, false) => {
            if ours_mode == theirs_mode {
                (ours_mode, false)
            } else {
                (ours_mode, true)
            }
        }
    }
}

/// A minimal three-way line merge (spec.md §4.5 step 4 / L5.1): short-circuit
/// on the three trivial cases, then, when `base`/`ours`/`theirs` all have the
/// same line count, compare per-line against `base` on each side. If the
/// positions either side changed never overlap, apply both change sets; a
/// shared changed position (to different content) is a conflict. Any other
/// shape mismatch (lines inserted/removed differently on each side) falls
/// back to a whole-file conflict block, since this merge never attempts a
/// real sequence alignment.
fn merge_lines(branch_label: &str, base: &[u8], ours: &[u8], theirs: &[u8]) -> (Vec<u8>, bool) {
    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    if ours_lines == theirs_lines {
        return (ours.to_vec(), false);
    }
    if base_lines == ours_lines {
        return (theirs.to_vec(), false);
    }
    if base_lines == theirs_lines {
        return (ours.to_vec(), false);
    }

    if base_lines.len() == ours_lines.len() && base_lines.len() == theirs_lines.len() {
        let mut merged = Vec::new();
        let mut overlap = false;
        for i in 0..base_lines.len() {
            let o_changed = ours_lines[i] != base_lines[i];
            let t_changed = theirs_lines[i] != base_lines[i];
            let chosen = match (o_changed, t_changed) {
                (false, false) => base_lines[i],
                (true, false) => ours_lines[i],
                (false, true) => theirs_lines[i],
                (true, true) if ours_lines[i] == theirs_lines[i] => ours_lines[i],
                (true, true) => {
                    overlap = true;
                    break;
                }
            };
            merged.extend_from_slice(chosen);
        }
        if !overlap {
            return (merged, false);
        }
    }

    // Fallback: either the change sets overlap or the line counts differ
    // across base/ours/theirs, which this positional merge can't align.
    // Emit a single conflict block spanning the whole file.
    let mut out = Vec::new();
    out.extend_from_slice(b"<<<<<<< HEAD\n");
    out.extend_from_slice(ours);
    if !ours.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(b"=======\n");
    out.extend_from_slice(theirs);
    if !theirs.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(format!(">>>>>>> {branch_label}\n").as_bytes());
    (out, true)
}

fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content.split_inclusive(|&b| b == b'\n').collect()
}
