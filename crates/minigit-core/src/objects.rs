//! L1: content-addressed object store.
//!
//! Loose objects live at `<git-dir>/objects/<xx>/<38-hex>`, zlib-compressed
//! frames (spec.md §4.1). Objects are immutable once written; writing an
//! id that already exists is a no-op.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::Error;
use crate::hash;
use crate::repo::{Repository, write_atomic};
use crate::types::{Commit, EntryMode, Identity, ObjectId, ObjectKind, Tag, TreeEntry, tree_sort_key};

impl Repository {
    fn object_path(&self, id: ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.git_dir.join("objects").join(&hex[..2]).join(&hex[2..])
    }

    /// Pure hash of `(kind, payload)` — touches no disk.
    #[must_use]
    pub fn hash_object(kind: ObjectKind, payload: &[u8]) -> ObjectId {
        hash::hash(kind, payload)
    }

    /// Write an object, returning its id. A no-op if already present.
    pub fn write_object(&self, kind: ObjectKind, payload: &[u8]) -> Result<ObjectId, Error> {
        let id = hash::hash(kind, payload);
        let path = self.object_path(id);
        if path.exists() {
            return Ok(id);
        }
        let framed = hash::frame(kind, payload);
        let compressed = hash::compress(&framed)?;
        write_atomic(&path, &compressed)?;
        tracing::debug!(%id, kind = kind.as_str(), "wrote object");
        Ok(id)
    }

    /// Read an object back by id.
    pub fn read_object(&self, id: ObjectId) -> Result<(ObjectKind, Vec<u8>), Error> {
        let path = self.object_path(id);
        let compressed = std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound { id: id.to_hex() }
            } else {
                Error::IoError(e)
            }
        })?;
        let framed = hash::decompress(&compressed)?;
        let (kind, payload) = hash::parse_frame(&framed)?;
        Ok((kind, payload.to_vec()))
    }

    #[must_use]
    pub fn object_exists(&self, id: ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Expand a hex prefix (length 4..40) to a full object id.
    pub fn expand_short(&self, prefix: &str) -> Result<ObjectId, Error> {
        if prefix.len() == 40 {
            let id: ObjectId = prefix.parse()?;
            return if self.object_exists(id) {
                Ok(id)
            } else {
                Err(Error::NotFound { id: prefix.to_owned() })
            };
        }
        if prefix.len() < 4 {
            return Err(Error::BackendError {
                message: format!("short id prefix '{prefix}' is shorter than the minimum of 4"),
            });
        }
        if !prefix.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidOid {
                value: prefix.to_owned(),
                reason: "not all hex digits".to_owned(),
            });
        }
        let dir = self.git_dir.join("objects").join(&prefix[..2]);
        let rest = &prefix[2..];
        let entries = match std::fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound { id: prefix.to_owned() });
            }
            Err(e) => return Err(Error::IoError(e)),
        };

        let mut matches = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(rest) {
                matches.push(format!("{}{name}", &prefix[..2]));
            }
        }
        match matches.len() {
            0 => Err(Error::NotFound { id: prefix.to_owned() }),
            1 => matches[0].parse(),
            _ => Err(Error::Ambiguous { prefix: prefix.to_owned() }),
        }
    }

    /// Parse a tree object's payload into its entries.
    pub fn parse_tree(payload: &[u8]) -> Result<Vec<TreeEntry>, Error> {
        let mut entries = Vec::new();
        let mut i = 0;
        while i < payload.len() {
            let space = payload[i..]
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::Corrupt {
                    message: "tree entry missing mode separator".to_owned(),
                })?
                + i;
            let mode_str = std::str::from_utf8(&payload[i..space]).map_err(|e| Error::Corrupt {
                message: format!("tree entry mode not utf8: {e}"),
            })?;
            let mode = EntryMode::from_tree_str(mode_str)?;

            let nul = payload[space + 1..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::Corrupt {
                    message: "tree entry missing name terminator".to_owned(),
                })?
                + space
                + 1;
            let name = std::str::from_utf8(&payload[space + 1..nul])
                .map_err(|e| Error::Corrupt {
                    message: format!("tree entry name not utf8: {e}"),
                })?
                .to_owned();

            let sha_start = nul + 1;
            let sha_end = sha_start + 20;
            if sha_end > payload.len() {
                return Err(Error::Corrupt {
                    message: "tree entry truncated sha".to_owned(),
                });
            }
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(&payload[sha_start..sha_end]);
            entries.push(TreeEntry {
                name,
                mode,
                id: ObjectId::from_bytes(bytes),
            });
            i = sha_end;
        }
        Ok(entries)
    }

    /// Serialize tree entries into a tree object's payload. Entries need
    /// not be pre-sorted; this function sorts them per the tree-sort rule.
    #[must_use]
    pub fn serialize_tree(entries: &[TreeEntry]) -> Vec<u8> {
        let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
        sorted.sort_by(|a, b| tree_sort_key(a).cmp(&tree_sort_key(b)));
        let mut out = Vec::new();
        for entry in sorted {
            out.extend_from_slice(entry.mode.as_tree_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    /// Parse a commit object's payload.
    pub fn parse_commit(payload: &[u8]) -> Result<Commit, Error> {
        let sep = find_double_newline(payload).ok_or_else(|| Error::Corrupt {
            message: "commit missing header/message separator".to_owned(),
        })?;
        let header = std::str::from_utf8(&payload[..sep]).map_err(|e| Error::Corrupt {
            message: format!("commit header not utf8: {e}"),
        })?;
        let message = String::from_utf8_lossy(&payload[sep + 2..]).into_owned();

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;
        for line in header.lines() {
            let (key, value) = line.split_once(' ').ok_or_else(|| Error::Corrupt {
                message: format!("commit header line missing space: {line:?}"),
            })?;
            match key {
                "tree" => tree = Some(value.parse::<ObjectId>()?),
                "parent" => parents.push(value.parse::<ObjectId>()?),
                "author" => author = Some(value.parse::<Identity>()?),
                "committer" => committer = Some(value.parse::<Identity>()?),
                other => {
                    return Err(Error::Corrupt {
                        message: format!("unknown commit header key '{other}'"),
                    });
                }
            }
        }
        Ok(Commit {
            tree: tree.ok_or_else(|| Error::Corrupt {
                message: "commit missing tree header".to_owned(),
            })?,
            parents,
            author: author.ok_or_else(|| Error::Corrupt {
                message: "commit missing author header".to_owned(),
            })?,
            committer: committer.ok_or_else(|| Error::Corrupt {
                message: "commit missing committer header".to_owned(),
            })?,
            message,
        })
    }

    /// Serialize a commit into its payload bytes.
    #[must_use]
    pub fn serialize_commit(commit: &Commit) -> Vec<u8> {
        let mut out = format!("tree {}\n", commit.tree);
        for parent in &commit.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", commit.author));
        out.push_str(&format!("committer {}\n", commit.committer));
        out.push('\n');
        out.push_str(&commit.message);
        out.into_bytes()
    }

    /// Parse a tag object's payload.
    pub fn parse_tag(payload: &[u8]) -> Result<Tag, Error> {
        let sep = find_double_newline(payload).ok_or_else(|| Error::Corrupt {
            message: "tag missing header/message separator".to_owned(),
        })?;
        let header = std::str::from_utf8(&payload[..sep]).map_err(|e| Error::Corrupt {
            message: format!("tag header not utf8: {e}"),
        })?;
        let message = String::from_utf8_lossy(&payload[sep + 2..]).into_owned();

        let mut object = None;
        let mut target_kind = None;
        let mut tag = None;
        let mut tagger = None;
        for line in header.lines() {
            let (key, value) = line.split_once(' ').ok_or_else(|| Error::Corrupt {
                message: format!("tag header line missing space: {line:?}"),
            })?;
            match key {
                "object" => object = Some(value.parse::<ObjectId>()?),
                "type" => target_kind = Some(value.parse::<ObjectKind>()?),
                "tag" => tag = Some(value.to_owned()),
                "tagger" => tagger = Some(value.parse::<Identity>()?),
                other => {
                    return Err(Error::Corrupt {
                        message: format!("unknown tag header key '{other}'"),
                    });
                }
            }
        }
        Ok(Tag {
            object: object.ok_or_else(|| Error::Corrupt {
                message: "tag missing object header".to_owned(),
            })?,
            target_kind: target_kind.ok_or_else(|| Error::Corrupt {
                message: "tag missing type header".to_owned(),
            })?,
            tag: tag.ok_or_else(|| Error::Corrupt {
                message: "tag missing tag header".to_owned(),
            })?,
            tagger: tagger.ok_or_else(|| Error::Corrupt {
                message: "tag missing tagger header".to_owned(),
            })?,
            message,
        })
    }

    /// Serialize a tag into its payload bytes.
    #[must_use]
    pub fn serialize_tag(tag: &Tag) -> Vec<u8> {
        let mut out = format!("object {}\n", tag.object);
        out.push_str(&format!("type {}\n", tag.target_kind));
        out.push_str(&format!("tag {}\n", tag.tag));
        out.push_str(&format!("tagger {}\n", tag.tagger));
        out.push('\n');
        out.push_str(&tag.message);
        out.into_bytes()
    }

    /// Follow a commit or tag id to the tree it denotes. Tags may chain
    /// through other tags.
    pub fn tree_of(&self, id: ObjectId) -> Result<ObjectId, Error> {
        let (kind, payload) = self.read_object(id)?;
        match kind {
            ObjectKind::Tree => Ok(id),
            ObjectKind::Commit => Ok(Self::parse_commit(&payload)?.tree),
            ObjectKind::Tag => {
                let tag = Self::parse_tag(&payload)?;
                self.tree_of(tag.object)
            }
            ObjectKind::Blob => Err(Error::WrongKind {
                expected: "commit, tree, or tag".to_owned(),
                got: "blob".to_owned(),
            }),
        }
    }

    /// Depth-first, explicit-worklist walk of every non-tree entry
    /// reachable from `tree_id`, keyed by `/`-separated path.
    pub fn walk_tree(&self, tree_id: ObjectId) -> Result<BTreeMap<String, (ObjectId, EntryMode)>, Error> {
        let mut result = BTreeMap::new();
        let mut worklist: Vec<(String, ObjectId)> = vec![(String::new(), tree_id)];
        while let Some((prefix, id)) = worklist.pop() {
            let (kind, payload) = self.read_object(id)?;
            if kind != ObjectKind::Tree {
                return Err(Error::WrongKind {
                    expected: "tree".to_owned(),
                    got: kind.to_string(),
                });
            }
            for entry in Self::parse_tree(&payload)? {
                let path = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{prefix}/{}", entry.name)
                };
                if entry.mode.is_tree() {
                    worklist.push((path, entry.id));
                } else {
                    result.insert(path, (entry.id, entry.mode));
                }
            }
        }
        Ok(result)
    }
}

fn find_double_newline(payload: &[u8]) -> Option<usize> {
    payload.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Identity;

    fn ident(n: &str) -> Identity {
        Identity {
            name: n.to_owned(),
            email: format!("{n}@example.com"),
            timestamp: 1_700_000_000,
            tz_offset: "+0000".to_owned(),
        }
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id = repo.write_object(ObjectKind::Blob, b"hello\n").unwrap();
        assert_eq!(id.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let (kind, payload) = repo.read_object(id).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"hello\n");
    }

    #[test]
    fn write_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let a = repo.write_object(ObjectKind::Blob, b"same").unwrap();
        let b = repo.write_object(ObjectKind::Blob, b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let id: ObjectId = "a".repeat(40).parse().unwrap();
        assert!(matches!(repo.read_object(id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn tree_roundtrip_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let blob = repo.write_object(ObjectKind::Blob, b"x").unwrap();
        let entries = vec![
            TreeEntry { name: "foo.txt".into(), mode: EntryMode::Regular, id: blob },
            TreeEntry { name: "foo".into(), mode: EntryMode::Tree, id: blob },
        ];
        let payload = Repository::serialize_tree(&entries);
        let parsed = Repository::parse_tree(&payload).unwrap();
        assert_eq!(parsed[0].name, "foo.txt");
        assert_eq!(parsed[1].name, "foo");
    }

    #[test]
    fn commit_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let blob = repo.write_object(ObjectKind::Blob, b"x").unwrap();
        let commit = Commit {
            tree: blob,
            parents: vec![],
            author: ident("a"),
            committer: ident("c"),
            message: "first\n".to_owned(),
        };
        let payload = Repository::serialize_commit(&commit);
        let parsed = Repository::parse_commit(&payload).unwrap();
        assert_eq!(parsed, commit);
    }

    #[test]
    fn expand_short_disambiguates() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        // Find two payloads whose blob ids share a 4-char prefix by brute force
        // over small integers is too slow for a unit test; instead verify the
        // unique-match and not-found paths, which do not require a collision.
        let id = repo.write_object(ObjectKind::Blob, b"unique content").unwrap();
        let hex = id.to_hex();
        let resolved = repo.expand_short(&hex[..8]).unwrap();
        assert_eq!(resolved, id);
        assert!(matches!(repo.expand_short("deadbeef"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn walk_tree_covers_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let blob = repo.write_object(ObjectKind::Blob, b"x").unwrap();
        let inner = Repository::serialize_tree(&[TreeEntry {
            name: "b.txt".into(),
            mode: EntryMode::Regular,
            id: blob,
        }]);
        let inner_id = repo.write_object(ObjectKind::Tree, &inner).unwrap();
        let outer = Repository::serialize_tree(&[
            TreeEntry { name: "a.txt".into(), mode: EntryMode::Regular, id: blob },
            TreeEntry { name: "sub".into(), mode: EntryMode::Tree, id: inner_id },
        ]);
        let outer_id = repo.write_object(ObjectKind::Tree, &outer).unwrap();
        let walked = repo.walk_tree(outer_id).unwrap();
        assert_eq!(walked.len(), 2);
        assert_eq!(walked["a.txt"].0, blob);
        assert_eq!(walked["sub/b.txt"].0, blob);
    }
}
