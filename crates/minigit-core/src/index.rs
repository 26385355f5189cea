//! L4: the binary staging index (spec.md §4.4).
//!
//! Mirrors git's `DIRC` version-2 index format: a 12-byte header, entries
//! sorted by path and packed with NUL padding to an 8-byte boundary, and a
//! trailing SHA-1 checksum of everything before it.

use std::collections::BTreeMap;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::repo::{Repository, write_atomic};
use crate::types::{EntryMode, IndexEntry, ObjectId, TreeEntry};

const SIGNATURE: &[u8; 4] = b"DIRC";
const VERSION: u32 = 2;

/// The staging index: a path-sorted set of entries.
#[derive(Clone, Debug, Default)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.path.clone(), entry);
    }

    pub fn remove(&mut self, path: &str) -> Option<IndexEntry> {
        self.entries.remove(path)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// Entries in path-sorted order (the `BTreeMap` already guarantees this).
    pub fn sorted_entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the on-disk `DIRC` byte format.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(SIGNATURE);
        out.extend_from_slice(&VERSION.to_be_bytes());
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for entry in self.entries.values() {
            let start = out.len();
            out.extend_from_slice(&entry.ctime_s.to_be_bytes());
            out.extend_from_slice(&entry.ctime_ns.to_be_bytes());
            out.extend_from_slice(&entry.mtime_s.to_be_bytes());
            out.extend_from_slice(&entry.mtime_ns.to_be_bytes());
            out.extend_from_slice(&entry.dev.to_be_bytes());
            out.extend_from_slice(&entry.ino.to_be_bytes());
            out.extend_from_slice(&entry.mode.as_index_u32().to_be_bytes());
            out.extend_from_slice(&entry.uid.to_be_bytes());
            out.extend_from_slice(&entry.gid.to_be_bytes());
            out.extend_from_slice(&entry.size.to_be_bytes());
            out.extend_from_slice(entry.id.as_bytes());
            #[allow(clippy::cast_possible_truncation)]
            out.extend_from_slice(&(entry.path.len() as u16).to_be_bytes());
            out.extend_from_slice(entry.path.as_bytes());
            out.push(0);
            let written = out.len() - start;
            let padded = written.div_ceil(8) * 8;
            out.resize(out.len() + (padded - written), 0);
        }

        let mut hasher = Sha1::new();
        hasher.update(&out);
        let checksum = hasher.finalize();
        out.extend_from_slice(&checksum);
        out
    }

    /// Parse the on-disk `DIRC` byte format, verifying the trailing checksum.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 32 {
            return Err(Error::Truncated("index shorter than header+checksum".to_owned()));
        }
        let (body, checksum) = bytes.split_at(bytes.len() - 20);
        let mut hasher = Sha1::new();
        hasher.update(body);
        if hasher.finalize().as_slice() != checksum {
            return Err(Error::ChecksumMismatch);
        }

        if &body[0..4] != SIGNATURE {
            return Err(Error::BadSignature);
        }
        let version = u32::from_be_bytes(body[4..8].try_into().expect("slice of length 4"));
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let count = u32::from_be_bytes(body[8..12].try_into().expect("slice of length 4"));

        let mut index = Self::new();
        let mut cursor = 12usize;
        for _ in 0..count {
            let start = cursor;
            let field = |off: usize| -> Result<u32, Error> {
                let s = start + off;
                body.get(s..s + 4)
                    .map(|b| u32::from_be_bytes(b.try_into().expect("slice of length 4")))
                    .ok_or_else(|| Error::Truncated("index entry truncated".to_owned()))
            };
            let ctime_s = field(0)?;
            let ctime_ns = field(4)?;
            let mtime_s = field(8)?;
            let mtime_ns = field(12)?;
            let dev = field(16)?;
            let ino = field(20)?;
            let mode_raw = field(24)?;
            let uid = field(28)?;
            let gid = field(32)?;
            let size = field(36)?;
            let id_bytes = body
                .get(start + 40..start + 60)
                .ok_or_else(|| Error::Truncated("index entry id truncated".to_owned()))?;
            let mut id_arr = [0u8; 20];
            id_arr.copy_from_slice(id_bytes);
            let id = ObjectId::from_bytes(id_arr);
            let name_len_bytes: [u8; 2] = body
                .get(start + 60..start + 62)
                .ok_or_else(|| Error::Truncated("index entry name length truncated".to_owned()))?
                .try_into()
                .expect("slice of length 2");
            let name_len = u16::from_be_bytes(name_len_bytes) as usize;
            let name_start = start + 62;
            let name_bytes = body
                .get(name_start..name_start + name_len)
                .ok_or_else(|| Error::Truncated("index entry name truncated".to_owned()))?;
            let path = std::str::from_utf8(name_bytes)
                .map_err(|e| Error::Corrupt {
                    message: format!("index entry path not utf8: {e}"),
                })?
                .to_owned();

            let written = 62 + name_len;
            let padded = written.div_ceil(8) * 8;
            cursor = start + padded;

            index.upsert(IndexEntry {
                ctime_s,
                ctime_ns,
                mtime_s,
                mtime_ns,
                dev,
                ino,
                mode: EntryMode::from_index_u32(mode_raw)?,
                uid,
                gid,
                size,
                id,
                path,
            });
        }
        Ok(index)
    }
}

impl Repository {
    fn index_path(&self) -> std::path::PathBuf {
        self.git_dir.join("index")
    }

    /// Read the current index, or an empty one if none has been written yet.
    pub fn read_index(&self) -> Result<Index, Error> {
        let path = self.index_path();
        match std::fs::read(&path) {
            Ok(bytes) => Index::deserialize(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Index::new()),
            Err(e) => Err(Error::IoError(e)),
        }
    }

    /// Write the index atomically.
    pub fn write_index(&self, index: &Index) -> Result<(), Error> {
        write_atomic(&self.index_path(), &index.serialize())
    }

    /// Build a root tree object from the index contents, writing every
    /// intermediate tree object along the way. Deterministic regardless of
    /// the order entries were inserted into the index.
    pub fn build_root_tree(&self, index: &Index) -> Result<ObjectId, Error> {
        #[derive(Default)]
        struct Node {
            files: Vec<TreeEntry>,
            dirs: BTreeMap<String, Node>,
        }

        let mut root = Node::default();
        for entry in index.sorted_entries() {
            let mut node = &mut root;
            let mut components: Vec<&str> = entry.path.split('/').collect();
            let file_name = components.pop().expect("path always has at least one component");
            for dir in components {
                node = node.dirs.entry(dir.to_owned()).or_default();
            }
            node.files.push(TreeEntry {
                name: file_name.to_owned(),
                mode: entry.mode,
                id: entry.id,
            });
        }

        fn write_node(repo: &Repository, node: Node) -> Result<ObjectId, Error> {
            let mut entries = node.files;
            for (name, child) in node.dirs {
                let id = write_node(repo, child)?;
                entries.push(TreeEntry {
                    name,
                    mode: EntryMode::Tree,
                    id,
                });
            }
            let payload = Repository::serialize_tree(&entries);
            repo.write_object(crate::types::ObjectKind::Tree, &payload)
        }

        write_node(self, root)
    }

    /// Build an `IndexEntry` for a file on disk, hashing and writing its
    /// blob object as a side effect.
    pub fn stage_file(&self, repo_relative_path: &str, absolute_path: &Path) -> Result<IndexEntry, Error> {
        let metadata = std::fs::symlink_metadata(absolute_path)?;
        let mode = entry_mode_for(&metadata, absolute_path)?;
        let content = if mode == EntryMode::Symlink {
            let target = std::fs::read_link(absolute_path)?;
            target.to_string_lossy().into_owned().into_bytes()
        } else {
            std::fs::read(absolute_path)?
        };
        let id = self.write_object(crate::types::ObjectKind::Blob, &content)?;

        #[cfg(unix)]
        let (dev, ino, uid, gid) = {
            use std::os::unix::fs::MetadataExt;
            (
                metadata.dev() as u32,
                metadata.ino() as u32,
                metadata.uid(),
                metadata.gid(),
            )
        };
        #[cfg(not(unix))]
        let (dev, ino, uid, gid) = (0u32, 0u32, 0u32, 0u32);

        let (mtime_s, mtime_ns) = mtime_parts(&metadata);

        Ok(IndexEntry {
            ctime_s: mtime_s,
            ctime_ns: mtime_ns,
            mtime_s,
            mtime_ns,
            dev,
            ino,
            mode,
            uid,
            gid,
            #[allow(clippy::cast_possible_truncation)]
            size: content.len() as u32,
            id,
            path: repo_relative_path.to_owned(),
        })
    }
}

#[cfg(unix)]
fn entry_mode_for(metadata: &std::fs::Metadata, _path: &Path) -> Result<EntryMode, Error> {
    use std::os::unix::fs::PermissionsExt;
    if metadata.file_type().is_symlink() {
        return Ok(EntryMode::Symlink);
    }
    let perms = metadata.permissions().mode();
    if perms & 0o111 != 0 {
        Ok(EntryMode::Executable)
    } else {
        Ok(EntryMode::Regular)
    }
}

#[cfg(not(unix))]
fn entry_mode_for(metadata: &std::fs::Metadata, _path: &Path) -> Result<EntryMode, Error> {
    if metadata.file_type().is_symlink() {
        Ok(EntryMode::Symlink)
    } else {
        Ok(EntryMode::Regular)
    }
}

#[cfg(unix)]
fn mtime_parts(metadata: &std::fs::Metadata) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    (metadata.mtime() as u32, metadata.mtime_nsec() as u32)
}

#[cfg(not(unix))]
fn mtime_parts(metadata: &std::fs::Metadata) -> (u32, u32) {
    let secs = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs());
    #[allow(clippy::cast_possible_truncation)]
    (secs as u32, 0)
}
