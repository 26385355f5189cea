//! L0: SHA-1 framing and zlib compression over object payloads.
//!
//! Every other layer depends on this one. The framing format is fixed by
//! spec.md §3: `"<kind> <decimal-length>\0<payload>"`, hashed with SHA-1 and
//! stored zlib-compressed.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use sha1::{Digest, Sha1};

use crate::error::Error;
use crate::types::{ObjectId, ObjectKind};

/// Build the framed byte sequence `"<kind> <len>\0<payload>"`.
#[must_use]
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.as_str(), payload.len());
    let mut framed = Vec::with_capacity(header.len() + payload.len());
    framed.extend_from_slice(header.as_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// The SHA-1 id of a kind+payload pair, without touching disk.
#[must_use]
pub fn hash(kind: ObjectKind, payload: &[u8]) -> ObjectId {
    hash_framed(&frame(kind, payload))
}

/// The SHA-1 id of already-framed bytes.
#[must_use]
pub fn hash_framed(framed: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(framed);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest);
    ObjectId::from_bytes(bytes)
}

/// zlib-deflate `data`.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish().map_err(Error::IoError)
}

/// zlib-inflate `data`.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, Error> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| Error::Corrupt {
        message: format!("zlib inflate failed: {e}"),
    })?;
    Ok(out)
}

/// Parse a frame back into `(kind, payload)`, validating the declared length.
pub fn parse_frame(framed: &[u8]) -> Result<(ObjectKind, &[u8]), Error> {
    let space = framed.iter().position(|&b| b == b' ').ok_or_else(|| Error::Corrupt {
        message: "object frame missing space separator".to_owned(),
    })?;
    let nul = framed.iter().position(|&b| b == 0).ok_or_else(|| Error::Corrupt {
        message: "object frame missing NUL separator".to_owned(),
    })?;
    if nul < space {
        return Err(Error::Corrupt {
            message: "object frame has NUL before space".to_owned(),
        });
    }
    let kind_str = std::str::from_utf8(&framed[..space]).map_err(|e| Error::Corrupt {
        message: format!("object frame kind not utf8: {e}"),
    })?;
    let kind: ObjectKind = kind_str.parse()?;
    let len_str = std::str::from_utf8(&framed[space + 1..nul]).map_err(|e| Error::Corrupt {
        message: format!("object frame length not utf8: {e}"),
    })?;
    let len: usize = len_str.parse().map_err(|e| Error::Corrupt {
        message: format!("object frame length not a number: {e}"),
    })?;
    let payload = &framed[nul + 1..];
    if payload.len() != len {
        return Err(Error::Corrupt {
            message: format!(
                "object frame length mismatch: header says {len}, payload is {}",
                payload.len()
            ),
        });
    }
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable() {
        let a = hash(ObjectKind::Blob, b"hello\n");
        let b = hash(ObjectKind::Blob, b"hello\n");
        assert_eq!(a, b);
    }

    #[test]
    fn known_blob_hash() {
        // git hash-object for "hello\n" is a well-known value.
        let id = hash(ObjectKind::Blob, b"hello\n");
        assert_eq!(id.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn compress_roundtrip() {
        let data = b"some payload bytes".repeat(50);
        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn frame_roundtrip() {
        let framed = frame(ObjectKind::Blob, b"content");
        let (kind, payload) = parse_frame(&framed).unwrap();
        assert_eq!(kind, ObjectKind::Blob);
        assert_eq!(payload, b"content");
    }

    #[test]
    fn frame_rejects_length_mismatch() {
        let mut framed = frame(ObjectKind::Blob, b"content");
        framed.push(b'x');
        assert!(parse_frame(&framed).is_err());
    }
}
