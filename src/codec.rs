//! document <-> backend hash encode/decode, and the shared little-endian
//! `f32[]` vector byte layout
//!
//! the same `pack_vector`/`unpack_vector` pair backs both document vectors
//! and the embedding cache value.

use crate::error::{Error, Result};
use crate::schema::Document;
use std::collections::BTreeMap;

pub const FIELD_CONTENT: &str = "__content";
pub const FIELD_VECTOR: &str = "__vector";
pub const NUMERIC_PREFIX: &str = "__n:";

/// pack an `f32` vector into its little-endian byte representation. this is
/// both the document-vector wire format and the embedding-cache value
/// format.
pub fn pack_vector(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// unpack a little-endian `f32` vector, rejecting a byte length not
/// divisible by 4.
pub fn unpack_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::InvalidSchema(format!(
            "vector byte length {} is not divisible by 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// encode a document into the backend's flat hash representation:
/// `__content`, packed `__vector`, each tag as `tag_name -> value`, each
/// numeric as `__n:name -> decimal`.
pub fn encode(document: &Document) -> BTreeMap<String, Vec<u8>> {
    let mut hash = BTreeMap::new();
    hash.insert(FIELD_CONTENT.to_string(), document.content.clone().into_bytes());
    if let Some(vector) = &document.vector {
        hash.insert(FIELD_VECTOR.to_string(), pack_vector(vector));
    }
    for (key, value) in &document.tags {
        hash.insert(key.clone(), value.clone().into_bytes());
    }
    for (key, value) in &document.numerics {
        // Rust's `f64` Display already produces the shortest round-trip
        // decimal representation.
        hash.insert(format!("{NUMERIC_PREFIX}{key}"), value.to_string().into_bytes());
    }
    hash
}

/// decode a backend hash back into a `Document`. any field starting with
/// `__` other than `__content`/`__vector`/`__n:*` is ignored — the backend
/// may inject auxiliary fields such as `__vector_score`.
pub fn decode(id: &str, hash: &BTreeMap<String, Vec<u8>>) -> Result<Document> {
    let mut content = String::new();
    let mut vector = None;
    let mut tags = std::collections::BTreeMap::new();
    let mut numerics = std::collections::BTreeMap::new();

    for (key, bytes) in hash {
        if key == FIELD_CONTENT {
            content = String::from_utf8(bytes.clone())
                .map_err(|e| Error::InvalidSchema(format!("content is not utf-8: {e}")))?;
        } else if key == FIELD_VECTOR {
            vector = Some(unpack_vector(bytes)?);
        } else if let Some(name) = key.strip_prefix(NUMERIC_PREFIX) {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| Error::InvalidSchema(format!("numeric is not utf-8: {e}")))?;
            let value: f64 = text
                .parse()
                .map_err(|e| Error::InvalidSchema(format!("numeric {key:?} unparsable: {e}")))?;
            numerics.insert(name.to_string(), value);
        } else if key.starts_with("__") {
            // auxiliary backend-injected field; not part of the document
            continue;
        } else {
            let value = String::from_utf8(bytes.clone())
                .map_err(|e| Error::InvalidSchema(format!("tag {key:?} is not utf-8: {e}")))?;
            tags.insert(key.clone(), value);
        }
    }

    Ok(Document {
        id: id.to_string(),
        content,
        tags,
        numerics,
        vector,
    })
}
