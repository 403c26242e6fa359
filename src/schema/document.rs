use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// maximum content size, bytes (160 KiB)
pub const MAX_CONTENT_BYTES: usize = 160 * 1024;
/// document id length bound, chars
pub const MAX_ID_CHARS: usize = 256;

/// a document: identifier, content, structured attributes, optional
/// embedding. `tags`/`numerics` use `BTreeMap` rather than `HashMap` so
/// codec round-trips and test fixtures iterate deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub tags: BTreeMap<String, String>,
    pub numerics: BTreeMap<String, f64>,
    pub vector: Option<Vec<f32>>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            tags: BTreeMap::new(),
            numerics: BTreeMap::new(),
            vector: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_numeric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.numerics.insert(key.into(), value);
        self
    }

    pub fn with_vector(mut self, vector: Vec<f32>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// validate id shape, content size, reserved-id rejection, and that
    /// tags/numerics are disjoint in name. schema-vs-field-type fit is
    /// validated separately by the caller against a `Collection`, since
    /// that check needs the collection's field list.
    pub fn validate_shape(&self) -> Result<()> {
        if self.id.is_empty() || self.id.chars().count() > MAX_ID_CHARS {
            return Err(Error::InvalidSchema(format!(
                "document id must be 1..{MAX_ID_CHARS} chars: {:?}",
                self.id
            )));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' || c == '~')
        {
            return Err(Error::InvalidSchema(format!(
                "document id must be URL-safe: {:?}",
                self.id
            )));
        }
        if crate::schema::is_reserved_document_id(&self.id) {
            return Err(Error::InvalidSchema(format!(
                "document id is reserved: {:?}",
                self.id
            )));
        }
        if self.content.len() > MAX_CONTENT_BYTES {
            return Err(Error::InvalidSchema(format!(
                "content exceeds {MAX_CONTENT_BYTES} bytes"
            )));
        }
        for key in self.tags.keys() {
            if self.numerics.contains_key(key) {
                return Err(Error::InvalidSchema(format!(
                    "key {key:?} used as both a tag and a numeric"
                )));
            }
        }
        Ok(())
    }

    /// validate that every tag/numeric key is a declared field of the
    /// matching kind.
    pub fn validate_against_schema(&self, collection: &crate::schema::Collection) -> Result<()> {
        use crate::schema::FieldKind;
        for key in self.tags.keys() {
            match collection.field(key) {
                Some(f) if f.kind == FieldKind::Tag => {}
                Some(_) => {
                    return Err(Error::InvalidSchema(format!(
                        "field {key:?} is not a tag field"
                    )))
                }
                None => {
                    return Err(Error::InvalidSchema(format!(
                        "undeclared field: {key:?}"
                    )))
                }
            }
        }
        for key in self.numerics.keys() {
            match collection.field(key) {
                Some(f) if f.kind == FieldKind::Numeric || f.kind == FieldKind::GeoLat || f.kind == FieldKind::GeoLon => {}
                Some(_) => {
                    return Err(Error::InvalidSchema(format!(
                        "field {key:?} is not a numeric field"
                    )))
                }
                None => {
                    return Err(Error::InvalidSchema(format!(
                        "undeclared field: {key:?}"
                    )))
                }
            }
        }
        if let Some(vector) = &self.vector {
            if vector.len() as u32 != collection.vector_dim {
                return Err(Error::VectorDimMismatch {
                    expected: collection.vector_dim,
                    actual: vector.len() as u32,
                });
            }
        }
        Ok(())
    }

    /// validate the `latitude`/`longitude` numerics a geo document must
    /// carry: both required, in `-90..=90`/`-180..=180` respectively.
    pub fn geo_coordinates(&self) -> Result<(f64, f64)> {
        let lat = *self
            .numerics
            .get("latitude")
            .ok_or_else(|| Error::GeoQueryInvalid("missing latitude".to_string()))?;
        let lon = *self
            .numerics
            .get("longitude")
            .ok_or_else(|| Error::GeoQueryInvalid("missing longitude".to_string()))?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(Error::GeoQueryInvalid(format!(
                "latitude out of range: {lat}"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(Error::GeoQueryInvalid(format!(
                "longitude out of range: {lon}"
            )));
        }
        Ok((lat, lon))
    }
}
