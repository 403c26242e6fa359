use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// the two collection shapes the engine supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    Text,
    Geo,
}

/// a collection's lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    Created,
    Active,
    Dropped,
}

impl CollectionState {
    /// the only legal forward transitions are `Created -> Active -> Dropped`.
    /// re-creation under the same name is a fresh `Collection`, not a
    /// transition back to `Created`.
    pub fn transition(self, to: CollectionState) -> Result<CollectionState> {
        use CollectionState::*;
        match (self, to) {
            (Created, Active) | (Active, Dropped) => Ok(to),
            _ => Err(Error::InvalidSchema(format!(
                "illegal collection state transition: {self:?} -> {to:?}"
            ))),
        }
    }
}

/// a field type a collection schema can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Tag,
    Numeric,
    Text,
    Vector,
    GeoLat,
    GeoLon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// a named container for documents sharing a schema and vector space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub collection_type: CollectionType,
    pub fields: Vec<Field>,
    pub vector_dim: u32,
    pub created_at_millis: i64,
    pub revision: u64,
    pub state: CollectionState,
}

impl Collection {
    /// construct a text collection, validating name/field/dimension
    /// invariants up front so an invalid `Collection` can never exist.
    pub fn new_text(
        name: impl Into<String>,
        fields: Vec<Field>,
        vector_dim: u32,
        created_at_millis: i64,
    ) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        Self::validate_fields(&fields)?;
        if vector_dim == 0 {
            return Err(Error::InvalidSchema(
                "vector dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            name,
            collection_type: CollectionType::Text,
            fields,
            vector_dim,
            created_at_millis,
            revision: 0,
            state: CollectionState::Created,
        })
    }

    /// construct a geo collection: implicit 3-D vector, reserved
    /// `latitude`/`longitude` numeric fields. additional caller-supplied
    /// fields (e.g. a `category` tag) are appended.
    pub fn new_geo(
        name: impl Into<String>,
        mut extra_fields: Vec<Field>,
        created_at_millis: i64,
    ) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        let mut fields = vec![
            Field::new("latitude", FieldKind::GeoLat),
            Field::new("longitude", FieldKind::GeoLon),
        ];
        fields.append(&mut extra_fields);
        Self::validate_fields(&fields)?;
        Ok(Self {
            name,
            collection_type: CollectionType::Geo,
            fields,
            vector_dim: 3,
            created_at_millis,
            revision: 0,
            state: CollectionState::Created,
        })
    }

    fn validate_name(name: &str) -> Result<()> {
        if super::is_valid_collection_name(name) {
            Ok(())
        } else {
            Err(Error::InvalidSchema(format!(
                "collection name must match [A-Za-z0-9_-]{{1,64}}: {name:?}"
            )))
        }
    }

    fn validate_fields(fields: &[Field]) -> Result<()> {
        let mut seen = HashSet::new();
        for field in fields {
            if !seen.insert(&field.name) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate field name: {}",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn activate(&mut self) -> Result<()> {
        self.state = self.state.transition(CollectionState::Active)?;
        self.revision += 1;
        Ok(())
    }

    pub fn drop_collection(&mut self) -> Result<()> {
        self.state = self.state.transition(CollectionState::Dropped)?;
        self.revision += 1;
        Ok(())
    }

    pub fn is_geo(&self) -> bool {
        self.collection_type == CollectionType::Geo
    }
}
