//! collection/field/document value objects and validation
//!
//! plain, `serde`-derived value structs with their own validation methods.

mod collection;
mod document;

pub use collection::{Collection, CollectionState, CollectionType, Field, FieldKind};
pub use document::Document;

/// `^[A-Za-z0-9_-]{1,64}$`, checked without pulling in a regex dependency
/// since the grammar is this simple.
pub(crate) fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// reserved document ids that collide with the codec's own namespace
pub(crate) fn is_reserved_document_id(id: &str) -> bool {
    id.is_empty() || id.starts_with("__")
}

/// validate a filter expression against a collection's declared fields:
/// every key must be declared, tag-match conditions only over tag fields,
/// range conditions only over numeric fields.
pub fn validate_filter_against_schema(
    collection: &Collection,
    expression: &crate::expr::Expression,
) -> crate::error::Result<()> {
    use crate::error::Error;
    use crate::expr::Condition;

    let check = |condition: &Condition| -> crate::error::Result<()> {
        match condition {
            Condition::TagMatch { key, .. } => match collection.field(key) {
                Some(f) if f.kind == FieldKind::Tag => Ok(()),
                Some(_) => Err(Error::InvalidSchema(format!(
                    "tag-match condition over non-tag field: {key:?}"
                ))),
                None => Err(Error::InvalidSchema(format!("undeclared field: {key:?}"))),
            },
            Condition::NumericRange { key, .. } => match collection.field(key) {
                Some(f) if f.kind == FieldKind::Numeric || f.kind == FieldKind::GeoLat || f.kind == FieldKind::GeoLon => {
                    Ok(())
                }
                Some(_) => Err(Error::InvalidSchema(format!(
                    "range condition over non-numeric field: {key:?}"
                ))),
                None => Err(Error::InvalidSchema(format!("undeclared field: {key:?}"))),
            },
        }
    };

    for condition in expression
        .must()
        .iter()
        .chain(expression.should())
        .chain(expression.must_not())
    {
        check(condition)?;
    }
    Ok(())
}
