//! collection metadata persistence
//!
//! a collection metadata hash lives at `{prefix}collection:{name}` with
//! `name`, `type`, `fields_json`, `vector_dim`, `created_at`; this module is
//! the encode/decode pair plus the create/load/drop operations: an atomic
//! pair (write the metadata record, then create the secondary index in the
//! backend) with best-effort rollback if index creation fails.

use crate::error::{Error, Result};
use crate::key_layout::KeyLayout;
use crate::repository::{HashRepository, IndexDef, IndexFieldDef, IndexFieldKind, IndexRepository};
use crate::schema::{Collection, CollectionState, CollectionType, Field, FieldKind};
use std::collections::BTreeMap;

fn field_kind_to_index_kind(kind: FieldKind, vector_dim: u32) -> IndexFieldKind {
    match kind {
        FieldKind::Tag => IndexFieldKind::Tag,
        FieldKind::Numeric | FieldKind::GeoLat | FieldKind::GeoLon => IndexFieldKind::Numeric,
        FieldKind::Text => IndexFieldKind::Text,
        FieldKind::Vector => IndexFieldKind::Vector { dim: vector_dim },
    }
}

fn index_def_for(collection: &Collection, prefix: &str) -> IndexDef {
    let mut fields: Vec<IndexFieldDef> = collection
        .fields
        .iter()
        .map(|f| IndexFieldDef {
            name: f.name.clone(),
            kind: field_kind_to_index_kind(f.kind, collection.vector_dim),
        })
        .collect();
    fields.push(IndexFieldDef {
        name: "vector".to_string(),
        kind: IndexFieldKind::Vector {
            dim: collection.vector_dim,
        },
    });

    IndexDef {
        name: KeyLayout::collection_index(prefix, &collection.name),
        key_prefix: format!("{prefix}{}:", collection.name),
        fields,
    }
}

fn state_str(state: CollectionState) -> &'static str {
    match state {
        CollectionState::Created => "created",
        CollectionState::Active => "active",
        CollectionState::Dropped => "dropped",
    }
}

fn parse_state(raw: &str) -> Result<CollectionState> {
    match raw {
        "created" => Ok(CollectionState::Created),
        "active" => Ok(CollectionState::Active),
        "dropped" => Ok(CollectionState::Dropped),
        other => Err(Error::InvalidSchema(format!(
            "unknown collection state: {other:?}"
        ))),
    }
}

fn encode_meta(collection: &Collection) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut hash = BTreeMap::new();
    hash.insert("name".to_string(), collection.name.clone().into_bytes());
    let type_str = match collection.collection_type {
        CollectionType::Text => "text",
        CollectionType::Geo => "geo",
    };
    hash.insert("type".to_string(), type_str.as_bytes().to_vec());
    let fields_json = serde_json::to_vec(&collection.fields)
        .map_err(|e| Error::InvalidSchema(format!("failed to encode fields_json: {e}")))?;
    hash.insert("fields_json".to_string(), fields_json);
    hash.insert(
        "vector_dim".to_string(),
        collection.vector_dim.to_string().into_bytes(),
    );
    hash.insert(
        "created_at".to_string(),
        collection.created_at_millis.to_string().into_bytes(),
    );
    hash.insert(
        "revision".to_string(),
        collection.revision.to_string().into_bytes(),
    );
    hash.insert(
        "state".to_string(),
        state_str(collection.state).as_bytes().to_vec(),
    );
    Ok(hash)
}

fn decode_meta(name: &str, hash: &BTreeMap<String, Vec<u8>>) -> Result<Collection> {
    let field = |key: &str| -> Result<&Vec<u8>> {
        hash.get(key)
            .ok_or_else(|| Error::InvalidSchema(format!("collection metadata missing field {key:?}")))
    };
    let utf8 = |bytes: &[u8]| -> Result<&str> {
        std::str::from_utf8(bytes).map_err(|e| Error::InvalidSchema(e.to_string()))
    };

    let collection_type = match utf8(field("type")?)? {
        "text" => CollectionType::Text,
        "geo" => CollectionType::Geo,
        other => return Err(Error::InvalidSchema(format!("unknown collection type: {other:?}"))),
    };
    let fields: Vec<Field> = serde_json::from_slice(field("fields_json")?)
        .map_err(|e| Error::InvalidSchema(format!("failed to decode fields_json: {e}")))?;
    let vector_dim: u32 = utf8(field("vector_dim")?)?
        .parse()
        .map_err(|e: std::num::ParseIntError| Error::InvalidSchema(e.to_string()))?;
    let created_at_millis: i64 = utf8(field("created_at")?)?
        .parse()
        .map_err(|e: std::num::ParseIntError| Error::InvalidSchema(e.to_string()))?;
    let revision: u64 = hash
        .get("revision")
        .map(|b| utf8(b))
        .transpose()?
        .map(|s| s.parse().unwrap_or(0))
        .unwrap_or(0);
    let state = hash
        .get("state")
        .map(|b| utf8(b))
        .transpose()?
        .map(parse_state)
        .transpose()?
        .unwrap_or(CollectionState::Created);

    Ok(Collection {
        name: name.to_string(),
        collection_type,
        fields,
        vector_dim,
        created_at_millis,
        revision,
        state,
    })
}

/// load a collection's metadata, failing `NotFound` if it has never been
/// created.
pub async fn load_collection<H: HashRepository>(
    hash_repo: &H,
    prefix: &str,
    name: &str,
) -> Result<Collection> {
    let key = KeyLayout::collection_meta(prefix, name);
    let hash = hash_repo
        .get_all(&key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("collection {name:?}")))?;
    decode_meta(name, &hash)
}

/// create a collection: write the metadata record, create the secondary
/// index, then activate. `AlreadyExists` if the metadata key is already
/// present. if index creation fails, the metadata record is deleted
/// best-effort.
pub async fn create_collection<H: HashRepository, I: IndexRepository>(
    hash_repo: &H,
    index_repo: &I,
    prefix: &str,
    collection: Collection,
) -> Result<Collection> {
    let meta_key = KeyLayout::collection_meta(prefix, &collection.name);
    if hash_repo.exists(&meta_key).await? {
        return Err(Error::AlreadyExists(collection.name.clone()));
    }

    hash_repo.set_all(&meta_key, encode_meta(&collection)?).await?;

    let def = index_def_for(&collection, prefix);
    if let Err(e) = index_repo.create(def).await {
        let _ = hash_repo.delete(&meta_key).await;
        return Err(e.into());
    }

    let mut activated = collection;
    activated.activate()?;
    hash_repo.set_all(&meta_key, encode_meta(&activated)?).await?;
    Ok(activated)
}

/// drop a collection: transition its state to `Dropped`, drop the backend
/// index, then persist the new state. re-creation under the same name
/// starts a fresh `Created` collection (`Collection::new_text`/`new_geo`),
/// not a transition back out of `Dropped`.
pub async fn drop_collection<H: HashRepository, I: IndexRepository>(
    hash_repo: &H,
    index_repo: &I,
    prefix: &str,
    name: &str,
) -> Result<()> {
    let mut collection = load_collection(hash_repo, prefix, name).await?;
    collection.drop_collection()?;

    index_repo.drop(&KeyLayout::collection_index(prefix, name)).await?;

    let meta_key = KeyLayout::collection_meta(prefix, name);
    hash_repo.set_all(&meta_key, encode_meta(&collection)?).await?;
    Ok(())
}
