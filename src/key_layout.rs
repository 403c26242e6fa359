//! persisted-key formatting
//!
//! every backend key this crate ever writes or reads is formatted through
//! one of these functions. no other module is allowed to format a key by
//! hand, so the `prefix` configuration value (default `"vecdex:"`) never
//! gets hardcoded below this layer.

pub struct KeyLayout;

impl KeyLayout {
    pub fn document(prefix: &str, collection: &str, id: &str) -> String {
        format!("{prefix}{collection}:{id}")
    }

    pub fn collection_index(prefix: &str, collection: &str) -> String {
        format!("{prefix}{collection}:idx")
    }

    pub fn collection_meta(prefix: &str, name: &str) -> String {
        format!("{prefix}collection:{name}")
    }

    pub fn embedding_cache(prefix: &str, text_sha256_hex: &str) -> String {
        format!("{prefix}emb_cache:{text_sha256_hex}")
    }

    pub fn budget_daily(prefix: &str, provider: &str, date: &str) -> String {
        format!("{prefix}budget:{provider}:daily:{date}")
    }

    pub fn budget_monthly(prefix: &str, provider: &str, month: &str) -> String {
        format!("{prefix}budget:{provider}:monthly:{month}")
    }
}
