//! reciprocal rank fusion for hybrid (KNN + BM25) search results
//!
//! fuses purely by rank rather than by normalized score: `HashMap`
//! accumulation keyed by document id, 0-based rank, deterministic
//! tie-break sort by id.

use crate::repository::BackendRow;
use std::collections::HashMap;

pub const RRF_K: f32 = 60.0;

/// a document id's rank-fused score plus the row chosen to carry its
/// payload. when a document appears in both lists, the KNN-side row is
/// kept since it may carry the vector.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: String,
    pub score: f32,
    pub row: BackendRow,
}

fn rrf_term(rank: usize) -> f32 {
    1.0 / (RRF_K + rank as f32 + 1.0)
}

/// fuse two ranked result lists (KNN first, BM25 second) into one list
/// sorted descending by fused score, ties broken by id ascending for
/// determinism.
pub fn fuse(knn: Vec<BackendRow>, bm25: Vec<BackendRow>) -> Vec<FusedResult> {
    let mut fused: HashMap<String, FusedResult> = HashMap::new();

    for (rank, row) in knn.into_iter().enumerate() {
        let score = rrf_term(rank);
        fused.insert(
            row.id.clone(),
            FusedResult {
                id: row.id.clone(),
                score,
                row,
            },
        );
    }

    for (rank, row) in bm25.into_iter().enumerate() {
        let score = rrf_term(rank);
        match fused.get_mut(&row.id) {
            Some(entry) => entry.score += score,
            None => {
                fused.insert(
                    row.id.clone(),
                    FusedResult {
                        id: row.id.clone(),
                        score,
                        row,
                    },
                );
            }
        }
    }

    let mut results: Vec<FusedResult> = fused.into_values().collect();
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    results
}
