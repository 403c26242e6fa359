use super::{EmbeddingError, EmbeddingResult};
use crate::embedding::Embedder;

/// which instruction prefix to prepend — queries and documents use
/// different fixed strings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Query,
    Document,
}

impl InstructionKind {
    fn prefix(self) -> &'static str {
        match self {
            InstructionKind::Query => "Represent this query for retrieval: ",
            InstructionKind::Document => "Represent this document for retrieval: ",
        }
    }
}

/// outermost layer of the decorator chain: prepends a fixed instruction
/// string before delegating.
pub struct InstructionPrefixEmbedder<E> {
    inner: E,
    kind: InstructionKind,
}

impl<E> InstructionPrefixEmbedder<E> {
    pub fn new(inner: E, kind: InstructionKind) -> Self {
        Self { inner, kind }
    }

    pub fn prefixed(&self, text: &str) -> String {
        format!("{}{}", self.kind.prefix(), text)
    }
}

impl<E: Embedder> Embedder for InstructionPrefixEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<EmbeddingResult, EmbeddingError> {
        self.inner.embed(&self.prefixed(text)).await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
