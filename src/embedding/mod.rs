//! Embedder: the external text-embedding collaborator, abstracted behind a
//! trait so production (fastembed/ONNX) and test backends share a contract.

use std::fmt;

#[derive(Debug)]
pub enum EmbedError {
    /// The model returned no results for a non-empty batch.
    EmptyResult,
    /// Model loading or inference failed.
    ModelError(String),
}

impl fmt::Display for EmbedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbedError::EmptyResult => write!(f, "embedder returned no results"),
            EmbedError::ModelError(msg) => write!(f, "embedding model error: {msg}"),
        }
    }
}

impl std::error::Error for EmbedError {}

/// Outcome of embedding a single text. Embedding failures degrade
/// per-item rather than failing the whole batch: a failed item gets a
/// zero-vector placeholder and is flagged so ingest can schedule a
/// re-embed on the next maintenance cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbedOutcome {
    Embedded(Vec<f32>),
    Failed,
}

impl EmbedOutcome {
    /// The vector to store now — a real embedding, or a same-dimension
    /// zero-vector placeholder for a failed item.
    pub fn vector_or_zero(&self, dim: usize) -> Vec<f32> {
        match self {
            EmbedOutcome::Embedded(v) => v.clone(),
            EmbedOutcome::Failed => vec![0.0; dim],
        }
    }

    pub fn needs_reembed(&self) -> bool {
        matches!(self, EmbedOutcome::Failed)
    }
}

/// Text-embedding backend. Given an ordered batch of texts, returns an
/// equal-length ordered batch of outcomes: implementations MUST be
/// idempotent for identical inputs within a deployment session, and MUST
/// NOT fail the whole batch just because one item failed.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbedOutcome>, EmbedError>;

    fn dimension(&self) -> usize;
}

/// Cosine similarity between two equal-length vectors. Zero-length or
/// all-zero vectors (e.g. a failed-embed placeholder) compare as 0.0
/// rather than dividing by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// An embedder that always returns zero vectors. This is an explicitly
/// flagged degraded mode — every outcome is `Failed` so callers' reindex
/// bookkeeping fires correctly. Never the default backend; a deployment
/// must opt into it.
pub struct ZeroEmbedder {
    dim: usize,
}

impl ZeroEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for ZeroEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbedOutcome>, EmbedError> {
        Ok(texts.iter().map(|_| EmbedOutcome::Failed).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Deterministic test embedder: hashes each text into a fixed-dimension
/// vector so cosine similarity behaves sensibly for near-identical inputs
/// without pulling in a real model.
pub struct MockEmbedder {
    dim: usize,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn hash_vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dim] += b as f32;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Embedder for MockEmbedder {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbedOutcome>, EmbedError> {
        Ok(texts
            .iter()
            .map(|t| EmbedOutcome::Embedded(self.hash_vector(t)))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{EmbedError, EmbedOutcome, Embedder};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime). Wrapped in a
    /// `Mutex` because `TextEmbedding::embed` takes `&mut self` while the
    /// `Embedder` trait is `&self` (queries run concurrently).
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
        dim: usize,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel, dim: usize) -> Result<Self, EmbedError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding =
                TextEmbedding::try_new(options).map_err(|e| EmbedError::ModelError(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
                dim,
            })
        }

        pub fn default_model() -> Result<Self, EmbedError> {
            Self::new(EmbeddingModel::AllMiniLML6V2, 384)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbedOutcome>, EmbedError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            match model.embed(texts.to_vec(), None) {
                Ok(vectors) if vectors.len() == texts.len() => {
                    Ok(vectors.into_iter().map(EmbedOutcome::Embedded).collect())
                }
                Ok(_) => Err(EmbedError::EmptyResult),
                // A whole-batch inference error degrades to per-item failure
                // rather than propagating, per the embedder contract.
                Err(e) => {
                    tracing::warn!(error = %e, "fastembed batch inference failed, marking all items for reindex");
                    Ok(texts.iter().map(|_| EmbedOutcome::Failed).collect())
                }
            }
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;
