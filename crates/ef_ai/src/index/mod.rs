//! In-memory vector index over document chunks.
//!
//! Built once per uploaded document, read-only afterwards, replaced wholesale
//! on the next upload.

use ef_core::domain::Chunk;
use ef_core::error::{codes, AppError};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;

mod similarity;

pub use similarity::{cosine_distance, cosine_similarity, l2_norm};

/// Inputs per embedding call during index build.
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Insertion slot in the backend.
    pub slot: usize,
    pub distance: f32,
}

/// Nearest-neighbour search over vectors addressed by insertion slot.
pub trait VectorBackend: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dims(&self) -> usize;

    /// At most `k` neighbours, ascending distance, ties broken by lower slot.
    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor>;
}

/// Exhaustive cosine-distance scan. Adequate for a single document.
#[derive(Debug, Clone, Default)]
pub struct FlatCosineBackend {
    vectors: Vec<Vec<f32>>,
    norms: Vec<f32>,
    dims: usize,
}

impl FlatCosineBackend {
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, AppError> {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        for (slot, v) in vectors.iter().enumerate() {
            if v.len() != dims {
                return Err(AppError::new(
                    codes::EMBEDDINGS_FAILED,
                    "Embedding dimension mismatch across chunks",
                )
                .with_details(format!("expected={dims}; got={}; slot={slot}", v.len())));
            }
        }
        let norms = vectors.iter().map(|v| l2_norm(v)).collect();
        Ok(Self {
            vectors,
            norms,
            dims,
        })
    }
}

impl VectorBackend for FlatCosineBackend {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let qnorm = l2_norm(query);
        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .zip(self.norms.iter())
            .enumerate()
            .map(|(slot, (v, vnorm))| Neighbor {
                slot,
                distance: cosine_distance(query, v, qnorm, *vnorm),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.slot.cmp(&b.slot)));
        hits.truncate(k);
        hits
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine distance; lower is closer.
    pub score: f32,
}

pub struct VectorIndex {
    chunks: Vec<Chunk>,
    backend: Box<dyn VectorBackend>,
    model: String,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("chunks", &self.chunks.len())
            .field("dims", &self.backend.dims())
            .field("model", &self.model)
            .finish()
    }
}

impl VectorIndex {
    /// Pair chunks with a prebuilt backend; slot `i` must hold the vector of `chunks[i]`.
    pub fn from_parts(
        chunks: Vec<Chunk>,
        backend: Box<dyn VectorBackend>,
        model: impl Into<String>,
    ) -> Result<Self, AppError> {
        if chunks.len() != backend.len() {
            return Err(AppError::new(
                codes::EMBEDDINGS_FAILED,
                "Vector count does not match chunk count",
            )
            .with_details(format!("chunks={}; vectors={}", chunks.len(), backend.len())));
        }
        Ok(Self {
            chunks,
            backend,
            model: model.into(),
        })
    }

    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            chunks: Vec::new(),
            backend: Box::new(FlatCosineBackend::default()),
            model: model.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.backend.dims()
    }
}

/// Embed every chunk (batched) and build a flat cosine index. Zero chunks give an empty index.
pub fn build_index_with_embedder(
    mut chunks: Vec<Chunk>,
    embedder: &dyn Embedder,
    model: &str,
) -> Result<VectorIndex, AppError> {
    if chunks.is_empty() {
        return Ok(VectorIndex::empty(model));
    }
    // Slot order == position order, so backend tie-breaks favour earlier chunks.
    chunks.sort_by_key(|c| c.position);

    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(EMBED_BATCH_SIZE) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embedded = embedder.embed_batch(model, &texts).map_err(|e| {
            AppError::new(codes::EMBEDDINGS_FAILED, "Failed to compute embeddings")
                .with_details(format!(
                    "first_position={}; err={}",
                    batch[0].position, e
                ))
                .with_retryable(e.retryable)
        })?;
        if embedded.len() != batch.len() {
            return Err(AppError::new(
                codes::EMBEDDINGS_FAILED,
                "Embedder returned the wrong number of vectors",
            )
            .with_details(format!("expected={}; got={}", batch.len(), embedded.len())));
        }
        vectors.extend(embedded);
        debug!("embedded {}/{} chunks", vectors.len(), chunks.len());
    }

    let backend = FlatCosineBackend::build(vectors)?;
    info!(
        "built vector index: chunks={}, dims={}, model={}",
        chunks.len(),
        backend.dims(),
        model
    );
    VectorIndex::from_parts(chunks, Box::new(backend), model)
}

/// Up to `k` chunks nearest to `query`, best first.
pub fn query_with_embedder(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>, AppError> {
    if index.is_empty() {
        return Err(AppError::new(
            codes::EMPTY_INDEX,
            "Index holds no chunks; upload a document with extractable text",
        ));
    }
    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new(codes::RETRIEVAL_FAILED, "Query must not be empty"));
    }

    let qv = embedder.embed(&index.model, q)?;
    if qv.len() != index.dims() {
        return Err(AppError::new(
            codes::RETRIEVAL_FAILED,
            "Query embedding dims do not match index dims",
        )
        .with_details(format!("index_dims={}; query_dims={}", index.dims(), qv.len())));
    }

    let hits = index.backend.search(&qv, k);
    let mut out = Vec::with_capacity(hits.len());
    for hit in hits {
        let chunk = index.chunks.get(hit.slot).ok_or_else(|| {
            AppError::new(codes::RETRIEVAL_FAILED, "Backend returned an unknown slot")
                .with_details(format!("slot={}", hit.slot))
        })?;
        out.push(ScoredChunk {
            chunk: chunk.clone(),
            score: hit.distance,
        });
    }
    debug!("retrieved {} chunks for query ({} chars)", out.len(), q.len());
    Ok(out)
}
