//! Retrieval-augmented answering. Each question stands alone: prior turns are never sent.

use ef_core::error::{codes, AppError};
use log::info;
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::{query_with_embedder, ScoredChunk, VectorIndex};
use crate::llm::Llm;
use crate::prompts::grounded_answer_prompt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagAnswer {
    /// The model's literal output.
    pub answer_text: String,
    /// Retrieval order, best first.
    pub cited_chunks: Vec<ScoredChunk>,
}

pub fn answer_question(
    index: &VectorIndex,
    embedder: &dyn Embedder,
    llm: &dyn Llm,
    model: &str,
    question: &str,
    k: usize,
) -> Result<RagAnswer, AppError> {
    if index.is_empty() {
        return Err(AppError::new(
            codes::EMPTY_DOCUMENT,
            "The document has no extractable text to answer from",
        ));
    }

    let hits = query_with_embedder(index, embedder, question, k)?;
    let context = build_context_blocks(&hits);
    let prompt = grounded_answer_prompt(question.trim(), &context);

    let answer_text = llm.generate(model, &prompt).map_err(|e| {
        if e.code == codes::GENERATION_FAILED {
            e
        } else {
            AppError::new(codes::GENERATION_FAILED, "Answer generation failed")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        }
    })?;

    info!("answered question using {} chunks", hits.len());
    Ok(RagAnswer {
        answer_text,
        cited_chunks: hits,
    })
}

fn build_context_blocks(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .map(|h| {
            format!(
                "[chunk {} | page {}]\n{}",
                h.chunk.position, h.chunk.source_page, h.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
