//! One uploaded document: its pages, its index, the chat turns and the latest exam.
//!
//! A new upload builds a new session; nothing carries over.

use ef_core::chunking::chunk_pages;
use ef_core::config::ExamForgeConfig;
use ef_core::domain::PageRecord;
use ef_core::error::AppError;
use ef_core::extract::{extract_pages, PageRasterizer};
use log::info;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::embeddings::Embedder;
use crate::exam::{generate_exam_with_progress, BatchProgress, ExamGeneration};
use crate::index::{build_index_with_embedder, VectorIndex};
use crate::llm::Llm;
use crate::retrieve::{answer_question, RagAnswer};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub question: String,
    pub answer: String,
    pub cited_chunk_ids: Vec<String>,
    /// RFC3339, UTC.
    pub asked_at: String,
}

#[derive(Debug)]
pub struct ChatSession {
    pages: Vec<PageRecord>,
    index: VectorIndex,
    history: Vec<ChatTurn>,
    exam: Option<ExamGeneration>,
    opened_at: String,
}

impl ChatSession {
    /// Extract, chunk and index a PDF. A document without any text still opens:
    /// questions then fail with `EMPTY_DOCUMENT`, but exams can use the page images.
    pub fn open(
        pdf: &[u8],
        config: &ExamForgeConfig,
        rasterizer: &dyn PageRasterizer,
        embedder: &dyn Embedder,
    ) -> Result<Self, AppError> {
        let pages = extract_pages(pdf, rasterizer)?;
        Self::from_pages(pages, config, embedder)
    }

    pub fn from_pages(
        pages: Vec<PageRecord>,
        config: &ExamForgeConfig,
        embedder: &dyn Embedder,
    ) -> Result<Self, AppError> {
        let chunks = chunk_pages(&pages, config.chunk_size, config.chunk_overlap)?;
        let index = build_index_with_embedder(chunks, embedder, &config.embedding_model)?;
        info!(
            "session opened: {} pages, {} chunks indexed",
            pages.len(),
            index.len()
        );
        Ok(Self {
            pages,
            index,
            history: Vec::new(),
            exam: None,
            opened_at: now_rfc3339(),
        })
    }

    /// Answer against the document. History is recorded, never sent to the model.
    pub fn ask(
        &mut self,
        question: &str,
        config: &ExamForgeConfig,
        embedder: &dyn Embedder,
        llm: &dyn Llm,
    ) -> Result<RagAnswer, AppError> {
        let answer = answer_question(
            &self.index,
            embedder,
            llm,
            &config.text_model,
            question,
            config.retrieval_k,
        )?;
        self.history.push(ChatTurn {
            question: question.trim().to_string(),
            answer: answer.answer_text.clone(),
            cited_chunk_ids: answer.cited_chunks.iter().map(|c| c.chunk.id.clone()).collect(),
            asked_at: now_rfc3339(),
        });
        Ok(answer)
    }

    pub fn generate_exam(
        &mut self,
        config: &ExamForgeConfig,
        llm: &dyn Llm,
    ) -> Result<&ExamGeneration, AppError> {
        self.generate_exam_with_progress(config, llm, &|_| {})
    }

    /// Regenerates from scratch; a failed run leaves the previous exam in place.
    pub fn generate_exam_with_progress(
        &mut self,
        config: &ExamForgeConfig,
        llm: &dyn Llm,
        progress: &(dyn Fn(&BatchProgress) + Sync),
    ) -> Result<&ExamGeneration, AppError> {
        let generated = generate_exam_with_progress(&self.pages, llm, config, progress)?;
        Ok(&*self.exam.insert(generated))
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn exam(&self) -> Option<&ExamGeneration> {
        self.exam.as_ref()
    }

    pub fn opened_at(&self) -> &str {
        &self.opened_at
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
