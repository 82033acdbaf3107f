//! Batched multimodal exam generation.
//!
//! Pages are split into fixed-size batches; each batch is one multimodal call
//! whose output is parsed independently. A batch that fails (call error or
//! unrecoverable output) becomes a warning. Only when every batch fails does the
//! whole generation fail.

use std::thread;

use ef_core::config::ExamForgeConfig;
use ef_core::domain::{Exam, ExamQuestion, PageRecord};
use ef_core::error::{codes, AppError};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::llm::{Llm, MultimodalRequest};
use crate::prompts::{exam_batch_prompt, QuestionLimits};

mod aggregate;
mod parse;

pub use aggregate::{aggregate_batches, AggregateStats};
pub use parse::parse_batch_output;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWarning {
    pub batch_number: u32,
    pub first_page: u32,
    pub last_page: u32,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Started,
    Parsed { questions: usize },
    Skipped { code: String },
}

/// Reported before and after each batch. `batch_number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch_number: u32,
    pub batch_count: u32,
    pub first_page: u32,
    pub last_page: u32,
    pub outcome: BatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamGeneration {
    pub exam: Exam,
    pub warnings: Vec<BatchWarning>,
    pub batch_count: u32,
    pub filtered_administrative: usize,
    pub dropped_duplicates: usize,
}

struct PageBatch<'a> {
    number: u32,
    pages: &'a [PageRecord],
}

impl PageBatch<'_> {
    fn first_page(&self) -> u32 {
        self.pages.first().map(|p| p.page_number).unwrap_or(0)
    }

    fn last_page(&self) -> u32 {
        self.pages.last().map(|p| p.page_number).unwrap_or(0)
    }
}

pub fn generate_exam(
    pages: &[PageRecord],
    llm: &dyn Llm,
    config: &ExamForgeConfig,
) -> Result<ExamGeneration, AppError> {
    generate_exam_with_progress(pages, llm, config, &|_| {})
}

pub fn generate_exam_with_progress(
    pages: &[PageRecord],
    llm: &dyn Llm,
    config: &ExamForgeConfig,
    progress: &(dyn Fn(&BatchProgress) + Sync),
) -> Result<ExamGeneration, AppError> {
    if pages.is_empty() {
        return Err(AppError::new(
            codes::EMPTY_DOCUMENT,
            "Document has no pages to generate an exam from",
        ));
    }
    if config.exam_batch_size == 0 {
        return Err(AppError::new(
            codes::CONFIG_INVALID,
            "exam_batch_size must be positive",
        ));
    }

    let batches: Vec<PageBatch<'_>> = pages
        .chunks(config.exam_batch_size)
        .enumerate()
        .map(|(i, pages)| PageBatch {
            number: i as u32 + 1,
            pages,
        })
        .collect();
    let batch_count = batches.len() as u32;
    info!(
        "exam generation: {} pages in {batch_count} batches (parallel={})",
        pages.len(),
        config.max_parallel_batches
    );

    let run = |batch: &PageBatch<'_>| -> Result<Vec<ExamQuestion>, AppError> {
        let report = |outcome: BatchOutcome| {
            progress(&BatchProgress {
                batch_number: batch.number,
                batch_count,
                first_page: batch.first_page(),
                last_page: batch.last_page(),
                outcome,
            })
        };
        report(BatchOutcome::Started);
        let result = run_batch(batch, llm, config);
        match &result {
            Ok(qs) => report(BatchOutcome::Parsed { questions: qs.len() }),
            Err(e) => report(BatchOutcome::Skipped {
                code: e.code.clone(),
            }),
        }
        result
    };

    let mut results: Vec<Option<Result<Vec<ExamQuestion>, AppError>>> =
        (0..batches.len()).map(|_| None).collect();
    let wave = config.max_parallel_batches.max(1);
    if wave == 1 {
        for (slot, batch) in batches.iter().enumerate() {
            results[slot] = Some(run(batch));
        }
    } else {
        for (w, group) in batches.chunks(wave).enumerate() {
            let run = &run;
            let outputs: Vec<Result<Vec<ExamQuestion>, AppError>> = thread::scope(|s| {
                let handles: Vec<_> = group.iter().map(|b| s.spawn(move || run(b))).collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(AppError::new(
                                codes::GENERATION_FAILED,
                                "Batch worker panicked",
                            ))
                        })
                    })
                    .collect()
            });
            for (offset, out) in outputs.into_iter().enumerate() {
                results[w * wave + offset] = Some(out);
            }
        }
    }

    let mut parsed = Vec::new();
    let mut warnings = Vec::new();
    for (batch, result) in batches.iter().zip(results) {
        match result {
            Some(Ok(questions)) => parsed.push((batch.number, questions)),
            Some(Err(e)) => {
                warn!(
                    "skipping exam batch {} (pages {}-{}): {e}",
                    batch.number,
                    batch.first_page(),
                    batch.last_page()
                );
                warnings.push(BatchWarning {
                    batch_number: batch.number,
                    first_page: batch.first_page(),
                    last_page: batch.last_page(),
                    code: e.code,
                    message: e.message,
                });
            }
            None => {}
        }
    }

    if parsed.is_empty() {
        let summary = warnings
            .iter()
            .map(|w| format!("batch {}: {}", w.batch_number, w.code))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(
            AppError::new(codes::EXAM_GENERATION_FAILED, "Every exam batch failed")
                .with_details(summary),
        );
    }

    let (exam, stats) = aggregate_batches(parsed, &config.administrative_keyword_denylist);
    info!(
        "exam generated: {} questions, {} batch warnings, {} administrative filtered, {} duplicates dropped",
        exam.question_count(),
        warnings.len(),
        stats.filtered_administrative,
        stats.dropped_duplicates
    );
    Ok(ExamGeneration {
        exam,
        warnings,
        batch_count,
        filtered_administrative: stats.filtered_administrative,
        dropped_duplicates: stats.dropped_duplicates,
    })
}

fn limits(config: &ExamForgeConfig) -> QuestionLimits {
    QuestionLimits {
        mcq: config.max_mcq_per_batch,
        short_answer: config.max_short_answer_per_batch,
        essay: config.max_essay_per_batch,
    }
}

fn run_batch(
    batch: &PageBatch<'_>,
    llm: &dyn Llm,
    config: &ExamForgeConfig,
) -> Result<Vec<ExamQuestion>, AppError> {
    info!(
        "exam batch {} (pages {}-{})",
        batch.number,
        batch.first_page(),
        batch.last_page()
    );
    let page_text = config
        .include_page_text
        .then(|| batch_page_text(batch.pages, config.page_text_char_limit));
    let prompt = exam_batch_prompt(
        batch.first_page(),
        batch.last_page(),
        limits(config),
        page_text.as_deref(),
    );
    let raw = llm.generate_multimodal(&MultimodalRequest {
        model: &config.vision_model,
        prompt: &prompt,
        images: batch.pages.iter().map(|p| &p.image).collect(),
        json_output: true,
    })?;
    let questions = parse_batch_output(&raw, batch.number)?;
    Ok(apply_caps(questions, limits(config)))
}

/// Page text as auxiliary context, each page truncated to `limit` characters.
fn batch_page_text(pages: &[PageRecord], limit: usize) -> String {
    pages
        .iter()
        .filter(|p| !p.text.trim().is_empty())
        .map(|p| {
            let text: String = p.text.trim().chars().take(limit).collect();
            format!("[page {}]\n{text}", p.page_number)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Keep at most the configured number of questions of each kind, in parse order.
fn apply_caps(questions: Vec<ExamQuestion>, limits: QuestionLimits) -> Vec<ExamQuestion> {
    let (mut mcq, mut sa, mut essay) = (0usize, 0usize, 0usize);
    questions
        .into_iter()
        .filter(|q| {
            let (count, cap) = match q {
                ExamQuestion::Mcq(_) => (&mut mcq, limits.mcq),
                ExamQuestion::ShortAnswer(_) => (&mut sa, limits.short_answer),
                ExamQuestion::Essay(_) => (&mut essay, limits.essay),
            };
            *count += 1;
            *count <= cap
        })
        .collect()
}
