use std::collections::HashSet;

use ef_core::domain::{Exam, ExamQuestion};
use ef_core::normalize::prompt_key;
use log::debug;

use crate::guardrails::administrative_match;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStats {
    pub filtered_administrative: usize,
    pub dropped_duplicates: usize,
}

/// Merge per-batch question lists into one exam.
///
/// Input may arrive in any order; it is sorted by batch number first so the
/// result is batch-then-parse order. Administrative prompts are dropped, then
/// duplicates by normalized prompt (first occurrence wins, across all kinds).
pub fn aggregate_batches(
    mut batches: Vec<(u32, Vec<ExamQuestion>)>,
    denylist: &[String],
) -> (Exam, AggregateStats) {
    batches.sort_by_key(|(n, _)| *n);

    let mut stats = AggregateStats::default();
    let mut seen = HashSet::new();
    let mut exam = Exam::default();

    for (batch, questions) in batches {
        for q in questions {
            if let Some(hit) = administrative_match(q.prompt(), denylist) {
                debug!("batch {batch}: filtered administrative question (matched {hit:?})");
                stats.filtered_administrative += 1;
                continue;
            }
            if !seen.insert(prompt_key(q.prompt())) {
                debug!("batch {batch}: dropped duplicate question {:?}", q.prompt());
                stats.dropped_duplicates += 1;
                continue;
            }
            exam.push(q);
        }
    }
    (exam, stats)
}
