use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use ef_ai::exam::{generate_exam, generate_exam_with_progress, BatchOutcome, BatchProgress};
use ef_ai::llm::{Llm, MultimodalRequest};
use ef_core::config::ExamForgeConfig;
use ef_core::domain::{PageImage, PageRecord};
use ef_core::error::{codes, AppError};
use ef_core::validate::duplicate_prompts;
use pretty_assertions::assert_eq;
use serde_json::json;

/// Replies based on the first image of each request (`page-N`). Unknown pages
/// get prose, which is unparsable.
struct FixtureLlm {
    replies: HashMap<String, Result<String, AppError>>,
    delays: HashMap<String, Duration>,
    seen: Mutex<Vec<(String, usize, bool, String)>>,
}

impl FixtureLlm {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            delays: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn reply(mut self, page: u32, body: String) -> Self {
        self.replies.insert(format!("page-{page}"), Ok(body));
        self
    }

    fn fail(mut self, page: u32, err: AppError) -> Self {
        self.replies.insert(format!("page-{page}"), Err(err));
        self
    }

    fn delay(mut self, page: u32, ms: u64) -> Self {
        self.delays.insert(format!("page-{page}"), Duration::from_millis(ms));
        self
    }
}

impl Llm for FixtureLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Err(AppError::new(codes::GENERATION_FAILED, "text calls not expected"))
    }

    fn generate_multimodal(&self, req: &MultimodalRequest<'_>) -> Result<String, AppError> {
        let key = req
            .images
            .first()
            .map(|img| String::from_utf8_lossy(&img.bytes).to_string())
            .unwrap_or_default();
        self.seen.lock().expect("lock").push((
            req.model.to_string(),
            req.images.len(),
            req.json_output,
            req.prompt.to_string(),
        ));
        if let Some(d) = self.delays.get(&key) {
            thread::sleep(*d);
        }
        self.replies
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Ok("Sorry, I could not read these pages.".to_string()))
    }
}

fn pages(n: u32) -> Vec<PageRecord> {
    (1..=n)
        .map(|i| PageRecord {
            page_number: i,
            text: format!("text of page {i}"),
            image: PageImage::png(format!("page-{i}").into_bytes()),
        })
        .collect()
}

fn config(batch_size: usize) -> ExamForgeConfig {
    ExamForgeConfig {
        exam_batch_size: batch_size,
        ..ExamForgeConfig::default()
    }
}

fn short_answers(prompts: &[&str]) -> String {
    let items: Vec<_> = prompts
        .iter()
        .map(|p| json!({"question": p, "answer": "See notes."}))
        .collect();
    json!({"mcq": [], "short_answer": items, "essay": []}).to_string()
}

fn all_prompts(gen: &ef_ai::exam::ExamGeneration) -> Vec<String> {
    let e = &gen.exam;
    e.mcqs
        .iter()
        .map(|q| q.prompt.clone())
        .chain(e.short_answers.iter().map(|q| q.prompt.clone()))
        .chain(e.essays.iter().map(|q| q.prompt.clone()))
        .collect()
}

#[test]
fn duplicate_prompts_across_batches_collapse_to_the_first() {
    let llm = FixtureLlm::new()
        .reply(1, short_answers(&["What is a stack?"]))
        .reply(2, short_answers(&["What is a stack?   ", "What is a queue?"]));

    let gen = generate_exam(&pages(2), &llm, &config(1)).expect("generate");

    assert_eq!(all_prompts(&gen), vec!["What is a stack?", "What is a queue?"]);
    assert_eq!(gen.exam.short_answers[0].source_batch, 1);
    assert_eq!(gen.dropped_duplicates, 1);
    assert!(duplicate_prompts(&gen.exam).is_empty());
}

#[test]
fn final_exam_has_no_duplicate_prompts_across_kinds() {
    let mcq = json!({
        "mcq": [{"question": "What is a heap?", "options": ["w", "x", "y", "z"], "answer_index": 0}],
        "short_answer": [{"question": "what IS a  heap?", "answer": "A tree."}],
        "essay": [{"question": "What is a heap?", "key_points": ["Ordering"]}]
    })
    .to_string();
    let llm = FixtureLlm::new()
        .reply(1, mcq)
        .reply(2, short_answers(&["What is a heap?", "What is a trie?"]));

    let gen = generate_exam(&pages(2), &llm, &config(1)).expect("generate");

    assert_eq!(all_prompts(&gen), vec!["What is a heap?", "What is a trie?"]);
    assert_eq!(gen.dropped_duplicates, 3);
    assert!(duplicate_prompts(&gen.exam).is_empty());
}

#[test]
fn denylisted_prompts_are_removed_even_if_the_model_emits_them() {
    let body = json!({
        "mcq": [{
            "question": "What does the grading policy say about late labs?",
            "options": ["Nothing", "Zero credit", "Half credit", "Full credit"],
            "answer_index": 2
        }],
        "short_answer": [{"question": "Define virtual memory.", "answer": "An abstraction."}],
        "essay": []
    })
    .to_string();
    let llm = FixtureLlm::new().reply(1, body);

    let gen = generate_exam(&pages(1), &llm, &config(4)).expect("generate");

    assert!(gen.exam.mcqs.is_empty());
    assert_eq!(all_prompts(&gen), vec!["Define virtual memory."]);
    assert_eq!(gen.filtered_administrative, 1);
}

#[test]
fn one_unparsable_batch_is_skipped_with_a_warning() {
    let llm = FixtureLlm::new()
        .reply(1, short_answers(&["Q from batch one?"]))
        .reply(3, short_answers(&["Q from batch three?"]));

    let gen = generate_exam(&pages(3), &llm, &config(1)).expect("generate");

    assert_eq!(all_prompts(&gen), vec!["Q from batch one?", "Q from batch three?"]);
    let batches: Vec<u32> = gen.exam.short_answers.iter().map(|q| q.source_batch).collect();
    assert_eq!(batches, vec![1, 3]);
    assert_eq!(gen.warnings.len(), 1);
    assert_eq!(gen.warnings[0].batch_number, 2);
    assert_eq!(gen.warnings[0].first_page, 2);
    assert_eq!(gen.warnings[0].code, codes::MALFORMED_EXAM_OUTPUT);
    assert_eq!(gen.batch_count, 3);
}

#[test]
fn a_failed_model_call_is_also_only_a_warning() {
    let llm = FixtureLlm::new()
        .reply(1, short_answers(&["Survivor?"]))
        .fail(
            2,
            AppError::new(codes::GENERATION_FAILED, "timed out").with_retryable(true),
        );

    let gen = generate_exam(&pages(2), &llm, &config(1)).expect("generate");

    assert_eq!(all_prompts(&gen), vec!["Survivor?"]);
    assert_eq!(gen.warnings[0].code, codes::GENERATION_FAILED);
}

#[test]
fn every_batch_failing_is_fatal() {
    let llm = FixtureLlm::new();
    let err = generate_exam(&pages(2), &llm, &config(1)).expect_err("all fail");
    assert_eq!(err.code, codes::EXAM_GENERATION_FAILED);
}

#[test]
fn no_pages_is_an_empty_document() {
    let llm = FixtureLlm::new();
    let err = generate_exam(&[], &llm, &config(4)).expect_err("empty");
    assert_eq!(err.code, codes::EMPTY_DOCUMENT);
    assert!(llm.seen.lock().expect("lock").is_empty());
}

#[test]
fn administrative_only_batches_are_not_failures() {
    let llm = FixtureLlm::new().reply(1, short_answers(&[])).reply(2, short_answers(&["Real?"]));
    let gen = generate_exam(&pages(2), &llm, &config(1)).expect("generate");
    assert!(gen.warnings.is_empty());
    assert_eq!(all_prompts(&gen), vec!["Real?"]);
}

#[test]
fn batches_carry_their_images_and_request_json() {
    let llm = FixtureLlm::new()
        .reply(1, short_answers(&["A?"]))
        .reply(4, short_answers(&["B?"]));
    let cfg = config(3);

    generate_exam(&pages(5), &llm, &cfg).expect("generate");

    let seen = llm.seen.lock().expect("lock");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, cfg.vision_model);
    assert_eq!((seen[0].1, seen[1].1), (3, 2));
    assert!(seen.iter().all(|s| s.2));
    assert!(seen[0].3.contains("text of page 3"));
    assert!(!seen[0].3.contains("text of page 4"));
}

#[test]
fn page_text_can_be_left_out_of_the_prompt() {
    let llm = FixtureLlm::new().reply(1, short_answers(&["A?"]));
    let cfg = ExamForgeConfig {
        include_page_text: false,
        ..config(2)
    };
    generate_exam(&pages(2), &llm, &cfg).expect("generate");
    assert!(!llm.seen.lock().expect("lock")[0].3.contains("text of page 1"));
}

#[test]
fn parallel_batches_keep_batch_order() {
    let mut llm = FixtureLlm::new();
    for p in 1..=5u32 {
        llm = llm
            .reply(p, short_answers(&[format!("Question from page {p}?").as_str()]))
            .delay(p, u64::from(6 - p) * 15);
    }
    let cfg = ExamForgeConfig {
        max_parallel_batches: 3,
        ..config(1)
    };

    let gen = generate_exam(&pages(5), &llm, &cfg).expect("generate");

    let expected: Vec<String> = (1..=5).map(|p| format!("Question from page {p}?")).collect();
    assert_eq!(all_prompts(&gen), expected);
}

#[test]
fn per_batch_caps_apply_after_parsing() {
    let mcq = |q: &str, answer: usize| {
        json!({"question": q, "options": ["w", "x", "y", "z"], "answer_index": answer})
    };
    let body = json!({
        "mcq": [mcq("M1?", 0), mcq("M2?", 1), mcq("M3?", 2)],
        "essay": [
            {"question": "E1?", "key_points": ["p"]},
            {"question": "E2?", "key_points": ["p"]}
        ]
    })
    .to_string();
    let llm = FixtureLlm::new().reply(1, body);
    let cfg = ExamForgeConfig {
        max_mcq_per_batch: 2,
        max_essay_per_batch: 1,
        ..config(1)
    };

    let gen = generate_exam(&pages(1), &llm, &cfg).expect("generate");

    assert_eq!(all_prompts(&gen), vec!["M1?", "M2?", "E1?"]);
    assert_eq!(gen.exam.mcqs[1].correct_index, 1);
}

#[test]
fn progress_reports_each_batch_start_and_outcome() {
    let llm = FixtureLlm::new().reply(1, short_answers(&["One?", "Two?"]));
    let events: Mutex<Vec<BatchProgress>> = Mutex::new(Vec::new());

    generate_exam_with_progress(&pages(3), &llm, &config(2), &|p| {
        events.lock().expect("lock").push(p.clone())
    })
    .expect("generate");

    let events = events.into_inner().expect("lock");
    let summary: Vec<(u32, u32, u32, u32, BatchOutcome)> = events
        .into_iter()
        .map(|e| (e.batch_number, e.batch_count, e.first_page, e.last_page, e.outcome))
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, 2, 1, 2, BatchOutcome::Started),
            (1, 2, 1, 2, BatchOutcome::Parsed { questions: 2 }),
            (2, 2, 3, 3, BatchOutcome::Started),
            (
                2,
                2,
                3,
                3,
                BatchOutcome::Skipped {
                    code: codes::MALFORMED_EXAM_OUTPUT.to_string()
                }
            ),
        ]
    );
}
