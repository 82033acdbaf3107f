//! Decode one batch's raw model output into questions.
//!
//! The top-level shape must be recoverable (a JSON object with at least one of the
//! three question lists) or the whole batch is `MALFORMED_EXAM_OUTPUT`. Individual
//! items that do not decode or fail validation are dropped.

use std::collections::BTreeMap;

use ef_core::domain::{EssayQuestion, ExamQuestion, McqQuestion, ShortAnswerQuestion};
use ef_core::error::{codes, AppError};
use ef_core::normalize::{collapse_whitespace, prompt_key, strip_numbering, strip_option_label};
use ef_core::validate::validate_question;
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
struct RawBatch {
    #[serde(default, alias = "mcqs", alias = "multiple_choice", alias = "multiple_choice_questions")]
    mcq: Option<Vec<Value>>,
    #[serde(default, alias = "short_answers", alias = "short_answer_questions")]
    short_answer: Option<Vec<Value>>,
    #[serde(default, alias = "essays", alias = "essay_questions")]
    essay: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawMcq {
    #[serde(alias = "prompt")]
    question: String,
    options: RawOptions,
    #[serde(default)]
    answer_index: Option<RawAnswer>,
    #[serde(default, alias = "correct_answer", alias = "correct")]
    answer: Option<RawAnswer>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawOptions {
    List(Vec<String>),
    Labeled(BTreeMap<String, String>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    Index(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawShortAnswer {
    #[serde(alias = "prompt")]
    question: String,
    #[serde(alias = "reference_answer", alias = "model_answer")]
    answer: String,
}

#[derive(Debug, Deserialize)]
struct RawEssay {
    #[serde(alias = "prompt")]
    question: String,
    #[serde(alias = "key_points_to_cover", alias = "points")]
    key_points: RawKeyPoints,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKeyPoints {
    List(Vec<String>),
    Text(String),
}

pub fn parse_batch_output(raw: &str, batch: u32) -> Result<Vec<ExamQuestion>, AppError> {
    let malformed = |msg: &str| {
        AppError::new(codes::MALFORMED_EXAM_OUTPUT, msg.to_string())
            .with_details(format!("batch={batch}; output={}", preview(raw)))
    };

    let json = extract_json_object(raw).ok_or_else(|| malformed("No JSON object in model output"))?;
    let value: Value =
        serde_json::from_str(json).map_err(|_| malformed("Model output is not valid JSON"))?;
    let Value::Object(obj) = value else {
        return Err(malformed("Model output is not a JSON object"));
    };
    let obj = unwrap_envelope(normalize_keys(obj));
    let raw_batch: RawBatch = serde_json::from_value(Value::Object(obj))
        .map_err(|_| malformed("Question lists have the wrong type"))?;
    if raw_batch.mcq.is_none() && raw_batch.short_answer.is_none() && raw_batch.essay.is_none() {
        return Err(malformed("Model output has none of the expected question lists"));
    }

    let mut out = Vec::new();
    for item in raw_batch.mcq.unwrap_or_default() {
        push_valid(&mut out, decode_mcq(item, batch), batch);
    }
    for item in raw_batch.short_answer.unwrap_or_default() {
        push_valid(&mut out, decode_short_answer(item, batch), batch);
    }
    for item in raw_batch.essay.unwrap_or_default() {
        push_valid(&mut out, decode_essay(item, batch), batch);
    }
    Ok(out)
}

fn push_valid(out: &mut Vec<ExamQuestion>, q: Option<ExamQuestion>, batch: u32) {
    let Some(q) = q else {
        debug!("batch {batch}: dropped undecodable question item");
        return;
    };
    let issues = validate_question(&q);
    if issues.is_empty() {
        out.push(q);
    } else {
        let codes: Vec<&str> = issues.iter().map(|i| i.code.as_str()).collect();
        debug!("batch {batch}: dropped invalid question ({})", codes.join(","));
    }
}

fn clean_prompt(s: &str) -> String {
    collapse_whitespace(strip_numbering(s))
}

fn decode_mcq(item: Value, batch: u32) -> Option<ExamQuestion> {
    let raw: RawMcq = serde_json::from_value(item).ok()?;
    let options: Vec<String> = match raw.options {
        RawOptions::List(list) => list
            .iter()
            .map(|o| collapse_whitespace(strip_option_label(o)))
            .collect(),
        RawOptions::Labeled(map) => map
            .values()
            .map(|o| collapse_whitespace(strip_option_label(o)))
            .collect(),
    };
    let options: [String; 4] = options.try_into().ok()?;
    let correct_index = raw
        .answer_index
        .or(raw.answer)
        .and_then(|a| resolve_answer(&a, &options))?;
    Some(ExamQuestion::Mcq(McqQuestion {
        prompt: clean_prompt(&raw.question),
        options,
        correct_index,
        source_batch: batch,
    }))
}

fn decode_short_answer(item: Value, batch: u32) -> Option<ExamQuestion> {
    let raw: RawShortAnswer = serde_json::from_value(item).ok()?;
    Some(ExamQuestion::ShortAnswer(ShortAnswerQuestion {
        prompt: clean_prompt(&raw.question),
        reference_answer: raw.answer.trim().to_string(),
        source_batch: batch,
    }))
}

fn decode_essay(item: Value, batch: u32) -> Option<ExamQuestion> {
    let raw: RawEssay = serde_json::from_value(item).ok()?;
    let key_points = match raw.key_points {
        RawKeyPoints::List(list) => list
            .iter()
            .map(|p| clean_point(p))
            .filter(|p| !p.is_empty())
            .collect(),
        RawKeyPoints::Text(text) => split_points(&text),
    };
    Some(ExamQuestion::Essay(EssayQuestion {
        prompt: clean_prompt(&raw.question),
        key_points,
        source_batch: batch,
    }))
}

/// Option text first, then a letter (`"B"`, `"b)"`, `"Option C"`), then a bare index.
fn resolve_answer(answer: &RawAnswer, options: &[String; 4]) -> Option<usize> {
    match answer {
        RawAnswer::Index(i) => usize::try_from(*i).ok().filter(|i| *i < options.len()),
        RawAnswer::Text(text) => {
            let t = text.trim();
            let by_text = |key: String| options.iter().position(|o| prompt_key(o) == key);
            by_text(prompt_key(t))
                .or_else(|| by_text(prompt_key(strip_option_label(t))))
                .or_else(|| answer_letter(t))
                .or_else(|| t.parse::<usize>().ok().filter(|i| *i < options.len()))
        }
    }
}

fn answer_letter(t: &str) -> Option<usize> {
    let lower = t.to_ascii_lowercase();
    let mut rest = lower.as_str();
    for prefix in ["answer:", "answer", "option", "correct:"] {
        if let Some(r) = rest.strip_prefix(prefix) {
            rest = r.trim_start();
        }
    }
    let rest = rest.trim_start_matches('(');
    let mut chars = rest.chars();
    let letter = chars.next()?;
    let idx = match letter {
        'a' => 0,
        'b' => 1,
        'c' => 2,
        'd' => 3,
        _ => return None,
    };
    match chars.next() {
        Some(c) if c.is_alphanumeric() => None,
        _ => Some(idx),
    }
}

fn clean_point(p: &str) -> String {
    let t = p.trim().trim_start_matches(['-', '*', '\u{2022}']).trim();
    collapse_whitespace(strip_numbering(t))
}

fn split_points(text: &str) -> Vec<String> {
    text.split(['\n', ';', '\u{2022}'])
        .map(clean_point)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Strip code fences and surrounding prose; return the outermost `{...}` span.
fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Lower-case top-level keys and fold spaces/dashes to underscores.
fn normalize_keys(obj: Map<String, Value>) -> Map<String, Value> {
    obj.into_iter()
        .map(|(k, v)| (k.trim().to_lowercase().replace([' ', '-'], "_"), v))
        .collect()
}

/// Accept `{"exam": {...}}` / `{"questions": {...}}` wrappers.
fn unwrap_envelope(obj: Map<String, Value>) -> Map<String, Value> {
    if obj.len() == 1 {
        let inner = obj
            .iter()
            .next()
            .filter(|(k, _)| k.as_str() == "exam" || k.as_str() == "questions")
            .and_then(|(_, v)| v.as_object().cloned());
        if let Some(inner) = inner {
            return normalize_keys(inner);
        }
    }
    obj
}

fn preview(raw: &str) -> String {
    let p: String = raw.chars().take(120).collect();
    p.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompts(qs: &[ExamQuestion]) -> Vec<&str> {
        qs.iter().map(|q| q.prompt()).collect()
    }

    #[test]
    fn decodes_the_requested_shape() {
        let raw = r#"{
          "mcq": [{"question": "Which is LIFO?", "options": ["Queue", "Stack", "Heap", "Tree"], "answer_index": 1}],
          "short_answer": [{"question": "Define a pointer.", "answer": "A variable holding an address."}],
          "essay": [{"question": "Discuss paging.", "key_points": ["Frames", "Page tables"]}]
        }"#;
        let qs = parse_batch_output(raw, 2).expect("parse");
        assert_eq!(prompts(&qs), vec!["Which is LIFO?", "Define a pointer.", "Discuss paging."]);
        assert!(qs.iter().all(|q| q.source_batch() == 2));
        match &qs[0] {
            ExamQuestion::Mcq(m) => assert_eq!(m.correct_index, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn tolerates_fences_numbering_labels_and_letter_answers() {
        let raw = "Here is your exam:\n```json\n{\"MCQ\": [{\"question\": \"  1.  What   is a stack? \", \"options\": [\"A) Queue\", \"B) Stack\", \"C) Heap\", \"D) Tree\"], \"answer\": \"B\"}],\n \"Short Answer\": [], \"essay\": [{\"question\": \"Q2: Explain caching.\", \"key_points_to_cover\": \"- Locality\\n- Eviction; Write policy\"}]}\n```";
        let qs = parse_batch_output(raw, 1).expect("parse");
        assert_eq!(prompts(&qs), vec!["What is a stack?", "Explain caching."]);
        match &qs[0] {
            ExamQuestion::Mcq(m) => {
                assert_eq!(m.options[1], "Stack");
                assert_eq!(m.correct_index, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &qs[1] {
            ExamQuestion::Essay(e) => {
                assert_eq!(e.key_points, vec!["Locality", "Eviction", "Write policy"])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn answer_given_as_option_text() {
        let raw = r#"{"mcq": [{"question": "Capital of France?", "options": ["Rome", "Paris", "Berlin", "Madrid"], "answer": "paris"}]}"#;
        let qs = parse_batch_output(raw, 1).expect("parse");
        match &qs[0] {
            ExamQuestion::Mcq(m) => assert_eq!(m.correct_index, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn numeric_options_resolve_by_text_before_index() {
        let raw = |answer: &str| {
            format!(
                r#"{{"mcq": [{{"question": "2 + 2?", "options": ["1", "2", "3", "4"], "answer": "{answer}"}}]}}"#
            )
        };
        for (answer, expected) in [("3", 2), ("4", 3), ("C", 2)] {
            let qs = parse_batch_output(&raw(answer), 1).expect("parse");
            match qs.as_slice() {
                [ExamQuestion::Mcq(m)] => {
                    assert_eq!(m.correct_index, expected, "answer {answer}");
                    assert_eq!(m.correct_option(), ["1", "2", "3", "4"][expected]);
                }
                other => panic!("answer {answer}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn bare_index_is_the_last_resort() {
        let raw = r#"{"mcq": [{"question": "Pick one.", "options": ["red", "green", "blue", "cyan"], "answer": "2"}]}"#;
        let qs = parse_batch_output(raw, 1).expect("parse");
        match &qs[0] {
            ExamQuestion::Mcq(m) => assert_eq!(m.correct_index, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_items_are_dropped_not_fatal() {
        let raw = r#"{"mcq": [
            {"question": "Three options?", "options": ["a", "b", "c"], "answer_index": 0},
            {"question": "Bad index?", "options": ["w", "x", "y", "z"], "answer_index": 9},
            {"options": ["w", "x", "y", "z"], "answer_index": 0},
            {"question": "Good one?", "options": ["w", "x", "y", "z"], "answer_index": 3}
        ]}"#;
        let qs = parse_batch_output(raw, 1).expect("parse");
        assert_eq!(prompts(&qs), vec!["Good one?"]);
    }

    #[test]
    fn empty_lists_are_a_valid_administrative_batch() {
        let qs = parse_batch_output(r#"{"mcq": [], "short_answer": [], "essay": []}"#, 1)
            .expect("parse");
        assert!(qs.is_empty());
    }

    #[test]
    fn envelope_is_unwrapped() {
        let qs = parse_batch_output(
            r#"{"exam": {"short_answer": [{"question": "Define RAM.", "answer": "Volatile memory."}]}}"#,
            1,
        )
        .expect("parse");
        assert_eq!(prompts(&qs), vec!["Define RAM."]);
    }

    #[test]
    fn unrecoverable_shapes_are_malformed() {
        for raw in [
            "I cannot help with that.",
            "{not json}",
            r#"{"questions": "none"}"#,
            r#"{"mcq": "oops"}"#,
            "[1, 2, 3]",
        ] {
            let err = parse_batch_output(raw, 3).expect_err(raw);
            assert_eq!(err.code, codes::MALFORMED_EXAM_OUTPUT, "{raw}");
        }
    }
}
