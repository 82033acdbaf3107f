use serde::{Deserialize, Serialize};

use crate::domain::{Exam, ExamQuestion};
use crate::normalize::prompt_key;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionIssue {
    pub code: String,
    pub message: String,
}

fn issue(code: &str, message: &str) -> QuestionIssue {
    QuestionIssue {
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Structural checks on a decoded question. Empty result means the question is usable.
pub fn validate_question(q: &ExamQuestion) -> Vec<QuestionIssue> {
    let mut out = Vec::new();
    if q.prompt().trim().is_empty() {
        out.push(issue("QUESTION_PROMPT_EMPTY", "Question prompt is empty"));
    }
    match q {
        ExamQuestion::Mcq(m) => {
            if m.options.iter().any(|o| o.trim().is_empty()) {
                out.push(issue("MCQ_OPTION_EMPTY", "Every option must have text"));
            }
            if m.correct_index >= m.options.len() {
                out.push(issue("MCQ_ANSWER_OUT_OF_RANGE", "Correct answer index out of range"));
            }
            let mut keys: Vec<String> = m.options.iter().map(|o| prompt_key(o)).collect();
            keys.sort();
            keys.dedup();
            if keys.len() != m.options.len() {
                out.push(issue("MCQ_OPTIONS_DUPLICATED", "Options must be distinct"));
            }
        }
        ExamQuestion::ShortAnswer(s) => {
            if s.reference_answer.trim().is_empty() {
                out.push(issue("SHORT_ANSWER_MISSING", "Reference answer is empty"));
            }
        }
        ExamQuestion::Essay(e) => {
            if e.key_points.iter().all(|p| p.trim().is_empty()) {
                out.push(issue("ESSAY_KEY_POINTS_MISSING", "Essay has no key points"));
            }
        }
    }
    out
}

/// Exam-level invariant: no two prompts share a normalized key.
pub fn duplicate_prompts(exam: &Exam) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    let mut dups = Vec::new();
    let prompts = exam
        .mcqs
        .iter()
        .map(|q| q.prompt.as_str())
        .chain(exam.short_answers.iter().map(|q| q.prompt.as_str()))
        .chain(exam.essays.iter().map(|q| q.prompt.as_str()));
    for p in prompts {
        if !seen.insert(prompt_key(p)) {
            dups.push(p.to_string());
        }
    }
    dups
}
