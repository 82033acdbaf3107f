use ef_core::domain::{EssayQuestion, Exam, McqQuestion, ShortAnswerQuestion};
use ef_core::report::{
    render_exam_markdown, render_exam_pdf, write_exam_pdf, ANSWER_KEY_TITLE, ESSAY_SECTION,
    MCQ_SECTION, SHORT_ANSWER_SECTION,
};
use lopdf::Document;
use pretty_assertions::assert_eq;

fn sample_exam() -> Exam {
    Exam {
        mcqs: vec![
            McqQuestion {
                prompt: "Which structure is LIFO?".to_string(),
                options: [
                    "Queue".to_string(),
                    "Stack".to_string(),
                    "Heap".to_string(),
                    "Graph".to_string(),
                ],
                correct_index: 1,
                source_batch: 0,
            },
            McqQuestion {
                prompt: "Which layer routes packets?".to_string(),
                options: [
                    "Link".to_string(),
                    "Session".to_string(),
                    "Network".to_string(),
                    "Physical".to_string(),
                ],
                correct_index: 2,
                source_batch: 1,
            },
        ],
        short_answers: vec![ShortAnswerQuestion {
            prompt: "Define amortized cost.".to_string(),
            reference_answer: "Average cost per operation over a sequence.".to_string(),
            source_batch: 0,
        }],
        essays: vec![EssayQuestion {
            prompt: "Compare TCP and UDP.".to_string(),
            key_points: vec!["Reliability".to_string(), "Ordering".to_string()],
            source_batch: 1,
        }],
    }
}

fn visible_text(pdf: &[u8]) -> String {
    let doc = Document::load_mem(pdf).expect("load rendered pdf");
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages).expect("extract text")
}

#[test]
fn rendered_pdf_contains_every_prompt_and_each_option_label_once_per_question() {
    let exam = sample_exam();
    let pdf = render_exam_pdf(&exam).expect("render");
    let text = visible_text(&pdf);

    for q in &exam.mcqs {
        assert_eq!(text.matches(q.prompt.as_str()).count(), 1, "prompt {}", q.prompt);
    }
    for label in ["(A) ", "(B) ", "(C) ", "(D) "] {
        assert_eq!(text.matches(label).count(), exam.mcqs.len(), "label {label}");
    }
    assert!(text.contains("Define amortized cost."));
    assert!(text.contains("Compare TCP and UDP."));
}

#[test]
fn sections_appear_in_fixed_order_with_answer_key_last() {
    let text = visible_text(&render_exam_pdf(&sample_exam()).expect("render"));
    let mcq = text.find(MCQ_SECTION).expect("mcq section");
    let short = text.find(SHORT_ANSWER_SECTION).expect("short section");
    let essay = text.find(ESSAY_SECTION).expect("essay section");
    let key = text.find(ANSWER_KEY_TITLE).expect("answer key");
    assert!(mcq < short && short < essay && essay < key);

    // The correct option is only spelled out after the answer key heading.
    let marker = "2. C - Network";
    let at = text.find(marker).expect("answer key entry");
    assert!(at > key);
}

#[test]
fn rendering_is_deterministic() {
    let exam = sample_exam();
    let a = render_exam_pdf(&exam).expect("render");
    let b = render_exam_pdf(&exam).expect("render");
    assert_eq!(a, b);
}

#[test]
fn empty_exam_still_renders_a_valid_document() {
    let pdf = render_exam_pdf(&Exam::default()).expect("render");
    assert!(pdf.starts_with(b"%PDF-"));
    let text = visible_text(&pdf);
    assert!(text.contains(MCQ_SECTION));
    assert!(text.contains("No questions were generated."));
}

#[test]
fn accented_text_round_trips_through_the_pdf() {
    let mut exam = sample_exam();
    exam.mcqs[0].prompt = "Qu'est-ce qu'un caf\u{e9}?".to_string();
    exam.mcqs[0].options[1] = "Cr\u{e8}me br\u{fb}l\u{e9}e".to_string();
    exam.short_answers[0].prompt = "Explain the \u{201C}na\u{ef}ve\u{201D} approach \u{2013} briefly.".to_string();

    let text = visible_text(&render_exam_pdf(&exam).expect("render"));

    assert_eq!(text.matches("Qu'est-ce qu'un caf\u{e9}?").count(), 1, "got:\n{text}");
    assert!(text.contains("(B) Cr\u{e8}me br\u{fb}l\u{e9}e"));
    assert!(text.contains("\u{201C}na\u{ef}ve\u{201D} approach \u{2013} briefly."));
}

#[test]
fn long_exams_paginate() {
    let mut exam = sample_exam();
    let template = exam.mcqs[0].clone();
    exam.mcqs = (0..60)
        .map(|i| McqQuestion {
            prompt: format!("Generated prompt number {i}?"),
            ..template.clone()
        })
        .collect();
    let pdf = render_exam_pdf(&exam).expect("render");
    let doc = Document::load_mem(&pdf).expect("load");
    assert!(doc.get_pages().len() > 3);
}

#[test]
fn write_exam_pdf_creates_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("exam.pdf");
    write_exam_pdf(&path, &sample_exam()).expect("write");
    let bytes = std::fs::read(&path).expect("read back");
    assert_eq!(bytes, render_exam_pdf(&sample_exam()).expect("render"));
}

#[test]
fn markdown_mirrors_pdf_layout() {
    let md = render_exam_markdown(&sample_exam());
    let expected_head = "# Generated Exam\n\n## Part I: Multiple Choice Questions\n\n**1. Which structure is LIFO?**\n\n- (A) Queue\n- (B) Stack\n- (C) Heap\n- (D) Graph\n";
    assert!(md.starts_with(expected_head), "got:\n{md}");
    assert!(md.contains("- **1. B - Stack**\n"));
    let key = md.find("# Answer Key").expect("key");
    assert!(md.find("B - Stack").expect("answer") > key);
}
