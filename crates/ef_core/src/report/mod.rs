//! Exam rendering. Layout is computed once and shared by the PDF and Markdown writers.
//!
//! Ordering rules are fixed so outputs are snapshot-testable:
//! multiple choice, then short answer, then essay, then the answer key on a new page.
//! Correct answers never appear next to the questions.

use crate::domain::{option_label, Exam};

mod markdown;
mod pdf;

pub use markdown::render_exam_markdown;
pub use pdf::{render_exam_pdf, write_exam_pdf};

pub const EXAM_TITLE: &str = "Generated Exam";
pub const ANSWER_KEY_TITLE: &str = "Answer Key";
pub const MCQ_SECTION: &str = "Part I: Multiple Choice Questions";
pub const SHORT_ANSWER_SECTION: &str = "Part II: Short Answer Questions";
pub const ESSAY_SECTION: &str = "Part III: Essay Questions";
const EMPTY_SECTION: &str = "No questions in this section.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Title,
    Section,
    Question,
    Option,
    Body,
    /// Answer key entries; the only place the correct option is marked.
    Answer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Line {
        style: LineStyle,
        text: String,
        indent: u8,
    },
    Spacer(f32),
    PageBreak,
}

fn line(style: LineStyle, text: impl Into<String>) -> Block {
    Block::Line {
        style,
        text: text.into(),
        indent: 0,
    }
}

fn indented(style: LineStyle, text: impl Into<String>) -> Block {
    Block::Line {
        style,
        text: text.into(),
        indent: 1,
    }
}

/// Label shown next to an option in the question section, e.g. `(B) Heap`.
pub fn option_line(index: usize, option: &str) -> String {
    format!("({}) {}", option_label(index), option)
}

pub fn layout_exam(exam: &Exam) -> Vec<Block> {
    let mut out = vec![line(LineStyle::Title, EXAM_TITLE), Block::Spacer(12.0)];

    out.push(line(LineStyle::Section, MCQ_SECTION));
    if exam.mcqs.is_empty() {
        out.push(line(LineStyle::Body, EMPTY_SECTION));
    }
    for (i, q) in exam.mcqs.iter().enumerate() {
        out.push(line(LineStyle::Question, format!("{}. {}", i + 1, q.prompt)));
        for (j, opt) in q.options.iter().enumerate() {
            out.push(indented(LineStyle::Option, option_line(j, opt)));
        }
        out.push(Block::Spacer(6.0));
    }

    out.push(line(LineStyle::Section, SHORT_ANSWER_SECTION));
    if exam.short_answers.is_empty() {
        out.push(line(LineStyle::Body, EMPTY_SECTION));
    }
    for (i, q) in exam.short_answers.iter().enumerate() {
        out.push(line(LineStyle::Question, format!("{}. {}", i + 1, q.prompt)));
        out.push(Block::Spacer(6.0));
    }

    out.push(line(LineStyle::Section, ESSAY_SECTION));
    if exam.essays.is_empty() {
        out.push(line(LineStyle::Body, EMPTY_SECTION));
    }
    for (i, q) in exam.essays.iter().enumerate() {
        out.push(line(LineStyle::Question, format!("{}. {}", i + 1, q.prompt)));
        out.push(Block::Spacer(6.0));
    }

    out.push(Block::PageBreak);
    out.push(line(LineStyle::Title, ANSWER_KEY_TITLE));
    out.push(Block::Spacer(12.0));

    if !exam.mcqs.is_empty() {
        out.push(line(LineStyle::Section, "Multiple Choice Answers"));
        for (i, q) in exam.mcqs.iter().enumerate() {
            out.push(line(
                LineStyle::Answer,
                format!("{}. {} - {}", i + 1, q.correct_label(), q.correct_option()),
            ));
        }
        out.push(Block::Spacer(8.0));
    }
    if !exam.short_answers.is_empty() {
        out.push(line(LineStyle::Section, "Short Answer Reference"));
        for (i, q) in exam.short_answers.iter().enumerate() {
            out.push(line(
                LineStyle::Body,
                format!("{}. {}", i + 1, q.reference_answer),
            ));
        }
        out.push(Block::Spacer(8.0));
    }
    if !exam.essays.is_empty() {
        out.push(line(LineStyle::Section, "Essay Key Points"));
        for (i, q) in exam.essays.iter().enumerate() {
            out.push(line(LineStyle::Body, format!("{}. {}", i + 1, q.prompt)));
            for p in &q.key_points {
                out.push(indented(LineStyle::Body, format!("- {p}")));
            }
        }
    }
    if exam.is_empty() {
        out.push(line(LineStyle::Body, "No questions were generated."));
    }

    out
}
