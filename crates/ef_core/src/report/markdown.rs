use crate::domain::Exam;

use super::{layout_exam, Block, LineStyle};

/// Markdown rendering of the same layout the PDF uses.
pub fn render_exam_markdown(exam: &Exam) -> String {
    let mut out = String::new();
    for block in layout_exam(exam) {
        match block {
            Block::Line {
                style,
                text,
                indent,
            } => {
                let text = text.trim_end();
                match style {
                    LineStyle::Title => out.push_str(&format!("# {text}\n\n")),
                    LineStyle::Section => out.push_str(&format!("## {text}\n\n")),
                    LineStyle::Question => out.push_str(&format!("**{text}**\n\n")),
                    LineStyle::Option => out.push_str(&format!("- {text}\n")),
                    LineStyle::Answer => out.push_str(&format!("- **{text}**\n")),
                    LineStyle::Body if indent > 0 => out.push_str(&format!("  {text}\n")),
                    LineStyle::Body => out.push_str(&format!("{text}\n\n")),
                }
            }
            Block::Spacer(_) => {
                if !out.ends_with("\n\n") {
                    out.push('\n');
                }
            }
            Block::PageBreak => out.push_str("---\n\n"),
        }
    }
    out
}
