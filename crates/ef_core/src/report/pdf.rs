use std::fs;
use std::path::Path;

use log::info;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::domain::Exam;
use crate::error::{codes, AppError};

use super::{layout_exam, Block, LineStyle};

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 54.0;
const FOOTER_SPACE: f32 = 24.0;
const INDENT: f32 = 20.0;
// Average Helvetica glyph width relative to font size.
const AVG_GLYPH_EM: f32 = 0.5;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

struct PlacedLine {
    font: &'static str,
    size: f32,
    x: f32,
    y: f32,
    text: String,
}

fn style_metrics(style: LineStyle) -> (&'static str, f32) {
    match style {
        LineStyle::Title => (BOLD, 18.0),
        LineStyle::Section => (BOLD, 14.0),
        LineStyle::Question => (REGULAR, 11.0),
        LineStyle::Option => (REGULAR, 10.0),
        LineStyle::Body => (REGULAR, 10.0),
        LineStyle::Answer => (BOLD, 10.0),
    }
}

/// Render the exam as a paginated A4 PDF. Same input, same bytes.
pub fn render_exam_pdf(exam: &Exam) -> Result<Vec<u8>, AppError> {
    let pages = paginate(&layout_exam(exam));
    let bytes = encode_pdf(&pages)?;
    info!(
        "rendered exam pdf: {} questions, {} pages, {} bytes",
        exam.question_count(),
        pages.len(),
        bytes.len()
    );
    Ok(bytes)
}

pub fn write_exam_pdf(path: &Path, exam: &Exam) -> Result<(), AppError> {
    let bytes = render_exam_pdf(exam)?;
    fs::write(path, bytes).map_err(|e| {
        AppError::new(codes::REPORT_RENDER_FAILED, "Failed to write exam PDF")
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn paginate(blocks: &[Block]) -> Vec<Vec<PlacedLine>> {
    let top = PAGE_HEIGHT - MARGIN;
    let bottom = MARGIN + FOOTER_SPACE;
    let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
    let mut y = top;

    for block in blocks {
        match block {
            Block::PageBreak => {
                pages.push(Vec::new());
                y = top;
            }
            Block::Spacer(h) => {
                y -= h;
            }
            Block::Line {
                style,
                text,
                indent,
            } => {
                let (font, size) = style_metrics(*style);
                let x = MARGIN + INDENT * f32::from(*indent);
                let width = PAGE_WIDTH - MARGIN - x;
                let max_chars = ((width / (size * AVG_GLYPH_EM)) as usize).max(10);
                let leading = size * 1.4;
                for piece in wrap(&sanitize(text), max_chars) {
                    if y - leading < bottom {
                        pages.push(Vec::new());
                        y = top;
                    }
                    y -= leading;
                    if let Some(page) = pages.last_mut() {
                        page.push(PlacedLine {
                            font,
                            size,
                            x,
                            y,
                            text: piece,
                        });
                    }
                }
            }
        }
    }
    pages
}

fn text_op(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new(
            "Tj",
            vec![Object::String(win_ansi_bytes(text), StringFormat::Literal)],
        ),
        Operation::new("ET", vec![]),
    ]
}

fn encode_pdf(pages: &[Vec<PlacedLine>]) -> Result<Vec<u8>, AppError> {
    let render_err = |e: lopdf::Error| {
        AppError::new(codes::REPORT_RENDER_FAILED, "Failed to encode exam PDF")
            .with_details(e.to_string())
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (i, lines) in pages.iter().enumerate() {
        let mut operations = Vec::new();
        for l in lines {
            operations.extend(text_op(l.font, l.size, l.x, l.y, &l.text));
        }
        let footer = format!("Page {} of {}", i + 1, total);
        operations.extend(text_op(REGULAR, 9.0, PAGE_WIDTH / 2.0 - 24.0, MARGIN / 2.0, &footer));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(render_err)?,
        ));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(super::EXAM_TITLE),
        "Producer" => Object::string_literal("examforge"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| {
        AppError::new(codes::REPORT_RENDER_FAILED, "Failed to write exam PDF bytes")
            .with_details(e.to_string())
    })?;
    Ok(buf)
}

/// WinAnsi (cp1252) code for `ch`, if the base-14 fonts can show it.
fn win_ansi_byte(ch: char) -> Option<u8> {
    let b = match ch {
        ' '..='~' | '\u{A0}'..='\u{FF}' => return u8::try_from(u32::from(ch)).ok(),
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => return None,
    };
    Some(b)
}

/// Flatten line breaks and mask characters outside WinAnsi.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\t' | '\n' | '\r' => ' ',
            c if win_ansi_byte(c).is_some() => c,
            _ => '?',
        })
        .collect()
}

fn win_ansi_bytes(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| win_ansi_byte(ch).unwrap_or(b'?'))
        .collect()
}

/// Greedy word wrap counted in characters; words longer than a line are split hard.
fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split_whitespace() {
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = chars.split_off(max_chars);
            lines.push(chars.iter().collect());
            chars = rest;
        }
        if current_len > 0 && current_len + 1 + chars.len() > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(chars.iter());
        current_len += chars.len();
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width_and_keeps_words() {
        let lines = wrap("alpha beta gamma delta", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
        assert!(wrap(&"x".repeat(25), 10).iter().all(|l| l.len() <= 10));
        assert_eq!(wrap("", 10), vec![String::new()]);
    }

    #[test]
    fn wrap_counts_characters_not_bytes() {
        let lines = wrap(&"\u{e9}".repeat(12), 5);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.chars().count() <= 5));
    }

    #[test]
    fn latin1_and_typography_survive_and_the_rest_is_masked() {
        assert_eq!(sanitize("caf\u{e9}\n\u{201C}na\u{ef}ve\u{201D}"), "caf\u{e9} \u{201C}na\u{ef}ve\u{201D}");
        assert_eq!(sanitize("\u{65e5}\u{672c} ok"), "?? ok");
        assert_eq!(win_ansi_bytes("caf\u{e9} \u{20AC}5 \u{2013}"), b"caf\xe9 \x805 \x96".to_vec());
    }
}
