//! Character-window chunking over the concatenated document text.

use log::debug;
use sha2::{Digest, Sha256};

use crate::domain::{Chunk, PageRecord};
use crate::error::{codes, AppError};
use crate::normalize::normalize_newlines;

/// Inserted between consecutive pages when the document text is assembled.
pub const PAGE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    pub page_number: u32,
    /// Half-open character range.
    pub start: usize,
    pub end: usize,
}

/// Ordered document text with page boundaries tracked in character offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentText {
    pub text: String,
    pub spans: Vec<PageSpan>,
}

impl DocumentText {
    pub fn from_pages(pages: &[PageRecord]) -> Self {
        let mut text = String::new();
        let mut spans = Vec::with_capacity(pages.len());
        let mut offset = 0usize;
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                text.push_str(PAGE_SEPARATOR);
                offset += PAGE_SEPARATOR.chars().count();
            }
            let body = normalize_newlines(&page.text);
            let len = body.chars().count();
            text.push_str(&body);
            spans.push(PageSpan {
                page_number: page.page_number,
                start: offset,
                end: offset + len,
            });
            offset += len;
        }
        Self { text, spans }
    }

    /// Single-page document, mostly for callers that only have raw text.
    pub fn single_page(text: &str) -> Self {
        let body = normalize_newlines(text);
        let len = body.chars().count();
        Self {
            text: body,
            spans: vec![PageSpan {
                page_number: 1,
                start: 0,
                end: len,
            }],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Page holding the largest share of `[start, end)`; earlier page wins ties.
    fn majority_page(&self, start: usize, end: usize) -> u32 {
        let mut best: Option<(u32, usize)> = None;
        for span in &self.spans {
            let lo = start.max(span.start);
            let hi = end.min(span.end);
            if hi <= lo {
                continue;
            }
            let covered = hi - lo;
            if best.map_or(true, |(_, b)| covered > b) {
                best = Some((span.page_number, covered));
            }
        }
        if let Some((page, _)) = best {
            return page;
        }
        self.spans
            .iter()
            .rev()
            .find(|s| s.start <= start)
            .or_else(|| self.spans.first())
            .map(|s| s.page_number)
            .unwrap_or(1)
    }
}

/// Split `doc` into windows of `chunk_size` characters advancing by
/// `chunk_size - chunk_overlap`. Blank documents yield no chunks.
pub fn chunk_document(
    doc: &DocumentText,
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    if chunk_size == 0 || chunk_overlap >= chunk_size {
        return Err(AppError::new(
            codes::CONFIG_INVALID,
            "chunk_overlap must be smaller than a positive chunk_size",
        )
        .with_details(format!(
            "chunk_size={chunk_size}; chunk_overlap={chunk_overlap}"
        )));
    }
    if doc.is_blank() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = doc.text.chars().collect();
    let total = chars.len();
    let stride = chunk_size - chunk_overlap;

    let mut out = Vec::new();
    let mut start = 0usize;
    loop {
        let end = (start + chunk_size).min(total);
        let text: String = chars[start..end].iter().collect();
        let position = out.len() as u32;
        let source_page = doc.majority_page(start, end);
        out.push(Chunk {
            id: chunk_id(position, source_page, &text),
            text,
            source_page,
            position,
            start_char: start,
            end_char: end,
        });
        if end == total {
            break;
        }
        start += stride;
    }

    debug!(
        "chunked {} chars into {} chunks (size={}, overlap={})",
        total,
        out.len(),
        chunk_size,
        chunk_overlap
    );
    Ok(out)
}

pub fn chunk_pages(
    pages: &[PageRecord],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<Vec<Chunk>, AppError> {
    chunk_document(&DocumentText::from_pages(pages), chunk_size, chunk_overlap)
}

fn chunk_id(position: u32, page: u32, text: &str) -> String {
    let payload = format!("position={position}\npage={page}\ntext={text}");
    hex::encode(Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_skip_the_separator() {
        let doc = DocumentText {
            text: "abc\n\ndefg".to_string(),
            spans: vec![
                PageSpan { page_number: 1, start: 0, end: 3 },
                PageSpan { page_number: 2, start: 5, end: 9 },
            ],
        };
        assert_eq!(doc.majority_page(0, 4), 1);
        assert_eq!(doc.majority_page(2, 9), 2);
        assert_eq!(doc.majority_page(3, 5), 1);
    }

    #[test]
    fn rejects_overlap_not_smaller_than_window() {
        let doc = DocumentText::single_page("hello");
        let err = chunk_document(&doc, 10, 10).expect_err("should reject");
        assert_eq!(err.code, codes::CONFIG_INVALID);
    }
}
