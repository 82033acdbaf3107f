//! PDF bytes to ordered `PageRecord`s: text through `lopdf`, images through a `PageRasterizer`.

use log::{info, warn};
use lopdf::Document;

use crate::domain::{PageImage, PageRecord};
use crate::error::{codes, AppError};

pub mod pdfium;

/// Renders every page of a PDF to an image, in page order.
pub trait PageRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, AppError>;
}

pub fn extract_pages(
    pdf: &[u8],
    rasterizer: &dyn PageRasterizer,
) -> Result<Vec<PageRecord>, AppError> {
    let doc = Document::load_mem(pdf).map_err(|e| {
        AppError::new(codes::UNREADABLE_PDF, "Uploaded file is not a readable PDF")
            .with_details(e.to_string())
    })?;

    // BTreeMap keyed by 1-based page number, already in reading order.
    let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        info!("pdf has no pages");
        return Ok(Vec::new());
    }

    let images = rasterizer.rasterize(pdf)?;
    if images.len() != page_numbers.len() {
        return Err(AppError::new(
            codes::PDF_RENDER_FAILED,
            "Rendered page count does not match the document",
        )
        .with_details(format!(
            "pages={}; images={}",
            page_numbers.len(),
            images.len()
        )));
    }

    let mut out = Vec::with_capacity(page_numbers.len());
    for (page_number, image) in page_numbers.into_iter().zip(images) {
        let text = page_text(&doc, page_number);
        out.push(PageRecord {
            page_number,
            text,
            image,
        });
    }

    info!(
        "extracted {} pages ({} with text)",
        out.len(),
        out.iter().filter(|p| !p.text.trim().is_empty()).count()
    );
    Ok(out)
}

/// A page whose text cannot be decoded contributes an empty string.
fn page_text(doc: &Document, page_number: u32) -> String {
    match doc.extract_text(&[page_number]) {
        Ok(text) => text,
        Err(e) => {
            warn!("text extraction failed for page {page_number}: {e}");
            String::new()
        }
    }
}
