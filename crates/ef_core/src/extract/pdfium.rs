use std::io::Cursor;

use image::ImageFormat;
use pdfium_render::prelude::*;

use crate::domain::PageImage;
use crate::error::{codes, AppError};

use super::PageRasterizer;

/// Rasterizer backed by a Pdfium shared library found on the system.
pub struct PdfiumRasterizer {
    pdfium: Pdfium,
    dpi: u32,
}

impl PdfiumRasterizer {
    pub fn from_system_library(dpi: u32) -> Result<Self, AppError> {
        let bindings = Pdfium::bind_to_system_library().map_err(|e| {
            AppError::new(codes::PDF_RENDER_FAILED, "Pdfium library not available")
                .with_details(e.to_string())
        })?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            dpi,
        })
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, AppError> {
        let document = self.pdfium.load_pdf_from_byte_slice(pdf, None).map_err(|e| {
            AppError::new(codes::UNREADABLE_PDF, "Pdfium could not open the PDF")
                .with_details(e.to_string())
        })?;

        // PDF user space is 72 units per inch.
        let config = PdfRenderConfig::new().scale_page_by_factor(self.dpi as f32 / 72.0);

        let mut out = Vec::new();
        for (i, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&config).map_err(|e| {
                AppError::new(codes::PDF_RENDER_FAILED, "Failed to render page")
                    .with_details(format!("page={}; err={}", i + 1, e))
            })?;
            let mut png = Vec::new();
            bitmap
                .as_image()
                .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
                .map_err(|e| {
                    AppError::new(codes::PDF_RENDER_FAILED, "Failed to encode page image")
                        .with_details(format!("page={}; err={}", i + 1, e))
                })?;
            out.push(PageImage::png(png));
        }
        Ok(out)
    }
}
