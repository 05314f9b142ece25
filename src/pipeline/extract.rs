//! PDF text extraction via pdfium: bytes → [`PageContent`] per page.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and must not run on Tokio worker threads.
//! `tokio::task::spawn_blocking` moves the whole document walk onto the
//! blocking pool.

use super::normalize::PageContent;
use super::tables::{detect_tables, TextBox};
use crate::error::AnalysisError;
use pdfium_render::prelude::*;
use tracing::{debug, info, warn};

/// Extract body text and tables from every page, in page order.
pub async fn extract_pages(
    bytes: Vec<u8>,
    password: Option<String>,
) -> Result<Vec<PageContent>, AnalysisError> {
    tokio::task::spawn_blocking(move || extract_pages_blocking(&bytes, password.as_deref()))
        .await
        .map_err(|e| AnalysisError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Bind pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the system library.
fn bind_pdfium() -> Result<Pdfium, AnalysisError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| AnalysisError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn extract_pages_blocking(
    bytes: &[u8],
    password: Option<&str>,
) -> Result<Vec<PageContent>, AnalysisError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        let lower = err_str.to_lowercase();
        if lower.contains("password") || lower.contains("encrypt") {
            if password.is_some() {
                AnalysisError::WrongPassword
            } else {
                AnalysisError::PasswordRequired
            }
        } else {
            AnalysisError::CorruptPdf { detail: err_str }
        }
    })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut out = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let number = idx + 1;
        let text = match page.text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping text of page {}: {:?}", number, e);
                out.push(PageContent {
                    number,
                    ..Default::default()
                });
                continue;
            }
        };

        let boxes: Vec<TextBox> = text
            .segments()
            .iter()
            .map(|segment| {
                let bounds = segment.bounds();
                TextBox::new(
                    segment.text(),
                    bounds.left().value,
                    bounds.bottom().value,
                    bounds.right().value,
                    bounds.top().value,
                )
            })
            .collect();

        let tables = detect_tables(&boxes);
        debug!(
            "Page {}: {} text segments, {} tables",
            number,
            boxes.len(),
            tables.len()
        );

        out.push(PageContent {
            number,
            text: text.all(),
            tables,
        });
    }

    Ok(out)
}
