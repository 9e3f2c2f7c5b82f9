//! PDF rasterisation: render selected pages to `DynamicImage` via pdfium.
//!
//! pdfium is a blocking C++ library, so every call here runs inside
//! `tokio::task::spawn_blocking`.
//!
//! Pages are scaled by `dpi / 72` (PDF user space is 72 units per inch) and
//! then capped at `max_rendered_pixels` on either edge, so an oversized scan
//! cannot blow up memory.

use crate::config::GradingConfig;
use crate::error::{GradeError, PageError};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the pdfium library (file or directory).
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// One rasterised page, or why it could not be rasterised.
pub type RenderedPage = (usize, Result<DynamicImage, PageError>);

/// Bind to pdfium: `PDFIUM_LIB_PATH`, then the working directory, then the
/// system library.
pub fn bind_pdfium() -> Result<Pdfium, GradeError> {
    let mut attempts = Vec::new();

    if let Ok(configured) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !configured.is_empty() {
            let path = PathBuf::from(&configured);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            match Pdfium::bind_to_library(&lib) {
                Ok(bindings) => {
                    debug!("Bound pdfium from {}", lib.display());
                    return Ok(Pdfium::new(bindings));
                }
                Err(e) => attempts.push(format!("{}: {:?}", lib.display(), e)),
            }
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&local) {
        Ok(bindings) => {
            debug!("Bound pdfium from {}", local.display());
            return Ok(Pdfium::new(bindings));
        }
        Err(e) => attempts.push(format!("{}: {:?}", local.display(), e)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(GradeError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

/// Map a pdfium load failure to the matching fatal error.
fn load_error(pdf_path: &Path, password: Option<&str>, e: PdfiumError) -> GradeError {
    let detail = format!("{:?}", e);
    if detail.to_lowercase().contains("password") {
        if password.is_some() {
            GradeError::WrongPassword {
                path: pdf_path.to_path_buf(),
            }
        } else {
            GradeError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        }
    } else {
        GradeError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}

/// Scale factor from PDF points to pixels at `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

/// Rasterise the selected pages.
///
/// Returns one entry per in-range index, in the order given. A page that
/// fails to render yields a [`PageError::RenderFailed`] instead of aborting
/// the run; only binding and load failures are fatal.
pub async fn render_pages(
    pdf_path: &Path,
    config: &GradingConfig,
    page_indices: &[usize],
) -> Result<Vec<RenderedPage>, GradeError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let indices = page_indices.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &indices)
    })
    .await
    .map_err(|e| GradeError::Internal(format!("Render task panicked: {}", e)))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    page_indices: &[usize],
) -> Result<Vec<RenderedPage>, GradeError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, dpi);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale_for_dpi(dpi))
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(page_indices.len());

    for &idx in page_indices {
        if idx >= total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                idx + 1,
                total_pages
            );
            continue;
        }

        let rendered =
            render_one(&pages, idx, &render_config).map_err(|e| PageError::RenderFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            });

        match &rendered {
            Ok(image) => debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            ),
            Err(e) => warn!("{}", e),
        }

        results.push((idx, rendered));
    }

    Ok(results)
}

fn render_one(
    pages: &PdfPages<'_>,
    idx: usize,
    render_config: &PdfRenderConfig,
) -> Result<DynamicImage, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let bitmap = page.render_with_config(render_config)?;
    Ok(bitmap.as_image())
}

/// Read document metadata without rendering anything.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, GradeError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| GradeError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentMetadata, GradeError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| load_error(pdf_path, password, e))?;

    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().to_string())
            .filter(|v| !v.is_empty())
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dpi_scales_points_to_pixels() {
        // A4 width is 595 pt; at 300 DPI that is about 2480 px.
        let px = 595.0 * scale_for_dpi(300);
        assert!((px - 2479.0).abs() < 1.0, "got {px}");
        assert_eq!(scale_for_dpi(72), 1.0);
    }
}
