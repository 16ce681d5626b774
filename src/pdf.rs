//! Composition of uploaded images into a downloadable PDF.
//!
//! Each image gets its own A4 page, scaled to fit inside a fixed margin with
//! its aspect ratio preserved and centered both ways. The document is built
//! fully in memory; nothing is written to disk unless every page composed,
//! so a failing image never leaves a partial file behind.

use crate::error::{MoriatiError, Result};
use crate::media::UploadedImage;
use printpdf::image_crate::{DynamicImage, GenericImageView};
use printpdf::{Image, ImageTransform, Mm, PdfDocument};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fixed name of the composed document.
pub const OUTPUT_FILE_NAME: &str = "Moriati-AI-Document.pdf";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const DPI: f32 = 300.0;
const MM_PER_INCH: f32 = 25.4;

/// Placement of one image on its page, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub width: f32,
    pub height: f32,
    pub x: f32,
    pub y: f32,
}

/// Scale an image to fit the page inside the margin, preserving its aspect
/// ratio. An image relatively wider than the page is capped at the page
/// width; otherwise at the page height. The result is centered both ways.
pub fn fit_to_page(image_width: u32, image_height: u32) -> Placement {
    let page_ratio = PAGE_WIDTH_MM / PAGE_HEIGHT_MM;
    let image_ratio = image_width as f32 / image_height as f32;

    let (width, height) = if image_ratio > page_ratio {
        let width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
        (width, width / image_ratio)
    } else {
        let height = PAGE_HEIGHT_MM - 2.0 * MARGIN_MM;
        (height * image_ratio, height)
    };

    Placement {
        width,
        height,
        x: (PAGE_WIDTH_MM - width) / 2.0,
        y: (PAGE_HEIGHT_MM - height) / 2.0,
    }
}

/// Compose images into a PDF, one page per image in input order.
///
/// An empty list is rejected. Any image that fails to decode aborts the
/// whole composition.
pub fn compose(images: &[UploadedImage]) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(MoriatiError::InvalidArgument(
            "at least one image is required".to_string(),
        ));
    }

    info!("Composing PDF from {} image(s)", images.len());

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Moriati AI Document",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );

    for (index, upload) in images.iter().enumerate() {
        let decoded = printpdf::image_crate::load_from_memory(&upload.bytes).map_err(|e| {
            MoriatiError::ImageError(format!("Failed to decode image {}: {}", upload.id, e))
        })?;

        let (width_px, height_px) = decoded.dimensions();
        let placement = fit_to_page(width_px, height_px);
        debug!(
            image = upload.id.as_str(),
            width_px, height_px, "Placing image at {:?}", placement
        );

        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page).get_layer(layer)
        };

        // printpdf draws an image at its native pixel size for the given
        // dpi; scale from that to the computed placement.
        let native_width_mm = width_px as f32 * MM_PER_INCH / DPI;
        let native_height_mm = height_px as f32 * MM_PER_INCH / DPI;

        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(decoded.to_rgb8()));
        image.add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(placement.x)),
                translate_y: Some(Mm(placement.y)),
                scale_x: Some(placement.width / native_width_mm),
                scale_y: Some(placement.height / native_height_mm),
                dpi: Some(DPI),
                ..Default::default()
            },
        );
    }

    doc.save_to_bytes().map_err(|e| MoriatiError::PdfError(e.to_string()))
}

/// Compose images and persist the document under its fixed name.
///
/// The file is only written after the whole composition succeeded.
pub fn compose_to_file(images: &[UploadedImage], dir: impl AsRef<Path>) -> Result<PathBuf> {
    let bytes = compose(images)?;
    let path = dir.as_ref().join(OUTPUT_FILE_NAME);
    fs::write(&path, bytes)?;

    info!("Saved {}", path.display());
    Ok(path)
}
