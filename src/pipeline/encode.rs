//! Image encoding: `DynamicImage` → PNG bytes and base64 `ImageData`.
//!
//! PNG keeps pen strokes crisp; JPEG artefacts around thin handwriting make
//! the vision model misread letters. The raw PNG is kept too, so the page
//! image artifact is written from the same bytes the model saw.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page encoded once for both the model and the disk.
pub struct EncodedPage {
    pub png: Vec<u8>,
    pub image: ImageData,
}

/// Encode a rasterised page as PNG plus a `detail: "high"` image attachment.
pub fn encode_page(img: &DynamicImage) -> Result<EncodedPage, image::ImageError> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&png);
    debug!("Encoded image → {} bytes PNG, {} bytes base64", png.len(), b64.len());

    Ok(EncodedPage {
        png,
        image: ImageData::new(b64, "image/png").with_detail("high"),
    })
}
