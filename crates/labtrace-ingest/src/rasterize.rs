//! Rasterizes PDF pages to PNG for vision providers that can't accept
//! native PDF input. Runs inside a `tempfile::TempDir` so the working
//! directory is released on every exit path, including panics unwound
//! through this frame.

use image::imageops::FilterType;
use image::GenericImageView;
use pdfium_render::prelude::*;

use crate::error::{IngestError, Result};
use crate::types::RASTERIZE_LONG_EDGE_PX;

pub fn rasterize_pdf(pdf_bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
    let workdir = tempfile::tempdir().map_err(|e| IngestError::Rasterize(e.to_string()))?;

    let pdfium = Pdfium::new(
        Pdfium::bind_to_system_library().map_err(|e| IngestError::Rasterize(e.to_string()))?,
    );
    let document = pdfium
        .load_pdf_from_byte_slice(pdf_bytes, None)
        .map_err(|e| IngestError::Rasterize(e.to_string()))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(RASTERIZE_LONG_EDGE_PX as i32)
        .set_maximum_height(RASTERIZE_LONG_EDGE_PX as i32);

    let mut pages = Vec::new();
    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| IngestError::Rasterize(e.to_string()))?;
        let dynamic_image = bitmap.as_image();

        let resized = scale_to_long_edge(&dynamic_image, RASTERIZE_LONG_EDGE_PX);

        let page_path = workdir.path().join(format!("page-{index}.png"));
        resized
            .save_with_format(&page_path, image::ImageFormat::Png)
            .map_err(|e| IngestError::Rasterize(e.to_string()))?;
        let encoded = std::fs::read(&page_path).map_err(|e| IngestError::Rasterize(e.to_string()))?;
        pages.push(encoded);
    }

    // `workdir` drops here regardless of how the loop above exited.
    Ok(pages)
}

fn scale_to_long_edge(img: &image::DynamicImage, long_edge: u32) -> image::DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= long_edge {
        return img.clone();
    }
    if w >= h {
        img.resize(long_edge, (long_edge as u64 * h as u64 / w as u64) as u32, FilterType::Lanczos3)
    } else {
        img.resize((long_edge as u64 * w as u64 / h as u64) as u32, long_edge, FilterType::Lanczos3)
    }
}
