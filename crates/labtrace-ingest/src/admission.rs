use lopdf::Document;

use crate::error::{IngestError, Result};
use crate::types::{IngestionInput, ALLOWED_MIME_TYPES, MAX_PDF_PAGES, MAX_UPLOAD_BYTES};

/// Validate mime, size, and (for PDFs) page count before any expensive
/// work happens. PDF structure is inspected via `lopdf` — loading only the
/// document's cross-reference table and page tree, not rendering anything.
pub fn admit(input: &IngestionInput) -> Result<()> {
    if !ALLOWED_MIME_TYPES.contains(&input.declared_mime.as_str()) {
        return Err(IngestError::UnsupportedMime(input.declared_mime.clone()));
    }

    if input.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(IngestError::TooLarge {
            size: input.bytes.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }

    if input.declared_mime == "application/pdf" {
        let doc = Document::load_mem(&input.bytes).map_err(|e| IngestError::MalformedPdf(e.to_string()))?;
        let pages = doc.get_pages().len();
        if pages > MAX_PDF_PAGES {
            return Err(IngestError::TooManyPages {
                pages,
                limit: MAX_PDF_PAGES,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_core::types::UserId;

    fn input_with(mime: &str, bytes: Vec<u8>) -> IngestionInput {
        IngestionInput {
            owner_user_id: UserId::new(),
            bytes,
            declared_mime: mime.to_string(),
            original_filename: "report.pdf".to_string(),
        }
    }

    #[test]
    fn rejects_unsupported_mime() {
        let input = input_with("application/zip", vec![1, 2, 3]);
        assert!(matches!(admit(&input), Err(IngestError::UnsupportedMime(_))));
    }

    #[test]
    fn rejects_oversized_upload() {
        let input = input_with("image/png", vec![0u8; MAX_UPLOAD_BYTES + 1]);
        assert!(matches!(admit(&input), Err(IngestError::TooLarge { .. })));
    }
}
