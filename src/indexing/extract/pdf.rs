use super::Extractor;
use crate::core::error::ExtractError;
use std::path::Path;

/// PDF text via pdf-extract.
pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &[&'static str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ExtractError::Corrupt(format!("PDF extraction failed: {}", e)))
    }
}


