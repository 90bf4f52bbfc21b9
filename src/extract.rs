//! PDF text extraction.

use crate::errors::DocumentLoadError;

/// Extract plain text from raw PDF bytes.
///
/// Any parse failure is converted into [`DocumentLoadError::Extract`];
/// malformed input never panics the pipeline. An empty result is returned
/// as `Ok` — the orchestrator decides whether emptiness is an error.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, DocumentLoadError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
        tracing::warn!("invalid PDF: {}", e);
        DocumentLoadError::Extract(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_fail_with_typed_error() {
        let err = extract_pdf_text(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, DocumentLoadError::Extract(_)));
    }

    #[test]
    fn empty_input_fails_with_typed_error() {
        let err = extract_pdf_text(&[]).unwrap_err();
        assert!(matches!(err, DocumentLoadError::Extract(_)));
    }
}
