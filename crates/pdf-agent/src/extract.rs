//! Text extraction from input files.
//!
//! `.pdf` goes through `pdf-extract`; `.md`, `.markdown` and `.txt` are read
//! as UTF-8. Anything else is unsupported. Extraction never panics: a
//! malformed PDF becomes an [`ExtractError::Pdf`] and the caller skips the
//! document.

use std::path::Path;

use pdf_agent_core::models::Document;
use pdf_agent_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Turns one file into plain text.
pub trait DocumentLoader: Send + Sync {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Loader for the formats supported out of the box.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileLoader;

impl DocumentLoader for FileLoader {
    fn extract_text(&self, path: &Path) -> Result<String, ExtractError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => extract_pdf(&std::fs::read(path)?),
            "md" | "markdown" | "txt" => Ok(std::fs::read_to_string(path)?),
            "" => Err(ExtractError::Unsupported(format!(
                "{} has no extension",
                path.display()
            ))),
            other => Err(ExtractError::Unsupported(format!(".{}", other))),
        }
    }
}

pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf("parser panicked".to_string())),
    }
}

/// Load `path` as a [`Document`] identified by `source_id`.
pub fn load_document(
    loader: &dyn DocumentLoader,
    path: &Path,
    source_id: &str,
) -> pdf_agent_core::Result<Document> {
    let text = loader
        .extract_text(path)
        .map_err(|e| Error::SourceRead {
            source_id: source_id.to_string(),
            message: e.to_string(),
        })?;
    Ok(Document::new(source_id, text))
}

#[cfg(test)]
pub(crate) fn minimal_pdf_with_text(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_text_and_markdown() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        let md = tmp.path().join("README.MD");
        std::fs::write(&txt, "plain notes").unwrap();
        std::fs::write(&md, "# Title\n\nbody").unwrap();

        assert_eq!(FileLoader.extract_text(&txt).unwrap(), "plain notes");
        assert_eq!(FileLoader.extract_text(&md).unwrap(), "# Title\n\nbody");
    }

    #[test]
    fn test_extracts_pdf_text() {
        let tmp = TempDir::new().unwrap();
        let pdf = tmp.path().join("paris.pdf");
        std::fs::write(&pdf, minimal_pdf_with_text("capital of France")).unwrap();

        let text = FileLoader.extract_text(&pdf).unwrap();
        assert!(text.contains("capital of France"), "got: {:?}", text);
    }

    #[test]
    fn test_invalid_pdf_is_an_error() {
        let err = extract_pdf(b"not a pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let tmp = TempDir::new().unwrap();
        let bin = tmp.path().join("image.png");
        std::fs::write(&bin, [0u8, 1, 2]).unwrap();
        assert!(matches!(
            FileLoader.extract_text(&bin).unwrap_err(),
            ExtractError::Unsupported(_)
        ));
    }

    #[test]
    fn test_load_document_maps_to_source_read() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("gone.txt");
        let err = load_document(&FileLoader, &missing, "gone.txt").unwrap_err();
        match err {
            Error::SourceRead { source_id, .. } => assert_eq!(source_id, "gone.txt"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_text_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("bad.txt");
        std::fs::write(&txt, [0xff, 0xfe, 0x00]).unwrap();
        assert!(matches!(
            FileLoader.extract_text(&txt).unwrap_err(),
            ExtractError::Io(_)
        ));
    }
}
