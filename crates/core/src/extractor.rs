use crate::chunking::{normalize_page_text, page_marker};
use crate::error::IngestError;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn extract_pages_from_bytes(
        &self,
        bytes: &[u8],
        label: &str,
    ) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(bytes)
            .map_err(|error| IngestError::PdfParse(format!("{label}: {error}")))?;
        pages_of(&document, label)
    }
}

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            Document::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;
        pages_of(&document, &path.display().to_string())
    }
}

fn pages_of(document: &Document, label: &str) -> Result<Vec<PageText>, IngestError> {
    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let text = normalize_page_text(&text);
        if !text.is_empty() {
            pages.push(PageText {
                number: page_no,
                text,
            });
        }
    }

    if pages.is_empty() {
        return Err(IngestError::PdfParse(format!(
            "pdf had no readable page text: {label}"
        )));
    }

    Ok(pages)
}

pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>, IngestError> {
    LopdfExtractor.extract_pages(path)
}

/// Joins pages into one text with a marker line ahead of each page, which the
/// chunker treats as its preferred split point.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| format!("{}\n{}", page_marker(page.number), page.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn page_count(pages: &[PageText]) -> u32 {
    pages.iter().map(|page| page.number).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::split_into_chunks;

    fn pages() -> Vec<PageText> {
        vec![
            PageText {
                number: 1,
                text: "Patient: Jane Doe".to_string(),
            },
            PageText {
                number: 3,
                text: "Vitamin D 18 ng/mL".to_string(),
            },
        ]
    }

    #[test]
    fn joined_pages_carry_markers() {
        let joined = join_pages(&pages());
        assert_eq!(
            joined,
            "--- Page 1 ---\nPatient: Jane Doe\n\n--- Page 3 ---\nVitamin D 18 ng/mL"
        );
    }

    #[test]
    fn joined_pages_split_on_markers() {
        let chunks = split_into_chunks(&join_pages(&pages()), 40);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].starts_with("--- Page 3 ---"));
    }

    #[test]
    fn page_count_is_highest_page_number() {
        assert_eq!(page_count(&pages()), 3);
        assert_eq!(page_count(&[]), 0);
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = LopdfExtractor.extract_pages_from_bytes(b"%PDF-1.4\n%broken", "upload.pdf");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }
}
