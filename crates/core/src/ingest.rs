use crate::extractor::{extract_page_texts, join_pages, page_count};
use crate::models::Document;
use crate::IngestError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Extracts a PDF into a [`Document`]. The identifier is derived from the owner
/// and the file checksum, so re-uploading the same file maps to the same report.
pub fn load_document(path: &Path, owner: &str) -> Result<Document, IngestError> {
    if path.file_name().is_none() {
        return Err(IngestError::MissingFileName(path.display().to_string()));
    }

    let checksum = digest_file(path)?;
    let pages = extract_page_texts(path)?;

    Ok(Document {
        id: generate_document_id(owner, &checksum),
        owner: owner.to_string(),
        text: join_pages(&pages),
        page_count: page_count(&pages),
        source_path: Some(path.to_string_lossy().to_string()),
        checksum,
        created_at: Utc::now(),
    })
}

/// Plain-text reports are a single page.
pub fn load_text_document(path: &Path, owner: &str) -> Result<Document, IngestError> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "{} contains no text",
            path.display()
        )));
    }

    let checksum = digest_file(path)?;
    let mut document = Document::with_id(generate_document_id(owner, &checksum), owner, text, 1);
    document.source_path = Some(path.to_string_lossy().to_string());
    Ok(document)
}

pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

pub struct FolderLoadReport {
    pub documents: Vec<Document>,
    pub skipped_files: Vec<SkippedPdf>,
}

pub fn load_folder_best_effort(
    folder: &Path,
    owner: &str,
) -> Result<FolderLoadReport, IngestError> {
    let files = discover_pdf_files(folder);

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(format!(
            "no pdf files found in {}",
            folder.display()
        )));
    }

    let mut documents = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        match load_document(&path, owner) {
            Ok(document) => documents.push(document),
            Err(error) => skipped_files.push(SkippedPdf {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(FolderLoadReport {
        documents,
        skipped_files,
    })
}

fn generate_document_id(owner: &str, checksum: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner.as_bytes());
    hasher.update(b":");
    hasher.update(checksum.as_bytes());
    format!("{:x}", hasher.finalize())
}
