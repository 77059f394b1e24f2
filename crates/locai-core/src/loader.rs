use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Markdown,
    Pdf,
    /// Recognised but not ingested; image OCR is not implemented.
    Image,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::PlainText),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "png" => Some(Self::Image),
            _ => None,
        }
    }

    pub fn is_ingestible(self) -> bool {
        !matches!(self, Self::Image)
    }
}

/// A loaded source file: its key and its full extracted text body.
#[derive(Debug, Clone)]
pub struct Document {
    /// Document key; stored verbatim in the metadata store.
    pub path: String,
    pub kind: DocumentKind,
    pub text: String,
}

#[derive(Debug, Default, Clone)]
pub struct DocumentLoader;

impl DocumentLoader {
    pub fn new() -> Self { Self }

    /// Load every supported file under `root`, in sorted path order.
    ///
    /// Files that cannot be read or decoded are logged and skipped. Fails with
    /// [`Error::NoInput`] only when nothing could be loaded at all.
    pub fn load_folder(&self, root: &Path) -> Result<Vec<Document>> {
        let root = fs::canonicalize(root)
            .map_err(|e| Error::NoInput(format!("cannot open folder {}: {}", root.display(), e)))?;
        let files = self.list_supported_files(&root);
        if files.is_empty() {
            return Err(Error::NoInput(format!("no supported files found under {}", root.display())));
        }
        let mut documents = Vec::with_capacity(files.len());
        for (file_index, file_path) in files.iter().enumerate() {
            debug!("Loading file {}/{}: {}", file_index + 1, files.len(), file_path.display());
            match self.load_document(file_path) {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!("Skipping {}: {}", file_path.display(), e),
            }
        }
        if documents.is_empty() {
            return Err(Error::NoInput(format!("no readable files under {}", root.display())));
        }
        info!("Loaded {} of {} files from {}", documents.len(), files.len(), root.display());
        Ok(documents)
    }

    /// Extract the text of a single file. Used at build time via
    /// [`load_folder`](Self::load_folder) and again at query time to rematerialise chunks.
    pub fn load_document(&self, path: &Path) -> Result<Document> {
        let kind = DocumentKind::from_path(path).ok_or_else(|| Error::Extraction {
            path: path.display().to_string(),
            reason: "unsupported file type".to_string(),
        })?;
        let text = match kind {
            DocumentKind::PlainText | DocumentKind::Markdown => read_text_lossy(path)?,
            DocumentKind::Pdf => extract_pdf_text(path)?,
            DocumentKind::Image => {
                return Err(Error::Extraction {
                    path: path.display().to_string(),
                    reason: "image ingestion is not implemented".to_string(),
                })
            }
        };
        Ok(Document { path: path.to_string_lossy().to_string(), kind, text })
    }

    fn list_supported_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            match DocumentKind::from_path(path) {
                Some(kind) if kind.is_ingestible() => files.push(path.to_path_buf()),
                Some(_) => debug!("Ignoring image file {}", path.display()),
                None => {}
            }
        }
        files.sort();
        files
    }
}

/// Read a file as UTF-8, dropping invalid byte sequences instead of failing.
fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            let bytes = e.into_bytes();
            let mut text = String::with_capacity(bytes.len());
            for chunk in bytes.utf8_chunks() { text.push_str(chunk.valid()); }
            Ok(text)
        }
    }
}

/// Concatenate the text of every page, in page order.
fn extract_pdf_text(path: &Path) -> Result<String> {
    let extraction_error = |reason: String| Error::Extraction { path: path.display().to_string(), reason };
    let doc = lopdf::Document::load(path).map_err(|e| extraction_error(e.to_string()))?;
    let mut text = String::new();
    // get_pages is keyed by page number, so iteration is already in page order
    for page_number in doc.get_pages().keys() {
        let page_text = doc.extract_text(&[*page_number]).map_err(|e| extraction_error(format!("page {page_number}: {e}")))?;
        text.push_str(&page_text);
    }
    Ok(text)
}
