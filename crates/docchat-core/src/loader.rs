use chrono::Utc;
use globset::{Glob, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::DocumentLoader;
use crate::types::{Document, Metadata};

/// Strict UTF-8 reader for plain text files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn load(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path).map_err(|e| load_error(path, e))?;
        String::from_utf8(bytes).map_err(|e| load_error(path, format!("invalid UTF-8: {e}")))
    }
}

/// Extracts the text layer of a PDF. Pages are joined as extracted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfLoader;

impl DocumentLoader for PdfLoader {
    fn load(&self, path: &Path) -> Result<String> {
        pdf_extract::extract_text(path).map_err(|e| load_error(path, e))
    }
}

fn load_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Load { path: path.to_path_buf(), reason: reason.to_string() }
}

/// Pick the loader for a file extension (case-insensitive).
pub fn loader_for_extension(ext: &str) -> Option<Arc<dyn DocumentLoader>> {
    match ext.to_ascii_lowercase().as_str() {
        "txt" | "text" | "md" => Some(Arc::new(TextLoader)),
        "pdf" => Some(Arc::new(PdfLoader)),
        _ => None,
    }
}

/// Walks a directory, keeps files matching a glob and turns each into one [`Document`].
pub struct DirectoryLoader {
    root: PathBuf,
    pattern: String,
    matcher: GlobMatcher,
    loader: Option<Arc<dyn DocumentLoader>>,
}

impl DirectoryLoader {
    /// The per-file loader is chosen by extension unless one is forced with [`Self::with_loader`].
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> Result<Self> {
        let glob = Glob::new(pattern).map_err(|e| Error::config("corpus.pattern", e.to_string()))?;
        Ok(Self { root: root.into(), pattern: pattern.to_string(), matcher: glob.compile_matcher(), loader: None })
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn root(&self) -> &Path { &self.root }
    pub fn pattern(&self) -> &str { &self.pattern }

    /// Matching files in sorted order. The root must be an existing directory and
    /// any entry the walk cannot read is an error, not a skip.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(load_error(&self.root, "not an existing directory"));
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(&self.root).to_path_buf();
                load_error(&path, e)
            })?;
            if !entry.file_type().is_file() { continue; }
            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            if self.matcher.is_match(relative) { files.push(path.to_path_buf()); }
        }
        files.sort();
        Ok(files)
    }

    /// Load every matching file. The first failure aborts the whole batch.
    pub fn load(&self) -> Result<Vec<Document>> {
        let files = self.list_files()?;
        if files.is_empty() {
            info!(dir = %self.root.display(), pattern = %self.pattern, "no matching files");
            return Ok(vec![]);
        }
        let mut documents = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            debug!("Loading file {}/{}: {}", index + 1, files.len(), path.display());
            let loader = self.loader_for(path)?;
            let text = loader.load(path)?;
            documents.push(new_document(path, text));
        }
        info!("Loaded {} documents from {}", documents.len(), self.root.display());
        Ok(documents)
    }

    fn loader_for(&self, path: &Path) -> Result<Arc<dyn DocumentLoader>> {
        if let Some(loader) = &self.loader { return Ok(loader.clone()); }
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
        loader_for_extension(ext).ok_or_else(|| load_error(path, format!("no loader for extension '{ext}'")))
    }
}

/// Build a document with a fresh id; identical files still get distinct ids.
pub fn new_document(path: &Path, text: String) -> Document {
    let mut metadata = Metadata::new();
    metadata.insert("source".to_string(), path.to_string_lossy().to_string());
    metadata.insert("content_hash".to_string(), blake3::hash(text.as_bytes()).to_hex().to_string());
    metadata.insert("ingested_at".to_string(), Utc::now().to_rfc3339());
    Document { id: uuid::Uuid::new_v4().to_string(), source_path: path.to_path_buf(), text, metadata }
}
