//! Extension-keyed text extraction.
//!
//! Each supported format is an [`Extractor`]; the [`ExtractorRegistry`] maps a
//! normalized extension to the extractor that handles it. Adding a format means
//! registering another implementation, the indexer never branches on type.

mod legacy;
mod office;
mod pdf;

use crate::core::error::ExtractError;
use pulldown_cmark::{Event, Parser, TagEnd};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub use legacy::{DocExtractor, RtfExtractor};
pub use office::DocxExtractor;
pub use pdf::PdfExtractor;

/// Turns one file into plain text.
pub trait Extractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Extensions handled, without the leading dot
    fn extensions(&self) -> &[&'static str];

    /// Extract the text content of `path`
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Registry of extractors keyed by lowercase extension.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in format
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextExtractor);
        registry.register(MarkdownExtractor);
        registry.register(PdfExtractor);
        registry.register(DocxExtractor);
        registry.register(RtfExtractor);
        registry.register(DocExtractor);
        registry
    }

    /// Register an extractor for all of its extensions, replacing earlier ones
    pub fn register<E: Extractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn Extractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(normalize_extension(ext), Arc::clone(&extractor));
        }
    }

    /// Look up the extractor for an extension (`pdf`, `.pdf` and `PDF` are equivalent)
    pub fn get(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.by_extension.get(&normalize_extension(extension)).cloned()
    }

    /// Check whether `path` has a registered extension
    pub fn supports(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    fn for_path(&self, path: &Path) -> Option<Arc<dyn Extractor>> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.get(ext))
    }

    /// Extract text from `path`. `Ok(None)` means the extension is not supported.
    pub fn extract(&self, path: &Path) -> Result<Option<String>, ExtractError> {
        match self.for_path(path) {
            Some(extractor) => extractor.extract(path).map(Some),
            None => Ok(None),
        }
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Passthrough for text-like formats; invalid UTF-8 is replaced, not rejected.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn extensions(&self) -> &[&'static str] {
        &[
            "txt", "log", "csv", "json", "yaml", "yml", "toml", "xml", "html", "htm", "css",
            "js", "ts", "jsx", "tsx", "py", "rs", "go", "java", "c", "cpp", "h", "sh",
        ]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Markdown rendered down to its text, one line per block.
pub struct MarkdownExtractor;

impl Extractor for MarkdownExtractor {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extensions(&self) -> &[&'static str] {
        &["md", "markdown"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        Ok(markdown_to_text(&String::from_utf8_lossy(&bytes)))
    }
}

pub(crate) fn markdown_to_text(content: &str) -> String {
    let mut text = String::with_capacity(content.len());

    for event in Parser::new(content) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::Heading(_))
            | Event::End(TagEnd::Item)
            | Event::End(TagEnd::CodeBlock) => text.push('\n'),
            _ => {}
        }
    }

    text.trim_end().to_string()
}


