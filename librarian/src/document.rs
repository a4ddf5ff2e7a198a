//! Document metadata and text extraction.
//!
//! Parsing failures never propagate: they are logged and the document is
//! reported as [`DocumentOutcome::Degraded`], whose accessors yield empty
//! metadata and empty content so the rest of the pipeline proceeds on
//! publisher data alone.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

/// Dublin Core metadata key for the book title
pub const TITLE_KEY: &str = "dc:title";
/// Dublin Core metadata key for the primary author
pub const CREATOR_KEY: &str = "dc:creator";
/// Dublin Core metadata key for the publication date
pub const DATE_KEY: &str = "dc:date";

/// Dublin Core elements read from the package document
const DUBLIN_CORE_ELEMENTS: &[&str] = &[
    "title",
    "creator",
    "date",
    "language",
    "publisher",
    "identifier",
    "subject",
    "description",
];

/// Descriptive metadata as reported by the document, keyed `dc:<element>`
pub type RawDocumentMetadata = BTreeMap<String, String>;

/// Output of a successful parse
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub metadata: RawDocumentMetadata,
    pub content: String,
}

/// Something that can turn a book file into metadata and plain text
pub trait DocumentParser: Send + Sync {
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;
}

/// Result of extracting a document, successful or not
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOutcome {
    Parsed(ParsedDocument),
    Degraded { reason: String },
}

/// A document together with the identifier derived from its path
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub id: String,
    pub outcome: DocumentOutcome,
}

impl ExtractedDocument {
    /// Document metadata, empty when extraction degraded
    pub fn metadata(&self) -> &RawDocumentMetadata {
        static EMPTY: RawDocumentMetadata = BTreeMap::new();
        match &self.outcome {
            DocumentOutcome::Parsed(doc) => &doc.metadata,
            DocumentOutcome::Degraded { .. } => &EMPTY,
        }
    }

    /// Plain-text content, empty when extraction degraded
    pub fn content(&self) -> &str {
        match &self.outcome {
            DocumentOutcome::Parsed(doc) => &doc.content,
            DocumentOutcome::Degraded { .. } => "",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, DocumentOutcome::Degraded { .. })
    }
}

/// Derive the book identifier: the file name without its extension
pub fn derive_identifier(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract metadata and content from `path`, degrading on any parse failure
pub fn extract(parser: &dyn DocumentParser, path: &Path) -> ExtractedDocument {
    let id = derive_identifier(path);

    let outcome = match parser.parse(path) {
        Ok(doc) => {
            log::debug!(
                "Extracted {} metadata field(s) and {} characters from {}",
                doc.metadata.len(),
                doc.content.len(),
                path.display()
            );
            DocumentOutcome::Parsed(doc)
        }
        Err(e) => {
            log::warn!(
                "Could not parse {}, continuing without document metadata: {:#}",
                path.display(),
                e
            );
            DocumentOutcome::Degraded {
                reason: format!("{:#}", e),
            }
        }
    };

    ExtractedDocument { id, outcome }
}

/// EPUB parser backed by the `epub` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct EpubParser;

impl DocumentParser for EpubParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let mut doc = epub::doc::EpubDoc::new(path)
            .map_err(|e| anyhow::anyhow!("Failed to open EPUB: {}", e))?;

        let mut metadata = RawDocumentMetadata::new();
        for element in DUBLIN_CORE_ELEMENTS {
            if let Some(item) = doc.mdata(element) {
                let value = item.value.trim();
                if !value.is_empty() {
                    metadata.insert(format!("dc:{}", element), value.to_string());
                }
            }
        }

        let mut chapters = Vec::new();
        let spine = doc.spine.clone();

        for spine_item in spine.iter() {
            if let Some((content_bytes, _mime)) = doc.get_resource(&spine_item.idref) {
                let html = String::from_utf8_lossy(&content_bytes);
                let text = html_to_text(&html);
                if !text.trim().is_empty() {
                    chapters.push(text);
                }
            }
        }

        Ok(ParsedDocument {
            metadata,
            content: chapters.join("\n\n"),
        })
    }
}

/// Convert an XHTML chapter to plain text
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), 1000);
    clean_text(&text)
}

/// Collapse wrapped lines into paragraphs and decode leftover entities
fn clean_text(text: &str) -> String {
    let mut result = String::new();
    let mut prev_was_newline = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if !prev_was_newline && !result.is_empty() {
                result.push_str("\n\n");
                prev_was_newline = true;
            }
            continue;
        }

        prev_was_newline = false;

        if !result.is_empty() && !result.ends_with('\n') {
            result.push(' ');
        }

        result.push_str(trimmed);
    }

    result
        .trim_end()
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}
