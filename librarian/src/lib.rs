//! Book metadata extraction.
//!
//! Combines publisher-supplied records, EPUB Dublin Core metadata and
//! LLM-derived content attributes into a single [`BookMetadata`] per book.

pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod extractor;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod publisher;
pub mod session;

pub use config::{ExtractionSettings, LibrarianConfig, RetryConfig};
pub use content::{CharacterRelationship, ContentRecord, Setting, parse_content_record};
pub use document::{
    DocumentOutcome, DocumentParser, EpubParser, ExtractedDocument, ParsedDocument,
    RawDocumentMetadata, derive_identifier, extract,
};
pub use error::{LibrarianError, Result};
pub use extractor::ContentExtractor;
pub use merge::{BookMetadata, merge};
pub use output::OutputTarget;
pub use pipeline::{BookOutcome, Librarian, duplicate_identifiers};
pub use publisher::{PublisherRecord, PublisherTable, parse_separator, read_publisher_table};
pub use session::ExtractionSession;
