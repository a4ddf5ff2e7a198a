//! Per-book pipeline: document extraction, content extraction, merge.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::document::{self, DocumentParser, EpubParser};
use crate::error::{LibrarianError, Result};
use crate::extractor::ContentExtractor;
use crate::merge::{BookMetadata, merge};
use crate::publisher::PublisherTable;

/// Outcome for one book in a batch
#[derive(Debug)]
pub struct BookOutcome {
    pub path: PathBuf,
    pub result: Result<BookMetadata>,
}

pub struct Librarian<'a> {
    extractor: ContentExtractor<'a>,
    parser: Box<dyn DocumentParser>,
    publisher: PublisherTable,
    cancel: CancellationToken,
}

impl<'a> Librarian<'a> {
    /// Create a pipeline that parses books as EPUB
    pub fn new(extractor: ContentExtractor<'a>, publisher: PublisherTable) -> Self {
        Self::with_parser(extractor, publisher, Box::new(EpubParser))
    }

    pub fn with_parser(
        extractor: ContentExtractor<'a>,
        publisher: PublisherTable,
        parser: Box<dyn DocumentParser>,
    ) -> Self {
        Self {
            extractor,
            parser,
            publisher,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and pending work when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Produce the merged metadata for one book
    pub async fn process_book(&self, path: &Path) -> Result<BookMetadata> {
        let started = Instant::now();
        log::info!("Processing {}", path.display());

        let doc = document::extract(self.parser.as_ref(), path);
        let content = self
            .extractor
            .extract_content_with_cancel(doc.content(), &self.cancel)
            .await?;
        let book = merge(&self.publisher, &doc.id, doc.metadata(), content)?;

        log::info!(
            "Finished {} in {:.2}s",
            doc.id,
            started.elapsed().as_secs_f64()
        );
        Ok(book)
    }

    /// Process books one after another. A failure only affects its own book.
    pub async fn process_books(&self, paths: &[PathBuf]) -> Vec<BookOutcome> {
        self.process_books_with(paths, |_| Ok(())).await
    }

    /// Process books one after another, handing each finished book to `sink`
    /// before the next one starts. A sink error fails that book only.
    pub async fn process_books_with<F>(&self, paths: &[PathBuf], mut sink: F) -> Vec<BookOutcome>
    where
        F: FnMut(&BookMetadata) -> Result<()>,
    {
        let mut outcomes = Vec::with_capacity(paths.len());

        for path in paths {
            let result = if self.cancel.is_cancelled() {
                Err(LibrarianError::Cancelled)
            } else {
                match self.process_book(path).await {
                    Ok(book) => sink(&book).map(|()| book),
                    Err(e) => Err(e),
                }
            };

            if let Err(e) = &result {
                log::error!("Failed to process {}: {}", path.display(), e);
            }

            outcomes.push(BookOutcome {
                path: path.clone(),
                result,
            });
        }

        outcomes
    }
}

/// Identifiers shared by more than one path, with the paths that share them
pub fn duplicate_identifiers(paths: &[PathBuf]) -> BTreeMap<String, Vec<PathBuf>> {
    let mut by_id: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        by_id
            .entry(document::derive_identifier(path))
            .or_default()
            .push(path.clone());
    }
    by_id.retain(|_, paths| paths.len() > 1);
    by_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionSettings, RetryConfig};
    use crate::document::{ParsedDocument, TITLE_KEY};
    use crate::publisher::PublisherRecord;
    use crate::session::ExtractionSession;
    use llm_client::MockProvider;
    use std::sync::Arc;

    const RESPONSE: &str = r#"{
        "genre": "Mystery",
        "themes": ["deduction", "justice", "friendship"],
        "setting": {"time": "1880s", "place": "London"},
        "cultural_context": "Victorian England.",
        "narrative_tone": "Brisk.",
        "author_writing_style": "First-person narration by a companion.",
        "characters_and_relationships": [
            {"name": "Holmes", "relationship": "Detective"},
            {"name": "Watson", "relationship": "Holmes's friend"},
            {"name": "Lestrade", "relationship": "Police inspector"}
        ]
    }"#;

    struct TitleParser;

    impl DocumentParser for TitleParser {
        fn parse(&self, path: &Path) -> anyhow::Result<ParsedDocument> {
            let mut doc = ParsedDocument::default();
            doc.metadata.insert(
                TITLE_KEY.to_string(),
                format!("Title of {}", document::derive_identifier(path)),
            );
            doc.content = "It was a dark night.".to_string();
            Ok(doc)
        }
    }

    fn settings() -> ExtractionSettings {
        ExtractionSettings {
            retry: RetryConfig {
                max_attempts: 1,
                ..RetryConfig::default()
            },
            ..ExtractionSettings::default()
        }
    }

    #[tokio::test]
    async fn test_process_book_uses_document_content() {
        let provider = Arc::new(MockProvider::always_succeeds(RESPONSE));
        let session = ExtractionSession::from_provider(provider.clone());
        let librarian = Librarian::with_parser(
            ContentExtractor::new(&session, settings()),
            PublisherTable::new(),
            Box::new(TitleParser),
        );

        let book = librarian
            .process_book(Path::new("shelf/study.epub"))
            .await
            .unwrap();

        assert_eq!(book.epub_id, "study");
        assert_eq!(book.title, "Title of study");
        assert_eq!(book.content.genre, "Mystery");
        assert!(
            provider
                .last_request()
                .unwrap()
                .prompt
                .ends_with("It was a dark night.")
        );
    }

    #[tokio::test]
    async fn test_publisher_record_applied_by_identifier() {
        let provider = Arc::new(MockProvider::always_succeeds(RESPONSE));
        let session = ExtractionSession::from_provider(provider);
        let mut publisher = PublisherTable::new();
        publisher.insert(
            "study".to_string(),
            PublisherRecord {
                title: "A Study in Scarlet".to_string(),
                author: "Arthur Conan Doyle".to_string(),
                publishing_year: "1887".to_string(),
            },
        );
        let librarian = Librarian::with_parser(
            ContentExtractor::new(&session, settings()),
            publisher,
            Box::new(TitleParser),
        );

        let book = librarian
            .process_book(Path::new("study.epub"))
            .await
            .unwrap();
        assert_eq!(book.title, "A Study in Scarlet");
        assert_eq!(book.publishing_year, 1887);
    }

    #[tokio::test]
    async fn test_cancelled_batch_skips_remaining_books() {
        let provider = Arc::new(MockProvider::always_succeeds(RESPONSE));
        let session = ExtractionSession::from_provider(provider.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let librarian = Librarian::with_parser(
            ContentExtractor::new(&session, settings()),
            PublisherTable::new(),
            Box::new(TitleParser),
        )
        .with_cancellation(cancel);

        let outcomes = librarian
            .process_books(&[PathBuf::from("a.epub"), PathBuf::from("b.epub")])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o.result, Err(LibrarianError::Cancelled)))
        );
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_sink_failure_fails_only_that_book() {
        let provider = Arc::new(MockProvider::always_succeeds(RESPONSE));
        let session = ExtractionSession::from_provider(provider.clone());
        let librarian = Librarian::with_parser(
            ContentExtractor::new(&session, settings()),
            PublisherTable::new(),
            Box::new(TitleParser),
        );

        let mut written = Vec::new();
        let paths = [
            PathBuf::from("a.epub"),
            PathBuf::from("b.epub"),
            PathBuf::from("c.epub"),
        ];
        let outcomes = librarian
            .process_books_with(&paths, |book| {
                if book.epub_id == "b" {
                    return Err(LibrarianError::Format("disk full".into()));
                }
                written.push(book.epub_id.clone());
                Ok(())
            })
            .await;

        assert_eq!(written, vec!["a", "c"]);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(outcomes[1].result, Err(LibrarianError::Format(_))));
        assert_eq!(outcomes[2].result.as_ref().unwrap().epub_id, "c");
        assert_eq!(provider.call_count(), 3);
    }

    #[test]
    fn test_duplicate_identifiers() {
        let paths = [
            PathBuf::from("shelf/a/x.epub"),
            PathBuf::from("shelf/b/x.epub"),
            PathBuf::from("shelf/y.epub"),
        ];

        let duplicates = duplicate_identifiers(&paths);

        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates["x"], vec![paths[0].clone(), paths[1].clone()]);
        assert!(duplicate_identifiers(&paths[1..]).is_empty());
    }
}
