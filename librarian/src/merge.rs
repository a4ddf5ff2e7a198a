//! Merging publisher, document and content metadata into one record.

use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::content::ContentRecord;
use crate::document::{CREATOR_KEY, DATE_KEY, RawDocumentMetadata, TITLE_KEY};
use crate::error::{LibrarianError, Result};
use crate::publisher::PublisherTable;

pub const DEFAULT_TITLE: &str = "Unknown Title";
pub const DEFAULT_AUTHOR: &str = "Unknown Author";
pub const DEFAULT_YEAR: i32 = 0;

/// Final metadata for one book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub publishing_year: i32,
    pub epub_id: String,
    #[serde(flatten)]
    pub content: ContentRecord,
}

impl BookMetadata {
    /// Serialize with 4-space indentation
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        String::from_utf8(buf).map_err(|e| LibrarianError::Format(e.to_string()))
    }
}

/// Merge the three metadata sources for book `id`.
///
/// Title, author and year take the first non-blank value from the publisher
/// record, then the document metadata, then a fixed default. Content fields
/// are copied through unchanged.
pub fn merge(
    publisher: &PublisherTable,
    id: &str,
    doc_metadata: &RawDocumentMetadata,
    content: ContentRecord,
) -> Result<BookMetadata> {
    let record = publisher.get(id);

    let title = pick(record.map(|r| r.title.as_str()), doc_metadata, TITLE_KEY)
        .unwrap_or(DEFAULT_TITLE)
        .to_string();
    let author = pick(record.map(|r| r.author.as_str()), doc_metadata, CREATOR_KEY)
        .unwrap_or(DEFAULT_AUTHOR)
        .to_string();
    let year = pick(
        record.map(|r| r.publishing_year.as_str()),
        doc_metadata,
        DATE_KEY,
    );
    let publishing_year = match year {
        Some(raw) => parse_year(raw)
            .map_err(|e| LibrarianError::Format(format!("{} (book {})", e, id)))?,
        None => DEFAULT_YEAR,
    };

    if record.is_none() {
        log::debug!("No publisher record for {}", id);
    }

    Ok(BookMetadata {
        title,
        author,
        publishing_year,
        epub_id: id.to_string(),
        content,
    })
}

/// First non-blank of the publisher value and the document value for `key`,
/// returned as stored
fn pick<'a>(
    publisher_value: Option<&'a str>,
    doc_metadata: &'a RawDocumentMetadata,
    key: &str,
) -> Option<&'a str> {
    let present = |v: &&str| !v.trim().is_empty();
    publisher_value
        .filter(present)
        .or_else(|| doc_metadata.get(key).map(String::as_str).filter(present))
}

/// Coerce a year or an ISO 8601 date into a year
pub fn parse_year(raw: &str) -> std::result::Result<i32, String> {
    let value = raw.trim();

    if let Ok(year) = value.parse::<i32>() {
        return Ok(year);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Ok(date.year());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.year());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", value), "%Y-%m-%d") {
        return Ok(date.year());
    }

    Err(format!("publishing year {:?} is not a year or date", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{CharacterRelationship, Setting};
    use crate::publisher::PublisherRecord;
    use proptest::prelude::*;

    fn content() -> ContentRecord {
        ContentRecord {
            genre: "Fantasy".to_string(),
            themes: vec!["quest".into(), "friendship".into(), "power".into()],
            setting: Setting {
                time: "Third Age".to_string(),
                place: "Middle-earth".to_string(),
            },
            cultural_context: "Interwar English philology.".to_string(),
            narrative_tone: "Elegiac.".to_string(),
            author_writing_style: "Ornate, archaic diction.".to_string(),
            characters_and_relationships: vec![
                CharacterRelationship {
                    name: "Frodo".into(),
                    relationship: "Ring-bearer".into(),
                },
                CharacterRelationship {
                    name: "Sam".into(),
                    relationship: "Companion".into(),
                },
                CharacterRelationship {
                    name: "Gollum".into(),
                    relationship: "Former bearer".into(),
                },
            ],
        }
    }

    fn record(title: &str, author: &str, year: &str) -> PublisherRecord {
        PublisherRecord {
            title: title.to_string(),
            author: author.to_string(),
            publishing_year: year.to_string(),
        }
    }

    fn table(id: &str, rec: PublisherRecord) -> PublisherTable {
        let mut table = PublisherTable::new();
        table.insert(id.to_string(), rec);
        table
    }

    fn doc(pairs: &[(&str, &str)]) -> RawDocumentMetadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_publisher_wins() {
        let publisher = table("b1", record("T", "A", "1999"));
        let doc = doc(&[(TITLE_KEY, "X"), (CREATOR_KEY, "Y"), (DATE_KEY, "2001")]);

        let book = merge(&publisher, "b1", &doc, content()).unwrap();

        assert_eq!(book.title, "T");
        assert_eq!(book.author, "A");
        assert_eq!(book.publishing_year, 1999);
        assert_eq!(book.epub_id, "b1");
    }

    #[test]
    fn test_falls_back_to_document() {
        let doc = doc(&[
            (TITLE_KEY, "Doc Title"),
            (CREATOR_KEY, "Doc Author"),
            (DATE_KEY, "1954-07-29"),
        ]);

        let book = merge(&PublisherTable::new(), "b2", &doc, content()).unwrap();

        assert_eq!(book.title, "Doc Title");
        assert_eq!(book.author, "Doc Author");
        assert_eq!(book.publishing_year, 1954);
    }

    #[test]
    fn test_defaults_when_absent_everywhere() {
        let book = merge(
            &PublisherTable::new(),
            "b3",
            &RawDocumentMetadata::new(),
            content(),
        )
        .unwrap();

        assert_eq!(book.title, DEFAULT_TITLE);
        assert_eq!(book.author, DEFAULT_AUTHOR);
        assert_eq!(book.publishing_year, DEFAULT_YEAR);
        assert_eq!(book.content, content());
    }

    #[test]
    fn test_fields_fall_back_independently() {
        let publisher = table("b4", record("Publisher Title", "", ""));
        let doc = doc(&[(CREATOR_KEY, "Doc Author")]);

        let book = merge(&publisher, "b4", &doc, content()).unwrap();

        assert_eq!(book.title, "Publisher Title");
        assert_eq!(book.author, "Doc Author");
        assert_eq!(book.publishing_year, 0);
    }

    #[test]
    fn test_blank_publisher_value_is_absent() {
        let publisher = table("b5", record("   ", "A", "1999"));
        let doc = doc(&[(TITLE_KEY, "Doc Title")]);

        let book = merge(&publisher, "b5", &doc, content()).unwrap();
        assert_eq!(book.title, "Doc Title");
    }

    #[test]
    fn test_values_pass_through_untrimmed() {
        let publisher = table("b8", record("  Padded  ", "A", " 1999 "));
        let doc = doc(&[(CREATOR_KEY, " Doc Author")]);

        let book = merge(&publisher, "b8", &doc, content()).unwrap();
        assert_eq!(book.title, "  Padded  ");
        assert_eq!(book.publishing_year, 1999);

        let book = merge(&table("b8", record("T", "", "")), "b8", &doc, content()).unwrap();
        assert_eq!(book.author, " Doc Author");
    }

    #[test]
    fn test_other_ids_do_not_leak() {
        let publisher = table("other", record("T", "A", "1999"));

        let book = merge(&publisher, "b6", &RawDocumentMetadata::new(), content()).unwrap();
        assert_eq!(book.title, DEFAULT_TITLE);
        assert_eq!(book.epub_id, "b6");
    }

    #[test]
    fn test_non_numeric_year_is_format_error() {
        let publisher = table("b7", record("T", "A", "nineteen ninety-nine"));

        let err = merge(&publisher, "b7", &RawDocumentMetadata::new(), content()).unwrap_err();
        assert!(matches!(err, LibrarianError::Format(_)));
        assert!(err.to_string().contains("b7"));
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("1999"), Ok(1999));
        assert_eq!(parse_year(" 1851 "), Ok(1851));
        assert_eq!(parse_year("2008-06-27"), Ok(2008));
        assert_eq!(parse_year("2008-06"), Ok(2008));
        assert_eq!(parse_year("2011-03-01T00:00:00+00:00"), Ok(2011));
        assert!(parse_year("circa 1900").is_err());
        assert!(parse_year("").is_err());
    }

    #[test]
    fn test_end_to_end_b1() {
        let publisher = table("b1", record("T", "A", "1999"));
        let doc = doc(&[(TITLE_KEY, "X")]);

        let book = merge(&publisher, "b1", &doc, content()).unwrap();

        assert_eq!(book.title, "T");
        assert_eq!(book.publishing_year, 1999);
        assert_eq!(book.content.genre, "Fantasy");
    }

    #[test]
    fn test_json_layout() {
        let book = merge(
            &table("b1", record("T", "A", "1999")),
            "b1",
            &RawDocumentMetadata::new(),
            content(),
        )
        .unwrap();

        let json = book.to_json_pretty().unwrap();
        assert!(json.starts_with("{\n    \"title\": \"T\",\n    \"author\": \"A\""));
        assert!(json.contains("\n    \"epub_id\": \"b1\",\n    \"genre\": \"Fantasy\""));
        assert!(json.contains("\"setting\": {\n        \"time\": \"Third Age\""));

        let back: BookMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, book);
    }

    proptest! {
        #[test]
        fn prop_publisher_title_always_wins(
            title in "[A-Za-z][A-Za-z ]{0,20}",
            doc_title in "[A-Za-z ]{0,20}",
        ) {
            let publisher = table("id", record(&title, "A", "2000"));
            let doc = doc(&[(TITLE_KEY, doc_title.as_str())]);

            let book = merge(&publisher, "id", &doc, content()).unwrap();
            prop_assert_eq!(book.title, title);
        }
    }
}
