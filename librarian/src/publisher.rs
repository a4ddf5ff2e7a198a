//! Publisher-supplied metadata tables.
//!
//! A delimited file with a header row followed by
//! `identifier, title, author, publishing_year` rows. Extra columns are
//! ignored; a row with fewer than four columns fails the whole read.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LibrarianError, Result};

/// One row of the publisher table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublisherRecord {
    pub title: String,
    pub author: String,
    pub publishing_year: String,
}

/// Publisher records keyed by book identifier
pub type PublisherTable = HashMap<String, PublisherRecord>;

const REQUIRED_COLUMNS: usize = 4;

/// Parse a separator name or character into a delimiter byte.
///
/// Accepts `tab`, `\t`, `comma`, `,`, or any single ASCII character.
pub fn parse_separator(value: &str) -> Result<u8> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "semicolon" => Ok(b';'),
        "pipe" => Ok(b'|'),
        other => {
            let bytes = other.as_bytes();
            if bytes.len() == 1 && bytes[0].is_ascii() {
                Ok(bytes[0])
            } else {
                Err(LibrarianError::Config(format!(
                    "Invalid separator {:?}: expected tab, comma or a single ASCII character",
                    other
                )))
            }
        }
    }
}

/// Read a publisher table from `path`.
///
/// The first row is always treated as a header. An empty file or a header-only
/// file yields an empty table. When an identifier appears more than once the
/// later row wins.
pub fn read_publisher_table(path: impl AsRef<Path>, separator: u8) -> Result<PublisherTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| LibrarianError::io(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let mut table = PublisherTable::new();

    for result in reader.records() {
        let record = result.map_err(|e| {
            LibrarianError::Format(format!("{}: {}", path.display(), e))
        })?;

        if record.len() < REQUIRED_COLUMNS {
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            return Err(LibrarianError::Format(format!(
                "{}:{}: expected at least {} columns, found {}",
                path.display(),
                line,
                REQUIRED_COLUMNS,
                record.len()
            )));
        }

        table.insert(
            record[0].to_string(),
            PublisherRecord {
                title: record[1].to_string(),
                author: record[2].to_string(),
                publishing_year: record[3].to_string(),
            },
        );
    }

    log::debug!(
        "Read {} publisher record(s) from {}",
        table.len(),
        path.display()
    );

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_table(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_comma_separated() {
        let file = write_table(
            "id,title,author,year\n\
             1,Book One,Author A,2021\n\
             2,Book Two,Author B,2022\n\
             3,Book Three,Author C,2023\n",
        );

        let table = read_publisher_table(file.path(), b',').unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(
            table["2"],
            PublisherRecord {
                title: "Book Two".to_string(),
                author: "Author B".to_string(),
                publishing_year: "2022".to_string(),
            }
        );
    }

    #[test]
    fn test_read_tab_separated_with_commas_in_fields() {
        let file = write_table(
            "epub_id\ttitle\tauthor\tyear\n\
             pg74\tThe Adventures of Tom Sawyer\tTwain, Mark\t1876\n",
        );

        let table = read_publisher_table(file.path(), b'\t').unwrap();

        assert_eq!(table["pg74"].author, "Twain, Mark");
        assert_eq!(table["pg74"].publishing_year, "1876");
    }

    #[test]
    fn test_header_only_is_empty() {
        let file = write_table("id,title,author,year\n");
        assert!(read_publisher_table(file.path(), b',').unwrap().is_empty());
    }

    #[test]
    fn test_empty_file_is_empty() {
        let file = write_table("");
        assert!(read_publisher_table(file.path(), b',').unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_publisher_table(dir.path().join("missing.tsv"), b'\t');
        assert!(matches!(result, Err(LibrarianError::NotFound { .. })));
    }

    #[test]
    fn test_short_row_is_format_error() {
        let file = write_table(
            "id,title,author,year\n\
             1,Book One,Author A,2021\n\
             2,Book Two\n",
        );

        let err = read_publisher_table(file.path(), b',').unwrap_err();
        match err {
            LibrarianError::Format(message) => {
                assert!(message.contains(":3:"), "unexpected message: {}", message);
                assert!(message.contains("found 2"));
            }
            other => panic!("expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_columns_ignored() {
        let file = write_table("id,title,author,year,isbn\nb1,T,A,1999,978-0\n");
        let table = read_publisher_table(file.path(), b',').unwrap();
        assert_eq!(table["b1"].publishing_year, "1999");
    }

    #[test]
    fn test_duplicate_identifier_last_wins() {
        let file = write_table("id,title,author,year\nb1,First,A,1999\nb1,Second,B,2000\n");
        let table = read_publisher_table(file.path(), b',').unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table["b1"].title, "Second");
    }

    #[test]
    fn test_empty_fields_preserved() {
        let file = write_table("id,title,author,year\nb1,,Someone,\n");
        let table = read_publisher_table(file.path(), b',').unwrap();
        assert_eq!(table["b1"].title, "");
        assert_eq!(table["b1"].publishing_year, "");
    }

    #[test]
    fn test_parse_separator() {
        assert_eq!(parse_separator("tab").unwrap(), b'\t');
        assert_eq!(parse_separator("\\t").unwrap(), b'\t');
        assert_eq!(parse_separator("comma").unwrap(), b',');
        assert_eq!(parse_separator(",").unwrap(), b',');
        assert_eq!(parse_separator(";").unwrap(), b';');
        assert!(parse_separator("::").is_err());
        assert!(parse_separator("é").is_err());
    }

    proptest! {
        #[test]
        fn prop_row_count_matches(n in 0usize..40) {
            let mut contents = String::from("id\ttitle\tauthor\tyear\n");
            for i in 0..n {
                contents.push_str(&format!("book{}\tTitle {}\tAuthor {}\t{}\n", i, i, i, 1900 + i));
            }
            let file = write_table(&contents);

            let table = read_publisher_table(file.path(), b'\t').unwrap();
            prop_assert_eq!(table.len(), n);
        }
    }
}
