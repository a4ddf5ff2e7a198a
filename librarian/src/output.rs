//! Where finished records go.

use std::path::PathBuf;

use crate::error::{LibrarianError, Result};
use crate::merge::BookMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One JSON document per book on stdout
    Stdout,
    /// One `<epub_id>.json` file per book
    Directory(PathBuf),
}

impl OutputTarget {
    pub fn new(dir: Option<PathBuf>) -> Self {
        dir.map_or(Self::Stdout, Self::Directory)
    }

    pub fn write(&self, book: &BookMetadata) -> Result<()> {
        let json = book.to_json_pretty()?;

        match self {
            Self::Stdout => println!("{}", json),
            Self::Directory(dir) => {
                let path = dir.join(format!("{}.json", book.epub_id));
                std::fs::write(&path, format!("{}\n", json))
                    .map_err(|e| LibrarianError::io(&path, e))?;
                log::info!("Wrote {}", path.display());
            }
        }
        Ok(())
    }
}
