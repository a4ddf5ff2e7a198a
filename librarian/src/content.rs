//! Content attributes produced by the language model.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{LibrarianError, Result};

/// Minimum entries in `themes` and `characters_and_relationships`
pub const MIN_ENTRIES: usize = 3;
/// Maximum entries in `themes` and `characters_and_relationships`
pub const MAX_ENTRIES: usize = 10;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?\s*```$").expect("valid regex"));

/// When and where the story takes place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Setting {
    pub time: String,
    pub place: String,
}

/// A central character and their most important relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CharacterRelationship {
    pub name: String,
    pub relationship: String,
}

/// Attributes derived from the text of a book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContentRecord {
    pub genre: String,
    #[schemars(length(min = 3, max = 10))]
    pub themes: Vec<String>,
    pub setting: Setting,
    pub cultural_context: String,
    pub narrative_tone: String,
    pub author_writing_style: String,
    #[schemars(length(min = 3, max = 10))]
    pub characters_and_relationships: Vec<CharacterRelationship>,
}

impl ContentRecord {
    /// Check the constraints JSON deserialization cannot express
    pub fn validate(&self) -> Result<()> {
        check_bounds("themes", self.themes.len())?;
        check_bounds(
            "characters_and_relationships",
            self.characters_and_relationships.len(),
        )?;
        Ok(())
    }
}

fn check_bounds(field: &str, len: usize) -> Result<()> {
    if (MIN_ENTRIES..=MAX_ENTRIES).contains(&len) {
        Ok(())
    } else {
        Err(LibrarianError::SchemaViolation(format!(
            "{} must contain between {} and {} entries, got {}",
            field, MIN_ENTRIES, MAX_ENTRIES, len
        )))
    }
}

/// Parse and validate a model response.
///
/// Accepts a bare JSON object or one wrapped in a markdown code fence.
pub fn parse_content_record(raw: &str) -> Result<ContentRecord> {
    let trimmed = raw.trim();
    let json = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let record: ContentRecord = serde_json::from_str(json)
        .map_err(|e| LibrarianError::SchemaViolation(format!("invalid content record: {}", e)))?;
    record.validate()?;
    Ok(record)
}
