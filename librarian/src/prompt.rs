//! Fixed instruction prompt for content extraction.

/// Role and task description sent as the system prompt
pub const SYSTEM_PROMPT: &str = "You're an expert in literature and literary analysis. \
Your task is to extract and summarize key information from the provided book content.";

/// Field-by-field instructions preceding the book text
pub const FIELD_INSTRUCTIONS: &str = r#"Please provide the following details in a structured format:
    genre (string): Give only 1 main genre of the book (e.g., science fiction, crime, fantasy, romance).
    themes (list of strings): Between 3 and 10 of the main themes featured in the book.
    setting (object with time and place): The time and place that the story takes place in.
    cultural_context (string): A brief 1-2 sentence description of the relevant cultural context invoked in the story.
    narrative_tone (string): A brief 1-2 sentence description of the attitude or mood conveyed by the storytelling.
    author_writing_style (string): A brief 1-2 sentence description of the writing style and techniques employed by the author.
    characters_and_relationships (list of objects with name and relationship): Between 3 and 10 central characters and their most important relationships.

Respond only with the JSON object."#;

/// Marker separating the instructions from the book text
const CONTENT_HEADER: &str = "Book content:";

/// Build the user prompt for a book's extracted text
pub fn build_prompt(content: &str) -> String {
    format!("{}\n\n{}\n{}", FIELD_INSTRUCTIONS, CONTENT_HEADER, content)
}
