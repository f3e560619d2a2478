//! Input classification and attachment validation.

use crate::model::TaskCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputCategory {
    Question,
    Command,
    Request,
    Conversation,
}

impl InputCategory {
    /// Task category used when auto-selecting a model.
    pub fn task_category(&self) -> TaskCategory {
        match self {
            InputCategory::Question => TaskCategory::Analysis,
            InputCategory::Command => TaskCategory::Creative,
            InputCategory::Request | InputCategory::Conversation => TaskCategory::General,
        }
    }
}

pub fn categorize_input(input: &str) -> InputCategory {
    let lower = input.trim().to_lowercase();

    if lower.contains('?') {
        InputCategory::Question
    } else if lower.starts_with("create") || lower.starts_with("generate") {
        InputCategory::Command
    } else if lower.starts_with("please") || lower.contains("help") {
        InputCategory::Request
    } else {
        InputCategory::Conversation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedText {
    pub text: String,
    pub word_count: usize,
    pub category: InputCategory,
}

pub fn process_text(input: &str) -> ProcessedText {
    let text = input.trim().to_string();
    ProcessedText {
        word_count: text.split_whitespace().count(),
        category: categorize_input(&text),
        text,
    }
}

pub fn validate_file_type(mime: &str, allowed: &[&str]) -> bool {
    allowed.iter().any(|a| {
        a.strip_suffix("/*")
            .map_or(*a == mime, |prefix| mime.split('/').next() == Some(prefix))
    })
}

pub fn validate_file_size(bytes: u64, max_mb: u64) -> bool {
    bytes <= max_mb * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_input() {
        assert_eq!(categorize_input("what is 2+2?"), InputCategory::Question);
        assert_eq!(categorize_input("Generate a poem"), InputCategory::Command);
        assert_eq!(categorize_input("create a logo"), InputCategory::Command);
        assert_eq!(categorize_input("Please summarize"), InputCategory::Request);
        assert_eq!(categorize_input("I need help with rust"), InputCategory::Request);
        assert_eq!(categorize_input("nice weather"), InputCategory::Conversation);
    }

    #[test]
    fn test_process_text_trims_and_counts() {
        let processed = process_text("  hello   there world  ");
        assert_eq!(processed.text, "hello   there world");
        assert_eq!(processed.word_count, 3);
        assert_eq!(processed.category, InputCategory::Conversation);
    }

    #[test]
    fn test_validate_file_type() {
        assert!(validate_file_type("image/png", &["image/*"]));
        assert!(validate_file_type("audio/wav", &["image/png", "audio/wav"]));
        assert!(!validate_file_type("text/plain", &["image/*"]));
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(5 * 1024 * 1024, 5));
        assert!(!validate_file_size(5 * 1024 * 1024 + 1, 5));
    }
}
