use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CleanerError {
    #[error("Message is empty")]
    EmptyInput,
    #[error("Message exceeds maximum length: {0} characters")]
    TooLong(usize),
}

/// Inbound chat message validation.
pub struct Cleaner;

impl Cleaner {
    pub const MAX_LENGTH: usize = 10_000;

    /// Trims the message and strips control characters other than newline
    /// and tab. Line structure is kept; the model sees Markdown.
    pub fn clean(input: &str) -> Result<String, CleanerError> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|&c| !c.is_control() || c == '\n' || c == '\t')
            .collect();

        if cleaned.trim().is_empty() {
            return Err(CleanerError::EmptyInput);
        }

        let length = cleaned.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(CleanerError::TooLong(length));
        }

        Ok(cleaned)
    }
}
