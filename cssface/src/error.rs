use thiserror::Error;

/// Reasons a stylesheet can't be parsed.
///
/// Offsets are byte offsets into the stylesheet text.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unterminated string starting at {0}")]
    UnclosedString(usize),
    #[error("Unterminated comment starting at {0}")]
    UnclosedComment(usize),
    #[error("Unterminated url starting at {0}")]
    UnclosedUrl(usize),
    #[error("Missing '{expected}' to close what was opened at {offset}")]
    UnclosedBlock { expected: char, offset: usize },
    #[error("Unexpected '{ch}' at {offset}")]
    UnexpectedClose { ch: char, offset: usize },
    #[error("Expected a block after the rule prelude starting at {0}")]
    MissingBlock(usize),
}
