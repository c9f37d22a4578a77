use thiserror::Error;

/// What went wrong while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("malformed number '{0}'")]
    MalformedNumber(String),
}

/// A malformed token at a byte offset of the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lex error at {position}: {kind}")]
pub struct LexError {
    position: usize,
    kind: LexErrorKind,
}

impl LexError {
    pub(crate) fn new(position: usize, kind: LexErrorKind) -> Self {
        Self { position, kind }
    }

    /// Byte offset of the offending character.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn kind(&self) -> &LexErrorKind {
        &self.kind
    }
}

/// A token sequence that violates the expression grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {position}: expected {expected}, found {found}")]
pub struct ParseError {
    position: usize,
    expected: String,
    found: String,
}

impl ParseError {
    pub(crate) fn new(position: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Byte offset of the offending token.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub fn expected(&self) -> &str {
        &self.expected
    }

    #[must_use]
    pub fn found(&self) -> &str {
        &self.found
    }
}

/// Either stage of turning text into an [`Expr`](crate::Expr).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}
