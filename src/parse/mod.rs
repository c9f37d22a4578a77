mod error;
mod lexer;
mod parser;

pub use error::{ExpressionError, LexError, LexErrorKind, ParseError};
pub use lexer::{tokenize, Token, TokenKind};

use crate::Expr;

/// Tokenize and parse an expression string into an [`Expr`] tree.
///
/// # Errors
///
/// Returns [`ExpressionError::Lex`] for a malformed token and
/// [`ExpressionError::Parse`] for a grammar violation, including trailing
/// input after a complete expression.
pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(input)?;
    let expr = parser::Parser::new(&tokens).parse_expression()?;
    Ok(expr)
}
