use std::fmt;

use winnow::ascii::digit1;
use winnow::combinator::{alt, opt};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use super::error::{LexError, LexErrorKind};

/// Token kinds produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Plus,
    Minus,
    Star,
    Slash,
    Gt,
    Gte,
    Lt,
    Lte,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Eof,
}

impl TokenKind {
    /// Whether the grammar expects an operand next, which decides if a
    /// following `-<digit>` is a negative literal or the minus operator.
    fn expects_operand_after(&self) -> bool {
        !matches!(
            self,
            TokenKind::Ident(_)
                | TokenKind::Int(_)
                | TokenKind::Float(_)
                | TokenKind::Str(_)
                | TokenKind::Bool(_)
                | TokenKind::RBracket
                | TokenKind::RParen
                | TokenKind::Dot
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "'{name}'"),
            TokenKind::Int(v) => write!(f, "'{v}'"),
            TokenKind::Float(v) => write!(f, "'{v:?}'"),
            TokenKind::Str(s) => write!(f, "string '{s}'"),
            TokenKind::Bool(b) => write!(f, "'{b}'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Gte => write!(f, "'>='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Lte => write!(f, "'<='"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::AndAnd => write!(f, "'&&'"),
            TokenKind::OrOr => write!(f, "'||'"),
            TokenKind::Bang => write!(f, "'!'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

/// A token and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

// -- Lexemes ----------------------------------------------------------------

fn ident<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

fn quoted<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    let mut quote = one_of(['\'', '"']).parse_next(input)?;
    let body = take_till(0.., move |c: char| c == quote).parse_next(input)?;
    quote.parse_next(input)?;
    Ok(body)
}

fn number_lexeme<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    (opt('-'), digit1, opt(('.', digit1)))
        .take()
        .parse_next(input)
}

fn symbol(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        alt((
            ">=".value(TokenKind::Gte),
            "<=".value(TokenKind::Lte),
            "==".value(TokenKind::EqEq),
            "!=".value(TokenKind::NotEq),
            "&&".value(TokenKind::AndAnd),
            "||".value(TokenKind::OrOr),
        )),
        alt((
            '>'.value(TokenKind::Gt),
            '<'.value(TokenKind::Lt),
            '!'.value(TokenKind::Bang),
            '+'.value(TokenKind::Plus),
            '-'.value(TokenKind::Minus),
            '*'.value(TokenKind::Star),
            '/'.value(TokenKind::Slash),
            '.'.value(TokenKind::Dot),
            '['.value(TokenKind::LBracket),
            ']'.value(TokenKind::RBracket),
            '('.value(TokenKind::LParen),
            ')'.value(TokenKind::RParen),
        )),
    ))
    .parse_next(input)
}

fn number(input: &mut &str, position: usize) -> Result<TokenKind, LexError> {
    let malformed = |text: String| LexError::new(position, LexErrorKind::MalformedNumber(text));
    let lexeme = number_lexeme
        .parse_next(input)
        .map_err(|_| malformed(input.chars().take(1).collect()))?;

    // `1.`, `1.2.3` and `12ab` are rejected rather than split into tokens.
    let tail: String = input
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_')
        .collect();
    if !tail.is_empty() {
        return Err(malformed(format!("{lexeme}{tail}")));
    }

    if lexeme.contains('.') {
        lexeme
            .parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| malformed(lexeme.to_owned()))
    } else {
        lexeme
            .parse::<i64>()
            .map(TokenKind::Int)
            .map_err(|_| malformed(lexeme.to_owned()))
    }
}

/// Split `source` into tokens. The result always ends with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns [`LexError`] on an unrecognized character, an unterminated string
/// literal, or a malformed number.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut input = source;
    let mut tokens: Vec<Token> = Vec::new();

    loop {
        input = input.trim_start();
        let position = source.len() - input.len();
        let Some(c) = input.chars().next() else {
            tokens.push(Token {
                kind: TokenKind::Eof,
                position,
            });
            return Ok(tokens);
        };

        let operand_expected = tokens
            .last()
            .map_or(true, |t| t.kind.expects_operand_after());
        let signed = c == '-'
            && operand_expected
            && input[1..].starts_with(|d: char| d.is_ascii_digit());

        let kind = if c == '\'' || c == '"' {
            quoted
                .parse_next(&mut input)
                .map(|s| TokenKind::Str(s.to_owned()))
                .map_err(|_| LexError::new(position, LexErrorKind::UnterminatedString))?
        } else if c.is_ascii_digit() || signed {
            number(&mut input, position)?
        } else if c.is_ascii_alphabetic() || c == '_' {
            let word = ident
                .parse_next(&mut input)
                .map_err(|_| LexError::new(position, LexErrorKind::UnexpectedChar(c)))?;
            match word {
                "true" => TokenKind::Bool(true),
                "false" => TokenKind::Bool(false),
                _ => TokenKind::Ident(word.to_owned()),
            }
        } else {
            symbol
                .parse_next(&mut input)
                .map_err(|_| LexError::new(position, LexErrorKind::UnexpectedChar(c)))?
        };

        tokens.push(Token { kind, position });
    }
}
