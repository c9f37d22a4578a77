use crate::{BinaryOp, CompareOp, Expr, PathSegment, Value};

use super::error::ParseError;
use super::lexer::{Token, TokenKind};

/// Upper bound on the height of a parsed tree. Flat `&&`/`||` chains count
/// as one level however long they are.
pub(crate) const MAX_DEPTH: usize = 64;

const TOO_DEEP: &str = "at most 64 levels of nesting";

static EOF: Token = Token {
    kind: TokenKind::Eof,
    position: 0,
};

/// A subtree and its height, so the limit is checked while building.
struct Parsed {
    expr: Expr,
    height: usize,
}

impl Parsed {
    fn leaf(expr: Expr) -> Self {
        Self { expr, height: 1 }
    }
}

/// Recursive-descent parser, one method per precedence level:
///
/// ```text
/// or_expr        := and_expr ( "||" and_expr )*
/// and_expr       := equality ( "&&" equality )*
/// equality       := relational ( ("==" | "!=") relational )?
/// relational     := additive ( (">" | "<" | ">=" | "<=") additive )?
/// additive       := multiplicative ( ("+" | "-") multiplicative )*
/// multiplicative := unary ( ("*" | "/") unary )*
/// unary          := "!" unary | primary
/// primary        := literal | path
/// path           := Ident ( "." Ident ("(" ")")? | "[" or_expr "]" )*
/// ```
pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a complete expression; trailing tokens are an error.
    pub(crate) fn parse_expression(mut self) -> Result<Expr, ParseError> {
        let parsed = self.or_expr()?;
        if self.peek().kind == TokenKind::Eof {
            Ok(parsed.expr)
        } else {
            Err(self.error("an operator or end of input"))
        }
    }

    fn peek(&self) -> &'t Token {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .unwrap_or(&EOF)
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError::new(token.position, expected, token.kind.to_string())
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ParseError> {
        if &self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    /// Guards the recursive productions (`!` and `[...]`) before descending.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error(TOO_DEEP));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Accept `expr` at `height`, or fail at the operator token `at`.
    fn node(expr: Expr, height: usize, at: &Token) -> Result<Parsed, ParseError> {
        if height > MAX_DEPTH {
            return Err(ParseError::new(at.position, TOO_DEEP, at.kind.to_string()));
        }
        Ok(Parsed { expr, height })
    }

    fn binary(op: BinaryOp, left: Parsed, right: Parsed, at: &Token) -> Result<Parsed, ParseError> {
        let height = left.height.max(right.height) + 1;
        Self::node(Expr::binary(op, left.expr, right.expr), height, at)
    }

    /// One `separator`-joined chain collected into a single flat node.
    fn junction(
        &mut self,
        separator: &TokenKind,
        operand: fn(&mut Self) -> Result<Parsed, ParseError>,
        build: fn(Vec<Expr>) -> Expr,
    ) -> Result<Parsed, ParseError> {
        let first = operand(self)?;
        if &self.peek().kind != separator {
            return Ok(first);
        }
        let at = self.peek();
        let mut height = first.height;
        let mut operands = vec![first.expr];
        while &self.peek().kind == separator {
            self.advance();
            let next = operand(self)?;
            height = height.max(next.height);
            operands.push(next.expr);
        }
        Self::node(build(operands), height + 1, at)
    }

    fn or_expr(&mut self) -> Result<Parsed, ParseError> {
        self.junction(&TokenKind::OrOr, Self::and_expr, Expr::Any)
    }

    fn and_expr(&mut self) -> Result<Parsed, ParseError> {
        self.junction(&TokenKind::AndAnd, Self::equality, Expr::All)
    }

    fn equality(&mut self) -> Result<Parsed, ParseError> {
        let left = self.relational()?;
        let Some(op) = equality_op(&self.peek().kind) else {
            return Ok(left);
        };
        let at = self.advance();
        let right = self.relational()?;
        if equality_op(&self.peek().kind).is_some() {
            return Err(self.error("'&&' or '||' between comparisons"));
        }
        Self::binary(BinaryOp::Compare(op), left, right, at)
    }

    fn relational(&mut self) -> Result<Parsed, ParseError> {
        let left = self.additive()?;
        let Some(op) = relational_op(&self.peek().kind) else {
            return Ok(left);
        };
        let at = self.advance();
        let right = self.additive()?;
        if relational_op(&self.peek().kind).is_some() {
            return Err(self.error("'&&' or '||' between comparisons"));
        }
        Self::binary(BinaryOp::Compare(op), left, right, at)
    }

    fn additive(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            let at = self.advance();
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right, at)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Parsed, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            let at = self.advance();
            let right = self.unary()?;
            left = Self::binary(op, left, right, at)?;
        }
    }

    fn unary(&mut self) -> Result<Parsed, ParseError> {
        if self.peek().kind == TokenKind::Bang {
            let at = self.advance();
            let operand = self.nested(Self::unary)?;
            return Self::node(Expr::Not(Box::new(operand.expr)), operand.height + 1, at);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Parsed, ParseError> {
        let literal = match &self.peek().kind {
            TokenKind::Int(v) => Value::Int(*v),
            TokenKind::Float(v) => Value::Float(*v),
            TokenKind::Str(s) => Value::String(s.clone()),
            TokenKind::Bool(b) => Value::Bool(*b),
            TokenKind::Ident(name) => {
                let root = name.clone();
                self.advance();
                return self.path(root);
            }
            _ => return Err(self.error("expression")),
        };
        self.advance();
        Ok(Parsed::leaf(Expr::Literal(literal)))
    }

    fn path(&mut self, root: String) -> Result<Parsed, ParseError> {
        let mut segments = Vec::new();
        let mut height = 1;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let TokenKind::Ident(name) = &self.peek().kind else {
                        return Err(self.error("field or method name"));
                    };
                    let name = name.clone();
                    self.advance();
                    if self.peek().kind == TokenKind::LParen {
                        self.advance();
                        self.expect(&TokenKind::RParen, "')' (calls take no arguments)")?;
                        segments.push(PathSegment::Call(name));
                    } else {
                        segments.push(PathSegment::Field(name));
                    }
                }
                TokenKind::LBracket => {
                    let at = self.advance();
                    let index = self.nested(Self::or_expr)?;
                    self.expect(&TokenKind::RBracket, "']'")?;
                    let index = Self::node(index.expr, index.height + 1, at)?;
                    height = height.max(index.height);
                    segments.push(PathSegment::Index(Box::new(index.expr)));
                }
                _ => {
                    return Ok(Parsed {
                        expr: Expr::Variable { root, segments },
                        height,
                    })
                }
            }
        }
    }
}

fn equality_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::EqEq => Some(CompareOp::Eq),
        TokenKind::NotEq => Some(CompareOp::Neq),
        _ => None,
    }
}

fn relational_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::Gte => Some(CompareOp::Gte),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::Lte => Some(CompareOp::Lte),
        _ => None,
    }
}
