//! Recursive-descent parser producing the expression tree.
//!
//! Precedence, loosest first: `||`, `&&`, `^`, comparisons and matches
//! (non-associative), `+ -`, `* / %`, unary `! - +`.

use super::lexer::{Lexer, Token, TokenKind};
use crate::buffer::whole_match_regex;
use crate::error::{FmlError, Result};
use crate::types::{FieldId, Width};
use regex::Regex;
use std::fmt;

/// Which occurrence a field reference reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Occurrence {
    At(usize),
    /// `[?]`: any occurrence.
    Any,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldRef<W: Width> {
    pub id: FieldId<W>,
    pub name: String,
    pub occurrence: Occurrence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Xor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Xor => "^",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::Or | Self::And | Self::Xor)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node<W: Width> {
    Number(f64),
    Text(String),
    Field(FieldRef<W>),
    Unary(UnaryOp, Box<Node<W>>),
    Binary(BinaryOp, Box<Node<W>>, Box<Node<W>>),
    Match {
        negated: bool,
        subject: Box<Node<W>>,
        pattern: String,
        regex: Regex,
    },
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("'")?;
    for ch in text.chars() {
        match ch {
            '\'' => f.write_str("\\'")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            other => write!(f, "{}", other)?,
        }
    }
    f.write_str("'")
}

/// Canonical form: every binary operation parenthesized.
impl<W: Width> fmt::Display for Node<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write_quoted(f, s),
            Self::Field(field) => {
                f.write_str(&field.name)?;
                match field.occurrence {
                    Occurrence::At(0) => Ok(()),
                    Occurrence::At(n) => write!(f, "[{}]", n),
                    Occurrence::Any => f.write_str("[?]"),
                }
            }
            Self::Unary(op, operand) => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                    UnaryOp::Plus => "+",
                };
                write!(f, "{}{}", symbol, operand)
            }
            Self::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Self::Match {
                negated,
                subject,
                pattern,
                ..
            } => {
                write!(f, "({} {} ", subject, if *negated { "!%" } else { "%%" })?;
                write_quoted(f, pattern)?;
                f.write_str(")")
            }
        }
    }
}

/// Deepest expression tree, and deepest parenthesis or unary nesting, that
/// compiles.
pub const MAX_EXPR_DEPTH: usize = 128;

/// A subtree with its depth.
type Parsed<W> = (Node<W>, usize);

pub(crate) struct Parser<'a, W: Width> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
    _width: std::marker::PhantomData<W>,
}

impl<'a, W: Width> Parser<'a, W> {
    /// Parse a complete expression; trailing input is an error.
    pub fn parse(source: &'a str) -> Result<Node<W>> {
        let mut parser = Self {
            source,
            tokens: Lexer::tokenize(source)?,
            pos: 0,
            nesting: 0,
            _width: std::marker::PhantomData,
        };
        let (node, _) = parser.parse_or()?;
        match parser.peek() {
            TokenKind::Eof => Ok(node),
            _ => Err(parser.error("unexpected trailing input")),
        }
    }

    fn peek(&self) -> &TokenKind {
        // The token list always ends with Eof and parsing never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |t| t.pos)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if kind != TokenKind::Eof {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, want: TokenKind, what: &str) -> Result<()> {
        if *self.peek() == want {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn error(&self, cause: impl Into<String>) -> FmlError {
        FmlError::MalformedExpression {
            expr: self.source.to_string(),
            position: self.position(),
            cause: cause.into(),
        }
    }

    fn too_deep(&self) -> FmlError {
        self.error(format!("expression nested deeper than {} levels", MAX_EXPR_DEPTH))
    }

    /// Run `inner` one nesting level down.
    fn nested(&mut self, inner: fn(&mut Self) -> Result<Parsed<W>>) -> Result<Parsed<W>> {
        if self.nesting >= MAX_EXPR_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let parsed = inner(self);
        self.nesting -= 1;
        parsed
    }

    /// Wrap `node` with its depth, refusing trees past the limit.
    fn sized(&self, node: Node<W>, depth: usize) -> Result<Parsed<W>> {
        if depth > MAX_EXPR_DEPTH {
            return Err(self.too_deep());
        }
        Ok((node, depth))
    }

    fn binary(&self, op: BinaryOp, lhs: Parsed<W>, rhs: Parsed<W>) -> Result<Parsed<W>> {
        let depth = lhs.1.max(rhs.1) + 1;
        self.sized(Node::Binary(op, Box::new(lhs.0), Box::new(rhs.0)), depth)
    }

    /// One left-associative precedence level.
    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Result<Parsed<W>>,
        op_for: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Parsed<W>> {
        let mut lhs = operand(self)?;
        while let Some(op) = op_for(self.peek()) {
            self.pos += 1;
            let rhs = operand(self)?;
            lhs = self.binary(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Parsed<W>> {
        self.binary_level(Self::parse_and, |t| {
            (*t == TokenKind::OrOr).then_some(BinaryOp::Or)
        })
    }

    fn parse_and(&mut self) -> Result<Parsed<W>> {
        self.binary_level(Self::parse_xor, |t| {
            (*t == TokenKind::AndAnd).then_some(BinaryOp::And)
        })
    }

    fn parse_xor(&mut self) -> Result<Parsed<W>> {
        self.binary_level(Self::parse_comparison, |t| {
            (*t == TokenKind::Caret).then_some(BinaryOp::Xor)
        })
    }

    fn parse_comparison(&mut self) -> Result<Parsed<W>> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            TokenKind::Match | TokenKind::NotMatch => return self.parse_match(lhs),
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_additive()?;
        self.binary(op, lhs, rhs)
    }

    fn parse_match(&mut self, (subject, depth): Parsed<W>) -> Result<Parsed<W>> {
        let negated = self.advance() == TokenKind::NotMatch;
        let pattern = match self.peek() {
            TokenKind::Str(pattern) => pattern.clone(),
            _ => return Err(self.error("regular expression must be a string literal")),
        };
        let regex = whole_match_regex(&pattern).map_err(|e| match e {
            FmlError::MalformedExpression { cause, .. } => self.error(cause),
            other => other,
        })?;
        self.pos += 1;
        let node = Node::Match {
            negated,
            subject: Box::new(subject),
            pattern,
            regex,
        };
        self.sized(node, depth + 1)
    }

    fn parse_additive(&mut self) -> Result<Parsed<W>> {
        self.binary_level(Self::parse_multiplicative, |t| match t {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Result<Parsed<W>> {
        self.binary_level(Self::parse_unary, |t| match t {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    fn parse_unary(&mut self) -> Result<Parsed<W>> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        let (operand, depth) = self.nested(Self::parse_unary)?;
        self.sized(Node::Unary(op, Box::new(operand)), depth + 1)
    }

    fn parse_primary(&mut self) -> Result<Parsed<W>> {
        let start = self.pos;
        match self.advance() {
            TokenKind::Number(n) => Ok((Node::Number(n), 1)),
            TokenKind::Str(s) => Ok((Node::Text(s), 1)),
            TokenKind::LParen => {
                let inner = self.nested(Self::parse_or)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => Ok((self.parse_field(name)?, 1)),
            _ => {
                self.pos = start;
                Err(self.error("expected a number, string, field or '('"))
            }
        }
    }

    fn parse_field(&mut self, name: String) -> Result<Node<W>> {
        let id = W::catalog().identifier_for(&name)?;
        let mut occurrence = Occurrence::At(0);
        if *self.peek() == TokenKind::LBracket {
            self.pos += 1;
            occurrence = match self.advance() {
                TokenKind::Question => Occurrence::Any,
                TokenKind::Number(n) if n >= 0.0 && n.fract() == 0.0 => Occurrence::At(n as usize),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("occurrence must be a non-negative integer or '?'"));
                }
            };
            self.expect(TokenKind::RBracket, "']'")?;
        }
        Ok(Node::Field(FieldRef {
            id,
            name,
            occurrence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::register_fixture_tables;
    use crate::types::Wide;

    fn canonical(src: &str) -> String {
        register_fixture_tables();
        Parser::<Wide>::parse(src).unwrap().to_string()
    }

    fn failure(src: &str) -> FmlError {
        register_fixture_tables();
        Parser::<Wide>::parse(src).unwrap_err()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(canonical("1 + 2 * 3 - 4"), "((1 + (2 * 3)) - 4)");
        assert_eq!(
            canonical("COUNT > 1 && PRICE < 2 || NAME"),
            "(((COUNT > 1) && (PRICE < 2)) || NAME)"
        );
        assert_eq!(canonical("COUNT == 1 ^ COUNT == 2"), "((COUNT == 1) ^ (COUNT == 2))");
        assert_eq!(canonical("!-COUNT[2] % 3"), "(!-COUNT[2] % 3)");
        assert_eq!(canonical("(1 + 2) * 3"), "((1 + 2) * 3)");
    }

    #[test]
    fn fields_and_matches() {
        assert_eq!(canonical("NAME[?] %% 'w.*'"), "(NAME[?] %% 'w.*')");
        assert_eq!(canonical("NAME[0] !% \"it's\""), "(NAME !% 'it\\'s')");
    }

    #[test]
    fn canonical_form_reparses_identically() {
        for src in [
            "NAME[?] %% 'a\\\\b' || COUNT[1] * -2 >= PRICE / 4",
            "!(COUNT ^ PRICE) && 'x' != NAME[3]",
        ] {
            let once = canonical(src);
            assert_eq!(canonical(&once), once);
        }
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        for src in ["", "1 +", "(1", "COUNT[", "COUNT[1.5]", "COUNT[-1]", "1 2", "1 < 2 < 3"] {
            assert!(
                matches!(failure(src), FmlError::MalformedExpression { .. }),
                "{src}"
            );
        }
    }

    #[test]
    fn match_needs_literal_valid_pattern() {
        assert!(matches!(
            failure("NAME %% NAME"),
            FmlError::MalformedExpression { .. }
        ));
        let err = failure("NAME %% '('");
        assert!(matches!(err, FmlError::MalformedExpression { position: 8, .. }));
    }

    #[test]
    fn nesting_is_bounded() {
        let parens = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(canonical(&parens(MAX_EXPR_DEPTH)), "1");

        let too_deep = [
            parens(MAX_EXPR_DEPTH + 1),
            parens(10_000),
            format!("{}1", "!".repeat(10_000)),
            vec!["1"; MAX_EXPR_DEPTH + 1].join(" + "),
        ];
        for src in &too_deep {
            let err = failure(src);
            assert!(
                matches!(&err, FmlError::MalformedExpression { cause, .. } if cause.contains("deeper")),
                "{err}"
            );
        }
        assert!(Parser::<Wide>::parse(&vec!["1"; MAX_EXPR_DEPTH].join(" + ")).is_ok());
    }

    #[test]
    fn unknown_fields_fail_at_compile_time() {
        assert!(matches!(
            failure("NO_SUCH_FIELD == 1"),
            FmlError::UnknownName { .. }
        ));
    }
}
