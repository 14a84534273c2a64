//! Expression tokenizer.

use crate::error::{FmlError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Question,
    OrOr,
    AndAnd,
    Caret,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    NotMatch,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub pos: usize,
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            src: source.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input; the last token is always `Eof`.
    pub fn tokenize(source: &str) -> Result<Vec<Token>> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let tok = lexer.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            tokens.push(tok);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn error(&self, position: usize, cause: impl Into<String>) -> FmlError {
        FmlError::MalformedExpression {
            expr: self.source.to_string(),
            position,
            cause: cause.into(),
        }
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.pos + ahead).copied()
    }

    /// `kind` when the next byte after the current one is `second`.
    fn pair(&self, second: u8, kind: TokenKind) -> Option<TokenKind> {
        (self.peek_at(1) == Some(second)).then_some(kind)
    }

    fn next_token(&mut self) -> Result<Token> {
        while self.peek_at(0).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(ch) = self.peek_at(0) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: start,
            });
        };

        let (kind, width) = match ch {
            b'\'' | b'"' => return self.lex_string(ch),
            b'0'..=b'9' | b'.' => return self.lex_number(),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => return Ok(self.lex_ident()),
            b'(' => (TokenKind::LParen, 1),
            b')' => (TokenKind::RParen, 1),
            b'[' => (TokenKind::LBracket, 1),
            b']' => (TokenKind::RBracket, 1),
            b'?' => (TokenKind::Question, 1),
            b'^' => (TokenKind::Caret, 1),
            b'+' => (TokenKind::Plus, 1),
            b'-' => (TokenKind::Minus, 1),
            b'*' => (TokenKind::Star, 1),
            b'/' => (TokenKind::Slash, 1),
            b'|' => match self.pair(b'|', TokenKind::OrOr) {
                Some(kind) => (kind, 2),
                None => return Err(self.error(start, "expected '||'")),
            },
            b'&' => match self.pair(b'&', TokenKind::AndAnd) {
                Some(kind) => (kind, 2),
                None => return Err(self.error(start, "expected '&&'")),
            },
            b'=' => match self.pair(b'=', TokenKind::EqEq) {
                Some(kind) => (kind, 2),
                None => return Err(self.error(start, "expected '=='")),
            },
            b'!' => match self.peek_at(1) {
                Some(b'=') => (TokenKind::NotEq, 2),
                Some(b'%') => (TokenKind::NotMatch, 2),
                _ => (TokenKind::Bang, 1),
            },
            b'%' => self.pair(b'%', TokenKind::Match).map_or((TokenKind::Percent, 1), |k| (k, 2)),
            b'<' => self.pair(b'=', TokenKind::Le).map_or((TokenKind::Lt, 1), |k| (k, 2)),
            b'>' => self.pair(b'=', TokenKind::Ge).map_or((TokenKind::Gt, 1), |k| (k, 2)),
            other => {
                return Err(self.error(start, format!("unexpected character '{}'", other as char)));
            }
        };
        self.pos += width;
        Ok(Token { kind, pos: start })
    }

    fn lex_ident(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_at(0)
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        Token {
            kind: TokenKind::Ident(self.source[start..self.pos].to_string()),
            pos: start,
        }
    }

    fn lex_number(&mut self) -> Result<Token> {
        let start = self.pos;
        while self.peek_at(0).is_some_and(|b| b.is_ascii_digit() || b == b'.') {
            self.pos += 1;
        }
        if matches!(self.peek_at(0), Some(b'e' | b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+' | b'-')));
            if self.peek_at(1 + sign).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1 + sign;
                while self.peek_at(0).is_some_and(|b| b.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text = &self.source[start..self.pos];
        let value = text
            .parse::<f64>()
            .map_err(|_| self.error(start, format!("invalid number '{}'", text)))?;
        Ok(Token {
            kind: TokenKind::Number(value),
            pos: start,
        })
    }

    fn lex_string(&mut self, quote: u8) -> Result<Token> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.peek_at(0) {
                None => return Err(self.error(start, "unterminated string literal")),
                Some(b) if b == quote => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    let escaped = match self.peek_at(1) {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b) => b,
                        None => return Err(self.error(start, "unterminated string literal")),
                    };
                    out.push(escaped);
                    self.pos += 2;
                }
                Some(b) => {
                    out.push(b);
                    self.pos += 1;
                }
            }
        }
        // Only ASCII bytes are rewritten, so the result stays valid UTF-8.
        let text = String::from_utf8(out)
            .map_err(|_| self.error(start, "string literal is not valid UTF-8"))?;
        Ok(Token {
            kind: TokenKind::Str(text),
            pos: start,
        })
    }
}
