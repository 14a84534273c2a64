//! Compiled boolean and arithmetic expressions over buffer fields.
//!
//! Source text is compiled once into a tree and evaluated any number of
//! times. Field names resolve through the width family's catalog at
//! compile time, so an unknown name fails [`BoolExpr::compile`], never
//! evaluation.
//!
//! ```text
//! expr    := or
//! or      := and ('||' and)*
//! and     := xor ('&&' xor)*
//! xor     := cmp ('^' cmp)*
//! cmp     := add (('=='|'!='|'<'|'<='|'>'|'>=') add | ('%%'|'!%') STRING)?
//! add     := mul (('+'|'-') mul)*
//! mul     := unary (('*'|'/'|'%') unary)*
//! unary   := ('!'|'-'|'+') unary | primary
//! primary := NUMBER | STRING | field | '(' expr ')'
//! field   := NAME ('[' (INTEGER | '?') ']')?
//! ```
//!
//! `%%` matches the whole text value against a regular expression; `!%` is
//! its negation. `NAME[?]` stands for any occurrence of `NAME`.
//!
//! # Example
//!
//! ```ignore
//! use fml_core::prelude::*;
//!
//! let expr = BoolExpr::<Wide>::compile("NAME[?] %% 'w.*' && COUNT > 2")?;
//! if expr.eval(&buf)? {
//!     // ...
//! }
//! ```

mod eval;
mod lexer;
mod parser;

pub use parser::MAX_EXPR_DEPTH;

use crate::buffer::FieldBuffer;
use crate::error::Result;
use crate::types::{Wide, Width};
use parser::{Node, Parser};
use std::fmt;

/// A compiled predicate.
#[derive(Debug, Clone)]
pub struct BoolExpr<W: Width = Wide> {
    source: String,
    root: Node<W>,
}

impl<W: Width> BoolExpr<W> {
    /// Compile `source`.
    pub fn compile(source: &str) -> Result<Self> {
        let root = Parser::<W>::parse(source)?;
        tracing::trace!(source, "Compiled boolean expression");
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against `buf`. A field absent from the buffer makes the
    /// comparison reading it false.
    pub fn eval(&self, buf: &FieldBuffer<W>) -> Result<bool> {
        eval::eval_bool(&self.root, buf)
    }

    /// Replace the compiled tree with one built from `source`. On failure
    /// the current tree is kept.
    pub fn recompile(&mut self, source: &str) -> Result<()> {
        *self = Self::compile(source)?;
        Ok(())
    }

    /// The text this expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Prints the canonical, fully parenthesized form.
impl<W: Width> fmt::Display for BoolExpr<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}

/// A compiled formula yielding a number.
#[derive(Debug, Clone)]
pub struct ArithExpr<W: Width = Wide> {
    source: String,
    root: Node<W>,
}

impl<W: Width> ArithExpr<W> {
    /// Compile `source`.
    pub fn compile(source: &str) -> Result<Self> {
        let root = Parser::<W>::parse(source)?;
        tracing::trace!(source, "Compiled arithmetic expression");
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against `buf`. Reading an absent field is `NotPresent`;
    /// comparisons inside the formula count as `1` or `0`.
    pub fn eval(&self, buf: &FieldBuffer<W>) -> Result<f64> {
        eval::eval_number(&self.root, buf)
    }

    /// Replace the compiled tree with one built from `source`. On failure
    /// the current tree is kept.
    pub fn recompile(&mut self, source: &str) -> Result<()> {
        *self = Self::compile(source)?;
        Ok(())
    }

    /// The text this expression was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl<W: Width> fmt::Display for ArithExpr<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.root, f)
    }
}
