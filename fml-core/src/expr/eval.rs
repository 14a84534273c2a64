//! Tree evaluation against a buffer.
//!
//! Comparisons, matches and presence tests are the quantifier scope for
//! `[?]` references: such a test holds when it holds for at least one
//! combination of occurrences of the wildcard fields it contains. A test
//! whose operands read an absent occurrence is false for that combination.

use super::parser::{BinaryOp, FieldRef, Node, Occurrence, UnaryOp};
use crate::buffer::FieldBuffer;
use crate::error::{FmlError, Result};
use crate::types::{FieldId, Width};
use crate::value::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Num(f64),
    Text(String),
}

/// Occurrences chosen for wildcard fields by enclosing tests.
type Bindings<W> = Vec<(FieldId<W>, usize)>;

pub(crate) fn eval_bool<W: Width>(node: &Node<W>, buf: &FieldBuffer<W>) -> Result<bool> {
    truth(node, buf, &mut Vec::new())
}

pub(crate) fn eval_number<W: Width>(node: &Node<W>, buf: &FieldBuffer<W>) -> Result<f64> {
    let value = value(node, buf, &mut Vec::new())?;
    number(value)
}

fn truth<W: Width>(node: &Node<W>, buf: &FieldBuffer<W>, bound: &mut Bindings<W>) -> Result<bool> {
    match node {
        Node::Binary(op, lhs, rhs) if op.is_logical() => {
            let lhs = truth(lhs, buf, bound)?;
            match op {
                BinaryOp::Or if lhs => Ok(true),
                BinaryOp::And if !lhs => Ok(false),
                BinaryOp::Xor => Ok(lhs ^ truth(rhs, buf, bound)?),
                _ => truth(rhs, buf, bound),
            }
        }
        Node::Unary(UnaryOp::Not, operand) => Ok(!truth(operand, buf, bound)?),
        Node::Field(field) => Ok(present(field, buf, bound)),
        _ => quantified(node, buf, bound),
    }
}

fn bound_occurrence<W: Width>(field: &FieldRef<W>, bound: &Bindings<W>) -> Option<usize> {
    match field.occurrence {
        Occurrence::At(n) => Some(n),
        Occurrence::Any => bound
            .iter()
            .find(|(id, _)| *id == field.id)
            .map(|(_, n)| *n),
    }
}

fn present<W: Width>(field: &FieldRef<W>, buf: &FieldBuffer<W>, bound: &Bindings<W>) -> bool {
    match bound_occurrence(field, bound) {
        Some(n) => buf.occurrence(field.id, n).is_some(),
        None => buf.count(field.id) > 0,
    }
}

/// Wildcard fields of a test that no enclosing test has bound. Nested
/// tests are skipped; they quantify their own wildcards.
fn free_wildcards<W: Width>(node: &Node<W>, bound: &Bindings<W>) -> Vec<FieldId<W>> {
    fn walk<W: Width>(node: &Node<W>, bound: &Bindings<W>, out: &mut Vec<FieldId<W>>) {
        match node {
            Node::Field(field) if field.occurrence == Occurrence::Any => {
                let seen = bound.iter().any(|(id, _)| *id == field.id) || out.contains(&field.id);
                if !seen {
                    out.push(field.id);
                }
            }
            Node::Unary(UnaryOp::Neg | UnaryOp::Plus, operand) => walk(operand, bound, out),
            Node::Binary(op, lhs, rhs) if !op.is_comparison() && !op.is_logical() => {
                walk(lhs, bound, out);
                walk(rhs, bound, out);
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    match node {
        Node::Binary(op, lhs, rhs) if op.is_comparison() => {
            walk(lhs, bound, &mut out);
            walk(rhs, bound, &mut out);
        }
        Node::Match { subject, .. } => walk(subject, bound, &mut out),
        other => walk(other, bound, &mut out),
    }
    out
}

/// Step `digits` to the next combination below `limits`; `false` after
/// the last one.
fn next_combination(digits: &mut [usize], limits: &[usize]) -> bool {
    for (digit, limit) in digits.iter_mut().zip(limits) {
        *digit += 1;
        if *digit < *limit {
            return true;
        }
        *digit = 0;
    }
    false
}

fn quantified<W: Width>(
    node: &Node<W>,
    buf: &FieldBuffer<W>,
    bound: &mut Bindings<W>,
) -> Result<bool> {
    let free = free_wildcards(node, bound);
    let limits: Vec<usize> = free.iter().map(|id| buf.count(*id)).collect();
    if limits.contains(&0) {
        return Ok(false);
    }

    let base = bound.len();
    let mut digits = vec![0usize; free.len()];
    let outcome = loop {
        bound.truncate(base);
        bound.extend(free.iter().copied().zip(digits.iter().copied()));
        match holds(node, buf, bound) {
            Ok(true) => break Ok(true),
            Ok(false) | Err(FmlError::NotPresent { .. }) => {}
            Err(e) => break Err(e),
        }
        if !next_combination(&mut digits, &limits) {
            break Ok(false);
        }
    };
    bound.truncate(base);
    outcome
}

/// One test under fixed bindings.
fn holds<W: Width>(node: &Node<W>, buf: &FieldBuffer<W>, bound: &mut Bindings<W>) -> Result<bool> {
    match node {
        Node::Binary(op, lhs, rhs) if op.is_comparison() => {
            let lhs = value(lhs, buf, bound)?;
            let rhs = value(rhs, buf, bound)?;
            compare(*op, lhs, rhs)
        }
        Node::Match {
            negated,
            subject,
            regex,
            ..
        } => match value(subject, buf, bound)? {
            Scalar::Text(text) => Ok(regex.is_match(&text) != *negated),
            Scalar::Num(n) => Err(FmlError::type_mismatch(subject, "text", n)),
        },
        other => Ok(match value(other, buf, bound)? {
            Scalar::Num(n) => n != 0.0,
            Scalar::Text(s) => !s.is_empty(),
        }),
    }
}

fn compare(op: BinaryOp, lhs: Scalar, rhs: Scalar) -> Result<bool> {
    let ordering = match (lhs, rhs) {
        (Scalar::Text(a), Scalar::Text(b)) => Some(a.cmp(&b)),
        (a, b) => number(a)?.partial_cmp(&number(b)?),
    };
    Ok(match op {
        BinaryOp::Eq => ordering == Some(Ordering::Equal),
        BinaryOp::Ne => ordering != Some(Ordering::Equal),
        BinaryOp::Lt => ordering == Some(Ordering::Less),
        BinaryOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        BinaryOp::Gt => ordering == Some(Ordering::Greater),
        _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
    })
}

fn number(value: Scalar) -> Result<f64> {
    match value {
        Scalar::Num(n) => Ok(n),
        Scalar::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| FmlError::type_mismatch(format!("'{}'", s), "number", "text")),
    }
}

fn scalar<W: Width>(field: &FieldRef<W>, value: Value) -> Result<Scalar> {
    if let Some(n) = value.as_f64() {
        return Ok(Scalar::Num(n));
    }
    match value.text_lossy() {
        Some(text) => Ok(Scalar::Text(text)),
        None => Err(FmlError::type_mismatch(
            &field.name,
            "number or text",
            value.field_type(),
        )),
    }
}

fn value<W: Width>(node: &Node<W>, buf: &FieldBuffer<W>, bound: &mut Bindings<W>) -> Result<Scalar> {
    Ok(match node {
        Node::Number(n) => Scalar::Num(*n),
        Node::Text(s) => Scalar::Text(s.clone()),
        Node::Field(field) => {
            let occurrence = bound_occurrence(field, bound).unwrap_or(0);
            let value = buf
                .value_at(field.id, occurrence)?
                .ok_or_else(|| FmlError::NotPresent {
                    field: field.name.clone(),
                    occurrence,
                })?;
            scalar(field, value)?
        }
        Node::Unary(UnaryOp::Neg, operand) => Scalar::Num(-number(value(operand, buf, bound)?)?),
        Node::Unary(UnaryOp::Plus, operand) => Scalar::Num(number(value(operand, buf, bound)?)?),
        Node::Unary(UnaryOp::Not, _) => Scalar::Num(f64::from(u8::from(truth(node, buf, bound)?))),
        Node::Binary(op, _, _) if op.is_logical() => {
            Scalar::Num(f64::from(u8::from(truth(node, buf, bound)?)))
        }
        Node::Binary(op, _, _) if op.is_comparison() => {
            Scalar::Num(f64::from(u8::from(quantified(node, buf, bound)?)))
        }
        Node::Match { .. } => Scalar::Num(f64::from(u8::from(quantified(node, buf, bound)?))),
        Node::Binary(op, lhs, rhs) => {
            let lhs = number(value(lhs, buf, bound)?)?;
            let rhs = number(value(rhs, buf, bound)?)?;
            Scalar::Num(match op {
                BinaryOp::Add => lhs + rhs,
                BinaryOp::Sub => lhs - rhs,
                BinaryOp::Mul => lhs * rhs,
                BinaryOp::Div => lhs / rhs,
                _ => lhs % rhs,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_cover_the_product() {
        let limits = [2, 3];
        let mut digits = [0, 0];
        let mut seen = vec![digits];
        while next_combination(&mut digits, &limits) {
            seen.push(digits);
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&[1, 2]));
    }

    #[test]
    fn text_compares_lexically_and_numbers_numerically() {
        let text = |s: &str| Scalar::Text(s.to_string());
        assert!(compare(BinaryOp::Lt, text("10"), text("9")).unwrap());
        assert!(compare(BinaryOp::Gt, text("10"), Scalar::Num(9.0)).unwrap());
        assert!(compare(BinaryOp::Ne, Scalar::Num(f64::NAN), Scalar::Num(f64::NAN)).unwrap());
        assert!(matches!(
            compare(BinaryOp::Eq, text("abc"), Scalar::Num(1.0)),
            Err(FmlError::TypeMismatch { .. })
        ));
    }
}
