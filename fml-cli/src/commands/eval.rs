//! Eval command - evaluate an expression against a buffer.

use super::read_buffer;
use anyhow::{Context, Result};
use fml_core::{ArithExpr, BoolExpr, FieldBuffer, Width};
use std::path::Path;

/// Compile `expr` and evaluate it against `buf`, rendering the result.
pub fn evaluate<W: Width>(buf: &FieldBuffer<W>, expr: &str, arith: bool) -> Result<String> {
    if arith {
        let compiled = ArithExpr::<W>::compile(expr).context("Failed to compile formula")?;
        tracing::debug!(canonical = %compiled, "Evaluating formula");
        Ok(compiled.eval(buf)?.to_string())
    } else {
        let compiled = BoolExpr::<W>::compile(expr).context("Failed to compile predicate")?;
        tracing::debug!(canonical = %compiled, "Evaluating predicate");
        Ok(compiled.eval(buf)?.to_string())
    }
}

/// Run the eval command.
pub fn run<W: Width>(file: &Path, expr: &str, arith: bool) -> Result<()> {
    let buf = read_buffer::<W>(file)?;
    println!("{}", evaluate(&buf, expr, arith)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::sample;
    use super::*;

    #[test]
    fn predicates_and_formulas_render() {
        let buf = sample();
        assert_eq!(evaluate(&buf, "NAME[?] %% 'w.*'", false).unwrap(), "true");
        assert_eq!(evaluate(&buf, "COUNT[?] > 10", false).unwrap(), "false");
        assert_eq!(evaluate(&buf, "COUNT[1] * PRICE", true).unwrap(), "20");
    }

    #[test]
    fn compile_errors_keep_their_position() {
        let buf = sample();
        let err = evaluate(&buf, "COUNT ==", false).unwrap_err();
        assert!(err.to_string().contains("predicate"));
        assert!(format!("{:#}", err).contains("position"));
    }
}
