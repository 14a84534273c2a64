//! Property tests for compiled expressions.

use fml_core::prelude::*;
use proptest::prelude::*;

mod common;

use common::counts;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn wildcard_tests_are_deterministic(
        values in proptest::collection::vec(-50i64..50, 0..8),
        threshold in -60i64..60,
    ) {
        let buf = counts(&values);
        let expr = BoolExpr::<Wide>::compile(&format!("COUNT[?] > {}", threshold)).unwrap();

        let first = expr.eval(&buf).unwrap();
        prop_assert_eq!(first, values.iter().any(|v| *v > threshold));
        prop_assert_eq!(expr.eval(&buf).unwrap(), first);

        let reparsed = BoolExpr::<Wide>::compile(&expr.to_string()).unwrap();
        prop_assert_eq!(reparsed.eval(&buf).unwrap(), first);
    }

    #[test]
    fn formulas_match_direct_arithmetic(a in -1000i64..1000, b in -1000i64..1000) {
        let buf = counts(&[a, b]);
        let expr = ArithExpr::<Wide>::compile("COUNT + COUNT[1] * 2 - 1").unwrap();
        prop_assert_eq!(expr.eval(&buf).unwrap(), (a + b * 2 - 1) as f64);
        prop_assert_eq!(expr.eval(&buf).unwrap(), expr.clone().eval(&buf).unwrap());
    }
}
