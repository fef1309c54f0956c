//! Property-based tests for batch parameter expansion.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rydberg_compile::{CompileError, Params};

fn value() -> impl Strategy<Value = Decimal> {
    (-1000_i64..=1000).prop_map(|v| Decimal::new(v, 2))
}

/// Two equally long batch columns.
fn columns() -> impl Strategy<Value = (Vec<Decimal>, Vec<Decimal>)> {
    (1_usize..=12).prop_flat_map(|n| {
        (
            prop::collection::vec(value(), n),
            prop::collection::vec(value(), n),
        )
    })
}

proptest! {
    #[test]
    fn batch_columns_zip_entry_by_entry((xs, ys) in columns(), s in value(), a in value()) {
        let params = Params::new()
            .assign("s", s).unwrap()
            .batch_assign([("x", xs.clone()), ("y", ys.clone())]).unwrap()
            .args(["a"]).unwrap();

        let tasks = params.tasks(&[a]).unwrap();
        prop_assert_eq!(tasks.len(), xs.len());
        prop_assert_eq!(params.n_tasks(), xs.len());
        for (i, task) in tasks.iter().enumerate() {
            prop_assert_eq!(task.len(), 4);
            prop_assert_eq!(task.scalar("x").unwrap(), xs[i]);
            prop_assert_eq!(task.scalar("y").unwrap(), ys[i]);
            prop_assert_eq!(task.scalar("s").unwrap(), s);
            prop_assert_eq!(task.scalar("a").unwrap(), a);
        }
    }

    #[test]
    fn unequal_columns_rejected(xs in prop::collection::vec(value(), 1..=8), extra in 1_usize..=4) {
        let ys: Vec<Decimal> = xs.iter().copied().chain(std::iter::repeat_n(Decimal::ZERO, extra)).collect();
        let err = Params::new().batch_assign([("x", xs.clone()), ("y", ys.clone())]).unwrap_err();
        match err {
            CompileError::BatchLengthMismatch { name, expected, found } => {
                prop_assert_eq!(name, "y");
                prop_assert_eq!(expected, xs.len());
                prop_assert_eq!(found, ys.len());
            }
            other => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    #[test]
    fn params_survive_json((xs, _) in columns(), s in value()) {
        let params = Params::new()
            .assign("s", s).unwrap()
            .batch_assign([("x", xs)]).unwrap();
        let json = serde_json::to_string(&params).unwrap();
        let back: Params = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.tasks(&[]).unwrap(), params.tasks(&[]).unwrap());
    }
}
