//! Task parameters.
//!
//! [`Params`] holds everything that turns one symbolic circuit into a list
//! of fully bound tasks:
//! - static values shared by every task
//! - a batch of per-task values; one task per entry
//! - the names of arguments supplied positionally at compile time
//!
//! Batch columns are zipped, not crossed: `x = [1, 2, 3]` and
//! `y = [4, 5, 6]` give three tasks `(1, 4)`, `(2, 5)` and `(3, 6)`.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rydberg_ir::{Bindings, IrError, ParamValue};

use crate::error::{CompileError, CompileResult};

/// Static values, batch entries and positional argument names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default, rename = "static")]
    static_params: Bindings,
    #[serde(default)]
    batch: Vec<Bindings>,
    /// Length fixed by the first batch column, even an empty one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    batch_len: Option<usize>,
    /// Names bound by the batch, including columns without entries.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    batch_names: BTreeSet<String>,
    #[serde(default)]
    args: Vec<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` for every task.
    pub fn assign(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> CompileResult<Self> {
        let name = name.into();
        self.reject_taken(&name)?;
        self.static_params.insert(name, value)?;
        Ok(self)
    }

    /// Add batch columns, zipped entry by entry.
    ///
    /// All columns must have the same length, and the length of any earlier
    /// column (empty ones included), otherwise [`CompileError::BatchLengthMismatch`]. Names already
    /// bound elsewhere fail with `IrError::DuplicateAssignment`.
    pub fn batch_assign<I, S, V>(mut self, columns: I) -> CompileResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<V>)>,
        S: Into<String>,
        V: Into<ParamValue>,
    {
        for (name, values) in columns {
            let name = name.into();
            self.reject_taken(&name)?;
            let found = values.len();
            match self.batch_length() {
                Some(expected) if expected != found => {
                    return Err(CompileError::BatchLengthMismatch {
                        name,
                        expected,
                        found,
                    });
                }
                Some(_) => {}
                None => self.batch = vec![Bindings::new(); found],
            }
            self.batch_len = Some(found);
            for (entry, value) in self.batch.iter_mut().zip(values) {
                entry.insert(name.clone(), value)?;
            }
            self.batch_names.insert(name);
        }
        Ok(self)
    }

    /// Append explicit batch entries.
    pub fn batch_entries<I: IntoIterator<Item = Bindings>>(mut self, entries: I) -> CompileResult<Self> {
        for entry in entries {
            if let Some((name, _)) = entry.iter().find(|(name, _)| self.static_params.contains(name)) {
                return Err(duplicate(name, &self.static_params));
            }
            self.batch_names.extend(entry.names().map(str::to_string));
            self.batch.push(entry);
        }
        self.batch_len = Some(self.batch.len());
        Ok(self)
    }

    /// Names whose values are passed positionally to [`Params::tasks`].
    pub fn args<I, S>(mut self, names: I) -> CompileResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.reject_taken(&name)?;
            self.args.push(name);
        }
        Ok(self)
    }

    pub fn static_params(&self) -> &Bindings {
        &self.static_params
    }

    pub fn batch(&self) -> &[Bindings] {
        &self.batch
    }

    pub fn arg_names(&self) -> &[String] {
        &self.args
    }

    /// Number of tasks: one per batch entry, or one without a batch. An
    /// empty batch column gives no tasks.
    pub fn n_tasks(&self) -> usize {
        self.batch_length().unwrap_or(1)
    }

    /// Bind the argument names to `values`, in order.
    pub fn flatten_args(&self, values: &[Decimal]) -> CompileResult<Bindings> {
        if values.len() != self.args.len() {
            return Err(CompileError::ArgumentCountMismatch {
                expected: self.args.len(),
                found: values.len(),
            });
        }
        let mut bindings = Bindings::new();
        for (name, value) in self.args.iter().zip(values) {
            bindings.insert(name.clone(), *value)?;
        }
        Ok(bindings)
    }

    /// The bindings of every task: static values, arguments and one batch
    /// entry each.
    pub fn tasks(&self, args: &[Decimal]) -> CompileResult<Vec<Bindings>> {
        let shared = self.static_params.merged(&self.flatten_args(args)?)?;
        if self.batch_length().is_none() {
            return Ok(vec![shared]);
        }
        self.batch
            .iter()
            .map(|entry| Ok(shared.merged(entry)?))
            .collect()
    }

    fn reject_taken(&self, name: &str) -> CompileResult<()> {
        if self.static_params.contains(name) {
            return Err(duplicate(name, &self.static_params));
        }
        if self.args.iter().any(|arg| arg == name) || self.batch_names().contains(name) {
            return Err(IrError::DuplicateAssignment {
                name: name.to_string(),
                previous: None,
            }
            .into());
        }
        Ok(())
    }

    /// The batch length; entries read from JSON count without a stored length.
    fn batch_length(&self) -> Option<usize> {
        self.batch_len
            .or_else(|| (!self.batch.is_empty()).then_some(self.batch.len()))
    }

    fn batch_names(&self) -> BTreeSet<&str> {
        self.batch_names
            .iter()
            .map(String::as_str)
            .chain(self.batch.iter().flat_map(Bindings::names))
            .collect()
    }
}

fn duplicate(name: &str, bindings: &Bindings) -> CompileError {
    IrError::DuplicateAssignment {
        name: name.to_string(),
        previous: bindings.get(name).and_then(ParamValue::as_scalar),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_batch_zip() {
        let params = Params::new()
            .batch_assign([("x", vec![dec!(1), dec!(2), dec!(3)]), ("y", vec![dec!(4), dec!(5), dec!(6)])])
            .unwrap();
        let tasks = params.tasks(&[]).unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[1].scalar("x").unwrap(), dec!(2));
        assert_eq!(tasks[1].scalar("y").unwrap(), dec!(5));
    }

    #[test]
    fn test_batch_length_mismatch() {
        let err = Params::new()
            .batch_assign([("x", vec![dec!(1), dec!(2)]), ("y", vec![dec!(4), dec!(5), dec!(6)])])
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::BatchLengthMismatch { ref name, expected: 2, found: 3 } if name == "y"
        ));
    }

    #[test]
    fn test_empty_column_fixes_batch_length() {
        let params = Params::new().batch_assign([("a", Vec::<Decimal>::new())]).unwrap();
        assert_eq!(params.n_tasks(), 0);
        assert!(params.tasks(&[]).unwrap().is_empty());

        let err = params
            .clone()
            .batch_assign([("b", vec![dec!(1), dec!(2), dec!(3)])])
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::BatchLengthMismatch { ref name, expected: 0, found: 3 } if name == "b"
        ));

        let err = params.batch_assign([("a", Vec::<Decimal>::new())]).unwrap_err();
        assert!(matches!(err, CompileError::Ir(IrError::DuplicateAssignment { .. })));
    }

    #[test]
    fn test_chained_batch_columns_must_match() {
        let params = Params::new()
            .batch_assign([("x", vec![dec!(1), dec!(2)])])
            .unwrap();
        let err = params
            .clone()
            .batch_assign([("y", vec![dec!(3)])])
            .unwrap_err();
        assert!(matches!(
            err,
            CompileError::BatchLengthMismatch { ref name, expected: 2, found: 1 } if name == "y"
        ));

        let params = params.batch_assign([("y", vec![dec!(3), dec!(4)])]).unwrap();
        let tasks = params.tasks(&[]).unwrap();
        assert_eq!(tasks[1].scalar("x").unwrap(), dec!(2));
        assert_eq!(tasks[1].scalar("y").unwrap(), dec!(4));
    }

    #[test]
    fn test_static_args_and_batch_merge() {
        let params = Params::new()
            .assign("omega", dec!(15))
            .unwrap()
            .args(["t"])
            .unwrap()
            .batch_assign([("delta", vec![dec!(-1), dec!(1)])])
            .unwrap();
        assert_eq!(params.n_tasks(), 2);

        let tasks = params.tasks(&[dec!(0.5)]).unwrap();
        for task in &tasks {
            assert_eq!(task.scalar("omega").unwrap(), dec!(15));
            assert_eq!(task.scalar("t").unwrap(), dec!(0.5));
        }
        assert_eq!(tasks[0].scalar("delta").unwrap(), dec!(-1));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let params = Params::new().args(["a", "b"]).unwrap();
        let err = params.tasks(&[dec!(1)]).unwrap_err();
        assert!(matches!(
            err,
            CompileError::ArgumentCountMismatch { expected: 2, found: 1 }
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let params = Params::new().assign("x", dec!(1)).unwrap();
        assert!(params.clone().assign("x", dec!(2)).is_err());
        assert!(params.clone().args(["x"]).is_err());
        assert!(params.batch_assign([("x", vec![dec!(3)])]).is_err());
    }

    #[test]
    fn test_vector_binding() {
        let params = Params::new().assign("mask", vec![dec!(1), dec!(0)]).unwrap();
        let task = &params.tasks(&[]).unwrap()[0];
        assert_eq!(task.vector("mask").unwrap(), &[dec!(1), dec!(0)]);
    }

    #[test]
    fn test_params_from_json() {
        let json = r#"{"static": {"omega": "15"}, "batch": [{"delta": "1"}, {"delta": "2"}], "args": []}"#;
        let params: Params = serde_json::from_str(json).unwrap();
        assert_eq!(params.n_tasks(), 2);
        assert_eq!(params.static_params().scalar("omega").unwrap(), dec!(15));
    }
}
