//! Variable binding passes.
//!
//! [`AssignVariables`] substitutes the task bindings into the circuit.
//! [`RecordScan`] then resolves record captures and checks that no free
//! variable remains.

use tracing::debug;

use rydberg_ir::{AnalogCircuit, Bindings, IrError, ParamValue};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::{PropertySet, RecordedValues};

/// Assign the task bindings throughout register and sequence.
///
/// Names already assigned in the circuit fail with
/// `IrError::DuplicateAssignment`.
pub struct AssignVariables;

impl Pass for AssignVariables {
    fn name(&self) -> &'static str {
        "assign_variables"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        *circuit = circuit.assign(&properties.bindings)?;
        Ok(())
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        !properties.bindings.is_empty()
    }
}

/// Capture recorded values and require a fully assigned circuit.
///
/// Records are evaluated in playback order, so a record may depend on
/// values captured before it. Every free name that no record provides is
/// reported at once in [`CompileError::MissingAssignments`].
pub struct RecordScan;

impl Pass for RecordScan {
    fn name(&self) -> &'static str {
        "record_scan"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        let recorded = circuit.recorded_variables();
        let missing: Vec<String> = circuit
            .free_variables()
            .into_iter()
            .filter(|name| !recorded.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(CompileError::MissingAssignments(missing));
        }

        if let Some(name) = recorded.iter().find(|n| properties.bindings.contains(n)) {
            return Err(IrError::DuplicateAssignment {
                name: name.clone(),
                previous: properties.bindings.get(name).and_then(ParamValue::as_scalar),
            }
            .into());
        }

        if !recorded.is_empty() {
            let captured = circuit.scan_records(Bindings::new())?;
            debug!("captured {} recorded values", captured.len());

            let free = circuit.free_variables();
            let used: Bindings = captured
                .iter()
                .filter(|(name, _)| free.contains(*name))
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect();
            *circuit = circuit.assign(&used)?;
            properties.insert(RecordedValues(captured));
        }

        let remaining: Vec<String> = circuit.free_variables().into_iter().collect();
        if !remaining.is_empty() {
            return Err(CompileError::MissingAssignments(remaining));
        }
        Ok(())
    }
}
