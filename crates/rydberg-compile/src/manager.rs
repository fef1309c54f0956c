//! Pass manager for orchestrating compilation.

use tracing::{debug, info, instrument};

use rydberg_hal::Capabilities;
use rydberg_ir::{AnalogCircuit, Bindings};

use crate::error::CompileResult;
use crate::pass::Pass;
use crate::passes::{
    AssignVariables, Normalize, RecordScan, ValidateDeviceLimits, ValidateGeometry,
    ValidateLevelCoupling, ValidateSpatialModulation, ValidateWaveforms,
};
use crate::property::PropertySet;

/// Manages and executes a sequence of compilation passes.
pub struct PassManager {
    /// The passes to execute, in order.
    passes: Vec<Box<dyn Pass>>,
}

impl PassManager {
    /// Create a new empty pass manager.
    pub fn new() -> Self {
        Self { passes: vec![] }
    }

    /// Add a pass to the manager.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.passes.push(Box::new(pass));
    }

    /// Run all passes on the given circuit.
    #[instrument(skip(self, circuit, properties))]
    pub fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        info!(
            "Running pass manager with {} passes on register with {} sites",
            self.passes.len(),
            circuit.register().n_sites()
        );

        for pass in &self.passes {
            if pass.should_run(circuit, properties) {
                debug!("Running pass: {}", pass.name());
                pass.run(circuit, properties)?;
                debug!("Pass {} completed, status: {:?}", pass.name(), circuit.status());
            } else {
                debug!("Skipping pass: {}", pass.name());
            }
        }

        info!(
            "Pass manager completed, status: {:?}, duration: {:?}",
            circuit.status(),
            properties.duration
        );

        Ok(())
    }

    /// Get the number of passes.
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Check if the manager has no passes.
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for the standard pipeline.
///
/// Binding and normalization always run. The validation passes are added
/// when target capabilities are set.
pub struct PassManagerBuilder {
    /// Task bindings and target limits.
    properties: PropertySet,
}

impl PassManagerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            properties: PropertySet::new(),
        }
    }

    /// Set the initial properties.
    #[must_use]
    pub fn with_properties(mut self, properties: PropertySet) -> Self {
        self.properties = properties;
        self
    }

    /// Set the task bindings.
    #[must_use]
    pub fn with_bindings(mut self, bindings: Bindings) -> Self {
        self.properties.bindings = bindings;
        self
    }

    /// Set the target limits, in program units.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.properties.capabilities = Some(capabilities);
        self
    }

    /// Build the pass manager and return it with the properties.
    pub fn build(self) -> (PassManager, PropertySet) {
        let mut pm = PassManager::new();

        pm.add_pass(AssignVariables);
        pm.add_pass(RecordScan);
        pm.add_pass(Normalize);

        if self.properties.capabilities.is_some() {
            pm.add_pass(ValidateGeometry);
            pm.add_pass(ValidateLevelCoupling);
            pm.add_pass(ValidateSpatialModulation);
            pm.add_pass(ValidateWaveforms);
            pm.add_pass(ValidateDeviceLimits);
        }

        (pm, self.properties)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::UnitConversion;
    use crate::error::CompileError;
    use rust_decimal_macros::dec;
    use rydberg_ir::{
        BindingStatus, BravaisLattice, Field, FieldName, LevelCoupling, Pulse, Scalar, Sequence,
        Waveform,
    };

    fn circuit() -> AnalogCircuit {
        let pulse = Pulse::from_field(
            FieldName::RabiAmplitude,
            Field::uniform(Waveform::linear(0, Scalar::var("omega"), 1)),
        );
        AnalogCircuit::new(
            BravaisLattice::chain(2, 5),
            Sequence::from_pulse(LevelCoupling::GroundRydberg, pulse),
        )
    }

    #[test]
    fn test_empty_pass_manager() {
        let pm = PassManager::new();
        assert!(pm.is_empty());
        assert_eq!(pm.len(), 0);
    }

    #[test]
    fn test_pass_manager_builder() {
        let (pm, props) = PassManagerBuilder::new().build();
        assert_eq!(pm.len(), 3);
        assert!(props.capabilities.is_none());

        let caps = UnitConversion::si()
            .program_capabilities(&Capabilities::aquila())
            .unwrap();
        let (pm, props) = PassManagerBuilder::new().with_capabilities(caps).build();
        assert_eq!(pm.len(), 8);
        assert!(props.capabilities.is_some());
    }

    #[test]
    fn test_pipeline_binds_and_normalizes() {
        let (pm, mut props) = PassManagerBuilder::new()
            .with_bindings(Bindings::new().with("omega", dec!(10)).unwrap())
            .build();
        let mut c = circuit();
        pm.run(&mut c, &mut props).unwrap();

        assert_eq!(c.status(), BindingStatus::FullyAssigned);
        assert_eq!(props.duration, Some(dec!(1)));
    }

    #[test]
    fn test_pipeline_reports_missing() {
        let (pm, mut props) = PassManagerBuilder::new().build();
        let err = pm.run(&mut circuit(), &mut props).unwrap_err();
        assert!(matches!(err, CompileError::MissingAssignments(names) if names == vec!["omega"]));
    }
}
