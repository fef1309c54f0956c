//! Conversion to the Braket analog Hamiltonian simulation program format.
//!
//! Only the document shape changes: times, values and coordinates are
//! carried over unchanged and stay in SI units.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::task::{GlobalField, LocalField, TaskSpecification};

/// Schema name of an AHS program.
pub const AHS_SCHEMA_NAME: &str = "braket.ir.ahs.program";

/// Schema version of an AHS program.
pub const AHS_SCHEMA_VERSION: &str = "1";

/// A Braket AHS program document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraketProgram {
    pub braket_schema_header: SchemaHeader,
    pub setup: Setup,
    pub hamiltonian: BraketHamiltonian,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaHeader {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub ahs_register: AhsRegister,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AhsRegister {
    pub sites: Vec<(Decimal, Decimal)>,
    pub filling: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraketHamiltonian {
    pub driving_fields: Vec<DrivingField>,
    #[serde(default)]
    pub local_detuning: Vec<LocalDetuning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivingField {
    pub amplitude: PhysicalField,
    pub phase: PhysicalField,
    pub detuning: PhysicalField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDetuning {
    pub magnitude: PhysicalField,
}

/// A time series with its spatial pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalField {
    pub time_series: TimeSeries,
    pub pattern: Pattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub values: Vec<Decimal>,
    pub times: Vec<Decimal>,
}

/// Spatial pattern: the literal string `"uniform"` or one factor per site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pattern {
    Uniform(UniformTag),
    Sites(Vec<Decimal>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniformTag {
    Uniform,
}

impl PhysicalField {
    fn uniform(field: &GlobalField) -> Self {
        Self {
            time_series: TimeSeries {
                values: field.values.clone(),
                times: field.times.clone(),
            },
            pattern: Pattern::Uniform(UniformTag::Uniform),
        }
    }

    fn local(field: &LocalField) -> Self {
        Self {
            time_series: TimeSeries {
                values: field.values.clone(),
                times: field.times.clone(),
            },
            pattern: Pattern::Sites(field.lattice_site_coefficients.clone()),
        }
    }
}

impl TaskSpecification {
    /// Convert to a Braket AHS program.
    pub fn to_braket(&self) -> BraketProgram {
        let rydberg = &self.effective_hamiltonian.rydberg;
        BraketProgram {
            braket_schema_header: SchemaHeader {
                name: AHS_SCHEMA_NAME.into(),
                version: AHS_SCHEMA_VERSION.into(),
            },
            setup: Setup {
                ahs_register: AhsRegister {
                    sites: self.lattice.sites.clone(),
                    filling: self.lattice.filling.clone(),
                },
            },
            hamiltonian: BraketHamiltonian {
                driving_fields: vec![DrivingField {
                    amplitude: PhysicalField::uniform(&rydberg.rabi_frequency_amplitude.global),
                    phase: PhysicalField::uniform(&rydberg.rabi_frequency_phase.global),
                    detuning: PhysicalField::uniform(&rydberg.detuning.global),
                }],
                local_detuning: rydberg
                    .detuning
                    .local
                    .iter()
                    .map(|local| LocalDetuning {
                        magnitude: PhysicalField::local(local),
                    })
                    .collect(),
            },
        }
    }
}
