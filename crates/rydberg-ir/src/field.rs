//! Spatial modulations and fields.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bindings::{Bindings, ParamValue};
use crate::error::{IrError, IrResult};
use crate::scalar::{Interval, Scalar};
use crate::waveform::Waveform;

/// How a drive is distributed over the sites of the register.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpatialModulation {
    /// Every site receives coefficient 1.
    Uniform,
    /// Explicit coefficients for selected sites; other sites receive 0.
    ScaledLocations(BTreeMap<usize, Scalar>),
    /// A coefficient vector supplied by name at binding time.
    RunTimeVector(String),
    /// A named coefficient vector with its bound values.
    AssignedRunTimeVector {
        /// Name of the vector.
        name: String,
        /// One coefficient per site.
        values: Vec<Decimal>,
    },
}

impl SpatialModulation {
    /// Coefficients for selected sites.
    pub fn scaled_locations<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = (usize, S)>,
        S: Into<Scalar>,
    {
        SpatialModulation::ScaledLocations(
            locations.into_iter().map(|(i, s)| (i, s.into())).collect(),
        )
    }

    /// A named run-time coefficient vector.
    pub fn run_time_vector(name: impl Into<String>) -> Self {
        SpatialModulation::RunTimeVector(name.into())
    }

    /// Whether this is [`SpatialModulation::Uniform`].
    pub fn is_uniform(&self) -> bool {
        matches!(self, SpatialModulation::Uniform)
    }

    /// Bind a run-time vector or assign the scalars of scaled locations.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<SpatialModulation> {
        Ok(match self {
            SpatialModulation::Uniform => self.clone(),
            SpatialModulation::ScaledLocations(locations) => SpatialModulation::ScaledLocations(
                locations
                    .iter()
                    .map(|(i, s)| Ok((*i, s.assign(bindings)?)))
                    .collect::<IrResult<_>>()?,
            ),
            SpatialModulation::RunTimeVector(name) => match bindings.get(name) {
                Some(ParamValue::Vector(values)) => SpatialModulation::AssignedRunTimeVector {
                    name: name.clone(),
                    values: values.clone(),
                },
                Some(ParamValue::Scalar(_)) => {
                    return Err(IrError::TypeMismatch {
                        name: name.clone(),
                        expected: "vector",
                    });
                }
                None => self.clone(),
            },
            SpatialModulation::AssignedRunTimeVector { name, .. } => {
                if bindings.contains(name) {
                    return Err(IrError::DuplicateAssignment {
                        name: name.clone(),
                        previous: None,
                    });
                }
                self.clone()
            }
        })
    }

    /// Collect the names this modulation still needs.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self {
            SpatialModulation::ScaledLocations(locations) => {
                locations.values().for_each(|s| s.collect_free(out));
            }
            SpatialModulation::RunTimeVector(name) => {
                out.insert(name.clone());
            }
            SpatialModulation::Uniform | SpatialModulation::AssignedRunTimeVector { .. } => {}
        }
    }

    /// Collect assigned scalar variables into `out`.
    pub fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        if let SpatialModulation::ScaledLocations(locations) = self {
            locations.values().for_each(|s| s.collect_assigned(out));
        }
    }

    /// Per-site coefficients for a register with `n_sites` sites.
    pub fn coefficients(&self, n_sites: usize, bindings: &Bindings) -> IrResult<Vec<Decimal>> {
        match self {
            SpatialModulation::Uniform => Ok(vec![Decimal::ONE; n_sites]),
            SpatialModulation::ScaledLocations(locations) => {
                let mut coefficients = vec![Decimal::ZERO; n_sites];
                for (index, scale) in locations {
                    let slot = coefficients.get_mut(*index).ok_or_else(|| {
                        IrError::InvalidArgument(format!(
                            "location {index} is outside a register of {n_sites} sites"
                        ))
                    })?;
                    *slot = scale.evaluate(bindings)?;
                }
                Ok(coefficients)
            }
            SpatialModulation::RunTimeVector(name) => Ok(bindings.vector(name)?.to_vec()),
            SpatialModulation::AssignedRunTimeVector { values, .. } => Ok(values.clone()),
        }
    }
}

impl fmt::Display for SpatialModulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialModulation::Uniform => f.write_str("uniform"),
            SpatialModulation::ScaledLocations(locations) => {
                write!(f, "locations(")?;
                for (i, (index, scale)) in locations.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{index}: {scale}")?;
                }
                write!(f, ")")
            }
            SpatialModulation::RunTimeVector(name) => write!(f, "vector({name})"),
            SpatialModulation::AssignedRunTimeVector { name, values } => {
                write!(f, "vector({name}={})", ParamValue::Vector(values.clone()))
            }
        }
    }
}

/// The name of a control field within a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    /// Detuning from resonance.
    Detuning,
    /// Rabi frequency amplitude.
    RabiAmplitude,
    /// Rabi frequency phase.
    RabiPhase,
}

impl FieldName {
    /// All field names in canonical order.
    pub const ALL: [FieldName; 3] = [
        FieldName::Detuning,
        FieldName::RabiAmplitude,
        FieldName::RabiPhase,
    ];

    /// Whether this field drives the Rabi transition.
    pub fn is_rabi(self) -> bool {
        matches!(self, FieldName::RabiAmplitude | FieldName::RabiPhase)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldName::Detuning => f.write_str("detuning"),
            FieldName::RabiAmplitude => f.write_str("rabi_amplitude"),
            FieldName::RabiPhase => f.write_str("rabi_phase"),
        }
    }
}

/// A sum of drives, each a waveform applied through a spatial modulation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Field {
    drives: BTreeMap<SpatialModulation, Waveform>,
}

impl Field {
    /// A field with no drives.
    pub fn new() -> Self {
        Self::default()
    }

    /// A field with a single uniform drive.
    pub fn uniform(waveform: Waveform) -> Self {
        Self::new().with_drive(SpatialModulation::Uniform, waveform)
    }

    /// Build from a drive map.
    pub fn from_drives(drives: BTreeMap<SpatialModulation, Waveform>) -> Self {
        Self { drives }
    }

    /// Add a drive; a drive with the same modulation is summed with it.
    pub fn with_drive(mut self, modulation: SpatialModulation, waveform: Waveform) -> Self {
        let waveform = match self.drives.remove(&modulation) {
            Some(existing) => existing.add(&waveform),
            None => waveform,
        };
        self.drives.insert(modulation, waveform);
        self
    }

    /// Sum of two fields.
    pub fn add(&self, other: &Field) -> Field {
        other
            .drives
            .iter()
            .fold(self.clone(), |acc, (m, w)| acc.with_drive(m.clone(), w.clone()))
    }

    /// The drives, ordered by modulation.
    pub fn drives(&self) -> &BTreeMap<SpatialModulation, Waveform> {
        &self.drives
    }

    /// Whether the field has no drives.
    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    /// The longest drive duration.
    pub fn duration(&self, bindings: &Bindings) -> IrResult<Decimal> {
        self.drives
            .values()
            .try_fold(Decimal::ZERO, |acc, w| Ok(acc.max(w.duration(bindings)?)))
    }

    /// Apply `f` to every waveform, keeping modulations.
    pub fn map_waveforms(&self, f: impl Fn(&Waveform) -> IrResult<Waveform>) -> IrResult<Field> {
        Ok(Field {
            drives: self
                .drives
                .iter()
                .map(|(m, w)| Ok((m.clone(), f(w)?)))
                .collect::<IrResult<_>>()?,
        })
    }

    /// Slice every drive.
    pub fn slice(&self, interval: &Interval) -> IrResult<Field> {
        self.map_waveforms(|w| Ok(w.slice(interval.clone())))
    }

    /// Assign variables in modulations and waveforms.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Field> {
        let mut field = Field::new();
        for (modulation, waveform) in &self.drives {
            field = field.with_drive(modulation.assign(bindings)?, waveform.assign(bindings)?);
        }
        Ok(field)
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        for (modulation, waveform) in &self.drives {
            modulation.collect_free(out);
            waveform.collect_free(out);
        }
    }

    /// Collect assigned variables into `out`.
    pub fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        for (modulation, waveform) in &self.drives {
            modulation.collect_assigned(out);
            waveform.collect_assigned(out);
        }
    }

    /// Collect recorded variable names into `out`.
    pub fn collect_recorded(&self, out: &mut BTreeSet<String>) {
        self.drives.values().for_each(|w| w.collect_recorded(out));
    }

    /// Resolve record captures in drive order.
    pub fn scan_records(&self, acc: Bindings) -> IrResult<Bindings> {
        self.drives.values().try_fold(acc, |acc, w| w.scan_records(acc))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field(")?;
        for (i, (modulation, waveform)) in self.drives.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{modulation} * {waveform}")?;
        }
        write!(f, ")")
    }
}
