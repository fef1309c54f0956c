//! Hardware task specification.
//!
//! The types in this module mirror the JSON document accepted by
//! neutral-atom analog devices. Field names are part of the wire contract.
//! Decimals serialize as strings so that a task survives a JSON round-trip
//! without losing precision.

use std::collections::BTreeMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{HalError, HalResult};

/// A complete task for an analog device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpecification {
    /// Number of shots.
    pub nshots: u32,
    /// Atom positions and filling.
    pub lattice: Lattice,
    /// Drive schedule.
    pub effective_hamiltonian: EffectiveHamiltonian,
}

/// Atom positions and which of them are filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lattice {
    /// `(x, y)` coordinates, one per site.
    pub sites: Vec<(Decimal, Decimal)>,
    /// `1` for a filled site, `0` for a vacancy.
    pub filling: Vec<u8>,
}

/// The drive Hamiltonian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveHamiltonian {
    /// Ground-Rydberg drive.
    pub rydberg: RydbergHamiltonian,
}

/// Ground-Rydberg drive channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RydbergHamiltonian {
    /// Rabi frequency amplitude.
    pub rabi_frequency_amplitude: RabiFrequencyAmplitude,
    /// Rabi frequency phase.
    pub rabi_frequency_phase: RabiFrequencyPhase,
    /// Detuning.
    pub detuning: Detuning,
}

/// Rabi amplitude channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabiFrequencyAmplitude {
    pub global: GlobalField,
}

/// Rabi phase channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RabiFrequencyPhase {
    pub global: GlobalField,
}

/// Detuning channel, with an optional local component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detuning {
    pub global: GlobalField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalField>,
}

/// A time series applied uniformly to all sites.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalField {
    pub times: Vec<Decimal>,
    pub values: Vec<Decimal>,
}

/// A time series scaled per site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalField {
    pub times: Vec<Decimal>,
    pub values: Vec<Decimal>,
    pub lattice_site_coefficients: Vec<Decimal>,
}

impl GlobalField {
    /// Create a time series.
    pub fn new(times: Vec<Decimal>, values: Vec<Decimal>) -> Self {
        Self { times, values }
    }

    /// Check that times start at zero, strictly increase and pair with values.
    pub fn check(&self, channel: &str) -> HalResult<()> {
        check_series(channel, &self.times, &self.values)
    }
}

impl LocalField {
    /// Check the series and that one coefficient exists per site.
    pub fn check(&self, channel: &str, n_sites: usize) -> HalResult<()> {
        check_series(channel, &self.times, &self.values)?;
        if self.lattice_site_coefficients.len() != n_sites {
            return Err(HalError::InvalidTask(format!(
                "{channel}: {} site coefficients for {n_sites} sites",
                self.lattice_site_coefficients.len()
            )));
        }
        Ok(())
    }
}

fn check_series(channel: &str, times: &[Decimal], values: &[Decimal]) -> HalResult<()> {
    if times.len() != values.len() {
        return Err(HalError::InvalidTask(format!(
            "{channel}: {} times but {} values",
            times.len(),
            values.len()
        )));
    }
    if times.first().is_some_and(|t| !t.is_zero()) {
        return Err(HalError::InvalidTask(format!(
            "{channel}: first time must be 0"
        )));
    }
    if let Some(pair) = times.windows(2).find(|w| w[1] <= w[0]) {
        return Err(HalError::InvalidTask(format!(
            "{channel}: times not strictly increasing at {} -> {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

impl TaskSpecification {
    /// Check internal consistency of the document.
    pub fn check(&self) -> HalResult<()> {
        let n_sites = self.lattice.sites.len();
        if self.lattice.filling.len() != n_sites {
            return Err(HalError::InvalidTask(format!(
                "{} filling entries for {n_sites} sites",
                self.lattice.filling.len()
            )));
        }
        if let Some(bad) = self.lattice.filling.iter().find(|f| **f > 1) {
            return Err(HalError::InvalidTask(format!("filling value {bad}")));
        }
        let rydberg = &self.effective_hamiltonian.rydberg;
        rydberg
            .rabi_frequency_amplitude
            .global
            .check("rabi_frequency_amplitude")?;
        rydberg.rabi_frequency_phase.global.check("rabi_frequency_phase")?;
        rydberg.detuning.global.check("detuning")?;
        if let Some(local) = &rydberg.detuning.local {
            local.check("detuning.local", n_sites)?;
        }
        Ok(())
    }
}

/// Position of one site inside a tiled parallel register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLocation {
    /// Index in the tiled lattice.
    pub global_location_index: usize,
    /// `(column, row)` of the cluster copy.
    pub cluster_index: (usize, usize),
    /// Index inside the original arrangement.
    pub cluster_location_index: usize,
}

/// Maps the sites of a tiled register back to cluster copies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParallelDecoder {
    pub mapping: Vec<ClusterLocation>,
}

impl ParallelDecoder {
    /// Create a decoder from a mapping table.
    pub fn new(mapping: Vec<ClusterLocation>) -> Self {
        Self { mapping }
    }

    /// Global site indices per cluster, ordered by in-cluster index.
    pub fn cluster_indices(&self) -> BTreeMap<(usize, usize), Vec<usize>> {
        let mut clusters: BTreeMap<(usize, usize), Vec<(usize, usize)>> = BTreeMap::new();
        for loc in &self.mapping {
            clusters
                .entry(loc.cluster_index)
                .or_default()
                .push((loc.cluster_location_index, loc.global_location_index));
        }
        clusters
            .into_iter()
            .map(|(cluster, mut sites)| {
                sites.sort_unstable();
                (cluster, sites.into_iter().map(|(_, global)| global).collect())
            })
            .collect()
    }

    /// Split one shot over the tiled lattice into per-cluster shots.
    pub fn decode(&self, shot: &[u8]) -> HalResult<BTreeMap<(usize, usize), Vec<u8>>> {
        self.cluster_indices()
            .into_iter()
            .map(|(cluster, globals)| {
                let bits = globals
                    .iter()
                    .map(|&g| {
                        shot.get(g).copied().ok_or_else(|| {
                            HalError::InvalidTask(format!(
                                "shot has {} sites, decoder needs index {g}",
                                shot.len()
                            ))
                        })
                    })
                    .collect::<HalResult<Vec<u8>>>()?;
                Ok((cluster, bits))
            })
            .collect()
    }
}

/// A compiled task ready for submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareTask {
    pub task_specification: TaskSpecification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_decoder: Option<ParallelDecoder>,
}

impl HardwareTask {
    /// Create a task without a parallel decoder.
    pub fn new(task_specification: TaskSpecification) -> Self {
        Self {
            task_specification,
            parallel_decoder: None,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> HalResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from JSON and check consistency.
    pub fn from_json(json: &str) -> HalResult<Self> {
        let task: HardwareTask = serde_json::from_str(json)?;
        task.task_specification.check()?;
        Ok(task)
    }
}

/// An ordered batch of tasks, one per batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchTasks {
    pub tasks: Vec<HardwareTask>,
}

impl BatchTasks {
    /// Wrap a list of tasks.
    pub fn new(tasks: Vec<HardwareTask>) -> Self {
        Self { tasks }
    }

    /// Write the batch as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> HalResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a batch written by [`BatchTasks::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> HalResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let batch: BatchTasks = serde_json::from_str(&contents)?;
        for task in &batch.tasks {
            task.task_specification.check()?;
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn two_site_task() -> TaskSpecification {
        let ramp = GlobalField::new(vec![dec!(0), dec!(1)], vec![dec!(0), dec!(10)]);
        let zero = GlobalField::new(vec![dec!(0), dec!(1)], vec![dec!(0), dec!(0)]);
        TaskSpecification {
            nshots: 100,
            lattice: Lattice {
                sites: vec![(dec!(0), dec!(0)), (dec!(5), dec!(0))],
                filling: vec![1, 1],
            },
            effective_hamiltonian: EffectiveHamiltonian {
                rydberg: RydbergHamiltonian {
                    rabi_frequency_amplitude: RabiFrequencyAmplitude { global: ramp },
                    rabi_frequency_phase: RabiFrequencyPhase {
                        global: zero.clone(),
                    },
                    detuning: Detuning {
                        global: zero,
                        local: None,
                    },
                },
            },
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(two_site_task()).unwrap();
        let rydberg = &json["effective_hamiltonian"]["rydberg"];
        assert_eq!(json["lattice"]["filling"], serde_json::json!([1, 1]));
        assert!(rydberg["rabi_frequency_amplitude"]["global"]["times"].is_array());
        assert!(rydberg["detuning"].get("local").is_none());
    }

    #[test]
    fn test_json_roundtrip_preserves_precision() {
        let mut spec = two_site_task();
        spec.lattice.sites[1].0 = dec!(0.0000051234567891);
        let task = HardwareTask::new(spec);
        let back = HardwareTask::from_json(&task.to_json().unwrap()).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_check_rejects_unsorted_times() {
        let mut spec = two_site_task();
        spec.effective_hamiltonian.rydberg.detuning.global.times = vec![dec!(0), dec!(0)];
        assert!(matches!(spec.check(), Err(HalError::InvalidTask(_))));
    }

    #[test]
    fn test_check_rejects_coefficient_count() {
        let mut spec = two_site_task();
        spec.effective_hamiltonian.rydberg.detuning.local = Some(LocalField {
            times: vec![dec!(0), dec!(1)],
            values: vec![dec!(0), dec!(0)],
            lattice_site_coefficients: vec![dec!(1)],
        });
        assert!(spec.check().is_err());
    }

    #[test]
    fn test_decoder_groups_by_cluster() {
        let decoder = ParallelDecoder::new(vec![
            ClusterLocation {
                global_location_index: 0,
                cluster_index: (0, 0),
                cluster_location_index: 0,
            },
            ClusterLocation {
                global_location_index: 1,
                cluster_index: (0, 0),
                cluster_location_index: 1,
            },
            ClusterLocation {
                global_location_index: 2,
                cluster_index: (1, 0),
                cluster_location_index: 1,
            },
            ClusterLocation {
                global_location_index: 3,
                cluster_index: (1, 0),
                cluster_location_index: 0,
            },
        ]);
        let indices = decoder.cluster_indices();
        assert_eq!(indices[&(0, 0)], vec![0, 1]);
        assert_eq!(indices[&(1, 0)], vec![3, 2]);

        let decoded = decoder.decode(&[1, 0, 1, 0]).unwrap();
        assert_eq!(decoded[&(0, 0)], vec![1, 0]);
        assert_eq!(decoded[&(1, 0)], vec![0, 1]);

        assert!(decoder.decode(&[1, 0]).is_err());
    }
}
