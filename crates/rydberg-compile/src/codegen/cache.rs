//! Content-addressed cache of compiled waveforms.
//!
//! Waveforms compare and hash structurally, so channels that drive the
//! same literal waveform share one [`CompiledWaveform`].

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tracing::trace;

use rydberg_ir::{Bindings, IrError, Waveform};

use crate::error::CompileResult;

/// A flattened waveform with precomputed segment boundaries.
#[derive(Clone)]
pub struct CompiledWaveform(Arc<Compiled>);

struct Compiled {
    waveform: Waveform,
    segments: Vec<Waveform>,
    /// Cumulative end time of each segment.
    ends: Vec<Decimal>,
}

impl CompiledWaveform {
    /// Compile a fully assigned, flattened waveform.
    pub fn new(waveform: &Waveform) -> CompileResult<Self> {
        let bindings = Bindings::new();
        let segments = waveform.leaf_segments();
        let mut ends = Vec::with_capacity(segments.len());
        let mut t = Decimal::ZERO;
        for segment in &segments {
            let duration = segment.duration(&bindings)?;
            t = t
                .checked_add(duration)
                .ok_or_else(|| IrError::ArithmeticOverflow(format!("{t} + {duration}")))?;
            ends.push(t);
        }
        Ok(Self(Arc::new(Compiled {
            waveform: waveform.clone(),
            segments,
            ends,
        })))
    }

    /// The source waveform.
    pub fn waveform(&self) -> &Waveform {
        &self.0.waveform
    }

    /// The leaf segments in playback order.
    pub fn segments(&self) -> &[Waveform] {
        &self.0.segments
    }

    pub fn duration(&self) -> Decimal {
        self.0.ends.last().copied().unwrap_or(Decimal::ZERO)
    }

    /// Value at time `t`; zero outside `[0, duration]`.
    ///
    /// At a boundary shared by two segments the left segment's end value
    /// is returned.
    pub fn eval(&self, t: Decimal) -> CompileResult<Decimal> {
        if t < Decimal::ZERO || t > self.duration() || self.0.segments.is_empty() {
            return Ok(Decimal::ZERO);
        }
        let ends = &self.0.ends;
        let index = ends.partition_point(|end| *end < t).min(ends.len().saturating_sub(1));
        let start = index.checked_sub(1).map_or(Decimal::ZERO, |i| ends[i]);
        Ok(self.0.segments[index].eval(t - start, &Bindings::new())?)
    }

    /// Whether both handles share one compiled waveform.
    pub fn ptr_eq(&self, other: &CompiledWaveform) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CompiledWaveform {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.waveform == other.0.waveform
    }
}

impl Eq for CompiledWaveform {}

impl fmt::Debug for CompiledWaveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledWaveform")
            .field("segments", &self.0.segments.len())
            .field("duration", &self.duration())
            .finish()
    }
}

/// Interns compiled waveforms by structural equality.
#[derive(Default)]
pub struct WaveformCache {
    entries: FxHashMap<Waveform, CompiledWaveform>,
    hits: usize,
}

impl WaveformCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiled form of `waveform`, compiling it on first use.
    pub fn intern(&mut self, waveform: &Waveform) -> CompileResult<CompiledWaveform> {
        if let Some(compiled) = self.entries.get(waveform) {
            self.hits += 1;
            trace!("waveform cache hit ({} so far)", self.hits);
            return Ok(compiled.clone());
        }
        let compiled = CompiledWaveform::new(waveform)?;
        self.entries.insert(waveform.clone(), compiled.clone());
        Ok(compiled)
    }

    /// Number of distinct waveforms compiled.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of lookups served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }
}
