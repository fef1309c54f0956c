//! Time-domain waveform expressions.
//!
//! A [`Waveform`] is an immutable expression tree over [`Scalar`]s. Every
//! waveform has a duration and can be evaluated at any time; outside
//! `[0, duration]` it evaluates to zero.
//!
//! Constructors canonicalize eagerly:
//! - appends never nest and drop zero-length literal constants,
//! - double negation collapses,
//! - repeated scaling folds into a single factor.

mod flatten;
mod kernel;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::arith;
use crate::bindings::Bindings;
use crate::error::{IrError, IrResult};
use crate::scalar::{Interval, Scalar};

pub use kernel::SmoothingKernel;

/// A user-supplied waveform body: `f(t, parameters)` with `t` in the
/// waveform's own time frame.
pub type WaveformFn = Arc<dyn Fn(f64, &[f64]) -> f64 + Send + Sync>;

/// A symbolic time-domain waveform.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Waveform(Arc<WaveformKind>);

/// The node kinds of a [`Waveform`] expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WaveformKind {
    /// A constant value.
    Constant {
        /// The value.
        value: Scalar,
        /// The duration.
        duration: Scalar,
    },
    /// A linear ramp.
    Linear {
        /// Value at `t = 0`.
        start: Scalar,
        /// Value at `t = duration`.
        stop: Scalar,
        /// The duration.
        duration: Scalar,
    },
    /// A polynomial `sum(coeffs[i] * t^i)`.
    Poly {
        /// Coefficients, lowest degree first.
        coeffs: Vec<Scalar>,
        /// The duration.
        duration: Scalar,
    },
    /// A user-defined function.
    Function(FunctionWaveform),
    /// A waveform sampled on a regular grid.
    Sample {
        /// The sampled waveform.
        waveform: Waveform,
        /// Reconstruction between samples.
        interpolation: Interpolation,
        /// Sampling step.
        dt: Scalar,
    },
    /// A waveform convolved with a smoothing kernel.
    Smooth {
        /// The smoothed waveform.
        waveform: Waveform,
        /// The kernel.
        kernel: SmoothingKernel,
        /// Kernel bandwidth in time units.
        radius: Scalar,
    },
    /// Pointwise sum; the duration is the longer of the two.
    Add(Waveform, Waveform),
    /// Pointwise negation.
    Negative(Waveform),
    /// Multiplication by a scalar.
    Scale {
        /// The factor.
        factor: Scalar,
        /// The scaled waveform.
        waveform: Waveform,
    },
    /// A time window of a waveform, shifted to start at zero.
    Slice {
        /// The sliced waveform.
        waveform: Waveform,
        /// The window.
        interval: Interval,
    },
    /// Segments played one after another. Never empty, never nested.
    Append(Vec<Waveform>),
    /// Captures the final value of `waveform` into the variable `var`.
    Record {
        /// The recorded waveform.
        waveform: Waveform,
        /// Name of the variable receiving the final value.
        var: String,
    },
    /// A waveform stretched to a target duration by holding an edge value.
    Aligned {
        /// The aligned waveform.
        waveform: Waveform,
        /// Which edge the waveform is anchored to.
        alignment: Alignment,
        /// The target duration.
        duration: Scalar,
    },
}

/// Interpolation used between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interpolation {
    /// Piecewise-linear reconstruction.
    Linear,
    /// Zero-order hold.
    Constant,
}

/// Anchor of an [`WaveformKind::Aligned`] waveform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Alignment {
    /// The waveform starts at zero; its last value is held afterwards.
    Left,
    /// The waveform ends at the target duration; its first value is held before.
    Right,
}

/// A named user function with its scalar parameters.
///
/// Two function waveforms are equal when they share the same callable
/// (by pointer), name, parameters and duration.
#[derive(Clone)]
pub struct FunctionWaveform {
    name: String,
    func: WaveformFn,
    parameters: Vec<(String, Scalar)>,
    duration: Scalar,
}

impl FunctionWaveform {
    /// Create a function waveform.
    pub fn new(
        name: impl Into<String>,
        func: WaveformFn,
        parameters: Vec<(String, Scalar)>,
        duration: impl Into<Scalar>,
    ) -> Self {
        Self {
            name: name.into(),
            func,
            parameters,
            duration: duration.into(),
        }
    }

    /// The function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The named parameters.
    pub fn parameters(&self) -> &[(String, Scalar)] {
        &self.parameters
    }

    /// The duration expression.
    pub fn duration(&self) -> &Scalar {
        &self.duration
    }

    fn call(&self, t: Decimal, bindings: &Bindings) -> IrResult<Decimal> {
        let args = self
            .parameters
            .iter()
            .map(|(_, p)| p.evaluate(bindings).map(arith::to_f64))
            .collect::<IrResult<Vec<f64>>>()?;
        arith::from_f64((self.func)(arith::to_f64(t), &args), &self.name)
    }

    fn map_scalars(&self, f: impl Fn(&Scalar) -> IrResult<Scalar>) -> IrResult<Self> {
        Ok(Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
            parameters: self
                .parameters
                .iter()
                .map(|(n, p)| Ok((n.clone(), f(p)?)))
                .collect::<IrResult<_>>()?,
            duration: f(&self.duration)?,
        })
    }
}

impl PartialEq for FunctionWaveform {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && std::ptr::addr_eq(Arc::as_ptr(&self.func), Arc::as_ptr(&other.func))
            && self.parameters == other.parameters
            && self.duration == other.duration
    }
}

impl Eq for FunctionWaveform {}

impl Hash for FunctionWaveform {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        (Arc::as_ptr(&self.func) as *const ()).hash(state);
        self.parameters.hash(state);
        self.duration.hash(state);
    }
}

impl fmt::Debug for FunctionWaveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionWaveform")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}

impl Waveform {
    fn from_kind(kind: WaveformKind) -> Self {
        Waveform(Arc::new(kind))
    }

    /// Access the node kind for pattern matching.
    pub fn kind(&self) -> &WaveformKind {
        &self.0
    }

    /// A constant segment.
    pub fn constant(value: impl Into<Scalar>, duration: impl Into<Scalar>) -> Self {
        Self::from_kind(WaveformKind::Constant {
            value: value.into(),
            duration: duration.into(),
        })
    }

    /// A linear ramp from `start` to `stop`.
    pub fn linear(
        start: impl Into<Scalar>,
        stop: impl Into<Scalar>,
        duration: impl Into<Scalar>,
    ) -> Self {
        Self::from_kind(WaveformKind::Linear {
            start: start.into(),
            stop: stop.into(),
            duration: duration.into(),
        })
    }

    /// A polynomial segment, coefficients lowest degree first.
    pub fn poly(coeffs: Vec<Scalar>, duration: impl Into<Scalar>) -> Self {
        Self::from_kind(WaveformKind::Poly {
            coeffs,
            duration: duration.into(),
        })
    }

    /// A user-defined function segment.
    pub fn function(function: FunctionWaveform) -> Self {
        Self::from_kind(WaveformKind::Function(function))
    }

    /// Sample on a regular grid of step `dt`.
    pub fn sample(&self, dt: impl Into<Scalar>, interpolation: Interpolation) -> Self {
        Self::from_kind(WaveformKind::Sample {
            waveform: self.clone(),
            interpolation,
            dt: dt.into(),
        })
    }

    /// Convolve with `kernel` of bandwidth `radius`.
    pub fn smooth(&self, kernel: SmoothingKernel, radius: impl Into<Scalar>) -> Self {
        Self::from_kind(WaveformKind::Smooth {
            waveform: self.clone(),
            kernel,
            radius: radius.into(),
        })
    }

    /// Pointwise sum.
    pub fn add(&self, rhs: &Waveform) -> Self {
        Self::from_kind(WaveformKind::Add(self.clone(), rhs.clone()))
    }

    /// Pointwise negation, collapsing double negation.
    pub fn neg(&self) -> Self {
        match self.kind() {
            WaveformKind::Negative(inner) => inner.clone(),
            _ => Self::from_kind(WaveformKind::Negative(self.clone())),
        }
    }

    /// Multiply by `factor`, folding nested scales and dropping `* 1`.
    pub fn scale(&self, factor: impl Into<Scalar>) -> Self {
        let factor = factor.into();
        if factor.as_literal() == Some(Decimal::ONE) {
            return self.clone();
        }
        match self.kind() {
            WaveformKind::Scale {
                factor: inner_factor,
                waveform,
            } => waveform.scale(factor.mul(inner_factor)),
            _ => Self::from_kind(WaveformKind::Scale {
                factor,
                waveform: self.clone(),
            }),
        }
    }

    /// Cut out `interval`; an unbounded interval returns `self`.
    pub fn slice(&self, interval: Interval) -> Self {
        if interval.start.is_none() && interval.stop.is_none() {
            return self.clone();
        }
        Self::from_kind(WaveformKind::Slice {
            waveform: self.clone(),
            interval,
        })
    }

    /// Play `other` after `self`.
    pub fn append(&self, other: &Waveform) -> Self {
        let mut parts = Vec::new();
        push_canonical(&mut parts, self);
        push_canonical(&mut parts, other);
        match parts.len() {
            0 => self.clone(),
            1 => parts.swap_remove(0),
            _ => Self::from_kind(WaveformKind::Append(parts)),
        }
    }

    /// Play all `waveforms` in order.
    ///
    /// Fails with [`IrError::EmptyAppend`] when the iterator is empty.
    pub fn concat<I>(waveforms: I) -> IrResult<Self>
    where
        I: IntoIterator<Item = Waveform>,
    {
        let mut first = None;
        let mut parts = Vec::new();
        for waveform in waveforms {
            if first.is_none() {
                first = Some(waveform.clone());
            }
            push_canonical(&mut parts, &waveform);
        }
        let first = first.ok_or(IrError::EmptyAppend)?;
        Ok(match parts.len() {
            0 => first,
            1 => parts.swap_remove(0),
            _ => Self::from_kind(WaveformKind::Append(parts)),
        })
    }

    /// Record the final value of this waveform into `var`.
    pub fn record(&self, var: impl Into<String>) -> Self {
        Self::from_kind(WaveformKind::Record {
            waveform: self.clone(),
            var: var.into(),
        })
    }

    /// Stretch or cut to `duration`, anchored at `alignment`.
    pub fn align(&self, alignment: Alignment, duration: impl Into<Scalar>) -> Self {
        Self::from_kind(WaveformKind::Aligned {
            waveform: self.clone(),
            alignment,
            duration: duration.into(),
        })
    }

    /// Duration under `bindings`.
    pub fn duration(&self, bindings: &Bindings) -> IrResult<Decimal> {
        match self.kind() {
            WaveformKind::Constant { duration, .. }
            | WaveformKind::Linear { duration, .. }
            | WaveformKind::Poly { duration, .. }
            | WaveformKind::Aligned { duration, .. } => duration.evaluate(bindings),
            WaveformKind::Function(function) => function.duration.evaluate(bindings),
            WaveformKind::Sample { waveform, .. }
            | WaveformKind::Smooth { waveform, .. }
            | WaveformKind::Negative(waveform)
            | WaveformKind::Scale { waveform, .. }
            | WaveformKind::Record { waveform, .. } => waveform.duration(bindings),
            WaveformKind::Add(a, b) => Ok(a.duration(bindings)?.max(b.duration(bindings)?)),
            WaveformKind::Slice { waveform, interval } => {
                let (start, stop) = interval.resolve(waveform.duration(bindings)?, bindings)?;
                arith::sub(stop, start)
            }
            WaveformKind::Append(parts) => parts.iter().try_fold(Decimal::ZERO, |acc, p| {
                arith::add(acc, p.duration(bindings)?)
            }),
        }
    }

    /// Value at time `t` under `bindings`; zero outside `[0, duration]`.
    ///
    /// At a breakpoint between two appended segments the earlier segment
    /// provides the value.
    pub fn eval(&self, t: Decimal, bindings: &Bindings) -> IrResult<Decimal> {
        let duration = self.duration(bindings)?;
        if t < Decimal::ZERO || t > duration {
            return Ok(Decimal::ZERO);
        }
        self.eval_inside(t, duration, bindings)
    }

    fn eval_inside(&self, t: Decimal, duration: Decimal, bindings: &Bindings) -> IrResult<Decimal> {
        match self.kind() {
            WaveformKind::Constant { value, .. } => value.evaluate(bindings),
            WaveformKind::Linear { start, stop, .. } => arith::lerp(
                start.evaluate(bindings)?,
                stop.evaluate(bindings)?,
                t,
                duration,
            ),
            WaveformKind::Poly { coeffs, .. } => {
                let coeffs = coeffs
                    .iter()
                    .map(|c| c.evaluate(bindings))
                    .collect::<IrResult<Vec<_>>>()?;
                arith::horner(&coeffs, t)
            }
            WaveformKind::Function(function) => function.call(t, bindings),
            WaveformKind::Sample {
                waveform,
                interpolation,
                dt,
            } => {
                let dt = positive_step(dt, bindings)?;
                let cell = if t.is_zero() {
                    Decimal::ZERO
                } else {
                    arith::sub(arith::div(t, dt)?.ceil(), Decimal::ONE)?
                };
                let t0 = arith::mul(cell, dt)?;
                let v0 = waveform.eval(t0, bindings)?;
                match interpolation {
                    Interpolation::Constant => Ok(v0),
                    Interpolation::Linear => {
                        let t1 = arith::add(t0, dt)?.min(duration);
                        let v1 = waveform.eval(t1, bindings)?;
                        arith::lerp(v0, v1, arith::sub(t, t0)?, arith::sub(t1, t0)?)
                    }
                }
            }
            WaveformKind::Smooth {
                waveform,
                kernel,
                radius,
            } => {
                let radius = radius.evaluate(bindings)?;
                if radius <= Decimal::ZERO {
                    return waveform.eval(t, bindings);
                }
                let mut acc = 0.0;
                for (x, weight) in kernel.quadrature() {
                    let shift = arith::mul(radius, arith::from_f64(x, "smoothing kernel")?)?;
                    let value = waveform.eval(arith::sub(t, shift)?, bindings)?;
                    acc += weight * arith::to_f64(value);
                }
                arith::from_f64(acc, "smoothing kernel")
            }
            WaveformKind::Add(a, b) => arith::add(a.eval(t, bindings)?, b.eval(t, bindings)?),
            WaveformKind::Negative(waveform) => Ok(-waveform.eval(t, bindings)?),
            WaveformKind::Scale { factor, waveform } => {
                arith::mul(factor.evaluate(bindings)?, waveform.eval(t, bindings)?)
            }
            WaveformKind::Slice { waveform, interval } => {
                let (start, _) = interval.resolve(waveform.duration(bindings)?, bindings)?;
                waveform.eval(arith::add(t, start)?, bindings)
            }
            WaveformKind::Append(parts) => {
                let mut offset = Decimal::ZERO;
                for part in parts {
                    let end = arith::add(offset, part.duration(bindings)?)?;
                    if t <= end {
                        return part.eval(arith::sub(t, offset)?, bindings);
                    }
                    offset = end;
                }
                Ok(Decimal::ZERO)
            }
            WaveformKind::Record { waveform, .. } => waveform.eval(t, bindings),
            WaveformKind::Aligned {
                waveform,
                alignment,
                ..
            } => {
                let inner = waveform.duration(bindings)?;
                match alignment {
                    Alignment::Left => waveform.eval(t.min(inner), bindings),
                    Alignment::Right => {
                        let offset = arith::sub(duration, inner)?;
                        waveform.eval(arith::sub(t, offset)?.max(Decimal::ZERO), bindings)
                    }
                }
            }
        }
    }

    /// Replace every free variable bound in `bindings` by an assigned variable.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Waveform> {
        if bindings.is_empty() {
            return Ok(self.clone());
        }
        self.map_scalars(&|s| s.assign(bindings))
    }

    /// Rebuild the tree with `f` applied to every scalar.
    fn map_scalars(&self, f: &dyn Fn(&Scalar) -> IrResult<Scalar>) -> IrResult<Waveform> {
        Ok(match self.kind() {
            WaveformKind::Constant { value, duration } => Waveform::constant(f(value)?, f(duration)?),
            WaveformKind::Linear {
                start,
                stop,
                duration,
            } => Waveform::linear(f(start)?, f(stop)?, f(duration)?),
            WaveformKind::Poly { coeffs, duration } => Waveform::poly(
                coeffs.iter().map(f).collect::<IrResult<_>>()?,
                f(duration)?,
            ),
            WaveformKind::Function(function) => Waveform::function(function.map_scalars(f)?),
            WaveformKind::Sample {
                waveform,
                interpolation,
                dt,
            } => waveform.map_scalars(f)?.sample(f(dt)?, *interpolation),
            WaveformKind::Smooth {
                waveform,
                kernel,
                radius,
            } => waveform.map_scalars(f)?.smooth(*kernel, f(radius)?),
            WaveformKind::Add(a, b) => a.map_scalars(f)?.add(&b.map_scalars(f)?),
            WaveformKind::Negative(waveform) => waveform.map_scalars(f)?.neg(),
            WaveformKind::Scale { factor, waveform } => waveform.map_scalars(f)?.scale(f(factor)?),
            WaveformKind::Slice { waveform, interval } => {
                let interval = Interval::new(
                    interval.start.as_ref().map(f).transpose()?,
                    interval.stop.as_ref().map(f).transpose()?,
                );
                waveform.map_scalars(f)?.slice(interval)
            }
            WaveformKind::Append(parts) => {
                Waveform::concat(parts.iter().map(|p| p.map_scalars(f)).collect::<IrResult<Vec<_>>>()?)?
            }
            WaveformKind::Record { waveform, var } => waveform.map_scalars(f)?.record(var.clone()),
            WaveformKind::Aligned {
                waveform,
                alignment,
                duration,
            } => waveform.map_scalars(f)?.align(*alignment, f(duration)?),
        })
    }

    /// Visit every scalar in the tree.
    fn for_each_scalar(&self, f: &mut dyn FnMut(&Scalar)) {
        match self.kind() {
            WaveformKind::Constant { value, duration } => {
                f(value);
                f(duration);
            }
            WaveformKind::Linear {
                start,
                stop,
                duration,
            } => {
                f(start);
                f(stop);
                f(duration);
            }
            WaveformKind::Poly { coeffs, duration } => {
                coeffs.iter().for_each(&mut *f);
                f(duration);
            }
            WaveformKind::Function(function) => {
                function.parameters.iter().for_each(|(_, p)| f(p));
                f(&function.duration);
            }
            WaveformKind::Sample { waveform, dt, .. } => {
                waveform.for_each_scalar(f);
                f(dt);
            }
            WaveformKind::Smooth {
                waveform, radius, ..
            } => {
                waveform.for_each_scalar(f);
                f(radius);
            }
            WaveformKind::Add(a, b) => {
                a.for_each_scalar(f);
                b.for_each_scalar(f);
            }
            WaveformKind::Negative(waveform) | WaveformKind::Record { waveform, .. } => {
                waveform.for_each_scalar(f);
            }
            WaveformKind::Scale { factor, waveform } => {
                f(factor);
                waveform.for_each_scalar(f);
            }
            WaveformKind::Slice { waveform, interval } => {
                waveform.for_each_scalar(f);
                interval.start.iter().chain(interval.stop.iter()).for_each(f);
            }
            WaveformKind::Append(parts) => parts.iter().for_each(|p| p.for_each_scalar(f)),
            WaveformKind::Aligned {
                waveform, duration, ..
            } => {
                waveform.for_each_scalar(f);
                f(duration);
            }
        }
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        self.for_each_scalar(&mut |s| s.collect_free(out));
    }

    /// All free variable names.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_free(&mut out);
        out
    }

    /// Collect assigned variables with their values into `out`.
    pub fn collect_assigned(&self, out: &mut BTreeMap<String, Decimal>) {
        self.for_each_scalar(&mut |s| s.collect_assigned(out));
    }

    /// Collect the names captured by [`WaveformKind::Record`] nodes.
    pub fn collect_recorded(&self, out: &mut BTreeSet<String>) {
        match self.kind() {
            WaveformKind::Record { waveform, var } => {
                waveform.collect_recorded(out);
                out.insert(var.clone());
            }
            WaveformKind::Sample { waveform, .. }
            | WaveformKind::Smooth { waveform, .. }
            | WaveformKind::Negative(waveform)
            | WaveformKind::Scale { waveform, .. }
            | WaveformKind::Slice { waveform, .. }
            | WaveformKind::Aligned { waveform, .. } => waveform.collect_recorded(out),
            WaveformKind::Add(a, b) => {
                a.collect_recorded(out);
                b.collect_recorded(out);
            }
            WaveformKind::Append(parts) => parts.iter().for_each(|p| p.collect_recorded(out)),
            WaveformKind::Constant { .. }
            | WaveformKind::Linear { .. }
            | WaveformKind::Poly { .. }
            | WaveformKind::Function(_) => {}
        }
    }

    /// Resolve record captures, threading `acc` left to right.
    ///
    /// Each [`WaveformKind::Record`] evaluates its waveform at its own
    /// duration with the bindings accumulated so far and adds the result.
    /// Children of an append are scanned in playback order so a later
    /// segment sees the values recorded by earlier ones.
    pub fn scan_records(&self, acc: Bindings) -> IrResult<Bindings> {
        match self.kind() {
            WaveformKind::Record { waveform, var } => {
                let mut acc = waveform.scan_records(acc)?;
                let end = waveform.duration(&acc)?;
                let value = waveform.eval(end, &acc)?;
                acc.insert(var.clone(), value)?;
                Ok(acc)
            }
            WaveformKind::Sample { waveform, .. }
            | WaveformKind::Smooth { waveform, .. }
            | WaveformKind::Negative(waveform)
            | WaveformKind::Scale { waveform, .. }
            | WaveformKind::Slice { waveform, .. }
            | WaveformKind::Aligned { waveform, .. } => waveform.scan_records(acc),
            WaveformKind::Add(a, b) => b.scan_records(a.scan_records(acc)?),
            WaveformKind::Append(parts) => parts.iter().try_fold(acc, |acc, p| p.scan_records(acc)),
            WaveformKind::Constant { .. }
            | WaveformKind::Linear { .. }
            | WaveformKind::Poly { .. }
            | WaveformKind::Function(_) => Ok(acc),
        }
    }

    /// Whether the tree has no free variables.
    pub fn is_assigned(&self) -> bool {
        self.free_variables().is_empty()
    }
}

/// Push `waveform` into an append list, splicing nested appends and
/// dropping zero-length literal constants.
fn push_canonical(parts: &mut Vec<Waveform>, waveform: &Waveform) {
    match waveform.kind() {
        WaveformKind::Append(children) => parts.extend(children.iter().cloned()),
        WaveformKind::Constant { duration, .. } if duration.as_literal() == Some(Decimal::ZERO) => {}
        _ => parts.push(waveform.clone()),
    }
}

fn positive_step(dt: &Scalar, bindings: &Bindings) -> IrResult<Decimal> {
    let dt = dt.evaluate(bindings)?;
    if dt <= Decimal::ZERO {
        return Err(IrError::InvalidArgument(format!(
            "sample step must be positive, got {dt}"
        )));
    }
    Ok(dt)
}

impl fmt::Debug for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Waveform({self})")
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Linear => f.write_str("linear"),
            Interpolation::Constant => f.write_str("constant"),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alignment::Left => f.write_str("left"),
            Alignment::Right => f.write_str("right"),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            WaveformKind::Constant { value, duration } => write!(f, "constant({value}, {duration})"),
            WaveformKind::Linear {
                start,
                stop,
                duration,
            } => write!(f, "linear({start}, {stop}, {duration})"),
            WaveformKind::Poly { coeffs, duration } => {
                write!(f, "poly([")?;
                for (i, c) in coeffs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "], {duration})")
            }
            WaveformKind::Function(function) => {
                write!(f, "{}(", function.name)?;
                for (i, (name, value)) in function.parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                write!(f, "; {})", function.duration)
            }
            WaveformKind::Sample {
                waveform,
                interpolation,
                dt,
            } => write!(f, "sample({waveform}, {interpolation}, {dt})"),
            WaveformKind::Smooth {
                waveform,
                kernel,
                radius,
            } => write!(f, "smooth({waveform}, {kernel}, {radius})"),
            WaveformKind::Add(a, b) => write!(f, "({a} + {b})"),
            WaveformKind::Negative(waveform) => write!(f, "-({waveform})"),
            WaveformKind::Scale { factor, waveform } => write!(f, "{factor} * {waveform}"),
            WaveformKind::Slice { waveform, interval } => write!(f, "{waveform}{interval}"),
            WaveformKind::Append(parts) => {
                write!(f, "append(")?;
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            WaveformKind::Record { waveform, var } => write!(f, "record({waveform}, {var})"),
            WaveformKind::Aligned {
                waveform,
                alignment,
                duration,
            } => write!(f, "align({waveform}, {alignment}, {duration})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lit(v: Decimal) -> Scalar {
        Scalar::literal(v)
    }

    fn none() -> Bindings {
        Bindings::new()
    }

    #[test]
    fn test_zero_outside_support() {
        let w = Waveform::linear(0, 10, 1);
        assert_eq!(w.eval(dec!(-0.1), &none()).unwrap(), dec!(0));
        assert_eq!(w.eval(dec!(1.1), &none()).unwrap(), dec!(0));
        assert_eq!(w.eval(dec!(0.5), &none()).unwrap(), dec!(5));
    }

    #[test]
    fn test_append_flattens_and_drops_empty_constants() {
        let a = Waveform::constant(1, 1);
        let b = Waveform::linear(1, 2, 1);
        let empty = Waveform::constant(5, 0);
        let w = a.append(&b).append(&empty).append(&a.append(&b));
        match w.kind() {
            WaveformKind::Append(parts) => assert_eq!(parts.len(), 4),
            other => panic!("expected append, got {other:?}"),
        }
        assert_eq!(w.duration(&none()).unwrap(), dec!(4));
    }

    #[test]
    fn test_append_boundary_uses_left_segment() {
        let w = Waveform::constant(1, 1).append(&Waveform::constant(2, 1));
        assert_eq!(w.eval(dec!(1), &none()).unwrap(), dec!(1));
        assert_eq!(w.eval(dec!(1.5), &none()).unwrap(), dec!(2));
        assert_eq!(w.eval(dec!(2), &none()).unwrap(), dec!(2));
    }

    #[test]
    fn test_concat_empty_fails() {
        assert_eq!(Waveform::concat(Vec::new()), Err(IrError::EmptyAppend));
    }

    #[test]
    fn test_negation_and_scale_canonical() {
        let w = Waveform::linear(0, 1, 1);
        assert_eq!(w.neg().neg(), w);
        let scaled = w.scale(2).scale(3);
        match scaled.kind() {
            WaveformKind::Scale { factor, waveform } => {
                assert_eq!(factor.as_literal(), Some(dec!(6)));
                assert_eq!(waveform, &w);
            }
            other => panic!("expected scale, got {other:?}"),
        }
        assert_eq!(w.scale(1), w);
    }

    #[test]
    fn test_slice_eval() {
        let w = Waveform::linear(0, 10, 2);
        let s = w.slice(Interval::between(lit(dec!(0.5)), lit(dec!(1.5))));
        assert_eq!(s.duration(&none()).unwrap(), dec!(1));
        assert_eq!(s.eval(dec!(0), &none()).unwrap(), dec!(2.5));
        assert_eq!(s.eval(dec!(1), &none()).unwrap(), dec!(7.5));
    }

    #[test]
    fn test_invalid_slice() {
        let w = Waveform::constant(1, 1);
        let s = w.slice(Interval::until(2));
        assert!(matches!(s.duration(&none()), Err(IrError::InvalidSlice { .. })));
    }

    #[test]
    fn test_add_uses_longest_duration() {
        let w = Waveform::constant(1, 1).add(&Waveform::constant(2, 3));
        assert_eq!(w.duration(&none()).unwrap(), dec!(3));
        assert_eq!(w.eval(dec!(0.5), &none()).unwrap(), dec!(3));
        assert_eq!(w.eval(dec!(2), &none()).unwrap(), dec!(2));
    }

    #[test]
    fn test_sample_constant_holds_previous_sample() {
        let w = Waveform::linear(0, 4, 4).sample(1, Interpolation::Constant);
        assert_eq!(w.eval(dec!(0), &none()).unwrap(), dec!(0));
        assert_eq!(w.eval(dec!(0.5), &none()).unwrap(), dec!(0));
        assert_eq!(w.eval(dec!(1), &none()).unwrap(), dec!(0));
        assert_eq!(w.eval(dec!(1.5), &none()).unwrap(), dec!(1));
    }

    #[test]
    fn test_aligned_holds_edges() {
        let w = Waveform::linear(1, 2, 1);
        let left = w.align(Alignment::Left, 3);
        assert_eq!(left.eval(dec!(2), &none()).unwrap(), dec!(2));
        let right = w.align(Alignment::Right, 3);
        assert_eq!(right.eval(dec!(1), &none()).unwrap(), dec!(1));
        assert_eq!(right.eval(dec!(3), &none()).unwrap(), dec!(2));
    }

    #[test]
    fn test_function_waveform() {
        let func: WaveformFn = Arc::new(|t, p| p[0] * t);
        let w = Waveform::function(FunctionWaveform::new(
            "ramp",
            func,
            vec![("slope".into(), Scalar::var("k"))],
            2,
        ));
        let b = Bindings::new().with("k", dec!(3)).unwrap();
        assert_eq!(w.eval(dec!(1), &b).unwrap(), dec!(3));
        assert_eq!(w.free_variables().len(), 1);
    }

    #[test]
    fn test_non_finite_function_value() {
        let func: WaveformFn = Arc::new(|_, _| f64::NAN);
        let w = Waveform::function(FunctionWaveform::new("bad", func, vec![], 1));
        assert!(matches!(
            w.eval(dec!(0.5), &none()),
            Err(IrError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn test_scan_records_left_to_right() {
        let w = Waveform::constant(5, 1)
            .record("a")
            .append(&Waveform::linear(Scalar::var("a"), 0, 1));
        let acc = w.scan_records(Bindings::new()).unwrap();
        assert_eq!(acc.scalar("a").unwrap(), dec!(5));
    }

    #[test]
    fn test_assign_replaces_variables() {
        let w = Waveform::constant(Scalar::var("x"), Scalar::var("t"));
        let b = Bindings::new().with("x", dec!(1)).unwrap();
        let assigned = w.assign(&b).unwrap();
        assert_eq!(
            assigned.free_variables().into_iter().collect::<Vec<_>>(),
            vec!["t".to_string()]
        );
        let mut values = BTreeMap::new();
        assigned.collect_assigned(&mut values);
        assert_eq!(values.get("x"), Some(&dec!(1)));
    }

    #[test]
    fn test_display() {
        let w = Waveform::constant(1, 2).append(&Waveform::linear(Scalar::var("a"), 0, 1));
        assert_eq!(w.to_string(), "append(constant(1, 2), linear(a, 0, 1))");
    }
}
