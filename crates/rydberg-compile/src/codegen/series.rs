//! Breakpoint series extraction from flattened waveforms.

use rust_decimal::Decimal;
use rydberg_ir::{Bindings, FieldName, IrError, SpatialModulation, Waveform};

use crate::error::{CompileError, CompileResult};
use crate::passes::normalize::is_flat_segment;

/// Breakpoint times and values of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeSeries {
    /// Breakpoint times, starting at zero and increasing.
    pub times: Vec<Decimal>,
    /// Values at the breakpoints.
    pub values: Vec<Decimal>,
}

impl TimeSeries {
    /// Apply `f` to every time and `g` to every value.
    pub fn map<F, G>(&self, f: F, g: G) -> CompileResult<TimeSeries>
    where
        F: Fn(Decimal) -> CompileResult<Decimal>,
        G: Fn(Decimal) -> CompileResult<Decimal>,
    {
        Ok(TimeSeries {
            times: self.times.iter().map(|t| f(*t)).collect::<CompileResult<_>>()?,
            values: self.values.iter().map(|v| g(*v)).collect::<CompileResult<_>>()?,
        })
    }

    /// Largest absolute slope between neighbouring breakpoints.
    pub fn max_slope(&self) -> Option<Decimal> {
        self.times
            .windows(2)
            .zip(self.values.windows(2))
            .filter_map(|(t, v)| {
                let dv = v[1].checked_sub(v[0])?;
                let dt = t[1].checked_sub(t[0])?;
                dv.checked_div(dt).map(|slope| slope.abs())
            })
            .max()
    }
}

fn positive_segments(waveform: &Waveform) -> CompileResult<Vec<(usize, Waveform, Decimal)>> {
    let bindings = Bindings::new();
    waveform
        .leaf_segments()
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let duration = segment.duration(&bindings)?;
            Ok((index, segment, duration))
        })
        .filter(|entry: &CompileResult<(usize, Waveform, Decimal)>| {
            !matches!(entry, Ok((_, _, d)) if d.is_zero())
        })
        .collect()
}

fn advance(t: Decimal, duration: Decimal) -> CompileResult<Decimal> {
    t.checked_add(duration)
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{t} + {duration}")).into())
}

/// Breakpoints of a piecewise-linear channel: `N + 1` points for `N` segments.
///
/// Fails with [`CompileError::NonLinearSegment`] for a segment that is not
/// a ramp and [`CompileError::DiscontinuousWaveform`] where neighbouring
/// segments do not meet.
pub fn piecewise_linear(channel: &str, waveform: &Waveform) -> CompileResult<TimeSeries> {
    let mut series = TimeSeries {
        times: vec![Decimal::ZERO],
        values: Vec::new(),
    };
    let mut t = Decimal::ZERO;
    for (index, segment, duration) in positive_segments(waveform)? {
        let (start, stop) = segment
            .linear_endpoints()
            .ok_or_else(|| CompileError::NonLinearSegment {
                channel: channel.to_string(),
                index,
            })?;
        match series.values.last() {
            None => series.values.push(start),
            Some(&left) if left != start => {
                return Err(CompileError::DiscontinuousWaveform {
                    channel: channel.to_string(),
                    time: t,
                    left,
                    right: start,
                });
            }
            Some(_) => {}
        }
        t = advance(t, duration)?;
        series.times.push(t);
        series.values.push(stop);
    }
    if series.values.is_empty() {
        series.values.push(Decimal::ZERO);
    }
    Ok(series)
}

/// Breakpoints of a piecewise-constant channel.
///
/// Each segment contributes its start time and value; the final breakpoint
/// repeats the last value so every segment starts and ends on the same
/// value. Fails with [`CompileError::NonConstantSegment`].
pub fn piecewise_constant(channel: &str, waveform: &Waveform) -> CompileResult<TimeSeries> {
    let mut series = TimeSeries::default();
    let mut t = Decimal::ZERO;
    for (index, segment, duration) in positive_segments(waveform)? {
        let value = segment
            .constant_value()
            .ok_or_else(|| CompileError::NonConstantSegment {
                channel: channel.to_string(),
                index,
            })?;
        series.times.push(t);
        series.values.push(value);
        t = advance(t, duration)?;
    }
    let last = series.values.last().copied().unwrap_or(Decimal::ZERO);
    if series.times.is_empty() {
        series.times.push(Decimal::ZERO);
        series.values.push(last);
    }
    series.times.push(t);
    series.values.push(last);
    Ok(series)
}

/// Breakpoints of a ground-Rydberg channel in the shape the device expects.
///
/// Global detuning and Rabi amplitude are piecewise linear; phase and local
/// detuning are piecewise constant.
pub fn channel_series(
    field: FieldName,
    modulation: &SpatialModulation,
    channel: &str,
    waveform: &Waveform,
) -> CompileResult<TimeSeries> {
    if !waveform.leaf_segments().iter().all(is_flat_segment) {
        return Err(CompileError::UnflattenedComposition(channel.to_string()));
    }
    match field {
        FieldName::RabiAmplitude => piecewise_linear(channel, waveform),
        FieldName::Detuning if modulation.is_uniform() => piecewise_linear(channel, waveform),
        FieldName::Detuning | FieldName::RabiPhase => piecewise_constant(channel, waveform),
    }
}

/// Whether every segment of `waveform` is the constant zero.
pub fn is_zero(waveform: &Waveform) -> bool {
    waveform
        .leaf_segments()
        .iter()
        .all(|s| s.constant_value() == Some(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_piecewise_linear_points() {
        let w = Waveform::linear(0, 10, 1)
            .append(&Waveform::constant(10, 2))
            .append(&Waveform::linear(10, 0, dec!(0.5)));
        let series = piecewise_linear("amp", &w).unwrap();
        assert_eq!(series.times, vec![dec!(0), dec!(1), dec!(3), dec!(3.5)]);
        assert_eq!(series.values, vec![dec!(0), dec!(10), dec!(10), dec!(0)]);
    }

    #[test]
    fn test_piecewise_linear_discontinuity() {
        let w = Waveform::linear(0, 10, 1).append(&Waveform::constant(5, 1));
        let err = piecewise_linear("amp", &w).unwrap_err();
        match err {
            CompileError::DiscontinuousWaveform { time, left, right, .. } => {
                assert_eq!((time, left, right), (dec!(1), dec!(10), dec!(5)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_piecewise_linear_rejects_poly() {
        let w = Waveform::poly(vec![0.into(), 0.into(), 1.into()], 1);
        assert!(matches!(
            piecewise_linear("amp", &w),
            Err(CompileError::NonLinearSegment { index: 0, .. })
        ));
    }

    #[test]
    fn test_piecewise_constant_repeats_last_value() {
        let w = Waveform::constant(1, 1).append(&Waveform::constant(2, 3));
        let series = piecewise_constant("phase", &w).unwrap();
        assert_eq!(series.times, vec![dec!(0), dec!(1), dec!(4)]);
        assert_eq!(series.values, vec![dec!(1), dec!(2), dec!(2)]);
    }

    #[test]
    fn test_piecewise_constant_rejects_ramp() {
        let w = Waveform::constant(1, 1).append(&Waveform::linear(1, 2, 1));
        assert!(matches!(
            piecewise_constant("phase", &w),
            Err(CompileError::NonConstantSegment { index: 1, .. })
        ));
    }

    #[test]
    fn test_channel_series_shape_by_field() {
        let ramp = Waveform::linear(0, 1, 1);
        let uniform = SpatialModulation::Uniform;
        let local = SpatialModulation::scaled_locations([(0, 1)]);
        assert!(channel_series(FieldName::Detuning, &uniform, "d", &ramp).is_ok());
        assert!(channel_series(FieldName::RabiPhase, &uniform, "p", &ramp).is_err());
        assert!(matches!(
            channel_series(FieldName::Detuning, &local, "d", &ramp),
            Err(CompileError::NonConstantSegment { .. })
        ));
    }

    #[test]
    fn test_max_slope() {
        let series = TimeSeries {
            times: vec![dec!(0), dec!(1), dec!(3)],
            values: vec![dec!(0), dec!(10), dec!(-10)],
        };
        assert_eq!(series.max_slope(), Some(dec!(10)));
        assert_eq!(TimeSeries::default().max_slope(), None);
    }
}
