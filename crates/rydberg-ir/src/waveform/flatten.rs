//! Flattening of waveform trees into literal leaf segments.
//!
//! A flattened waveform is either a single leaf segment or an append of
//! leaf segments, each with literal scalars and a positive duration.
//! Combinators that can be pushed into leaves (negation, scaling, slicing,
//! sums, sampling, alignment) are resolved; leaves that cannot be split
//! analytically (user functions, smoothed waveforms) stay opaque and are
//! wrapped instead.

use rust_decimal::Decimal;

use super::{Alignment, Interpolation, Waveform, WaveformKind, positive_step};
use crate::arith;
use crate::bindings::Bindings;
use crate::error::IrResult;
use crate::scalar::{Interval, Scalar};

/// A literal segment together with its duration.
#[derive(Debug, Clone)]
struct Piece {
    waveform: Waveform,
    duration: Decimal,
}

impl Piece {
    fn new(waveform: Waveform, duration: Decimal) -> Self {
        Self { waveform, duration }
    }
}

impl Waveform {
    /// Flatten into a single leaf or an append of literal leaf segments.
    ///
    /// Record wrappers are dropped; resolve them with
    /// [`scan_records`](Waveform::scan_records) first. Flattening is
    /// idempotent.
    pub fn flatten(&self, bindings: &Bindings) -> IrResult<Waveform> {
        let pieces = self.pieces(bindings)?;
        if pieces.is_empty() {
            return Ok(Waveform::constant(Scalar::zero(), Scalar::zero()));
        }
        Waveform::concat(pieces.into_iter().map(|p| p.waveform))
    }

    /// The literal leaf segments of the flattened waveform, in order.
    pub fn segments(&self, bindings: &Bindings) -> IrResult<Vec<Waveform>> {
        Ok(self
            .pieces(bindings)?
            .into_iter()
            .map(|p| p.waveform)
            .collect())
    }

    /// The children of a flattened waveform: the append's parts, or itself.
    pub fn leaf_segments(&self) -> Vec<Waveform> {
        match self.kind() {
            WaveformKind::Append(parts) => parts.clone(),
            _ => vec![self.clone()],
        }
    }

    /// The value of a literal segment that is constant over its support.
    ///
    /// Matches constants, flat ramps and polynomials without non-zero
    /// higher-degree coefficients.
    pub fn constant_value(&self) -> Option<Decimal> {
        match self.kind() {
            WaveformKind::Constant { value, .. } => value.as_literal(),
            WaveformKind::Linear { start, stop, .. } => {
                let (start, stop) = (start.as_literal()?, stop.as_literal()?);
                (start == stop).then_some(start)
            }
            WaveformKind::Poly { coeffs, .. } => {
                let literal = coeffs
                    .iter()
                    .map(Scalar::as_literal)
                    .collect::<Option<Vec<_>>>()?;
                if literal.iter().skip(1).all(Decimal::is_zero) {
                    Some(literal.first().copied().unwrap_or(Decimal::ZERO))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Start and end values of a literal segment that is linear over its support.
    pub fn linear_endpoints(&self) -> Option<(Decimal, Decimal)> {
        match self.kind() {
            WaveformKind::Linear { start, stop, .. } => Some((start.as_literal()?, stop.as_literal()?)),
            WaveformKind::Poly { coeffs, duration } if coeffs.len() <= 2 => {
                let c0 = coeffs.first().map_or(Some(Decimal::ZERO), Scalar::as_literal)?;
                let c1 = coeffs.get(1).map_or(Some(Decimal::ZERO), Scalar::as_literal)?;
                let end = c0.checked_add(c1.checked_mul(duration.as_literal()?)?)?;
                Some((c0, end))
            }
            _ => self.constant_value().map(|v| (v, v)),
        }
    }

    fn pieces(&self, bindings: &Bindings) -> IrResult<Vec<Piece>> {
        let mut out = Vec::new();
        self.push_pieces(bindings, &mut out)?;
        Ok(out)
    }

    fn push_pieces(&self, bindings: &Bindings, out: &mut Vec<Piece>) -> IrResult<()> {
        match self.kind() {
            WaveformKind::Constant { value, duration } => {
                let duration = duration.evaluate(bindings)?;
                push_leaf(out, Waveform::constant(value.literalize(bindings)?, duration), duration);
            }
            WaveformKind::Linear {
                start,
                stop,
                duration,
            } => {
                let duration = duration.evaluate(bindings)?;
                let leaf = Waveform::linear(
                    start.literalize(bindings)?,
                    stop.literalize(bindings)?,
                    duration,
                );
                push_leaf(out, leaf, duration);
            }
            WaveformKind::Poly { coeffs, duration } => {
                let duration = duration.evaluate(bindings)?;
                let coeffs = coeffs
                    .iter()
                    .map(|c| c.literalize(bindings))
                    .collect::<IrResult<Vec<_>>>()?;
                push_leaf(out, Waveform::poly(coeffs, duration), duration);
            }
            WaveformKind::Function(function) => {
                let duration = function.duration().evaluate(bindings)?;
                let literal = function.map_scalars(|s| s.literalize(bindings))?;
                push_leaf(out, Waveform::function(literal), duration);
            }
            WaveformKind::Sample {
                waveform,
                interpolation,
                dt,
            } => {
                let duration = waveform.duration(bindings)?;
                let dt = positive_step(dt, bindings)?;
                let mut t0 = Decimal::ZERO;
                let mut k = Decimal::ZERO;
                while t0 < duration {
                    k = arith::add(k, Decimal::ONE)?;
                    let t1 = arith::mul(k, dt)?.min(duration);
                    let length = arith::sub(t1, t0)?;
                    let v0 = waveform.eval(t0, bindings)?;
                    let leaf = match interpolation {
                        Interpolation::Constant => Waveform::constant(v0, length),
                        Interpolation::Linear => {
                            Waveform::linear(v0, waveform.eval(t1, bindings)?, length)
                        }
                    };
                    push_leaf(out, leaf, length);
                    t0 = t1;
                }
            }
            WaveformKind::Smooth {
                waveform,
                kernel,
                radius,
            } => {
                let duration = waveform.duration(bindings)?;
                let leaf = waveform
                    .flatten(bindings)?
                    .smooth(*kernel, radius.literalize(bindings)?);
                push_leaf(out, leaf, duration);
            }
            WaveformKind::Add(a, b) => {
                out.extend(merge_sum(a.pieces(bindings)?, b.pieces(bindings)?)?);
            }
            WaveformKind::Negative(waveform) => {
                for piece in waveform.pieces(bindings)? {
                    out.push(negate(&piece)?);
                }
            }
            WaveformKind::Scale { factor, waveform } => {
                let factor = factor.evaluate(bindings)?;
                for piece in waveform.pieces(bindings)? {
                    out.push(scale(&piece, factor)?);
                }
            }
            WaveformKind::Slice { waveform, interval } => {
                let (start, stop) = interval.resolve(waveform.duration(bindings)?, bindings)?;
                out.extend(cut(&waveform.pieces(bindings)?, start, stop)?);
            }
            WaveformKind::Append(parts) => {
                for part in parts {
                    part.push_pieces(bindings, out)?;
                }
            }
            WaveformKind::Record { waveform, .. } => waveform.push_pieces(bindings, out)?,
            WaveformKind::Aligned {
                waveform,
                alignment,
                duration,
            } => {
                let target = duration.evaluate(bindings)?;
                let inner = waveform.duration(bindings)?;
                let pieces = waveform.pieces(bindings)?;
                match alignment {
                    Alignment::Left if target <= inner => out.extend(cut(&pieces, Decimal::ZERO, target)?),
                    Alignment::Right if target <= inner => {
                        out.extend(cut(&pieces, arith::sub(inner, target)?, inner)?);
                    }
                    Alignment::Left => {
                        let hold = arith::sub(target, inner)?;
                        out.extend(pieces);
                        push_leaf(out, Waveform::constant(waveform.eval(inner, bindings)?, hold), hold);
                    }
                    Alignment::Right => {
                        let hold = arith::sub(target, inner)?;
                        push_leaf(
                            out,
                            Waveform::constant(waveform.eval(Decimal::ZERO, bindings)?, hold),
                            hold,
                        );
                        out.extend(pieces);
                    }
                }
            }
        }
        Ok(())
    }
}

fn push_leaf(out: &mut Vec<Piece>, waveform: Waveform, duration: Decimal) {
    if duration > Decimal::ZERO {
        out.push(Piece::new(waveform, duration));
    }
}

fn literals(scalars: &[Scalar]) -> Option<Vec<Decimal>> {
    scalars.iter().map(Scalar::as_literal).collect()
}

fn literal_scalars(values: Vec<Decimal>) -> Vec<Scalar> {
    values.into_iter().map(Scalar::literal).collect()
}

fn negate(piece: &Piece) -> IrResult<Piece> {
    scale(piece, Decimal::NEGATIVE_ONE)
}

/// Multiply a literal segment by `factor`.
fn scale(piece: &Piece, factor: Decimal) -> IrResult<Piece> {
    let d = piece.duration;
    let waveform = match piece.waveform.kind() {
        WaveformKind::Constant { value, .. } if value.as_literal().is_some() => {
            Waveform::constant(arith::mul(lit(value), factor)?, d)
        }
        WaveformKind::Linear { start, stop, .. }
            if start.as_literal().is_some() && stop.as_literal().is_some() =>
        {
            Waveform::linear(arith::mul(lit(start), factor)?, arith::mul(lit(stop), factor)?, d)
        }
        WaveformKind::Poly { coeffs, .. } if literals(coeffs).is_some() => {
            let scaled = coeffs
                .iter()
                .map(|c| arith::mul(lit(c), factor))
                .collect::<IrResult<Vec<_>>>()?;
            Waveform::poly(literal_scalars(scaled), d)
        }
        _ if factor == Decimal::NEGATIVE_ONE => piece.waveform.neg(),
        _ => piece.waveform.scale(factor),
    };
    Ok(Piece::new(waveform, d))
}

fn lit(s: &Scalar) -> Decimal {
    s.as_literal().unwrap_or(Decimal::ZERO)
}

/// Restrict a segment list to `[start, stop]`, re-based at zero.
fn cut(pieces: &[Piece], start: Decimal, stop: Decimal) -> IrResult<Vec<Piece>> {
    let mut out = Vec::new();
    let mut offset = Decimal::ZERO;
    for piece in pieces {
        let end = arith::add(offset, piece.duration)?;
        let lo = start.max(offset);
        let hi = stop.min(end);
        if hi > lo {
            out.push(cut_piece(piece, arith::sub(lo, offset)?, arith::sub(hi, offset)?)?);
        }
        offset = end;
    }
    Ok(out)
}

/// Cut one literal segment to its local window `[s, e]`.
fn cut_piece(piece: &Piece, s: Decimal, e: Decimal) -> IrResult<Piece> {
    if s.is_zero() && e == piece.duration {
        return Ok(piece.clone());
    }
    let length = arith::sub(e, s)?;
    let waveform = match piece.waveform.kind() {
        WaveformKind::Constant { value, .. } => Waveform::constant(value.clone(), length),
        WaveformKind::Linear { start, stop, .. }
            if start.as_literal().is_some() && stop.as_literal().is_some() =>
        {
            let (a, b) = (lit(start), lit(stop));
            Waveform::linear(
                arith::lerp(a, b, s, piece.duration)?,
                arith::lerp(a, b, e, piece.duration)?,
                length,
            )
        }
        WaveformKind::Poly { coeffs, .. } if literals(coeffs).is_some() => {
            let coeffs = literals(coeffs).unwrap_or_default();
            Waveform::poly(literal_scalars(arith::shift_polynomial(&coeffs, s)?), length)
        }
        WaveformKind::Slice { waveform, interval } => {
            let base = interval.start.as_ref().map_or(Decimal::ZERO, lit);
            waveform.slice(Interval::between(arith::add(base, s)?, arith::add(base, e)?))
        }
        _ => piece.waveform.slice(Interval::between(s, e)),
    };
    Ok(Piece::new(waveform, length))
}

/// Coefficients of a literal segment as a polynomial in local time.
fn poly_coefficients(piece: &Piece) -> IrResult<Option<Vec<Decimal>>> {
    Ok(match piece.waveform.kind() {
        WaveformKind::Constant { value, .. } => value.as_literal().map(|v| vec![v]),
        WaveformKind::Linear { start, stop, .. } => match (start.as_literal(), stop.as_literal()) {
            (Some(a), Some(b)) => Some(vec![a, arith::div(arith::sub(b, a)?, piece.duration)?]),
            _ => None,
        },
        WaveformKind::Poly { coeffs, .. } => literals(coeffs),
        _ => None,
    })
}

/// Sum two equal-length literal segments.
fn sum_pieces(x: &Piece, y: &Piece) -> IrResult<Piece> {
    let d = x.duration;
    if let (Some(a), Some(b)) = (x.waveform.constant_value(), y.waveform.constant_value()) {
        if matches!(x.waveform.kind(), WaveformKind::Constant { .. })
            && matches!(y.waveform.kind(), WaveformKind::Constant { .. })
        {
            return Ok(Piece::new(Waveform::constant(arith::add(a, b)?, d), d));
        }
    }
    let is_ramp = |p: &Piece| {
        matches!(
            p.waveform.kind(),
            WaveformKind::Constant { .. } | WaveformKind::Linear { .. }
        )
    };
    if is_ramp(x) && is_ramp(y) {
        if let (Some((a0, a1)), Some((b0, b1))) =
            (x.waveform.linear_endpoints(), y.waveform.linear_endpoints())
        {
            let leaf = Waveform::linear(arith::add(a0, b0)?, arith::add(a1, b1)?, d);
            return Ok(Piece::new(leaf, d));
        }
    }
    if let (Some(a), Some(b)) = (poly_coefficients(x)?, poly_coefficients(y)?) {
        let n = a.len().max(b.len());
        let mut sum = Vec::with_capacity(n);
        for i in 0..n {
            let ai = a.get(i).copied().unwrap_or(Decimal::ZERO);
            let bi = b.get(i).copied().unwrap_or(Decimal::ZERO);
            sum.push(arith::add(ai, bi)?);
        }
        return Ok(Piece::new(Waveform::poly(literal_scalars(sum), d), d));
    }
    Ok(Piece::new(x.waveform.add(&y.waveform), d))
}

/// Merge two segment lists on the union of their breakpoints.
fn merge_sum(a: Vec<Piece>, b: Vec<Piece>) -> IrResult<Vec<Piece>> {
    let mut breakpoints = vec![Decimal::ZERO];
    for pieces in [&a, &b] {
        let mut offset = Decimal::ZERO;
        for piece in pieces {
            offset = arith::add(offset, piece.duration)?;
            breakpoints.push(offset);
        }
    }
    breakpoints.sort();
    breakpoints.dedup();

    let mut out = Vec::new();
    for window in breakpoints.windows(2) {
        let (t0, t1) = (window[0], window[1]);
        let x = cut(&a, t0, t1)?.into_iter().next();
        let y = cut(&b, t0, t1)?.into_iter().next();
        match (x, y) {
            (Some(x), Some(y)) => out.push(sum_pieces(&x, &y)?),
            (Some(p), None) | (None, Some(p)) => out.push(p),
            (None, None) => {}
        }
    }
    Ok(out)
}
