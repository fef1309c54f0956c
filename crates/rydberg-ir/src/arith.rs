//! Checked decimal arithmetic shared by the evaluators.
//!
//! Overflow maps to [`IrError::ArithmeticOverflow`], a zero divisor to
//! [`IrError::DivisionByZero`].

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::error::{IrError, IrResult};

pub fn add(a: Decimal, b: Decimal) -> IrResult<Decimal> {
    a.checked_add(b)
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{a} + {b}")))
}

pub fn sub(a: Decimal, b: Decimal) -> IrResult<Decimal> {
    a.checked_sub(b)
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{a} - {b}")))
}

pub fn mul(a: Decimal, b: Decimal) -> IrResult<Decimal> {
    a.checked_mul(b)
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{a} * {b}")))
}

pub fn div(a: Decimal, b: Decimal) -> IrResult<Decimal> {
    if b.is_zero() {
        return Err(IrError::DivisionByZero(format!("{a} / {b}")));
    }
    a.checked_div(b)
        .ok_or_else(|| IrError::ArithmeticOverflow(format!("{a} / {b}")))
}

/// Linear interpolation between `start` and `stop` at `t` in `[0, duration]`.
pub(crate) fn lerp(start: Decimal, stop: Decimal, t: Decimal, duration: Decimal) -> IrResult<Decimal> {
    if duration.is_zero() {
        return Ok(start);
    }
    add(start, div(mul(sub(stop, start)?, t)?, duration)?)
}

/// Evaluate `sum(coeffs[i] * t^i)` with Horner's scheme.
pub(crate) fn horner(coeffs: &[Decimal], t: Decimal) -> IrResult<Decimal> {
    let mut acc = Decimal::ZERO;
    for c in coeffs.iter().rev() {
        acc = add(mul(acc, t)?, *c)?;
    }
    Ok(acc)
}

/// Coefficients of `p(x + shift)` for `p(x) = sum(coeffs[i] * x^i)`.
pub(crate) fn shift_polynomial(coeffs: &[Decimal], shift: Decimal) -> IrResult<Vec<Decimal>> {
    let n = coeffs.len();
    let mut shifted = vec![Decimal::ZERO; n];
    for (i, &c) in coeffs.iter().enumerate() {
        // c * (x + s)^i = c * sum_j binom(i, j) * s^(i-j) * x^j
        let mut binom = Decimal::ONE;
        for j in (0..=i).rev() {
            let k = i - j;
            let term = mul(mul(c, binom)?, pow(shift, k)?)?;
            shifted[j] = add(shifted[j], term)?;
            // binom(i, k + 1) = binom(i, k) * (i - k) / (k + 1)
            if j > 0 {
                binom = div(mul(binom, Decimal::from(i - k))?, Decimal::from(k + 1))?;
            }
        }
    }
    Ok(shifted)
}

pub(crate) fn pow(base: Decimal, exp: usize) -> IrResult<Decimal> {
    let mut acc = Decimal::ONE;
    for _ in 0..exp {
        acc = mul(acc, base)?;
    }
    Ok(acc)
}

pub(crate) fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

pub(crate) fn from_f64(value: f64, source_name: &str) -> IrResult<Decimal> {
    if !value.is_finite() {
        return Err(IrError::NonFiniteValue {
            source_name: source_name.to_string(),
            value,
        });
    }
    Decimal::from_f64(value).ok_or_else(|| IrError::NonFiniteValue {
        source_name: source_name.to_string(),
        value,
    })
}
