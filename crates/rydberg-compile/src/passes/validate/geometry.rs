//! Register geometry against the device field of view.

use rust_decimal::{Decimal, MathematicalOps};
use tracing::debug;

use rydberg_hal::LatticeLimits;
use rydberg_ir::arith::{add, mul, sub};
use rydberg_ir::{AnalogCircuit, Bindings, Register, ResolvedSite, bounding_box};

use super::target_capabilities;
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind};
use crate::property::PropertySet;

/// Check site counts, extent and spacing of the register.
///
/// For parallel registers the cluster is checked; tiling keeps copies a
/// cluster spacing apart, which must itself respect the minimum spacing.
pub struct ValidateGeometry;

impl Pass for ValidateGeometry {
    fn name(&self) -> &'static str {
        "validate_geometry"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, circuit: &mut AnalogCircuit, properties: &mut PropertySet) -> CompileResult<()> {
        let lattice = &target_capabilities(properties)?.lattice;
        let register = circuit.register();
        let sites = register.arrangement().resolve(&Bindings::new())?;

        check_counts(&sites, lattice)?;
        check_extent(&sites, lattice)?;
        check_spacing(&sites, lattice)?;

        if let Register::Parallel(parallel) = register {
            let spacing = parallel.cluster_spacing.evaluate(&Bindings::new())?;
            if spacing < lattice.min_radial_spacing {
                return Err(CompileError::ValueOutOfRange {
                    channel: "cluster spacing".into(),
                    value: spacing,
                    min: lattice.min_radial_spacing,
                    max: lattice.width,
                });
            }
        }

        debug!("register of {} sites fits the field of view", sites.len());
        Ok(())
    }

    fn should_run(&self, _circuit: &AnalogCircuit, properties: &PropertySet) -> bool {
        properties.capabilities.is_some()
    }
}

fn check_counts(sites: &[ResolvedSite], lattice: &LatticeLimits) -> CompileResult<()> {
    if sites.is_empty() {
        return Err(CompileError::EmptyRegister);
    }
    if sites.len() > lattice.max_sites {
        return Err(CompileError::TooManySites {
            count: sites.len(),
            max: lattice.max_sites,
        });
    }
    let filled = sites.iter().filter(|s| s.filled).count();
    if filled > lattice.max_filled_sites {
        return Err(CompileError::TooManySites {
            count: filled,
            max: lattice.max_filled_sites,
        });
    }
    Ok(())
}

/// Check the bounding box of `sites` against the field of view.
pub(crate) fn check_extent(sites: &[ResolvedSite], lattice: &LatticeLimits) -> CompileResult<()> {
    let (width, height) = bounding_box(sites)?;
    if width > lattice.width {
        return Err(CompileError::RegisterTooWide {
            width,
            max_width: lattice.width,
        });
    }
    if height > lattice.height {
        return Err(CompileError::RegisterTooTall {
            height,
            max_height: lattice.height,
        });
    }
    Ok(())
}

fn check_spacing(sites: &[ResolvedSite], lattice: &LatticeLimits) -> CompileResult<()> {
    let min = lattice.min_radial_spacing;
    let min_sq = mul(min, min)?;
    for (i, a) in sites.iter().enumerate() {
        for (j, b) in sites.iter().enumerate().skip(i + 1) {
            let (dx, dy) = (sub(a.x, b.x)?, sub(a.y, b.y)?);
            let distance_sq = add(mul(dx, dx)?, mul(dy, dy)?)?;
            if distance_sq < min_sq {
                return Err(CompileError::SitesTooClose {
                    first: i,
                    second: j,
                    distance: distance_sq.sqrt().unwrap_or(distance_sq),
                    min,
                });
            }
        }
    }

    let mut rows: Vec<(Decimal, usize)> = sites.iter().enumerate().map(|(i, s)| (s.y, i)).collect();
    rows.sort();
    rows.dedup_by_key(|(y, _)| *y);
    for pair in rows.windows(2) {
        let ((y0, i0), (y1, i1)) = (pair[0], pair[1]);
        let gap = sub(y1, y0)?;
        if gap < lattice.min_vertical_spacing {
            return Err(CompileError::SitesTooClose {
                first: i0.min(i1),
                second: i0.max(i1),
                distance: gap,
                min: lattice.min_vertical_spacing,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::validate::fixtures::{aquila, ramp_pulse};
    use rust_decimal_macros::dec;
    use rydberg_ir::{BravaisLattice, IrError, ListOfLocations, LevelCoupling, Sequence};

    fn run(register: impl Into<Register>) -> CompileResult<()> {
        let mut c = AnalogCircuit::new(
            register,
            Sequence::from_pulse(LevelCoupling::GroundRydberg, ramp_pulse()),
        );
        let mut props = PropertySet::new().with_capabilities(aquila());
        ValidateGeometry.run(&mut c, &mut props)
    }

    #[test]
    fn test_chain_fits() {
        run(BravaisLattice::chain(10, dec!(6.1))).unwrap();
    }

    #[test]
    fn test_too_many_sites() {
        let err = run(BravaisLattice::square(17, 4)).unwrap_err();
        assert!(matches!(err, CompileError::TooManySites { count: 289, max: 256 }));
    }

    #[test]
    fn test_register_too_wide_reports_measure_and_limit() {
        let err = run(BravaisLattice::chain(20, 5)).unwrap_err();
        match err {
            CompileError::RegisterTooWide { width, max_width } => {
                assert_eq!(width, dec!(95));
                assert_eq!(max_width, dec!(75));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_register_too_tall() {
        let err = run(BravaisLattice::vertical_chain(20, 5)).unwrap_err();
        assert!(matches!(err, CompileError::RegisterTooTall { .. }));
    }

    #[test]
    fn test_sites_too_close() {
        let list = ListOfLocations::new()
            .add_position(0, 0, true)
            .add_position(3, 0, true);
        let err = run(list).unwrap_err();
        match err {
            CompileError::SitesTooClose { first, second, distance, min } => {
                assert_eq!((first, second), (0, 1));
                assert!((distance - dec!(3)).abs() < dec!(0.000001));
                assert_eq!(min, dec!(4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rows_too_close() {
        let list = ListOfLocations::new()
            .add_position(0, 0, true)
            .add_position(10, 2, true);
        let err = run(list).unwrap_err();
        assert!(matches!(err, CompileError::SitesTooClose { distance, .. } if distance == dec!(2)));
    }

    #[test]
    fn test_spacing_overflow_is_an_error() {
        let sites = [
            ResolvedSite { x: dec!(0), y: dec!(0), filled: true },
            ResolvedSite { x: dec!(100000000000000000000), y: dec!(0), filled: true },
        ];
        let err = check_spacing(&sites, &aquila().lattice).unwrap_err();
        assert!(matches!(err, CompileError::Ir(IrError::ArithmeticOverflow(_))));
    }

    #[test]
    fn test_empty_register() {
        assert!(matches!(run(ListOfLocations::new()), Err(CompileError::EmptyRegister)));
    }

    #[test]
    fn test_parallel_spacing_checked() {
        let err = run(Register::parallel(BravaisLattice::chain(2, 5), 1)).unwrap_err();
        assert!(matches!(err, CompileError::ValueOutOfRange { .. }));
    }
}
