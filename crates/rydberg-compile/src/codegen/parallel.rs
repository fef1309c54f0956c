//! Tiling of parallel registers over the field of view.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

use rydberg_hal::{ClusterLocation, LatticeLimits, ParallelDecoder};
use rydberg_ir::arith::{add, div, mul, sub};
use rydberg_ir::{Bindings, ParallelRegister, ResolvedSite, bounding_box};

use crate::error::{CompileError, CompileResult};
use crate::passes::validate::geometry::check_extent;

/// A cluster replicated on a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tiling {
    /// All sites, cluster after cluster.
    pub sites: Vec<ResolvedSite>,
    /// Global site index → (cluster, index within the cluster).
    pub decoder: ParallelDecoder,
    /// Number of clusters placed.
    pub copies: usize,
}

/// Replicate the cluster of `parallel` row by row until the field of view
/// or the site and filled-site budgets of `lattice` are exhausted.
///
/// Neighbouring clusters are one bounding box plus the cluster spacing
/// apart. `lattice` must be in the same units as the register.
pub fn tile(parallel: &ParallelRegister, lattice: &LatticeLimits) -> CompileResult<Tiling> {
    let bindings = Bindings::new();
    let cluster = parallel.arrangement.resolve(&bindings)?;
    if cluster.is_empty() {
        return Err(CompileError::EmptyRegister);
    }
    check_extent(&cluster, lattice)?;

    let spacing = parallel.cluster_spacing.evaluate(&bindings)?;
    if spacing <= Decimal::ZERO {
        return Err(CompileError::ValueOutOfRange {
            channel: "cluster spacing".into(),
            value: spacing,
            min: Decimal::ZERO,
            max: lattice.width,
        });
    }

    let (width, height) = bounding_box(&cluster)?;
    let origin_x = cluster.iter().map(|s| s.x).min().unwrap_or_default();
    let origin_y = cluster.iter().map(|s| s.y).min().unwrap_or_default();
    let (pitch_x, pitch_y) = (add(width, spacing)?, add(height, spacing)?);
    let columns = grid_count(sub(lattice.width, width)?, pitch_x)?;
    let rows = grid_count(sub(lattice.height, height)?, pitch_y)?;
    let max_copies = copy_budget(&cluster, lattice)?;

    let mut sites = Vec::new();
    let mut mapping = Vec::new();
    let mut copies = 0;
    'grid: for row in 0..rows {
        for column in 0..columns {
            if copies == max_copies {
                break 'grid;
            }
            let dx = sub(mul(Decimal::from(column), pitch_x)?, origin_x)?;
            let dy = sub(mul(Decimal::from(row), pitch_y)?, origin_y)?;
            for (index, site) in cluster.iter().enumerate() {
                mapping.push(ClusterLocation {
                    global_location_index: sites.len(),
                    cluster_index: (column, row),
                    cluster_location_index: index,
                });
                sites.push(ResolvedSite {
                    x: add(site.x, dx)?,
                    y: add(site.y, dy)?,
                    filled: site.filled,
                });
            }
            copies += 1;
        }
    }

    debug!("tiled {copies} clusters of {} sites", cluster.len());
    Ok(Tiling {
        sites,
        decoder: ParallelDecoder::new(mapping),
        copies,
    })
}

/// Copies of pitch `pitch` that fit in `room` beyond the first.
fn grid_count(room: Decimal, pitch: Decimal) -> CompileResult<usize> {
    Ok(div(room, pitch)?
        .floor()
        .to_usize()
        .map_or(1, |n| n.saturating_add(1)))
}

/// Clusters allowed by both the site and the filled-site budget.
fn copy_budget(cluster: &[ResolvedSite], lattice: &LatticeLimits) -> CompileResult<usize> {
    let by_sites = lattice.max_sites / cluster.len();
    if by_sites == 0 {
        return Err(CompileError::TooManySites {
            count: cluster.len(),
            max: lattice.max_sites,
        });
    }
    let filled = cluster.iter().filter(|s| s.filled).count();
    if filled == 0 {
        return Ok(by_sites);
    }
    let by_filled = lattice.max_filled_sites / filled;
    if by_filled == 0 {
        return Err(CompileError::TooManySites {
            count: filled,
            max: lattice.max_filled_sites,
        });
    }
    Ok(by_sites.min(by_filled))
}
