//! Atom arrangements and registers.
//!
//! Coordinates are [`Scalar`]s so lattice spacings can be swept like any
//! other parameter. Arrangements enumerate their sites lazily; calling
//! [`AtomArrangement::enumerate`] again restarts from the first site.

use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use rust_decimal::Decimal;

use crate::arith;
use crate::bindings::Bindings;
use crate::error::{IrError, IrResult};
use crate::scalar::Scalar;

/// One site of an arrangement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Site {
    /// `(x, y)` position.
    pub position: (Scalar, Scalar),
    /// Whether an atom is loaded at this site.
    pub filled: bool,
}

impl Site {
    /// A filled site.
    pub fn filled(x: impl Into<Scalar>, y: impl Into<Scalar>) -> Self {
        Self {
            position: (x.into(), y.into()),
            filled: true,
        }
    }

    /// An empty site.
    pub fn vacant(x: impl Into<Scalar>, y: impl Into<Scalar>) -> Self {
        Self {
            position: (x.into(), y.into()),
            filled: false,
        }
    }

    fn assign(&self, bindings: &Bindings) -> IrResult<Site> {
        Ok(Site {
            position: (
                self.position.0.assign(bindings)?,
                self.position.1.assign(bindings)?,
            ),
            filled: self.filled,
        })
    }
}

/// A site with evaluated coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedSite {
    /// x coordinate.
    pub x: Decimal,
    /// y coordinate.
    pub y: Decimal,
    /// Whether an atom is loaded at this site.
    pub filled: bool,
}

/// The family of a [`BravaisLattice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LatticeKind {
    /// One-dimensional chain.
    Chain,
    /// Square lattice.
    Square,
    /// Rectangular lattice with independent spacings.
    Rectangular,
    /// Honeycomb lattice.
    Honeycomb,
    /// Triangular lattice.
    Triangular,
    /// Lieb lattice.
    Lieb,
    /// Kagome lattice.
    Kagome,
}

fn sqrt3_over_2() -> Decimal {
    Decimal::new(8_660_254_037_844_386, 16)
}

fn sqrt3_over_4() -> Decimal {
    Decimal::new(4_330_127_018_922_193, 16)
}

fn sqrt3_over_6() -> Decimal {
    Decimal::new(2_886_751_345_948_129, 16)
}

fn half() -> Decimal {
    Decimal::new(5, 1)
}

fn quarter() -> Decimal {
    Decimal::new(25, 2)
}

/// A lattice given by cell vectors, a basis, and a number of cells per axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BravaisLattice {
    kind: LatticeKind,
    shape: (usize, usize),
    spacing: (Scalar, Scalar),
    vertical: bool,
}

impl BravaisLattice {
    fn new(kind: LatticeKind, shape: (usize, usize), spacing: (Scalar, Scalar)) -> Self {
        Self {
            kind,
            shape,
            spacing,
            vertical: false,
        }
    }

    /// A horizontal chain of `length` sites.
    pub fn chain(length: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Chain, (length, 1), (spacing.clone(), spacing))
    }

    /// A vertical chain of `length` sites.
    pub fn vertical_chain(length: usize, spacing: impl Into<Scalar>) -> Self {
        Self {
            vertical: true,
            ..Self::chain(length, spacing)
        }
    }

    /// An `l x l` square lattice.
    pub fn square(l: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Square, (l, l), (spacing.clone(), spacing))
    }

    /// A `width x height` rectangular lattice.
    pub fn rectangular(
        width: usize,
        height: usize,
        spacing_x: impl Into<Scalar>,
        spacing_y: impl Into<Scalar>,
    ) -> Self {
        Self::new(
            LatticeKind::Rectangular,
            (width, height),
            (spacing_x.into(), spacing_y.into()),
        )
    }

    /// An `l x l` honeycomb lattice (two sites per cell).
    pub fn honeycomb(l: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Honeycomb, (l, l), (spacing.clone(), spacing))
    }

    /// An `l x l` triangular lattice.
    pub fn triangular(l: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Triangular, (l, l), (spacing.clone(), spacing))
    }

    /// An `l x l` Lieb lattice (three sites per cell).
    pub fn lieb(l: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Lieb, (l, l), (spacing.clone(), spacing))
    }

    /// An `l x l` kagome lattice (three sites per cell).
    pub fn kagome(l: usize, spacing: impl Into<Scalar>) -> Self {
        let spacing = spacing.into();
        Self::new(LatticeKind::Kagome, (l, l), (spacing.clone(), spacing))
    }

    /// The lattice family.
    pub fn kind(&self) -> LatticeKind {
        self.kind
    }

    fn cell_vectors(&self) -> [(Decimal, Decimal); 2] {
        match self.kind {
            LatticeKind::Chain if self.vertical => [(Decimal::ZERO, Decimal::ONE), (Decimal::ZERO, Decimal::ZERO)],
            LatticeKind::Chain => [(Decimal::ONE, Decimal::ZERO), (Decimal::ZERO, Decimal::ZERO)],
            LatticeKind::Square | LatticeKind::Rectangular | LatticeKind::Lieb => {
                [(Decimal::ONE, Decimal::ZERO), (Decimal::ZERO, Decimal::ONE)]
            }
            LatticeKind::Honeycomb | LatticeKind::Triangular | LatticeKind::Kagome => {
                [(Decimal::ONE, Decimal::ZERO), (half(), sqrt3_over_2())]
            }
        }
    }

    fn basis(&self) -> Vec<(Decimal, Decimal)> {
        let origin = (Decimal::ZERO, Decimal::ZERO);
        match self.kind {
            LatticeKind::Chain
            | LatticeKind::Square
            | LatticeKind::Rectangular
            | LatticeKind::Triangular => vec![origin],
            LatticeKind::Honeycomb => vec![origin, (half(), sqrt3_over_6())],
            LatticeKind::Lieb => vec![origin, (half(), Decimal::ZERO), (Decimal::ZERO, half())],
            LatticeKind::Kagome => vec![origin, (half(), Decimal::ZERO), (quarter(), sqrt3_over_4())],
        }
    }

    /// Number of sites.
    pub fn n_sites(&self) -> usize {
        self.shape.0 * self.shape.1 * self.basis().len()
    }

    fn site(&self, index: usize) -> Site {
        let basis = self.basis();
        let [a1, a2] = self.cell_vectors();
        let cell = index / basis.len();
        let (bx, by) = basis[index % basis.len()];
        let i = Decimal::from(cell / self.shape.1);
        let j = Decimal::from(cell % self.shape.1);
        let x = i * a1.0 + j * a2.0 + bx;
        let y = i * a1.1 + j * a2.1 + by;
        Site::filled(
            self.spacing.0.mul(&Scalar::literal(x)),
            self.spacing.1.mul(&Scalar::literal(y)),
        )
    }

    fn map_spacing(&self, f: impl Fn(&Scalar) -> IrResult<Scalar>) -> IrResult<Self> {
        Ok(Self {
            spacing: (f(&self.spacing.0)?, f(&self.spacing.1)?),
            ..self.clone()
        })
    }
}

/// An explicit list of sites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ListOfLocations {
    sites: Vec<Site>,
}

impl ListOfLocations {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from sites.
    pub fn from_sites(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// Add a site.
    pub fn add_position(mut self, x: impl Into<Scalar>, y: impl Into<Scalar>, filled: bool) -> Self {
        self.sites.push(Site {
            position: (x.into(), y.into()),
            filled,
        });
        self
    }

    /// The sites in order.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Multiply every coordinate by `factor`.
    pub fn scale(&self, factor: impl Into<Scalar>) -> Self {
        let factor = factor.into();
        Self {
            sites: self
                .sites
                .iter()
                .map(|s| Site {
                    position: (s.position.0.mul(&factor), s.position.1.mul(&factor)),
                    filled: s.filled,
                })
                .collect(),
        }
    }

    /// Vacate exactly `n_defects` randomly chosen filled sites.
    pub fn apply_defect_count<R: Rng + ?Sized>(&self, n_defects: usize, rng: &mut R) -> IrResult<Self> {
        let filled: Vec<usize> = (0..self.sites.len()).filter(|&i| self.sites[i].filled).collect();
        if n_defects > filled.len() {
            return Err(IrError::InvalidArgument(format!(
                "cannot vacate {n_defects} sites out of {} filled",
                filled.len()
            )));
        }
        let mut sites = self.sites.clone();
        for chosen in rand::seq::index::sample(rng, filled.len(), n_defects).iter() {
            sites[filled[chosen]].filled = false;
        }
        Ok(Self { sites })
    }

    /// Vacate each filled site independently with probability `density`.
    pub fn apply_defect_density<R: Rng + ?Sized>(&self, density: f64, rng: &mut R) -> IrResult<Self> {
        if !(0.0..=1.0).contains(&density) {
            return Err(IrError::InvalidArgument(format!(
                "defect density must be in [0, 1], got {density}"
            )));
        }
        let mut sites = self.sites.clone();
        for site in sites.iter_mut().filter(|s| s.filled) {
            if rng.gen_bool(density) {
                site.filled = false;
            }
        }
        Ok(Self { sites })
    }
}

/// A geometric placement of sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AtomArrangement {
    /// A generated lattice; every site is filled.
    Lattice(BravaisLattice),
    /// An explicit list of sites.
    List(ListOfLocations),
}

/// Lazy iterator over the sites of an arrangement.
pub struct Sites<'a> {
    source: SiteSource<'a>,
    index: usize,
    len: usize,
}

enum SiteSource<'a> {
    Lattice(&'a BravaisLattice),
    List(&'a [Site]),
}

impl Iterator for Sites<'_> {
    type Item = Site;

    fn next(&mut self) -> Option<Site> {
        if self.index >= self.len {
            return None;
        }
        let site = match &self.source {
            SiteSource::Lattice(lattice) => lattice.site(self.index),
            SiteSource::List(sites) => sites[self.index].clone(),
        };
        self.index += 1;
        Some(site)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Sites<'_> {}

impl AtomArrangement {
    /// Iterate over the sites in order.
    pub fn enumerate(&self) -> Sites<'_> {
        match self {
            AtomArrangement::Lattice(lattice) => Sites {
                source: SiteSource::Lattice(lattice),
                index: 0,
                len: lattice.n_sites(),
            },
            AtomArrangement::List(list) => Sites {
                source: SiteSource::List(&list.sites),
                index: 0,
                len: list.sites.len(),
            },
        }
    }

    /// Number of sites, filled or not.
    pub fn n_sites(&self) -> usize {
        match self {
            AtomArrangement::Lattice(lattice) => lattice.n_sites(),
            AtomArrangement::List(list) => list.sites.len(),
        }
    }

    /// Number of vacant sites.
    pub fn n_vacant(&self) -> usize {
        match self {
            AtomArrangement::Lattice(_) => 0,
            AtomArrangement::List(list) => list.sites.iter().filter(|s| !s.filled).count(),
        }
    }

    /// Number of filled sites.
    pub fn n_filled(&self) -> usize {
        self.n_sites() - self.n_vacant()
    }

    /// Materialize as an explicit list.
    pub fn to_list(&self) -> ListOfLocations {
        match self {
            AtomArrangement::Lattice(_) => ListOfLocations::from_sites(self.enumerate().collect()),
            AtomArrangement::List(list) => list.clone(),
        }
    }

    /// Multiply every coordinate by `factor`.
    pub fn scale(&self, factor: impl Into<Scalar>) -> AtomArrangement {
        let factor = factor.into();
        match self {
            AtomArrangement::Lattice(lattice) => AtomArrangement::Lattice(BravaisLattice {
                spacing: (lattice.spacing.0.mul(&factor), lattice.spacing.1.mul(&factor)),
                ..lattice.clone()
            }),
            AtomArrangement::List(list) => AtomArrangement::List(list.scale(factor)),
        }
    }

    /// Assign variables in coordinates.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<AtomArrangement> {
        if bindings.is_empty() {
            return Ok(self.clone());
        }
        Ok(match self {
            AtomArrangement::Lattice(lattice) => {
                AtomArrangement::Lattice(lattice.map_spacing(|s| s.assign(bindings))?)
            }
            AtomArrangement::List(list) => AtomArrangement::List(ListOfLocations {
                sites: list
                    .sites
                    .iter()
                    .map(|s| s.assign(bindings))
                    .collect::<IrResult<_>>()?,
            }),
        })
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self {
            AtomArrangement::Lattice(lattice) => {
                lattice.spacing.0.collect_free(out);
                lattice.spacing.1.collect_free(out);
            }
            AtomArrangement::List(list) => {
                for site in &list.sites {
                    site.position.0.collect_free(out);
                    site.position.1.collect_free(out);
                }
            }
        }
    }

    /// Evaluate every coordinate.
    pub fn resolve(&self, bindings: &Bindings) -> IrResult<Vec<ResolvedSite>> {
        self.enumerate()
            .map(|site| {
                Ok(ResolvedSite {
                    x: site.position.0.evaluate(bindings)?,
                    y: site.position.1.evaluate(bindings)?,
                    filled: site.filled,
                })
            })
            .collect()
    }

    /// Width and height of the bounding box of all sites.
    pub fn extent(&self, bindings: &Bindings) -> IrResult<(Decimal, Decimal)> {
        bounding_box(&self.resolve(bindings)?)
    }
}

/// Width and height of the bounding box of `sites`; zero when empty.
pub fn bounding_box(sites: &[ResolvedSite]) -> IrResult<(Decimal, Decimal)> {
    let Some(first) = sites.first() else {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    };
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for site in &sites[1..] {
        min_x = min_x.min(site.x);
        max_x = max_x.max(site.x);
        min_y = min_y.min(site.y);
        max_y = max_y.max(site.y);
    }
    Ok((arith::sub(max_x, min_x)?, arith::sub(max_y, min_y)?))
}

impl From<BravaisLattice> for AtomArrangement {
    fn from(lattice: BravaisLattice) -> Self {
        AtomArrangement::Lattice(lattice)
    }
}

impl From<ListOfLocations> for AtomArrangement {
    fn from(list: ListOfLocations) -> Self {
        AtomArrangement::List(list)
    }
}

/// An arrangement replicated on a grid to fill the field of view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParallelRegister {
    /// The replicated cluster.
    pub arrangement: AtomArrangement,
    /// Gap between neighbouring clusters.
    pub cluster_spacing: Scalar,
}

/// The register of an analog circuit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Register {
    /// A single arrangement.
    Arrangement(AtomArrangement),
    /// A tiled arrangement.
    Parallel(ParallelRegister),
}

impl Register {
    /// Tile `arrangement` with `cluster_spacing` between copies.
    pub fn parallel(arrangement: impl Into<AtomArrangement>, cluster_spacing: impl Into<Scalar>) -> Self {
        Register::Parallel(ParallelRegister {
            arrangement: arrangement.into(),
            cluster_spacing: cluster_spacing.into(),
        })
    }

    /// The logical arrangement (one cluster for parallel registers).
    pub fn arrangement(&self) -> &AtomArrangement {
        match self {
            Register::Arrangement(arrangement) => arrangement,
            Register::Parallel(parallel) => &parallel.arrangement,
        }
    }

    /// Number of logical sites.
    pub fn n_sites(&self) -> usize {
        self.arrangement().n_sites()
    }

    /// Assign variables in coordinates and cluster spacing.
    pub fn assign(&self, bindings: &Bindings) -> IrResult<Register> {
        Ok(match self {
            Register::Arrangement(arrangement) => Register::Arrangement(arrangement.assign(bindings)?),
            Register::Parallel(parallel) => Register::Parallel(ParallelRegister {
                arrangement: parallel.arrangement.assign(bindings)?,
                cluster_spacing: parallel.cluster_spacing.assign(bindings)?,
            }),
        })
    }

    /// Collect free variable names into `out`.
    pub fn collect_free(&self, out: &mut BTreeSet<String>) {
        match self {
            Register::Arrangement(arrangement) => arrangement.collect_free(out),
            Register::Parallel(parallel) => {
                parallel.arrangement.collect_free(out);
                parallel.cluster_spacing.collect_free(out);
            }
        }
    }
}

impl From<AtomArrangement> for Register {
    fn from(arrangement: AtomArrangement) -> Self {
        Register::Arrangement(arrangement)
    }
}

impl From<BravaisLattice> for Register {
    fn from(lattice: BravaisLattice) -> Self {
        Register::Arrangement(lattice.into())
    }
}

impl From<ListOfLocations> for Register {
    fn from(list: ListOfLocations) -> Self {
        Register::Arrangement(list.into())
    }
}

impl fmt::Display for AtomArrangement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtomArrangement::Lattice(lattice) => write!(
                f,
                "{:?}({}x{}, spacing=({}, {}))",
                lattice.kind, lattice.shape.0, lattice.shape.1, lattice.spacing.0, lattice.spacing.1
            ),
            AtomArrangement::List(list) => write!(f, "ListOfLocations({} sites)", list.sites.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    #[test]
    fn test_chain_positions() {
        let chain = AtomArrangement::from(BravaisLattice::chain(3, dec!(6.1)));
        let sites = chain.resolve(&Bindings::new()).unwrap();
        let xs: Vec<_> = sites.iter().map(|s| s.x).collect();
        assert_eq!(xs, vec![dec!(0), dec!(6.1), dec!(12.2)]);
        assert!(sites.iter().all(|s| s.y.is_zero() && s.filled));
    }

    #[test]
    fn test_vertical_chain_extent() {
        let chain = AtomArrangement::from(BravaisLattice::vertical_chain(4, 5));
        assert_eq!(chain.extent(&Bindings::new()).unwrap(), (dec!(0), dec!(15)));
    }

    #[test]
    fn test_bounding_box_overflow() {
        let sites = [
            ResolvedSite { x: Decimal::MIN, y: dec!(0), filled: true },
            ResolvedSite { x: Decimal::MAX, y: dec!(0), filled: true },
        ];
        assert!(matches!(bounding_box(&sites), Err(IrError::ArithmeticOverflow(_))));
        assert_eq!(bounding_box(&[]).unwrap(), (dec!(0), dec!(0)));
    }

    #[test]
    fn test_site_counts() {
        assert_eq!(BravaisLattice::square(3, 1).n_sites(), 9);
        assert_eq!(BravaisLattice::rectangular(2, 5, 1, 2).n_sites(), 10);
        assert_eq!(BravaisLattice::honeycomb(2, 1).n_sites(), 8);
        assert_eq!(BravaisLattice::lieb(2, 1).n_sites(), 12);
        assert_eq!(BravaisLattice::kagome(2, 1).n_sites(), 12);
        assert_eq!(BravaisLattice::triangular(2, 1).n_sites(), 4);
    }

    #[test]
    fn test_enumerate_is_restartable() {
        let lattice = AtomArrangement::from(BravaisLattice::square(2, 1));
        let first: Vec<_> = lattice.enumerate().collect();
        let second: Vec<_> = lattice.enumerate().collect();
        assert_eq!(first, second);
        assert_eq!(lattice.enumerate().len(), 4);
    }

    #[test]
    fn test_symbolic_spacing() {
        let lattice = AtomArrangement::from(BravaisLattice::square(2, Scalar::var("a")));
        let mut free = BTreeSet::new();
        lattice.collect_free(&mut free);
        assert!(free.contains("a"));

        let b = Bindings::new().with("a", dec!(4)).unwrap();
        assert_eq!(lattice.extent(&b).unwrap(), (dec!(4), dec!(4)));
        let assigned = lattice.assign(&b).unwrap();
        assert_eq!(assigned.extent(&Bindings::new()).unwrap(), (dec!(4), dec!(4)));
    }

    #[test]
    fn test_list_scale_and_vacancies() {
        let list = ListOfLocations::new()
            .add_position(0, 0, true)
            .add_position(1, 0, false)
            .add_position(2, 1, true);
        let arrangement = AtomArrangement::from(list.scale(2));
        assert_eq!(arrangement.n_vacant(), 1);
        assert_eq!(arrangement.n_filled(), 2);
        assert_eq!(arrangement.extent(&Bindings::new()).unwrap(), (dec!(4), dec!(2)));
    }

    #[test]
    fn test_defect_count() {
        let list = AtomArrangement::from(BravaisLattice::square(3, 1)).to_list();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let defected = list.apply_defect_count(4, &mut rng).unwrap();
        assert_eq!(defected.sites().iter().filter(|s| !s.filled).count(), 4);
        assert!(list.apply_defect_count(10, &mut rng).is_err());
    }

    #[test]
    fn test_defect_density_bounds() {
        let list = AtomArrangement::from(BravaisLattice::chain(5, 1)).to_list();
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let all = list.apply_defect_density(1.0, &mut rng).unwrap();
        assert!(all.sites().iter().all(|s| !s.filled));
        let none = list.apply_defect_density(0.0, &mut rng).unwrap();
        assert_eq!(none, list);
        assert!(list.apply_defect_density(1.5, &mut rng).is_err());
    }
}
