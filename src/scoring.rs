//! Contracts for the two external collaborators the evaluator consumes:
//! the tabulated intra-ligand pair potential (`ScoringFunction`) and the
//! receptor's precomputed energy grid (`Receptor`). Both are out of scope
//! per SPEC_FULL.md section 1/6 — this module defines only the traits the
//! evaluator and parser need, plus (under `crate::testutil`, test-only) a
//! pair of minimal in-memory doubles used to exercise the geometry and
//! optimizer code without a real grid loader.

use crate::geometry::Vec3;
use crate::ligand::atom::XsType;

/// The tabulated pair-potential scoring function.
///
/// `e` and `d` are conceptually flat arrays of length `nr * S` where `S`
/// samples are taken per unit of squared distance; `d(offset)` already
/// represents `(dU/dr) / r`, so multiplying by the separation vector `r`
/// yields the pairwise force directly (see SPEC_FULL.md section 4.3).
pub trait ScoringFunction {
    /// Number of distinct xs-type pair combinations; pair offsets are
    /// `nr() * pair_index(..)`.
    fn nr(&self) -> usize;
    /// Samples per unit of squared distance.
    fn ns(&self) -> f64;
    /// Pair interactions at or beyond this squared distance are ignored.
    fn cutoff_sqr(&self) -> f64;
    /// Tabulated energy at a given array offset.
    fn e(&self, offset: usize) -> f64;
    /// Tabulated derivative (`dU/dr / r`) at a given array offset.
    fn d(&self, offset: usize) -> f64;
    /// Canonicalizes an unordered pair of xs types into a table index.
    fn pair_index(&self, xs_i: XsType, xs_j: XsType) -> usize;
}

/// The receptor's precomputed energy grid.
pub trait Receptor {
    /// Center of the search box, used by the optimizer to seed the first
    /// generation's ROOT position (SPEC_FULL.md section 4.4).
    fn center(&self) -> Vec3;
    /// Half-extent of the search box along each axis (`size` in SPEC_FULL.md
    /// section 4.4's `center +/- size`).
    fn half_size(&self) -> Vec3;
    fn within(&self, point: Vec3) -> bool;
    /// Maps a world coordinate to the floor grid-cell index.
    fn coordinate_to_index(&self, point: Vec3) -> (i64, i64, i64);
    fn granularity_inverse(&self) -> f64;
    /// Reads the scalar grid value for `xs_type` at integer grid indices.
    /// Indices outside `[0, num_probes)` are the caller's responsibility
    /// to avoid — the evaluator only reads the four corners of the cell
    /// `within()` already validated.
    fn grid_value(&self, xs_type: XsType, ix: i64, iy: i64, iz: i64) -> f64;
}
