//! Minimal in-memory doubles for `ScoringFunction` and `Receptor`, used
//! only by this crate's own tests. Neither is a production grid/pair-table
//! implementation — both are explicitly out of scope (SPEC_FULL.md
//! section 1) — they exist so the evaluator, optimizer and parser can be
//! exercised end to end without one.

use crate::geometry::Vec3;
use crate::ligand::atom::{XsType, NUM_XS_TYPES};
use crate::scoring::{Receptor, ScoringFunction};

/// A pair potential that is a pure function of separation: `e(r) = k *
/// (r2 - r0^2)^2`-free harmonic-ish well, sampled at `ns` points per unit
/// r2, independent of xs type. Good enough to drive finite-difference
/// gradient checks; not a stand-in for DKoes/Vina's empirical terms.
pub struct HarmonicPairPotential {
    pub ns: f64,
    pub cutoff_sqr: f64,
    pub well_depth: f64,
    pub equilibrium_r2: f64,
    samples: usize,
}

impl HarmonicPairPotential {
    pub fn new(cutoff_sqr: f64, well_depth: f64, equilibrium_r2: f64) -> Self {
        let ns = 100.0;
        let samples = (cutoff_sqr * ns).ceil() as usize + 2;
        HarmonicPairPotential {
            ns,
            cutoff_sqr,
            well_depth,
            equilibrium_r2,
            samples,
        }
    }

    fn r2_at(&self, sample: usize) -> f64 {
        sample as f64 / self.ns
    }
}

impl ScoringFunction for HarmonicPairPotential {
    fn nr(&self) -> usize {
        self.samples
    }

    fn ns(&self) -> f64 {
        self.ns
    }

    fn cutoff_sqr(&self) -> f64 {
        self.cutoff_sqr
    }

    fn e(&self, offset: usize) -> f64 {
        let sample = offset % self.samples;
        let r2 = self.r2_at(sample);
        let delta = r2 - self.equilibrium_r2;
        self.well_depth * delta * delta
    }

    fn d(&self, offset: usize) -> f64 {
        // e(r) = k*(r2 - r0)^2, dU/dr = 4*k*(r2-r0)*r, so (dU/dr)/r = 4*k*(r2-r0).
        let sample = offset % self.samples;
        let r2 = self.r2_at(sample);
        4.0 * self.well_depth * (r2 - self.equilibrium_r2)
    }

    fn pair_index(&self, xs_i: XsType, xs_j: XsType) -> usize {
        let (a, b) = if xs_i <= xs_j {
            (xs_i, xs_j)
        } else {
            (xs_j, xs_i)
        };
        a as usize * NUM_XS_TYPES + b as usize
    }
}

/// A receptor whose "grid" is a smooth analytic bowl centered at the
/// origin, so `within`/`grid_value` behave consistently for any point
/// without needing a real lattice file.
pub struct AnalyticBowlReceptor {
    pub center: Vec3,
    pub half_size: f64,
    pub granularity: f64,
}

impl AnalyticBowlReceptor {
    pub fn new(center: Vec3, half_size: f64, granularity: f64) -> Self {
        AnalyticBowlReceptor {
            center,
            half_size,
            granularity,
        }
    }

    fn value_at(&self, point: Vec3) -> f64 {
        let d = point - self.center;
        0.5 * d.norm2()
    }
}

/// A receptor that is always "within" and whose grid is uniformly zero.
/// Used to isolate gradient-correctness checks to kinematics and the
/// intra-ligand pair potential, which are smooth and exactly
/// differentiable -- unlike the grid term's forward-difference surrogate
/// gradient, which is only an approximation of the true (piecewise
/// constant, per SPEC_FULL.md section 4.3) grid energy and so is not a
/// fair target for a central-finite-difference check.
pub struct ZeroFieldReceptor;

impl Receptor for ZeroFieldReceptor {
    fn center(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn half_size(&self) -> Vec3 {
        Vec3::new(50.0, 50.0, 50.0)
    }

    fn within(&self, _point: Vec3) -> bool {
        true
    }

    fn coordinate_to_index(&self, point: Vec3) -> (i64, i64, i64) {
        (point.x.floor() as i64, point.y.floor() as i64, point.z.floor() as i64)
    }

    fn granularity_inverse(&self) -> f64 {
        1.0
    }

    fn grid_value(&self, _xs_type: XsType, _ix: i64, _iy: i64, _iz: i64) -> f64 {
        0.0
    }
}

impl Receptor for AnalyticBowlReceptor {
    fn center(&self) -> Vec3 {
        self.center
    }

    fn half_size(&self) -> Vec3 {
        Vec3::new(self.half_size, self.half_size, self.half_size)
    }

    fn within(&self, point: Vec3) -> bool {
        let d = point - self.center;
        d.x.abs() <= self.half_size && d.y.abs() <= self.half_size && d.z.abs() <= self.half_size
    }

    fn coordinate_to_index(&self, point: Vec3) -> (i64, i64, i64) {
        let d = (point - self.center) / self.granularity;
        (d.x.floor() as i64, d.y.floor() as i64, d.z.floor() as i64)
    }

    fn granularity_inverse(&self) -> f64 {
        1.0 / self.granularity
    }

    fn grid_value(&self, _xs_type: XsType, ix: i64, iy: i64, iz: i64) -> f64 {
        let point = Vec3::new(
            self.center.x + ix as f64 * self.granularity,
            self.center.y + iy as f64 * self.granularity,
            self.center.z + iz as f64 * self.granularity,
        );
        self.value_at(point)
    }
}
