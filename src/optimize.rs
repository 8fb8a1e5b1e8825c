//! Line-searched BFGS wrapped in a Metropolis-style outer loop
//! (SPEC_FULL.md section 4.4): the component that actually finds a
//! low-energy pose, repeatedly relaxing randomly perturbed starting
//! conformations and keeping only the best one seen.

use rand::Rng;

use crate::config::OptimizerConfig;
use crate::evaluate::{compose_result, Workspace};
use crate::geometry::{vec3_to_quat, Quaternion, Vec3};
use crate::ligand::model::Ligand;
use crate::scoring::{Receptor, ScoringFunction};

/// Dense symmetric matrix in upper-triangular packed storage
/// (SPEC_FULL.md section 9): `n*(n+1)/2` entries, indexed by `mr(i,j)` for
/// `i <= j`; `mp` normalizes an arbitrary `(i,j)` before indexing.
struct PackedSymmetric {
    n: usize,
    data: Vec<f64>,
}

impl PackedSymmetric {
    fn identity(n: usize) -> PackedSymmetric {
        let mut m = PackedSymmetric {
            n,
            data: vec![0.0; n * (n + 1) / 2],
        };
        for i in 0..n {
            let idx = m.mr(i, i);
            m.data[idx] = 1.0;
        }
        m
    }

    fn mr(&self, i: usize, j: usize) -> usize {
        j + i * (2 * self.n - i - 1) / 2
    }

    fn mp(&self, i: usize, j: usize) -> f64 {
        if i <= j {
            self.data[self.mr(i, j)]
        } else {
            self.data[self.mr(j, i)]
        }
    }

    fn add_upper(&mut self, i: usize, j: usize, value: f64) {
        let (i, j) = if i <= j { (i, j) } else { (j, i) };
        let idx = self.mr(i, j);
        self.data[idx] += value;
    }

    /// `self * v`, exploiting symmetry via `mp`.
    fn mul_vec(&self, v: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n];
        for i in 0..self.n {
            let mut acc = 0.0;
            for (j, &vj) in v.iter().enumerate() {
                acc += self.mp(i, j) * vj;
            }
            out[i] = acc;
        }
        out
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Builds the trial conformation `x1 + alpha * p` (SPEC_FULL.md section
/// 4.4): position and torsions step linearly, orientation composes a
/// rotation-vector quaternion on the left and renormalizes.
fn step_conformation(x1: &[f64], p: &[f64], alpha: f64, ligand: &Ligand) -> Vec<f64> {
    let mut x2 = vec![0.0; ligand.num_conformation_vars()];
    x2[0] = x1[0] + alpha * p[0];
    x2[1] = x1[1] + alpha * p[1];
    x2[2] = x1[2] + alpha * p[2];

    let rotvec = Vec3::new(alpha * p[3], alpha * p[4], alpha * p[5]);
    let delta = vec3_to_quat(rotvec);
    let q1 = Quaternion::new(x1[3], x1[4], x1[5], x1[6]);
    let q2 = (delta * q1).normalized();
    x2[3] = q2.w;
    x2[4] = q2.x;
    x2[5] = q2.y;
    x2[6] = q2.z;

    for t in 0..ligand.num_active_torsions {
        x2[7 + t] = x1[7 + t] + alpha * p[6 + t];
    }
    x2
}

/// Relaxes `x1` in place to a local minimum via BFGS with a backtracking,
/// Armijo/curvature ("strong-Wolfe-like") line search. Returns the final
/// energy. `x1` is assumed to already satisfy the Armijo upper bound
/// trivially (it is evaluated unconditionally before the loop starts).
fn bfgs(
    ligand: &Ligand,
    sf: &dyn ScoringFunction,
    rec: &dyn Receptor,
    cfg: &OptimizerConfig,
    x1: &mut [f64],
    ws: &mut Workspace,
) -> f64 {
    let n = ligand.num_gradient_vars();
    let mut h = PackedSymmetric::identity(n);

    let (_, mut e1) = ws.evaluate(ligand, x1, sf, rec, cfg.out_of_box_penalty, f64::INFINITY);
    let mut g1 = ws.gradient.clone();

    for _ in 0..cfg.max_bfgs_iterations {
        let p: Vec<f64> = h.mul_vec(&g1).iter().map(|v| -v).collect();
        let pg1 = dot(&p, &g1);
        if pg1 >= 0.0 {
            // Not a descent direction (can happen once H has drifted from
            // positive-definiteness under floating point error) -- stop
            // rather than climb.
            break;
        }

        let mut alpha = cfg.initial_alpha;
        let mut accepted: Option<(Vec<f64>, f64, Vec<f64>)> = None;

        for _ in 0..cfg.num_alphas {
            let x2 = step_conformation(x1, &p, alpha, ligand);
            let ue = e1 + cfg.armijo_c1 * alpha * pg1;
            let (ok, e2) = ws.evaluate(ligand, &x2, sf, rec, cfg.out_of_box_penalty, ue);
            if ok {
                let g2 = ws.gradient.clone();
                let pg2 = dot(&p, &g2);
                if pg2 >= cfg.wolfe_c2 * pg1 {
                    accepted = Some((x2, e2, g2));
                    break;
                }
            }
            alpha *= cfg.alpha_decay;
        }

        let (x2, e2, g2) = match accepted {
            Some(triple) => triple,
            None => break,
        };

        let y: Vec<f64> = g2.iter().zip(&g1).map(|(b, a)| b - a).collect();
        let mhy: Vec<f64> = h.mul_vec(&y).iter().map(|v| -v).collect();
        let yhy = -dot(&y, &mhy);
        let yp = dot(&y, &p);
        if yp.abs() < f64::EPSILON {
            break;
        }
        let ryp = 1.0 / yp;
        let pco = ryp * (ryp * yhy + alpha);
        for i in 0..n {
            for j in i..n {
                let update = ryp * (mhy[i] * p[j] + mhy[j] * p[i]) + pco * p[i] * p[j];
                h.add_upper(i, j, update);
            }
        }

        x1.copy_from_slice(&x2);
        e1 = e2;
        g1 = g2;
    }

    e1
}

/// Samples a uniform random conformation: ROOT position uniform in the
/// receptor's `center +/- half_size` box, ROOT orientation uniform on the
/// unit 3-sphere (four iid uniform-[-1,1] reals, normalized), each torsion
/// uniform in [-1, 1].
fn random_conformation(ligand: &Ligand, rec: &dyn Receptor, rng: &mut impl Rng) -> Vec<f64> {
    let center = rec.center();
    let half_size = rec.half_size();
    let mut x = vec![0.0; ligand.num_conformation_vars()];
    x[0] = center.x + rng.gen_range(-half_size.x, half_size.x);
    x[1] = center.y + rng.gen_range(-half_size.y, half_size.y);
    x[2] = center.z + rng.gen_range(-half_size.z, half_size.z);

    let mut q = Quaternion::new(
        rng.gen_range(-1.0, 1.0),
        rng.gen_range(-1.0, 1.0),
        rng.gen_range(-1.0, 1.0),
        rng.gen_range(-1.0, 1.0),
    );
    q.normalize();
    x[3] = q.w;
    x[4] = q.x;
    x[5] = q.y;
    x[6] = q.z;

    for t in 0..ligand.num_active_torsions {
        x[7 + t] = rng.gen_range(-1.0, 1.0);
    }
    x
}

/// The best pose found across all generations: its energy, raw
/// conformation vector, and full per-atom world coordinates (heavy atoms
/// and hydrogens).
#[derive(Debug, Clone)]
pub struct DockingResult {
    pub energy: f64,
    pub x: Vec<f64>,
    pub heavy_coordinates: Vec<Vec3>,
    pub hydrogen_coordinates: Vec<Vec3>,
}

/// Runs the Metropolis-wrapped BFGS optimizer to completion: `num_generations`
/// outer iterations, each perturbing ROOT's position and locally relaxing
/// with BFGS, keeping the best conformation seen (SPEC_FULL.md section 4.4).
/// Deterministic for a given `(ligand, sf, rec, cfg.seed)`.
pub fn optimize(
    ligand: &Ligand,
    sf: &dyn ScoringFunction,
    rec: &dyn Receptor,
    cfg: &OptimizerConfig,
) -> DockingResult {
    let mut rng: rand::rngs::StdRng = rand::SeedableRng::seed_from_u64(cfg.seed);
    let mut ws = Workspace::new(ligand);

    let mut x0 = random_conformation(ligand, rec, &mut rng);
    let (_, mut e0) = ws.evaluate(ligand, &x0, sf, rec, cfg.out_of_box_penalty, f64::INFINITY);
    log::debug!("generation 0: starting energy {:.3}", e0);

    for generation in 1..=cfg.num_generations {
        let mut x1 = x0.clone();
        x1[0] += rng.gen_range(-1.0, 1.0);
        x1[1] += rng.gen_range(-1.0, 1.0);
        x1[2] += rng.gen_range(-1.0, 1.0);

        let e1 = bfgs(ligand, sf, rec, cfg, &mut x1, &mut ws);

        if e1 < e0 {
            log::debug!("generation {}: improved energy {:.3} -> {:.3}", generation, e0, e1);
            x0 = x1;
            e0 = e1;
        }
    }

    log::info!("optimization finished, best energy {:.3}", e0);
    let (heavy_coordinates, hydrogen_coordinates) = compose_result(ligand, &x0);
    DockingResult {
        energy: e0,
        x: x0,
        heavy_coordinates,
        hydrogen_coordinates,
    }
}
