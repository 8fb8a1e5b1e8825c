//! The evaluator: forward kinematics, receptor-grid and intra-ligand pair
//! energy, and analytic-gradient back-propagation, in a single pass over a
//! conformation vector `x` (SPEC_FULL.md section 4.3).
//!
//! All scratch buffers live on a [`Workspace`] sized once from the ligand
//! and reused across BFGS iterations and Metropolis generations, per the
//! memory discipline in SPEC_FULL.md section 5 -- evaluating never
//! allocates.

use crate::geometry::{axis_angle_to_quat, Mat3, Quaternion, Vec3};
use crate::ligand::model::Ligand;
use crate::scoring::{Receptor, ScoringFunction};

/// Per-call scratch for one ligand: forward-kinematics frame state, per-atom
/// world coordinates and per-atom force/derivative accumulators, and the
/// gradient vector `evaluate` fills in.
pub struct Workspace {
    origin: Vec<Vec3>,
    orient: Vec<Quaternion>,
    axis: Vec<Vec3>,
    coords: Vec<Vec3>,
    derivatives: Vec<Vec3>,
    frame_force: Vec<Vec3>,
    frame_torque: Vec<Vec3>,
    pub gradient: Vec<f64>,
}

impl Workspace {
    pub fn new(ligand: &Ligand) -> Workspace {
        Workspace {
            origin: vec![Vec3::ZERO; ligand.num_frames],
            orient: vec![Quaternion::default(); ligand.num_frames],
            axis: vec![Vec3::ZERO; ligand.num_frames],
            coords: vec![Vec3::ZERO; ligand.num_heavy_atoms],
            derivatives: vec![Vec3::ZERO; ligand.num_heavy_atoms],
            frame_force: vec![Vec3::ZERO; ligand.num_frames],
            frame_torque: vec![Vec3::ZERO; ligand.num_frames],
            gradient: vec![0.0; ligand.num_gradient_vars()],
        }
    }

    /// World coordinates of the heavy atoms as of the most recent
    /// `evaluate` call.
    pub fn heavy_coordinates(&self) -> &[Vec3] {
        &self.coords
    }

    fn forward_kinematics(&mut self, ligand: &Ligand, x: &[f64]) {
        self.origin[0] = Vec3::new(x[0], x[1], x[2]);
        self.orient[0] = Quaternion::new(x[3], x[4], x[5], x[6]);

        for k in 0..ligand.num_frames {
            let frame = &ligand.frames[k];
            let m = self.orient[k].to_mat3();
            for i in frame.heavy_atoms() {
                self.coords[i] = self.origin[k] + m.apply(ligand.heavy_atoms[i].coord);
            }
            for &b in &frame.branches {
                let child = &ligand.frames[b];
                self.origin[b] =
                    self.origin[k] + m.apply(child.parent_rotor_y_to_current_rotor_y);
                if let Some(t) = child.active_torsion_index {
                    let axis = m.apply(child.parent_rotor_x_to_current_rotor_y);
                    self.axis[b] = axis;
                    let delta = axis_angle_to_quat(axis, x[7 + t]);
                    self.orient[b] = (delta * self.orient[k]).normalized();
                } else {
                    self.orient[b] = self.orient[k];
                }
            }
        }
    }

    /// Computes total energy and, unless rejected, the analytic gradient of
    /// `x`. Returns `true` iff `e < ue`. When `false`, `gradient` was not
    /// recomputed for this call and must not be read -- this is how the
    /// BFGS line search implements the Armijo test without paying for
    /// back-propagation on a conformation it is about to discard.
    pub fn evaluate(
        &mut self,
        ligand: &Ligand,
        x: &[f64],
        sf: &dyn ScoringFunction,
        rec: &dyn Receptor,
        out_of_box_penalty: f64,
        ue: f64,
    ) -> (bool, f64) {
        self.forward_kinematics(ligand, x);

        let mut e = 0.0;
        for i in 0..ligand.num_heavy_atoms {
            let c = self.coords[i];
            if !rec.within(c) {
                e += out_of_box_penalty;
                self.derivatives[i] = Vec3::ZERO;
                continue;
            }
            let xs_type = ligand.heavy_atoms[i].xs_type;
            let (ix, iy, iz) = rec.coordinate_to_index(c);
            let e000 = rec.grid_value(xs_type, ix, iy, iz);
            let e100 = rec.grid_value(xs_type, ix + 1, iy, iz);
            let e010 = rec.grid_value(xs_type, ix, iy + 1, iz);
            let e001 = rec.grid_value(xs_type, ix, iy, iz + 1);
            e += e000;
            let gi = rec.granularity_inverse();
            self.derivatives[i] =
                Vec3::new((e100 - e000) * gi, (e010 - e000) * gi, (e001 - e000) * gi);
        }

        for pair in &ligand.pairs {
            let r = self.coords[pair.j] - self.coords[pair.i];
            let r2 = r.norm2();
            if r2 < sf.cutoff_sqr() {
                let offset = pair.p_offset + (sf.ns() * r2).floor() as usize;
                e += sf.e(offset);
                let correction = r * sf.d(offset);
                self.derivatives[pair.i] -= correction;
                self.derivatives[pair.j] += correction;
            }
        }

        if e >= ue {
            return (false, e);
        }

        for f in self.frame_force.iter_mut() {
            *f = Vec3::ZERO;
        }
        for t in self.frame_torque.iter_mut() {
            *t = Vec3::ZERO;
        }
        for k in 0..ligand.num_frames {
            let frame = &ligand.frames[k];
            for i in frame.heavy_atoms() {
                self.frame_force[k] += self.derivatives[i];
                self.frame_torque[k] +=
                    (self.coords[i] - self.origin[k]).cross(self.derivatives[i]);
            }
        }
        for k in (1..ligand.num_frames).rev() {
            let frame = &ligand.frames[k];
            if let Some(t) = frame.active_torsion_index {
                self.gradient[6 + t] = self.frame_torque[k].dot(self.axis[k]);
            }
            let parent = frame.parent;
            let offset = self.origin[k] - self.origin[parent];
            let gf_k = self.frame_force[k];
            self.frame_force[parent] += gf_k;
            self.frame_torque[parent] += self.frame_torque[k] + offset.cross(gf_k);
        }

        self.gradient[0] = self.frame_force[0].x;
        self.gradient[1] = self.frame_force[0].y;
        self.gradient[2] = self.frame_force[0].z;
        self.gradient[3] = self.frame_torque[0].x;
        self.gradient[4] = self.frame_torque[0].y;
        self.gradient[5] = self.frame_torque[0].z;

        (true, e)
    }
}

/// Replays forward kinematics for `x` without touching the scoring
/// function or receptor, producing world coordinates for every heavy atom
/// *and* hydrogen (the evaluator only needs heavy atoms for scoring, but
/// the reported pose needs both -- SPEC_FULL.md section 4.4, `compose_result`).
pub fn compose_result(ligand: &Ligand, x: &[f64]) -> (Vec<Vec3>, Vec<Vec3>) {
    let mut origin = vec![Vec3::ZERO; ligand.num_frames];
    let mut orient = vec![Quaternion::default(); ligand.num_frames];
    let mut mats = vec![Mat3::IDENTITY; ligand.num_frames];
    let mut heavy = vec![Vec3::ZERO; ligand.num_heavy_atoms];
    let mut hydrogens = vec![Vec3::ZERO; ligand.num_hydrogens];

    origin[0] = Vec3::new(x[0], x[1], x[2]);
    orient[0] = Quaternion::new(x[3], x[4], x[5], x[6]);

    for k in 0..ligand.num_frames {
        let frame = &ligand.frames[k];
        let m = orient[k].to_mat3();
        mats[k] = m;
        for i in frame.heavy_atoms() {
            heavy[i] = origin[k] + m.apply(ligand.heavy_atoms[i].coord);
        }
        for i in frame.hydrogens() {
            hydrogens[i] = origin[k] + m.apply(ligand.hydrogens[i].coord);
        }
        for &b in &frame.branches {
            let child = &ligand.frames[b];
            origin[b] = origin[k] + m.apply(child.parent_rotor_y_to_current_rotor_y);
            if let Some(t) = child.active_torsion_index {
                let axis = m.apply(child.parent_rotor_x_to_current_rotor_y);
                let delta = axis_angle_to_quat(axis, x[7 + t]);
                orient[b] = (delta * orient[k]).normalized();
            } else {
                orient[b] = orient[k];
            }
        }
    }

    (heavy, hydrogens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ligand::parser::parse_str;
    use crate::testutil::{AnalyticBowlReceptor, HarmonicPairPotential, ZeroFieldReceptor};
    use approx::assert_relative_eq;
    use std::path::Path;

    fn sf() -> HarmonicPairPotential {
        HarmonicPairPotential::new(64.0, 1.0, 9.0)
    }

    fn rec() -> AnalyticBowlReceptor {
        // granularity 1.0 keeps grid points aligned with integer
        // coordinates, so tests can predict e000 without reimplementing
        // the floor-index lookup.
        AnalyticBowlReceptor::new(Vec3::ZERO, 50.0, 1.0)
    }

    fn atom_line(serial: i32, x: f64, y: f64, z: f64, code: &str) -> String {
        format!(
            "ATOM  {:>5}  {:<3} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    {:>6}{:<2}",
            serial, "C", x, y, z, "", code
        )
    }

    fn single_atom_ligand() -> Ligand {
        let text = format!("ROOT\n{}\nENDROOT\nTORSDOF 0\n", atom_line(1, 1.0, 2.0, 3.0, "C"));
        let sf = sf();
        parse_str(&text, Path::new("single.pdbqt"), &sf).unwrap()
    }

    fn two_frame_ligand() -> Ligand {
        let text = format!(
            "ROOT\n{}\n{}\nENDROOT\nBRANCH   1   3\n{}\nENDBRANCH   1   3\nTORSDOF 1\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.2, 0.0, 0.0, "C"),
            atom_line(3, 2.4, 0.0, 0.0, "C"),
        );
        let sf = sf();
        parse_str(&text, Path::new("two.pdbqt"), &sf).unwrap()
    }

    #[test]
    fn single_atom_energy_is_grid_value_at_its_position() {
        let ligand = single_atom_ligand();
        let sf = sf();
        let rec = rec();
        let x = vec![1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0];
        let mut ws = Workspace::new(&ligand);
        let (accepted, e) = ws.evaluate(&ligand, &x, &sf, &rec, 10.0, f64::INFINITY);
        assert!(accepted);
        let expected = 0.5 * (1.0f64.powi(2) + 2.0f64.powi(2) + 3.0f64.powi(2));
        assert_relative_eq!(e, expected, epsilon = 1e-6);
        assert_eq!(ws.gradient.len(), 6);
    }

    #[test]
    fn full_turn_rotation_returns_to_start() {
        let ligand = two_frame_ligand();
        let sf = sf();
        let rec = rec();
        let x0 = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let mut x1 = x0.clone();
        x1[7] = 2.0 * std::f64::consts::PI;

        let mut ws = Workspace::new(&ligand);
        ws.evaluate(&ligand, &x0, &sf, &rec, 10.0, f64::INFINITY);
        let c0: Vec<Vec3> = ws.heavy_coordinates().to_vec();
        ws.evaluate(&ligand, &x1, &sf, &rec, 10.0, f64::INFINITY);
        let c1: Vec<Vec3> = ws.heavy_coordinates().to_vec();

        for (a, b) in c0.iter().zip(c1.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-8);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-8);
            assert_relative_eq!(a.z, b.z, epsilon = 1e-8);
        }
    }

    #[test]
    fn forward_and_compose_result_agree() {
        let ligand = two_frame_ligand();
        let sf = sf();
        let rec = rec();
        let x = vec![0.3, -0.1, 0.2, 1.0, 0.0, 0.0, 0.0, 0.7];

        let mut ws = Workspace::new(&ligand);
        ws.evaluate(&ligand, &x, &sf, &rec, 10.0, f64::INFINITY);
        let (heavy, _hydrogens) = compose_result(&ligand, &x);

        for (a, b) in ws.heavy_coordinates().iter().zip(heavy.iter()) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-12);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-12);
            assert_relative_eq!(a.z, b.z, epsilon = 1e-12);
        }
    }

    #[test]
    fn gradient_matches_central_finite_difference() {
        // A zero-field receptor isolates this check to kinematics and the
        // intra-ligand pair potential, both smooth and exactly
        // differentiable (the grid term's forward-difference gradient is
        // only ever an approximation of its own piecewise-constant energy,
        // so central-differencing *that* would just measure discretization
        // error, not a kinematics/back-propagation bug).
        let ligand = two_frame_ligand();
        let sf = sf();
        let rec = ZeroFieldReceptor;
        let x = vec![0.2, 0.1, -0.3, 1.0, 0.0, 0.0, 0.0, 0.4];
        let delta = 1e-6;

        let mut ws = Workspace::new(&ligand);
        let (accepted, _e) = ws.evaluate(&ligand, &x, &sf, &rec, 10.0, f64::INFINITY);
        assert!(accepted);
        let analytic = ws.gradient.clone();

        // Only the position and torsion components are unconstrained reals;
        // the quaternion block is left fixed here since a directional
        // derivative along a raw quaternion component is not what `g[3..6]`
        // (a torque, expressed via the rotation-vector line-search update)
        // represents.
        for &idx in &[0usize, 1, 2, 7] {
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[idx] += delta;
            xm[idx] -= delta;
            let mut ws2 = Workspace::new(&ligand);
            let (_, ep) = ws2.evaluate(&ligand, &xp, &sf, &rec, 10.0, f64::INFINITY);
            let (_, em) = ws2.evaluate(&ligand, &xm, &sf, &rec, 10.0, f64::INFINITY);
            let fd = (ep - em) / (2.0 * delta);
            let analytic_idx = if idx < 3 { idx } else { idx - 1 };
            assert_relative_eq!(fd, analytic[analytic_idx], epsilon = 1e-4);
        }
    }

    #[test]
    fn rotation_invariance_of_pair_energy() {
        // Rotating the whole conformation about ROOT changes no pairwise
        // separation, so with a zero grid field the energy is unchanged.
        let ligand = two_frame_ligand();
        let sf = sf();
        let rec = ZeroFieldReceptor;
        let x0 = vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.5];
        let q = axis_angle_to_quat(Vec3::new(0.0, 0.0, 1.0), 1.1).normalized();
        let x1 = vec![0.0, 0.0, 0.0, q.w, q.x, q.y, q.z, 0.5];

        let mut ws = Workspace::new(&ligand);
        let (_, e0) = ws.evaluate(&ligand, &x0, &sf, &rec, 10.0, f64::INFINITY);
        let (_, e1) = ws.evaluate(&ligand, &x1, &sf, &rec, 10.0, f64::INFINITY);
        assert_relative_eq!(e0, e1, epsilon = 1e-9);
    }

    #[test]
    fn inactive_frame_contributes_no_conformation_variable() {
        let text = format!(
            "ROOT\n{}\nENDROOT\nBRANCH   1   2\n{}\n{}\nENDBRANCH   1   2\nTORSDOF 1\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.4, 0.0, 0.0, "OA"),
            atom_line(3, 1.9, 0.8, 0.0, "HD"),
        );
        let sf = sf();
        let ligand = parse_str(&text, Path::new("oh.pdbqt"), &sf).unwrap();
        assert_eq!(ligand.num_torsions, 1);
        assert_eq!(ligand.num_active_torsions, 0);
        // The -OH rotor exists in the tree but claims no slot in x or g.
        assert_eq!(ligand.num_conformation_vars(), 7);
        assert_eq!(ligand.num_gradient_vars(), 6);
    }
}
