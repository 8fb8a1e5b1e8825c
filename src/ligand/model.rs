//! The immutable ligand data model produced by the parser: atoms, the
//! frame tree, and the precomputed intra-ligand interacting-pair list.

use crate::ligand::atom::Atom;
use crate::ligand::frame::Frame;

/// An admitted intra-ligand pair, separated by more than three covalent
/// bonds and not excluded by rotor adjacency (see parser.rs).
#[derive(Debug, Clone, Copy)]
pub struct InteractingPair {
    pub i: usize,
    pub j: usize,
    /// Base index into the scoring function's tabulated `e`/`d` arrays,
    /// `scoring_function.nr * pair_index(xs_i, xs_j)`.
    pub p_offset: usize,
}

#[derive(Debug, Clone)]
pub struct Ligand {
    pub heavy_atoms: Vec<Atom>,
    pub hydrogens: Vec<Atom>,
    /// `frames[0]` is ROOT.
    pub frames: Vec<Frame>,
    pub pairs: Vec<InteractingPair>,
    /// The original input lines, used to rewrite coordinate columns when
    /// composing output poses. Lines that describe atoms are matched back
    /// up by the order they were encountered (heavy atoms first, then
    /// hydrogens, mirroring the ATOM/HETATM dispatch on column 77 == 'H').
    pub original_lines: Vec<String>,

    pub num_heavy_atoms: usize,
    pub num_hydrogens: usize,
    pub num_frames: usize,
    /// Total non-root frames, i.e. total rotor bonds (active + inactive).
    pub num_torsions: usize,
    pub num_active_torsions: usize,
    pub num_heavy_atoms_inverse: f64,
}

impl Ligand {
    /// Length of the conformation vector x: position (3) + orientation
    /// quaternion (4) + one parameter per active torsion.
    pub fn num_conformation_vars(&self) -> usize {
        7 + self.num_active_torsions
    }

    /// Length of the gradient vector g: force (3) + torque (3) + one
    /// projected torque per active torsion.
    pub fn num_gradient_vars(&self) -> usize {
        6 + self.num_active_torsions
    }
}
