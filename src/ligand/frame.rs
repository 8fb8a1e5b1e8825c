//! A node in the ligand's rigid-body tree: a contiguous run of heavy atoms
//! and hydrogens rigidly attached to each other, connected to its parent
//! frame by a single rotatable bond (the rotor).

use crate::geometry::Vec3;

/// Sentinel parent index used only by frame 0 (ROOT), which has no parent.
pub const ROOT: usize = 0;

#[derive(Debug, Clone)]
pub struct Frame {
    /// Index of the parent frame. `ROOT` (0) for the root frame, which
    /// points to itself.
    pub parent: usize,

    pub rotor_x_serial: i32,
    pub rotor_y_serial: i32,
    /// Index into the global heavy-atom array. Belongs to the *parent*
    /// frame.
    pub rotor_x_index: usize,
    /// Index into the global heavy-atom array. Belongs to *this* frame,
    /// and equals `heavy_begin` for every non-root frame.
    pub rotor_y_index: usize,

    pub heavy_begin: usize,
    pub heavy_end: usize,
    pub hydrogen_begin: usize,
    pub hydrogen_end: usize,

    pub branches: Vec<usize>,

    /// False if this frame carries no effective torsional degree of
    /// freedom: it owns only rotorY plus hydrogens (e.g. -OH, -NH2), whose
    /// rotation cannot change the scored energy.
    pub active: bool,

    /// Vector from the parent frame's rotor-Y to this frame's rotor-Y.
    /// World coordinates at parse time; re-expressed as a parent-local
    /// vector by the post-parse pass once all coordinates are frame-local.
    pub parent_rotor_y_to_current_rotor_y: Vec3,

    /// Unit vector along the rotor axis, in parent-local coordinates:
    /// `normalize(rotorY - rotorX)` at parse time.
    pub parent_rotor_x_to_current_rotor_y: Vec3,

    /// Index of this frame's torsion parameter within the active-torsion
    /// subsequence of the conformation vector, assigned once at parse
    /// time in frame order. `None` for ROOT and for inactive frames.
    pub active_torsion_index: Option<usize>,
}

impl Frame {
    pub fn root() -> Frame {
        Frame {
            parent: ROOT,
            rotor_x_serial: 0,
            rotor_y_serial: 0,
            rotor_x_index: 0,
            rotor_y_index: 0,
            heavy_begin: 0,
            heavy_end: 0,
            hydrogen_begin: 0,
            hydrogen_end: 0,
            branches: Vec::new(),
            active: false,
            parent_rotor_y_to_current_rotor_y: Vec3::ZERO,
            parent_rotor_x_to_current_rotor_y: Vec3::new(0.0, 0.0, 1.0),
            active_torsion_index: None,
        }
    }

    pub fn heavy_atoms(&self) -> std::ops::Range<usize> {
        self.heavy_begin..self.heavy_end
    }

    pub fn hydrogens(&self) -> std::ops::Range<usize> {
        self.hydrogen_begin..self.hydrogen_end
    }
}
