//! PDBQT-like ligand parser and topology builder (SPEC_FULL.md section 4.2).
//!
//! Reads a flexible small-molecule structure one record at a time and
//! produces a [`Ligand`]: an ordered heavy-atom array, an ordered hydrogen
//! array, a tree of rigid [`Frame`]s connected by rotor bonds, and the
//! precomputed intra-ligand interacting-pair list.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LigandError, ParseError};
use crate::geometry::Vec3;
use crate::ligand::atom::Atom;
use crate::ligand::frame::{Frame, ROOT};
use crate::ligand::model::{InteractingPair, Ligand};
use crate::scoring::ScoringFunction;

const BOND_DEPTH: usize = 3;

struct Builder {
    path: PathBuf,
    heavy: Vec<Atom>,
    hydrogens: Vec<Atom>,
    frames: Vec<Frame>,
    /// Whether `frames[i].heavy_end`/`hydrogen_end` have already been set.
    /// A frame's ends are finalized either when its first child BRANCH
    /// opens (for frames with children) or at its own ENDBRANCH (for
    /// leaves) — never both, since the first event to occur is authoritative.
    finalized: Vec<bool>,
    /// Line number (1-based) at which `BRANCH` opened each frame, for
    /// error messages; `frames[0]` (ROOT) has no opening line.
    opened_at_line: Vec<usize>,
    /// Stack of currently-open *non-root* frame indices; empty means the
    /// current frame is ROOT, so `current()` never needs to panic on an
    /// empty stack.
    stack: Vec<usize>,
    /// Covalent-bond adjacency over heavy-atom global indices.
    bonds: Vec<Vec<usize>>,
    original_lines: Vec<String>,
}

impl Builder {
    fn new(path: &Path) -> Builder {
        Builder {
            path: path.to_path_buf(),
            heavy: Vec::new(),
            hydrogens: Vec::new(),
            frames: vec![Frame::root()],
            finalized: vec![false],
            opened_at_line: vec![0],
            stack: Vec::new(),
            bonds: Vec::new(),
            original_lines: Vec::new(),
        }
    }

    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(ROOT)
    }

    fn finalize(&mut self, frame_idx: usize) {
        if !self.finalized[frame_idx] {
            self.frames[frame_idx].heavy_end = self.heavy.len();
            self.frames[frame_idx].hydrogen_end = self.hydrogens.len();
            self.finalized[frame_idx] = true;
        }
    }

    fn malformed(&self, line_no: usize, record: &'static str, message: String) -> ParseError {
        ParseError::MalformedRecord {
            path: self.path.clone(),
            line: line_no,
            record,
            message,
        }
    }

    fn handle_atom(&mut self, line: &str, line_no: usize) -> Result<(), ParseError> {
        // Truncated atom records are kept in the line buffer (already
        // pushed by the caller) but skipped for topology.
        if line.len() < 78 {
            return Ok(());
        }
        let serial = line[6..11].trim().parse::<i32>().map_err(|e| {
            self.malformed(line_no, "ATOM", format!("invalid serial number: {e}"))
        })?;
        let x = line[30..38]
            .trim()
            .parse::<f64>()
            .map_err(|e| self.malformed(line_no, "ATOM", format!("invalid x coordinate: {e}")))?;
        let y = line[38..46]
            .trim()
            .parse::<f64>()
            .map_err(|e| self.malformed(line_no, "ATOM", format!("invalid y coordinate: {e}")))?;
        let z = line[46..54]
            .trim()
            .parse::<f64>()
            .map_err(|e| self.malformed(line_no, "ATOM", format!("invalid z coordinate: {e}")))?;
        let type_code = &line[76..78];

        // An unsupported atom type is kept in the line buffer (already
        // pushed by the caller) but skipped for topology: no `Atom` is
        // built, so it claims no slot in `heavy`/`hydrogens`, no frame
        // range, no bond, and no interacting pair (SPEC_FULL.md section 4.2).
        let atom = match Atom::new(serial, type_code, Vec3::new(x, y, z)) {
            Some(atom) => atom,
            None => return Ok(()),
        };
        let current = self.current();

        if atom.is_hydrogen() {
            self.hydrogens.push(atom);
            if atom.is_polar_hydrogen {
                let heavy_begin = self.frames[current].heavy_begin;
                if let Some(&donor_idx) = (heavy_begin..self.heavy.len())
                    .collect::<Vec<_>>()
                    .iter()
                    .rev()
                    .find(|&&k| self.heavy[k].is_covalently_bonded(&atom))
                {
                    if self.heavy[donor_idx].is_hetero {
                        self.heavy[donor_idx].is_hydrogen_bond_donor = true;
                    }
                }
            }
            return Ok(());
        }

        let heavy_begin = self.frames[current].heavy_begin;
        let new_index = self.heavy.len();
        self.heavy.push(atom);
        self.bonds.push(Vec::new());

        for k in heavy_begin..new_index {
            if self.heavy[k].is_covalently_bonded(&self.heavy[new_index]) {
                self.bonds[k].push(new_index);
                self.bonds[new_index].push(k);
                if self.heavy[k].is_hetero != self.heavy[new_index].is_hetero {
                    if self.heavy[k].is_hetero {
                        self.heavy[new_index].is_hydrophobic = false;
                    } else {
                        self.heavy[k].is_hydrophobic = false;
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_branch(&mut self, tokens: &[&str], line_no: usize) -> Result<(), ParseError> {
        let x = tokens[1]
            .parse::<i32>()
            .map_err(|e| self.malformed(line_no, "BRANCH", format!("invalid rotorX serial: {e}")))?;
        let y = tokens
            .get(2)
            .ok_or_else(|| self.malformed(line_no, "BRANCH", "missing rotorY serial".to_string()))?
            .parse::<i32>()
            .map_err(|e| self.malformed(line_no, "BRANCH", format!("invalid rotorY serial: {e}")))?;

        let current = self.current();
        self.finalize(current);

        let rotor_x_index = self.frames[current]
            .heavy_atoms()
            .find(|&k| self.heavy[k].serial == x)
            .ok_or_else(|| ParseError::MissingRotorX {
                path: self.path.clone(),
                line: line_no,
                serial: x,
            })?;

        let mut child = Frame::root();
        child.parent = current;
        child.rotor_x_serial = x;
        child.rotor_y_serial = y;
        child.rotor_x_index = rotor_x_index;
        child.rotor_y_index = self.heavy.len();
        child.heavy_begin = self.heavy.len();
        child.heavy_end = self.heavy.len();
        child.hydrogen_begin = self.hydrogens.len();
        child.hydrogen_end = self.hydrogens.len();
        child.active = true;

        let child_index = self.frames.len();
        self.frames.push(child);
        self.finalized.push(false);
        self.opened_at_line.push(line_no);
        self.frames[current].branches.push(child_index);
        self.stack.push(child_index);
        Ok(())
    }

    fn handle_endbranch(&mut self, line_no: usize) -> Result<(), ParseError> {
        if self.stack.is_empty() {
            return Err(ParseError::UnmatchedEndBranch {
                path: self.path.clone(),
                line: line_no,
            });
        }
        let frame_idx = self.current();
        self.finalize(frame_idx);

        if self.frames[frame_idx].heavy_begin == self.frames[frame_idx].heavy_end {
            return Err(ParseError::EmptyBranch {
                path: self.path.clone(),
                line: self.opened_at_line[frame_idx],
            });
        }

        if self.frames[frame_idx].heavy_end - self.frames[frame_idx].heavy_begin == 1 {
            self.frames[frame_idx].active = false;
        }

        let rotor_x_index = self.frames[frame_idx].rotor_x_index;
        let rotor_y_index = self.frames[frame_idx].rotor_y_index;
        self.bonds[rotor_x_index].push(rotor_y_index);
        self.bonds[rotor_y_index].push(rotor_x_index);

        let parent = self.frames[frame_idx].parent;
        let parent_rotor_y_index = self.frames[parent].rotor_y_index;
        let parent_rotor_y_coord = self.heavy[parent_rotor_y_index].coord;
        let current_rotor_y_coord = self.heavy[rotor_y_index].coord;
        let rotor_x_coord = self.heavy[rotor_x_index].coord;

        self.frames[frame_idx].parent_rotor_y_to_current_rotor_y =
            current_rotor_y_coord - parent_rotor_y_coord;
        self.frames[frame_idx].parent_rotor_x_to_current_rotor_y =
            (current_rotor_y_coord - rotor_x_coord).normalized();

        self.stack.pop();
        Ok(())
    }

    fn finish(mut self) -> Result<Ligand, ParseError> {
        if !self.stack.is_empty() {
            return Err(ParseError::UnclosedBranch {
                path: self.path.clone(),
                count: self.stack.len(),
            });
        }
        self.finalize(ROOT);

        // Post-parse pass 1: re-express coordinates relative to each
        // frame's own rotor-Y origin (ROOT's rotor-Y is atom 0).
        for frame in &self.frames {
            let origin = self.heavy[frame.rotor_y_index].coord;
            for i in frame.heavy_atoms() {
                self.heavy[i].coord -= origin;
            }
            for i in frame.hydrogens() {
                self.hydrogens[i].coord -= origin;
            }
        }

        let pairs = build_interacting_pairs(&self.frames, &self.heavy, &self.bonds);

        // Active-torsion indices are assigned once, here, in frame index
        // order -- the same order forward kinematics walks the tree in, so
        // this matches the torsion-counter `t` the evaluator increments
        // during its single forward pass (SPEC_FULL.md section 4.3).
        let mut next_active_torsion = 0usize;
        for frame in self.frames.iter_mut() {
            if frame.active {
                frame.active_torsion_index = Some(next_active_torsion);
                next_active_torsion += 1;
            }
        }

        let num_frames = self.frames.len();
        let num_torsions = num_frames - 1;
        let num_active_torsions = next_active_torsion;
        let num_heavy_atoms = self.heavy.len();

        Ok(Ligand {
            heavy_atoms: self.heavy,
            hydrogens: self.hydrogens,
            frames: self.frames,
            pairs,
            original_lines: self.original_lines,
            num_heavy_atoms,
            num_hydrogens: 0, // filled below; avoids borrow before move
            num_frames,
            num_torsions,
            num_active_torsions,
            num_heavy_atoms_inverse: 1.0 / num_heavy_atoms as f64,
        })
    }
}

fn reachable_within(bonds: &[Vec<usize>], start: usize, depth: usize) -> HashSet<usize> {
    let mut visited = HashSet::new();
    visited.insert(start);
    let mut frontier = vec![start];
    for _ in 0..depth {
        let mut next = Vec::new();
        for &n in &frontier {
            for &nb in &bonds[n] {
                if visited.insert(nb) {
                    next.push(nb);
                }
            }
        }
        frontier = next;
    }
    visited
}

fn build_interacting_pairs(
    frames: &[Frame],
    heavy: &[Atom],
    bonds: &[Vec<usize>],
) -> Vec<InteractingPair> {
    let mut pairs = Vec::new();
    for k1 in 0..frames.len() {
        for i in frames[k1].heavy_atoms() {
            let reach = reachable_within(bonds, i, BOND_DEPTH);
            for k2 in (k1 + 1)..frames.len() {
                let f2 = &frames[k2];
                for j in f2.heavy_atoms() {
                    if reach.contains(&j) {
                        continue;
                    }
                    let parent2 = f2.parent;
                    let cond1 = parent2 == k1 && (i == f2.rotor_x_index || j == f2.rotor_y_index);
                    let cond2 = k1 != ROOT
                        && parent2 != ROOT
                        && frames[k1].parent == parent2
                        && i == frames[k1].rotor_y_index
                        && j == f2.rotor_y_index;
                    let cond3 = parent2 != ROOT && {
                        let grandparent = frames[parent2].parent;
                        grandparent == k1
                            && i == frames[parent2].rotor_x_index
                            && j == f2.rotor_y_index
                    };
                    if cond1 || cond2 || cond3 {
                        continue;
                    }
                    pairs.push(InteractingPair { i, j, p_offset: 0 });
                }
            }
        }
    }
    let _ = heavy; // xs-type offsets are assigned by `assign_pair_offsets`.
    pairs
}

fn assign_pair_offsets(pairs: &mut [InteractingPair], heavy: &[Atom], sf: &dyn ScoringFunction) {
    for pair in pairs.iter_mut() {
        let xs_i = heavy[pair.i].xs_type;
        let xs_j = heavy[pair.j].xs_type;
        pair.p_offset = sf.nr() * sf.pair_index(xs_i, xs_j);
    }
}

/// Parses ligand text already read into memory. `path` is used only for
/// error messages (it need not exist on disk).
pub fn parse_str(text: &str, path: &Path, sf: &dyn ScoringFunction) -> Result<Ligand, ParseError> {
    let mut builder = Builder::new(path);

    for (zero_based, raw_line) in text.lines().enumerate() {
        let line_no = zero_based + 1;
        builder.original_lines.push(raw_line.to_string());

        let trimmed = raw_line.trim_start();
        let first_word = trimmed.split_whitespace().next().unwrap_or("");

        match first_word {
            "ROOT" | "ENDROOT" | "TORSDOF" => {}
            "BRANCH" => {
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                builder.handle_branch(&tokens, line_no)?;
            }
            "ENDBRANCH" => {
                builder.handle_endbranch(line_no)?;
            }
            _ => {
                if raw_line.len() >= 6 && (&raw_line[0..6] == "ATOM  " || &raw_line[0..6] == "HETATM") {
                    builder.handle_atom(raw_line, line_no)?;
                }
            }
        }
    }

    let num_hydrogens = builder.hydrogens.len();
    let mut ligand = builder.finish()?;
    ligand.num_hydrogens = num_hydrogens;
    assign_pair_offsets(&mut ligand.pairs, &ligand.heavy_atoms, sf);
    log::debug!(
        "parsed {}: {} heavy atoms, {} hydrogens, {} frames ({} active torsions), {} interacting pairs",
        path.display(),
        ligand.num_heavy_atoms,
        ligand.num_hydrogens,
        ligand.num_frames,
        ligand.num_active_torsions,
        ligand.pairs.len(),
    );
    Ok(ligand)
}

/// Reads and parses a ligand file from disk.
pub fn parse_file(path: &Path, sf: &dyn ScoringFunction) -> Result<Ligand, LigandError> {
    log::info!("reading ligand from {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| LigandError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_str(&text, path, sf).map_err(LigandError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::HarmonicPairPotential;

    fn sf() -> HarmonicPairPotential {
        HarmonicPairPotential::new(64.0, 1.0, 9.0)
    }

    fn atom_line(serial: i32, x: f64, y: f64, z: f64, code: &str) -> String {
        format!(
            "ATOM  {:>5}  {:<3} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    {:>6}{:<2}",
            serial, "C", x, y, z, "", code
        )
    }

    #[test]
    fn single_atom_ligand_has_one_frame_and_no_torsions() {
        let text = format!("ROOT\n{}\nENDROOT\nTORSDOF 0\n", atom_line(1, 0.0, 0.0, 0.0, "C"));
        let sf = sf();
        let ligand = parse_str(&text, Path::new("single.pdbqt"), &sf).unwrap();
        assert_eq!(ligand.num_frames, 1);
        assert_eq!(ligand.num_torsions, 0);
        assert_eq!(ligand.num_active_torsions, 0);
        assert_eq!(ligand.num_conformation_vars(), 7);
        assert_eq!(ligand.num_gradient_vars(), 6);
        assert_eq!(ligand.heavy_atoms.len(), 1);
    }

    #[test]
    fn two_frame_ligand_has_one_active_torsion() {
        let text = format!(
            "ROOT\n{}\n{}\nENDROOT\nBRANCH   1   3\n{}\nENDBRANCH   1   3\nTORSDOF 1\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.2, 0.0, 0.0, "C"),
            atom_line(3, 2.4, 0.0, 0.0, "C"),
        );
        let sf = sf();
        let ligand = parse_str(&text, Path::new("two.pdbqt"), &sf).unwrap();
        assert_eq!(ligand.num_frames, 2);
        assert_eq!(ligand.num_torsions, 1);
        assert_eq!(ligand.num_active_torsions, 1);
        assert_eq!(ligand.num_conformation_vars(), 8);

        let child = &ligand.frames[1];
        assert_eq!(child.parent, 0);
        assert!(child.parent < 1);
        assert_eq!(child.rotor_y_index, child.heavy_begin);
        assert!((child.parent_rotor_x_to_current_rotor_y.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hydroxyl_frame_is_marked_inactive() {
        // O at (1.4,0,0) bonded to C at origin, H at (1.9,0.8,0) bonded to O.
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
        assert!(!ligand.frames[1].active);
        assert!(ligand.heavy_atoms[1].is_hydrogen_bond_donor);
    }

    #[test]
    fn empty_branch_is_rejected_with_file_name_in_message() {
        let text = format!(
            "ROOT\n{}\nENDROOT\nBRANCH   4   9\nENDBRANCH   4   9\n",
            atom_line(4, 0.0, 0.0, 0.0, "C"),
        );
        let sf = sf();
        let err = parse_str(&text, Path::new("/tmp/broken.pdbqt"), &sf).unwrap_err();
        assert!(matches!(err, ParseError::EmptyBranch { .. }));
        let message = err.to_string();
        assert!(message.contains("broken.pdbqt"), "message was: {message}");
    }

    #[test]
    fn pair_list_excludes_atoms_within_three_bonds() {
        // A 4-carbon chain with no branches: all pairs are within 3 bonds
        // of each other (serials 1-2-3-4), so no interacting pairs exist.
        let text = format!(
            "ROOT\n{}\n{}\n{}\n{}\nENDROOT\nTORSDOF 0\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.5, 0.0, 0.0, "C"),
            atom_line(3, 3.0, 0.0, 0.0, "C"),
            atom_line(4, 4.5, 0.0, 0.0, "C"),
        );
        let sf = sf();
        let ligand = parse_str(&text, Path::new("chain.pdbqt"), &sf).unwrap();
        assert!(ligand.pairs.is_empty());
    }

    #[test]
    fn frame_tree_well_formedness_holds() {
        let text = format!(
            "ROOT\n{}\nENDROOT\nBRANCH   1   2\n{}\nENDBRANCH   1   2\nBRANCH   1   3\n{}\nENDBRANCH   1   3\nTORSDOF 2\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.5, 0.0, 0.0, "C"),
            atom_line(3, 0.0, 1.5, 0.0, "C"),
        );
        let sf = sf();
        let ligand = parse_str(&text, Path::new("branched.pdbqt"), &sf).unwrap();

        let mut seen_heavy = vec![false; ligand.heavy_atoms.len()];
        for (idx, frame) in ligand.frames.iter().enumerate() {
            if idx != ROOT {
                assert!(frame.parent < idx);
            }
            for h in frame.heavy_atoms() {
                assert!(!seen_heavy[h], "heavy atom {h} owned by more than one frame");
                seen_heavy[h] = true;
            }
            if idx != ROOT {
                assert_eq!(frame.rotor_y_index, frame.heavy_begin);
                assert!((frame.parent_rotor_x_to_current_rotor_y.norm() - 1.0).abs() < 1e-9);
            }
        }
        assert!(seen_heavy.iter().all(|&seen| seen));
    }

    #[test]
    fn unsupported_atom_type_is_kept_in_line_buffer_but_skipped_for_topology() {
        // "XX" is not a recognized xs-type code.
        let text = format!(
            "ROOT\n{}\n{}\nENDROOT\nTORSDOF 0\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.5, 0.0, 0.0, "XX"),
        );
        let sf = sf();
        let ligand = parse_str(&text, Path::new("unsupported.pdbqt"), &sf).unwrap();
        assert_eq!(ligand.heavy_atoms.len(), 1);
        assert_eq!(ligand.hydrogens.len(), 0);
        assert!(ligand.pairs.is_empty());
        // The raw line survives for output rewriting even though it
        // contributed no Atom.
        assert!(ligand.original_lines.iter().any(|l| l.contains("XX")));
    }
}
