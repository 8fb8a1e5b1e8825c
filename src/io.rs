//! PDBQT-like pose output (SPEC_FULL.md section 6): rewrites a ligand's
//! original input lines with a relaxed conformation's coordinates, byte-
//! faithfully enough that every column outside the coordinate/occupancy
//! fields survives untouched.

use std::io::{self, Write};

use crate::geometry::Vec3;
use crate::ligand::atom::{classify_atom_type, is_hydrogen, XsType};
use crate::ligand::model::Ligand;
use crate::optimize::DockingResult;

/// The xs type column 77-78 encodes, or `None` if the parser would have
/// skipped this line for topology (an unsupported atom type) -- such a
/// line claims no slot in `heavy_coordinates`/`hydrogen_coordinates` and
/// must be written back verbatim, just as the parser never built an `Atom`
/// for it.
fn atom_xs_type(line: &str) -> Option<XsType> {
    classify_atom_type(&line[76..78])
}

fn is_atom_record(line: &str) -> bool {
    line.len() >= 6 && (&line[0..6] == "ATOM  " || &line[0..6] == "HETATM")
}

/// Rewrites columns `[30,54)` with `coord`'s three `%8.3f` fields and
/// `[70,76)` with the zero occupancy/temperature placeholder, leaving
/// everything else -- including columns `[0,30)`, `[54,70)` and
/// `[76,end)` -- exactly as read.
fn rewrite_atom_line(line: &str, coord: Vec3) -> String {
    let mut out = String::with_capacity(line.len());
    out.push_str(&line[0..30]);
    out.push_str(&format!("{:>8.3}{:>8.3}{:>8.3}", coord.x, coord.y, coord.z));
    out.push_str(&line[54..70]);
    out.push_str(" 0    ");
    out.push_str(&line[76..]);
    out
}

/// Writes one `MODEL n` / `ENDMDL` block: a `REMARK` line with the pose's
/// predicted free energy, then every original line verbatim except
/// `ATOM`/`HETATM` records (length >= 79), whose coordinate columns are
/// rewritten in heavy-atoms-first/hydrogens-last order -- the order
/// `result.heavy_coordinates`/`hydrogen_coordinates` are already in, since
/// that mirrors the order the parser encountered them in the same file.
pub fn write_pose(
    ligand: &Ligand,
    result: &DockingResult,
    model_number: u32,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "MODEL {}", model_number)?;
    writeln!(out, "REMARK {:>8.3} KCAL/MOL", result.energy)?;

    let mut heavy_idx = 0usize;
    let mut hydrogen_idx = 0usize;
    for line in &ligand.original_lines {
        let xs_type = if is_atom_record(line) && line.len() >= 79 {
            atom_xs_type(line)
        } else {
            None
        };
        match xs_type {
            Some(xs_type) if is_hydrogen(xs_type) => {
                let coord = result.hydrogen_coordinates[hydrogen_idx];
                hydrogen_idx += 1;
                writeln!(out, "{}", rewrite_atom_line(line, coord))?;
            }
            Some(_) => {
                let coord = result.heavy_coordinates[heavy_idx];
                heavy_idx += 1;
                writeln!(out, "{}", rewrite_atom_line(line, coord))?;
            }
            None => writeln!(out, "{}", line)?,
        }
    }

    writeln!(out, "ENDMDL")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ligand::parser::parse_str;
    use crate::testutil::HarmonicPairPotential;
    use std::path::Path;

    // A trailing space keeps these at 79 columns -- the minimum length
    // `write_pose` requires before it will treat a line as a rewritable
    // atom record (SPEC_FULL.md section 6).
    fn atom_line(serial: i32, x: f64, y: f64, z: f64, code: &str) -> String {
        format!(
            "ATOM  {:>5}  {:<3} LIG A   1    {:>8.3}{:>8.3}{:>8.3}  1.00  0.00    {:>6}{:<2} ",
            serial, "C", x, y, z, "", code
        )
    }

    #[test]
    fn pose_rewrite_preserves_non_coordinate_columns_and_wraps_in_model_block() {
        let sf = HarmonicPairPotential::new(64.0, 1.0, 9.0);
        let text = format!("ROOT\n{}\nENDROOT\nTORSDOF 0\n", atom_line(1, 0.0, 0.0, 0.0, "C"));
        let ligand = parse_str(&text, Path::new("single.pdbqt"), &sf).unwrap();

        let result = DockingResult {
            energy: -5.4321,
            x: vec![1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0],
            heavy_coordinates: vec![Vec3::new(1.0, 2.0, 3.0)],
            hydrogen_coordinates: vec![],
        };

        let mut buf = Vec::new();
        write_pose(&ligand, &result, 1, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.starts_with("MODEL 1\n"));
        assert!(text.contains("-5.432 KCAL/MOL"));
        assert!(text.contains("   1.000   2.000   3.000"));
        assert!(text.trim_end().ends_with("ENDMDL"));
        // Serial/name/residue columns (0..30) survive untouched.
        assert!(text.contains("ATOM      1  C   LIG A   1"));
    }

    #[test]
    fn non_atom_records_are_written_verbatim() {
        let sf = HarmonicPairPotential::new(64.0, 1.0, 9.0);
        let text = format!(
            "ROOT\n{}\nENDROOT\nTORSDOF 0\n",
            atom_line(1, 0.0, 0.0, 0.0, "C")
        );
        let ligand = parse_str(&text, Path::new("single.pdbqt"), &sf).unwrap();
        let result = DockingResult {
            energy: 0.0,
            x: vec![0.0; 7],
            heavy_coordinates: vec![Vec3::ZERO],
            hydrogen_coordinates: vec![],
        };

        let mut buf = Vec::new();
        write_pose(&ligand, &result, 1, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("\nROOT\n"));
        assert!(text.contains("ENDROOT"));
        assert!(text.contains("TORSDOF 0"));
    }

    #[test]
    fn unsupported_atom_type_line_is_written_verbatim_and_claims_no_coordinate_slot() {
        let sf = HarmonicPairPotential::new(64.0, 1.0, 9.0);
        let text = format!(
            "ROOT\n{}\n{}\nENDROOT\nTORSDOF 0\n",
            atom_line(1, 0.0, 0.0, 0.0, "C"),
            atom_line(2, 1.5, 0.0, 0.0, "XX"),
        );
        let ligand = parse_str(&text, Path::new("unsupported.pdbqt"), &sf).unwrap();
        assert_eq!(ligand.heavy_atoms.len(), 1);

        let result = DockingResult {
            energy: 0.0,
            x: vec![0.0; 7],
            heavy_coordinates: vec![Vec3::new(9.0, 9.0, 9.0)],
            hydrogen_coordinates: vec![],
        };

        let mut buf = Vec::new();
        write_pose(&ligand, &result, 1, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        // The sole heavy atom's coordinate was rewritten...
        assert!(text.contains("   9.000   9.000   9.000"));
        // ...while the unsupported-type line passed through untouched,
        // coordinates and all, rather than consuming a coordinate slot.
        assert!(text.contains("   1.500   0.000   0.000"));
    }
}
