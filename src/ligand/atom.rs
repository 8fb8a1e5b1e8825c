//! Atom classification: element, xs-type and the handful of boolean flags
//! the pair-potential and interacting-pair logic key off of.
//!
//! The element/xs-type table below follows the AutoDock "xs" atom typing
//! scheme that PDBQT-like inputs encode in columns 77-78 of each ATOM
//! record: a short code such as `C`, `A` (aromatic carbon), `N`, `NA`
//! (H-bond acceptor nitrogen), `OA`, `HD` (polar hydrogen), `SA`, halogens,
//! and so on. Only the classification needed by the evaluator and parser is
//! kept; the full periodic table is out of scope.

use crate::geometry::Vec3;

/// Interaction-type index used as a key into grid maps and the pair
/// potential table. Distinct xs types may share an element (e.g. aliphatic
/// vs aromatic carbon).
pub type XsType = u8;

pub const XS_C_ALIPHATIC: XsType = 0;
pub const XS_C_AROMATIC: XsType = 1;
pub const XS_N: XsType = 2;
pub const XS_N_DONOR: XsType = 3;
pub const XS_N_ACCEPTOR: XsType = 4;
pub const XS_O: XsType = 5;
pub const XS_O_DONOR: XsType = 6;
pub const XS_O_ACCEPTOR: XsType = 7;
pub const XS_S: XsType = 8;
pub const XS_P: XsType = 9;
pub const XS_F: XsType = 10;
pub const XS_CL: XsType = 11;
pub const XS_BR: XsType = 12;
pub const XS_I: XsType = 13;
pub const XS_METAL: XsType = 14;
pub const XS_H: XsType = 15;
pub const XS_H_POLAR: XsType = 16;
pub const NUM_XS_TYPES: usize = 17;

/// Nominal covalent radius in Angstrom, by xs type. Used only to build the
/// covalent-bond graph during parsing (`Atom::covalent_radius`).
fn covalent_radius(xs_type: XsType) -> f64 {
    match xs_type {
        XS_C_ALIPHATIC | XS_C_AROMATIC => 0.77,
        XS_N | XS_N_DONOR | XS_N_ACCEPTOR => 0.75,
        XS_O | XS_O_DONOR | XS_O_ACCEPTOR => 0.73,
        XS_S => 1.02,
        XS_P => 1.06,
        XS_F => 0.71,
        XS_CL => 0.99,
        XS_BR => 1.14,
        XS_I => 1.33,
        XS_METAL => 1.30,
        XS_H | XS_H_POLAR => 0.37,
        _ => 0.77,
    }
}

/// Parses the two-character PDBQT atom-type code (columns 77-78) into an
/// xs type plus the donor/acceptor/aromatic flags it implies. Returns
/// `None` for a code this crate does not recognize: per SPEC_FULL.md
/// section 4.2, unsupported atom types are skipped for topology rather
/// than guessed at, so the caller must not build an `Atom` for them.
pub fn classify_atom_type(code: &str) -> Option<XsType> {
    // The acceptor/donor split lives in the xs type itself for heavy atoms
    // (N/O split into donor/acceptor/plain variants); whether a *hydrogen*
    // is a donor hydrogen is a property of the heavy atom it is bonded to,
    // assigned by the parser once the bond graph is known.
    match code.trim() {
        "C" | "A" => Some(XS_C_ALIPHATIC),
        "N" => Some(XS_N),
        "NA" => Some(XS_N_ACCEPTOR),
        "NS" => Some(XS_N_DONOR),
        "OA" => Some(XS_O_ACCEPTOR),
        "OS" => Some(XS_O_DONOR),
        "O" => Some(XS_O),
        "SA" | "S" => Some(XS_S),
        "P" => Some(XS_P),
        "F" => Some(XS_F),
        "Cl" | "CL" => Some(XS_CL),
        "Br" | "BR" => Some(XS_BR),
        "I" => Some(XS_I),
        "Mg" | "MG" | "Ca" | "CA" | "Mn" | "MN" | "Fe" | "FE" | "Zn" | "ZN" => Some(XS_METAL),
        "HD" => Some(XS_H_POLAR),
        "H" => Some(XS_H),
        _ => None,
    }
}

pub fn is_hydrogen(xs_type: XsType) -> bool {
    xs_type == XS_H || xs_type == XS_H_POLAR
}

pub fn is_hetero(xs_type: XsType) -> bool {
    !is_hydrogen(xs_type) && xs_type != XS_C_ALIPHATIC && xs_type != XS_C_AROMATIC
}

pub fn is_hydrogen_bond_acceptor(xs_type: XsType) -> bool {
    matches!(
        xs_type,
        XS_N_ACCEPTOR | XS_O_ACCEPTOR | XS_O | XS_S | XS_METAL
    )
}

/// A single parsed atom, heavy or hydrogen. `coord` starts as the
/// absolute coordinate read from the input file and is translated exactly
/// once, during the parser's post-parse pass, to be relative to the
/// owning frame's rotor-Y origin.
#[derive(Debug, Clone, Copy)]
pub struct Atom {
    pub serial: i32,
    pub xs_type: XsType,
    pub coord: Vec3,
    pub is_hetero: bool,
    pub is_polar_hydrogen: bool,
    pub is_hydrogen_bond_donor: bool,
    /// Cleared the moment this atom is found covalently bonded to any
    /// hetero atom (and symmetrically for that hetero atom's neighbors).
    pub is_hydrophobic: bool,
}

impl Atom {
    /// Builds an atom from its PDBQT type code, or returns `None` if the
    /// code is unsupported -- the caller (the parser) must then skip this
    /// record for topology rather than add it under a guessed type.
    pub fn new(serial: i32, code: &str, coord: Vec3) -> Option<Atom> {
        let xs_type = classify_atom_type(code)?;
        Some(Atom {
            serial,
            xs_type,
            coord,
            is_hetero: is_hetero(xs_type),
            is_polar_hydrogen: xs_type == XS_H_POLAR,
            // Set by the parser once the covalent-bond graph is built: true
            // for a heavy atom found bonded to a polar hydrogen.
            is_hydrogen_bond_donor: false,
            is_hydrophobic: !is_hetero(xs_type) && !is_hydrogen(xs_type),
        })
    }

    pub fn is_hydrogen(&self) -> bool {
        is_hydrogen(self.xs_type)
    }

    pub fn covalent_radius(&self) -> f64 {
        covalent_radius(self.xs_type)
    }

    /// True if `self` and `other` are within covalent bonding distance,
    /// using the sum of nominal covalent radii plus a small fudge factor
    /// (0.45 A, the usual tolerance for slightly strained input geometry).
    pub fn is_covalently_bonded(&self, other: &Atom) -> bool {
        let cutoff = self.covalent_radius() + other.covalent_radius() + 0.45;
        (self.coord - other.coord).norm2() <= cutoff * cutoff
    }
}
