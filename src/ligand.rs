//! The ligand data model: parsed atoms, the rigid-fragment tree connecting
//! them, and the PDBQT-like reader that builds one from a flexible
//! small-molecule file (SPEC_FULL.md section 4.2).

pub mod atom;
pub mod frame;
pub mod model;
pub mod parser;
