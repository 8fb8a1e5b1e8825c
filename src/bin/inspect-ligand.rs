use std::env;
use std::io;
use std::path::Path;
use std::process;

use ligdock_core::evaluate::compose_result;
use ligdock_core::io::write_pose;
use ligdock_core::ligand::atom::XsType;
use ligdock_core::ligand::parser::parse_file;
use ligdock_core::optimize::DockingResult;
use ligdock_core::scoring::ScoringFunction;

/// A production pair-scoring function is an external collaborator this
/// crate doesn't implement (SPEC_FULL.md section 1) -- all this demo needs
/// is something that never triggers an interacting-pair lookup, so the
/// cutoff is zero.
struct NoPairScoring;

impl ScoringFunction for NoPairScoring {
    fn nr(&self) -> usize {
        1
    }
    fn ns(&self) -> f64 {
        1.0
    }
    fn cutoff_sqr(&self) -> f64 {
        0.0
    }
    fn e(&self, _offset: usize) -> f64 {
        0.0
    }
    fn d(&self, _offset: usize) -> f64 {
        0.0
    }
    fn pair_index(&self, _xs_i: XsType, _xs_j: XsType) -> usize {
        0
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: inspect-ligand <ligand.pdbqt>");
        process::exit(1);
    }

    let path = Path::new(&args[1]);
    let sf = NoPairScoring;
    let ligand = match parse_file(path, &sf) {
        Ok(ligand) => ligand,
        Err(err) => {
            eprintln!("Error parsing {}: {}", path.display(), err);
            process::exit(1);
        }
    };

    eprintln!(
        "{}: {} heavy atoms, {} hydrogens, {} frames ({} active torsions), {} interacting pairs",
        path.display(),
        ligand.num_heavy_atoms,
        ligand.num_hydrogens,
        ligand.num_frames,
        ligand.num_active_torsions,
        ligand.pairs.len(),
    );

    // Identity conformation: ROOT at the origin, unrotated, every torsion
    // at zero -- this is a round-trip of the parsed geometry, not a docked
    // pose (no receptor/scoring function is wired up here).
    let mut x = vec![0.0; ligand.num_conformation_vars()];
    x[3] = 1.0;
    let (heavy_coordinates, hydrogen_coordinates) = compose_result(&ligand, &x);
    let result = DockingResult {
        energy: 0.0,
        x,
        heavy_coordinates,
        hydrogen_coordinates,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(err) = write_pose(&ligand, &result, 1, &mut handle) {
        eprintln!("Error writing pose: {}", err);
        process::exit(1);
    }
}
