//! Error types surfaced at the two fallible boundaries of the crate:
//! ligand parsing and pose I/O (see SPEC_FULL.md section 7).

use std::path::PathBuf;
use thiserror::Error;

/// A malformed ligand structure. Carries the offending file path (and,
/// where available, the 1-based line number) so the dispatch layer can log
/// and skip the ligand rather than abort the whole run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{}: BRANCH block at line {line} has no heavy atoms", path.display())]
    EmptyBranch { path: PathBuf, line: usize },

    #[error("{}: ENDBRANCH at line {line} has no matching open BRANCH", path.display())]
    UnmatchedEndBranch { path: PathBuf, line: usize },

    #[error("{}: {count} BRANCH record(s) left unclosed at end of file", path.display())]
    UnclosedBranch { path: PathBuf, count: usize },

    #[error("{}: line {line}: rotorX atom serial {serial} not found in current frame", path.display())]
    MissingRotorX {
        path: PathBuf,
        line: usize,
        serial: i32,
    },

    #[error("{}: line {line}: malformed {record} record: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        record: &'static str,
        message: String,
    },
}

impl ParseError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ParseError::EmptyBranch { path, .. }
            | ParseError::UnmatchedEndBranch { path, .. }
            | ParseError::UnclosedBranch { path, .. }
            | ParseError::MissingRotorX { path, .. }
            | ParseError::MalformedRecord { path, .. } => path,
        }
    }
}

/// Top-level error for reading/writing ligand files, composing parse
/// failures with the underlying I/O error.
#[derive(Debug, Error)]
pub enum LigandError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error reading/writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
