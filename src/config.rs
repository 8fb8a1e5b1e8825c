//! Tunables for the BFGS/Metropolis optimizer and the evaluator's soft
//! boundary penalty. Mirrors the teacher's `SetupFile` in spirit: a plain
//! serde-deserializable struct with a `Default` impl holding the literal
//! constants the spec pins down.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Outer Metropolis-style generations.
    pub num_generations: u32,
    /// Maximum BFGS iterations per generation before giving up.
    pub max_bfgs_iterations: u32,
    /// Number of step sizes tried per line search before the BFGS loop exits.
    pub num_alphas: u32,
    /// Initial line-search step size.
    pub initial_alpha: f64,
    /// Multiplier applied to alpha after each failed trial.
    pub alpha_decay: f64,
    /// Armijo sufficient-decrease coefficient (c1).
    pub armijo_c1: f64,
    /// Curvature (strong-Wolfe-like) coefficient (c2).
    pub wolfe_c2: f64,
    /// Energy penalty applied to an atom placed outside the receptor box.
    pub out_of_box_penalty: f64,
    /// Random number generator seed.
    pub seed: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            num_generations: 100,
            max_bfgs_iterations: 50,
            num_alphas: 5,
            initial_alpha: 1.0,
            alpha_decay: 0.1,
            armijo_c1: 0.0001,
            wolfe_c2: 0.9,
            out_of_box_penalty: 10.0,
            seed: 324_324,
        }
    }
}
