// config file
pub const CONFIG_FILE_NAME: &str = "response.toml";
// diagnostics are written to this file by the command line program
pub const OUTPUT_FILE_NAME: &str = "response.json";

// RESPONSE ITERATION
// frequency of the perturbing field in a.u., zero gives the static response
pub const FREQUENCY: f64 = 0.0;
// stop the response calculation after maxiter iterations
pub const MAX_ITER: usize = 25;
// requested convergence of the response densities
pub const DENSITY_CONV: f64 = 1.0e-4;
// thresholds of the precision protocol, the calculation is restarted at every stage
pub const PROTOCOL: [f64; 2] = [1.0e-4, 1.0e-6];
// number of atoms entering the density target, at least MIN_ATOMS_DENSITY_TARGET are used
pub const N_ATOMS: usize = 1;
pub const MIN_ATOMS_DENSITY_TARGET: usize = 5;
// relative residual target: thresh^a * 10^b
pub const RELATIVE_TARGET_EXPONENT: f64 = 0.50209;
pub const RELATIVE_TARGET_PREFACTOR_EXPONENT: f64 = -0.99162;
// the density target is never tighter than this multiple of the threshold
pub const DENSITY_THRESH_FACTOR: f64 = 10.0;

// if e_homo + omega >= 0 all orbital energies are shifted to e_homo + omega + shift = -SHIFT_MARGIN
pub const SHIFT_MARGIN: f64 = 0.05;

// the iteration is stopped if a density residual exceeds ABORT_FACTOR * density target
// after ABORT_WARMUP iterations
pub const ABORT_FACTOR: f64 = 20.0;
pub const ABORT_WARMUP: usize = 5;

// KAIN/Anderson subspace acceleration
pub const KAIN: bool = true;
pub const MAX_SUBSPACE: usize = 5;
// smallest singular value (relative to the largest residual overlap) that is kept
// when the subspace equations are solved
pub const SUBSPACE_SVD_EPS: f64 = 1.0e-12;

// the work distribution is rebalanced in the first iterations and then every n-th iteration
pub const LOAD_BALANCE_FIRST: usize = 2;
pub const LOAD_BALANCE_INTERVAL: usize = 10;

// CHECKPOINTS
pub const SAVE: bool = false;
pub const RESTART: bool = false;
pub const CHECKPOINT_FILE: &str = "restart_response.npz";
pub const CHECKPOINT_VERSION: u64 = 1;

pub const PRINT_LEVEL: usize = 1;

// MODEL PROBLEM
pub const MODEL_POINTS: usize = 48;
pub const MODEL_BOX_LENGTH: f64 = 12.0;
pub const MODEL_STATES: usize = 3;
pub const MODEL_ORBITAL_ENERGIES: [f64; 2] = [-0.9, -0.6];
pub const MODEL_POTENTIAL_DEPTH: f64 = 0.3;
// occupied orbitals are orthonormalized x^i exp(-a x^2) functions
pub const MODEL_ORBITAL_EXPONENT: f64 = 0.5;
pub const MODEL_KERNEL_STRENGTH: f64 = 0.05;
// fraction of exact exchange and local xc kernel weight for the different calculation types
pub const EXCHANGE_FRACTION_HF: f64 = 1.0;
pub const XC_KERNEL_WEIGHT: f64 = 0.5;
