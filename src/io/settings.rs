use serde::{Deserialize, Serialize};

use crate::defaults::*;
use crate::response::model::PerturbationKind;
use crate::response::operators::{CalcType, Protocol};

fn default_frequency() -> f64 {
    FREQUENCY
}
fn default_maxiter() -> usize {
    MAX_ITER
}
fn default_kain() -> bool {
    KAIN
}
fn default_maxsub() -> usize {
    MAX_SUBSPACE
}
fn default_dconv() -> f64 {
    DENSITY_CONV
}
fn default_protocol() -> Vec<f64> {
    PROTOCOL.to_vec()
}
fn default_n_atoms() -> usize {
    N_ATOMS
}
fn default_save() -> bool {
    SAVE
}
fn default_restart() -> bool {
    RESTART
}
fn default_checkpoint_file() -> String {
    String::from(CHECKPOINT_FILE)
}
fn default_print_level() -> usize {
    PRINT_LEVEL
}
fn default_abort_factor() -> f64 {
    ABORT_FACTOR
}
fn default_abort_warmup() -> usize {
    ABORT_WARMUP
}
fn default_shift_margin() -> f64 {
    SHIFT_MARGIN
}
fn default_calc_type() -> CalcType {
    CalcType::Hf
}
fn default_n_points() -> usize {
    MODEL_POINTS
}
fn default_box_length() -> f64 {
    MODEL_BOX_LENGTH
}
fn default_n_states() -> usize {
    MODEL_STATES
}
fn default_orbital_energies() -> Vec<f64> {
    MODEL_ORBITAL_ENERGIES.to_vec()
}
fn default_orbital_exponent() -> f64 {
    MODEL_ORBITAL_EXPONENT
}
fn default_potential_depth() -> f64 {
    MODEL_POTENTIAL_DEPTH
}
fn default_kernel_strength() -> f64 {
    MODEL_KERNEL_STRENGTH
}
fn default_perturbation() -> PerturbationKind {
    PerturbationKind::Dipole
}
fn default_response_config() -> ResponseConfig {
    ResponseConfig::default()
}
fn default_model_config() -> ModelConfig {
    ModelConfig::default()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Configuration {
    #[serde(default = "default_response_config")]
    pub response: ResponseConfig,
    #[serde(default = "default_model_config")]
    pub model: ModelConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            response: default_response_config(),
            model: default_model_config(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResponseConfig {
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_maxiter")]
    pub maxiter: usize,
    #[serde(default = "default_kain")]
    pub kain: bool,
    #[serde(default = "default_maxsub")]
    pub maxsub: usize,
    #[serde(default = "default_dconv")]
    pub dconv: f64,
    #[serde(default = "default_protocol")]
    pub protocol: Vec<f64>,
    #[serde(default = "default_n_atoms")]
    pub n_atoms: usize,
    #[serde(default = "default_save")]
    pub save: bool,
    #[serde(default = "default_checkpoint_file")]
    pub save_file: String,
    #[serde(default = "default_restart")]
    pub restart: bool,
    #[serde(default = "default_checkpoint_file")]
    pub restart_file: String,
    #[serde(default = "default_print_level")]
    pub print_level: usize,
    #[serde(default = "default_abort_factor")]
    pub abort_factor: f64,
    #[serde(default = "default_abort_warmup")]
    pub abort_warmup: usize,
    #[serde(default = "default_shift_margin")]
    pub shift_margin: f64,
    #[serde(default = "default_calc_type")]
    pub calc_type: CalcType,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            maxiter: default_maxiter(),
            kain: default_kain(),
            maxsub: default_maxsub(),
            dconv: default_dconv(),
            protocol: default_protocol(),
            n_atoms: default_n_atoms(),
            save: default_save(),
            save_file: default_checkpoint_file(),
            restart: default_restart(),
            restart_file: default_checkpoint_file(),
            print_level: default_print_level(),
            abort_factor: default_abort_factor(),
            abort_warmup: default_abort_warmup(),
            shift_margin: default_shift_margin(),
            calc_type: default_calc_type(),
        }
    }
}

impl ResponseConfig {
    /// The stages of the precision protocol in the order in which they are run.
    pub fn protocol_stages(&self) -> Vec<Protocol> {
        self.protocol
            .iter()
            .map(|thresh| Protocol {
                thresh: *thresh,
                dconv: self.dconv,
                n_atoms: self.n_atoms,
            })
            .collect()
    }
}

/// Parameters of the one-dimensional model system.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_n_points")]
    pub n_points: usize,
    #[serde(default = "default_box_length")]
    pub box_length: f64,
    /// number of perturbing operators
    #[serde(default = "default_n_states")]
    pub n_states: usize,
    #[serde(default = "default_perturbation")]
    pub perturbation: PerturbationKind,
    #[serde(default = "default_orbital_energies")]
    pub orbital_energies: Vec<f64>,
    #[serde(default = "default_orbital_exponent")]
    pub orbital_exponent: f64,
    #[serde(default = "default_potential_depth")]
    pub potential_depth: f64,
    #[serde(default = "default_kernel_strength")]
    pub kernel_strength: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_points: default_n_points(),
            box_length: default_box_length(),
            n_states: default_n_states(),
            perturbation: default_perturbation(),
            orbital_energies: default_orbital_energies(),
            orbital_exponent: default_orbital_exponent(),
            potential_depth: default_potential_depth(),
            kernel_strength: default_kernel_strength(),
        }
    }
}
