//! Frequency-dependent linear response.
//!
//! The response amplitudes are found by a fixed-point iteration of bound-state
//! Helmholtz (BSH) updates that is accelerated with KAIN/Anderson mixing. States
//! converge individually and are frozen afterwards.
pub mod bsh;
pub mod diagnostics;
mod logging;
pub mod mixer;
pub mod model;
pub mod operators;
pub mod residuals;
pub mod solver;
pub mod state;

pub use diagnostics::{property_scale, property_tensor, Diagnostics, IterationRecord, StageDiagnostics};
pub use model::{GridModel, ModelProblem, PerturbationKind, ResponseKernel};
pub use operators::{
    project_perturbation, CalcType, ConvergenceTargets, GroundState, ObservableExtractor,
    PrecisionSchedule, Protocol, ResolventFamily, ResponseOperators, TransitionDensity,
};
pub use solver::{FrequencySolver, ResponseResult, SolverParameters, SolverStatus};
pub use state::{ActiveSet, Channel, ResponseState};
