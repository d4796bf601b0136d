use itertools::izip;
use log::{debug, info};
use ndarray::prelude::*;

use crate::response::operators::ConvergenceTargets;
use crate::response::solver::SolverStatus;
use crate::utils::Timer;

pub fn response_init(omega: f64, thresh: f64, targets: &ConvergenceTargets, maxiter: usize, kain: bool) {
    info!("{:^80}", "");
    info!("{: ^80}", "Frequency-dependent Response");
    info!("{:-^80}", "");
    info!("{: <25} {:.6}", "frequency:", omega);
    info!("{: <25} {:.1e}", "threshold:", thresh);
    info!("{: <25} {:.3e}", "relative target:", targets.relative);
    info!("{: <25} {:.3e}", "density target:", targets.density);
    info!("{: <25} {}", "max. iterations:", maxiter);
    info!("{: <25} {}", "KAIN acceleration:", kain);
    info!("{:^80}", "");
    info!(
        "{: <5} {: >8} {: >18} {: >18} {: >18}",
        "Iter.", "#active", "max. rel. res.", "max. dens. res.", "time [s]"
    );
    info!("{:-^75} ", "");
}

pub fn response_iteration(
    iter: usize,
    n_active: usize,
    relative: ArrayView1<f64>,
    density: ArrayView1<f64>,
    seconds: f64,
) {
    info!(
        "{: >5} {:>8} {:>18.10e} {:>18.10e} {:>18.3}",
        iter,
        n_active,
        relative.iter().cloned().fold(0.0, f64::max),
        density.iter().cloned().fold(0.0, f64::max),
        seconds
    );
}

pub fn state_residuals(norms: ArrayView1<f64>, relative: ArrayView1<f64>, density: ArrayView1<f64>) {
    for (b, (norm, rel, dens)) in izip!(norms.iter(), relative.iter(), density.iter()).enumerate() {
        debug!(
            "{: >8} {:>4} norm: {:>14.8} rel. res.: {:>12.4e} dens. res.: {:>12.4e}",
            "state", b, norm, rel, dens
        );
    }
}

pub fn print_tensor(name: &str, tensor: ArrayView2<f64>) {
    info!("{: <80}", name);
    for row in tensor.outer_iter() {
        let line: String = row.iter().map(|x| format!("{:>16.8}", x)).collect();
        info!("{}", line);
    }
}

pub fn response_end(timer: &Timer, status: SolverStatus, iterations: usize, polarizability: ArrayView2<f64>) {
    info!("{:-^75} ", "");
    let message: String = match status {
        SolverStatus::Converged => format!("response converged after {} iterations", iterations),
        SolverStatus::MaxIterExceeded => {
            format!("response not converged within {} iterations", iterations)
        }
        SolverStatus::Aborted => format!("response diverged, aborted at iteration {}", iterations),
    };
    info!("{: ^75}", message);
    info!("{:^80} ", "");
    print_tensor("polarizability:", polarizability);
    info!("{:-<80} ", "");
    info!("{}", timer);
}
