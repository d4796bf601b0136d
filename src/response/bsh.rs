use log::{debug, warn};
use ndarray::prelude::*;

use crate::error::ResponseError;
use crate::grid::QProjector;
use crate::response::operators::{GroundState, ResolventFamily, ResponseOperators};
use crate::response::state::{ActiveSet, ResponseState};

/// Energy shift that makes `e_i + omega + shift` negative for every occupied orbital.
///
/// The bound-state Helmholtz operator is only defined for negative energies. If the least
/// bound orbital plus the frequency is not negative, all energies are shifted such that
/// `e_homo + omega + shift = -margin`.
pub fn energy_shift(energies: ArrayView1<f64>, omega: f64, margin: f64) -> f64 {
    let e_homo: f64 = energies.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if e_homo + omega >= 0.0 {
        -margin - (omega + e_homo)
    } else {
        0.0
    }
}

/// The resolvent families of both channels together with the energy shift they were built with.
pub struct BshOperators<R> {
    pub x: R,
    /// `None` for the static response
    pub y: Option<R>,
    pub shift: f64,
}

impl<R: ResolventFamily> BshOperators<R> {
    /// Builds the `+omega` family for X and, for non-zero frequencies, the `-omega` family
    /// for Y. Both use the same shift.
    pub fn new<O>(operators: &O, ground: &GroundState, omega: f64, margin: f64) -> Self
    where
        O: ResponseOperators<Resolvent = R>,
    {
        let shift: f64 = energy_shift(ground.energies.view(), omega, margin);
        if shift != 0.0 {
            warn!(
                "e_homo + omega = {:.6} is not negative, orbital energies are shifted by {:.6}",
                ground.homo_energy() + omega,
                shift
            );
        }
        let x: R = operators.resolvent_family(shift, omega);
        let y: Option<R> = if omega != 0.0 {
            Some(operators.resolvent_family(shift, -omega))
        } else {
            None
        };
        Self { x, y, shift }
    }

    pub fn is_static(&self) -> bool {
        self.y.is_none()
    }
}

/// One BSH update of the response amplitudes.
///
/// `x_new = Q G(e_i + omega + shift) [-2 (V x + shift x + PQ)]` for every active state,
/// where `V x` is the effective action of the operator provider. Inactive states are
/// copied from `chi` unchanged.
pub fn bsh_update<O>(
    operators: &O,
    chi: &ResponseState,
    pq: &ResponseState,
    bsh: &BshOperators<O::Resolvent>,
    projector: &QProjector,
    active: &ActiveSet,
) -> Result<ResponseState, ResponseError>
where
    O: ResponseOperators,
{
    ResponseError::check_shape("perturbation", &chi.shape(), &pq.shape())?;
    if bsh.is_static() == chi.has_y() {
        return Err(ResponseError::ShapeMismatch {
            what: "response channels",
            expected: vec![if bsh.is_static() { 1 } else { 2 }],
            found: vec![chi.n_channels()],
        });
    }

    let theta: ResponseState = operators.effective_action(chi);
    chi.check_same_layout(&theta, "effective action")?;

    let x: Array3<f64> = propagate_channel(
        theta.x.view(),
        chi.x.view(),
        pq.x.view(),
        &bsh.x,
        bsh.shift,
        projector,
        active,
    );
    let y: Option<Array3<f64>> = match (bsh.y.as_ref(), theta.y.as_ref(), chi.y.as_ref()) {
        (Some(y_ops), Some(theta_y), Some(chi_y)) => Some(propagate_channel(
            theta_y.view(),
            chi_y.view(),
            pq.y_or_x(),
            y_ops,
            bsh.shift,
            projector,
            active,
        )),
        _ => None,
    };
    debug!("BSH update of {} active states", active.len());
    ResponseState::from_channels(x, y)
}

fn propagate_channel<R: ResolventFamily>(
    theta: ArrayView3<f64>,
    chi: ArrayView3<f64>,
    pq: ArrayView3<f64>,
    resolvents: &R,
    shift: f64,
    projector: &QProjector,
    active: &ActiveSet,
) -> Array3<f64> {
    let mut result: Array3<f64> = chi.to_owned();
    for b in active.indices() {
        for i in 0..chi.dim().1 {
            let mut source: Array1<f64> = theta.slice(s![b, i, ..]).to_owned();
            source.scaled_add(shift, &chi.slice(s![b, i, ..]));
            source += &pq.slice(s![b, i, ..]);
            source *= -2.0;
            let propagated: Array1<f64> = resolvents.apply(i, source.view());
            result
                .slice_mut(s![b, i, ..])
                .assign(&projector.apply(&propagated));
        }
    }
    result
}
