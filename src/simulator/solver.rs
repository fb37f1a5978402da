use ode_solvers::{Dop853, Dopri5, System};

use crate::error::{OncoError, Result};
use crate::simulator::{Integrator, SolverOptions, T, V};

/// Integrate `system` from `ti` to `tf` starting at `x` and return the state at `tf`
///
/// The stepper is run with continuous output (`dx = 0`), so the last stored
/// state is the one at `tf`.
#[inline(always)]
pub fn integrate_segment<S>(system: S, x: V, ti: T, tf: T, options: SolverOptions) -> Result<V>
where
    S: System<T, V>,
{
    if ti > tf {
        return Err(OncoError::InvalidParameter(format!(
            "integration interval is reversed ({} > {})",
            ti, tf
        )));
    } else if ti == tf {
        return Ok(x);
    }

    match options.integrator {
        Integrator::Dopri5 => {
            let mut stepper = Dopri5::new(system, ti, tf, 0.0, x, options.rtol, options.atol);
            stepper
                .integrate()
                .map_err(|e| integration_failure(ti, tf, e))?;
            last_state(stepper.y_out(), ti, tf)
        }
        Integrator::Dop853 => {
            let mut stepper = Dop853::new(system, ti, tf, 0.0, x, options.rtol, options.atol);
            stepper
                .integrate()
                .map_err(|e| integration_failure(ti, tf, e))?;
            last_state(stepper.y_out(), ti, tf)
        }
    }
}

fn last_state(y_out: &[V], ti: T, tf: T) -> Result<V> {
    y_out.last().cloned().ok_or_else(|| OncoError::IntegrationFailure {
        time: ti,
        reason: format!("no output produced on [{}, {}]", ti, tf),
    })
}

fn integration_failure(ti: T, tf: T, err: impl std::fmt::Debug) -> OncoError {
    tracing::debug!("Integration failed on [{}, {}]: {:?}", ti, tf, err);
    OncoError::IntegrationFailure {
        time: ti,
        reason: format!("{:?}", err),
    }
}
