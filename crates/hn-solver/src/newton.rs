//! Damped Newton root finder.

use crate::error::{SolverError, SolverResult};
use crate::system::{NonlinearSystem, RootFinder};
use nalgebra::DVector;
use tracing::{debug, warn};

/// Newton solver configuration.
#[derive(Clone, Debug)]
pub struct NewtonConfig {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Absolute tolerance for residual norm
    pub abs_tol: f64,
    /// Relative tolerance for residual norm
    pub rel_tol: f64,
    /// Line search backtracking factor
    pub line_search_beta: f64,
    /// Maximum line search iterations
    pub max_line_search_iters: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            abs_tol: 1e-6,
            rel_tol: 1e-10,
            line_search_beta: 0.5,
            max_line_search_iters: 30,
        }
    }
}

/// Newton iteration result.
#[derive(Clone, Debug)]
pub struct NewtonResult {
    /// Solution vector (best estimate when not converged)
    pub x: DVector<f64>,
    /// Final residual norm
    pub residual_norm: f64,
    /// Number of iterations
    pub iterations: usize,
    /// Converged flag
    pub converged: bool,
}

/// Newton iteration with backtracking line search.
///
/// Stops with `converged = false` when the iteration budget is exhausted or the
/// line search stagnates; the returned `x` is then the lowest-residual iterate.
/// Only a singular Jacobian or a non-finite residual is reported as an error.
pub fn newton_solve<S>(
    system: &S,
    x0: DVector<f64>,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult>
where
    S: NonlinearSystem + ?Sized,
{
    let mut x = x0;
    let mut r = finite_residual(system, &x)?;
    let mut r_norm = r.norm();
    let r0_norm = r_norm;

    for iter in 0..config.max_iterations {
        if r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm {
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
                converged: true,
            });
        }

        let jac = system.jacobian(&x)?;

        // Solve J * dx = -r
        let dx = jac.lu().solve(&(-&r)).ok_or_else(|| SolverError::Numeric {
            what: format!("singular Jacobian at iteration {iter}"),
        })?;

        let mut alpha = 1.0;
        let mut x_new = &x + &dx;
        let mut r_new = finite_residual(system, &x_new)?;
        let mut r_new_norm = r_new.norm();

        let mut ls = 0;
        while r_new_norm >= r_norm && ls < config.max_line_search_iters {
            alpha *= config.line_search_beta;
            x_new = &x + alpha * &dx;
            r_new = finite_residual(system, &x_new)?;
            r_new_norm = r_new.norm();
            ls += 1;
        }

        if r_new_norm >= r_norm {
            warn!(
                iteration = iter,
                residual = r_norm,
                "line search stagnated; using best estimate"
            );
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
                converged: false,
            });
        }

        debug!(iteration = iter, residual = r_new_norm, alpha, "newton step");
        x = x_new;
        r = r_new;
        r_norm = r_new_norm;
    }

    let converged = r_norm < config.abs_tol || r_norm < config.rel_tol * r0_norm;
    if !converged {
        warn!(
            iterations = config.max_iterations,
            residual = r_norm,
            "newton iteration limit reached; using best estimate"
        );
    }
    Ok(NewtonResult {
        x,
        residual_norm: r_norm,
        iterations: config.max_iterations,
        converged,
    })
}

fn finite_residual<S>(system: &S, x: &DVector<f64>) -> SolverResult<DVector<f64>>
where
    S: NonlinearSystem + ?Sized,
{
    let r = system.residual(x)?;
    if r.iter().all(|v| v.is_finite()) {
        Ok(r)
    } else {
        Err(SolverError::Numeric {
            what: "non-finite residual".to_string(),
        })
    }
}

/// [`RootFinder`] backed by [`newton_solve`].
#[derive(Clone, Debug, Default)]
pub struct NewtonSolver {
    pub config: NewtonConfig,
}

impl NewtonSolver {
    pub fn new(config: NewtonConfig) -> Self {
        Self { config }
    }
}

impl RootFinder for NewtonSolver {
    fn find_root(
        &self,
        system: &dyn NonlinearSystem,
        x0: DVector<f64>,
    ) -> SolverResult<NewtonResult> {
        if x0.len() != system.dimension() {
            return Err(SolverError::ProblemSetup {
                what: format!(
                    "start vector has {} entries, system has {} unknowns",
                    x0.len(),
                    system.dimension()
                ),
            });
        }
        newton_solve(system, x0, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quadratic;

    impl NonlinearSystem for Quadratic {
        fn dimension(&self) -> usize {
            1
        }

        fn residual(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        }
    }

    /// x^2 + 1 = 0 has no real root.
    struct NoRoot;

    impl NonlinearSystem for NoRoot {
        fn dimension(&self) -> usize {
            1
        }

        fn residual(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] + 1.0))
        }
    }

    #[test]
    fn simple_quadratic() {
        let result = NewtonSolver::default()
            .find_root(&Quadratic, DVector::from_element(1, 3.0))
            .unwrap();

        assert!(result.converged);
        assert!((result.x[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn no_root_returns_best_estimate() {
        let config = NewtonConfig {
            max_iterations: 20,
            ..NewtonConfig::default()
        };
        let result = newton_solve(&NoRoot, DVector::from_element(1, 0.7), &config).unwrap();

        assert!(!result.converged);
        assert!(result.residual_norm >= 1.0);
        assert!(result.residual_norm < 1.49 + 1e-9);
    }

    #[test]
    fn already_converged_start_is_untouched() {
        let result = NewtonSolver::default()
            .find_root(&Quadratic, DVector::from_element(1, 2.0))
            .unwrap();
        assert!(result.converged);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.x[0], 2.0);
    }

    #[test]
    fn dimension_mismatch_is_setup_error() {
        let err = NewtonSolver::default()
            .find_root(&Quadratic, DVector::zeros(2))
            .unwrap_err();
        assert!(matches!(err, SolverError::ProblemSetup { .. }));
    }
}
