//! Seams between the hydraulic equations and the root finder.

use nalgebra::{DMatrix, DVector};

use crate::error::SolverResult;
use crate::jacobian::finite_difference_jacobian;
use crate::newton::NewtonResult;

/// A square system of nonlinear equations `F(x) = 0`.
pub trait NonlinearSystem {
    /// Number of unknowns, equal to the number of equations.
    fn dimension(&self) -> usize;

    fn residual(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>>;

    /// Jacobian of the residual at `x`. Defaults to forward differences.
    fn jacobian(&self, x: &DVector<f64>) -> SolverResult<DMatrix<f64>> {
        finite_difference_jacobian(self, x, 1e-7)
    }
}

/// A multivariate root finder.
///
/// Implementations return their best estimate together with a convergence
/// flag; failing to reach the tolerance is not an error.
pub trait RootFinder {
    fn find_root(
        &self,
        system: &dyn NonlinearSystem,
        x0: DVector<f64>,
    ) -> SolverResult<NewtonResult>;
}
