//! Finite difference Jacobians of a [`NonlinearSystem`].

use crate::error::SolverResult;
use crate::system::NonlinearSystem;
use nalgebra::{DMatrix, DVector};

fn step(x: f64, epsilon: f64) -> f64 {
    epsilon * x.abs().max(1.0)
}

/// Forward differences: column j is `(F(x + h e_j) - F(x)) / h`.
pub fn finite_difference_jacobian<S>(
    system: &S,
    x: &DVector<f64>,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    S: NonlinearSystem + ?Sized,
{
    let f_x = system.residual(x)?;
    let mut jac = DMatrix::zeros(f_x.len(), x.len());

    let mut shifted = x.clone();
    for j in 0..x.len() {
        let h = step(x[j], epsilon);
        shifted[j] = x[j] + h;
        let f_h = system.residual(&shifted)?;
        shifted[j] = x[j];
        jac.set_column(j, &((f_h - &f_x) / h));
    }

    Ok(jac)
}

/// Central differences; twice the residual evaluations, second-order accurate.
pub fn central_difference_jacobian<S>(
    system: &S,
    x: &DVector<f64>,
    epsilon: f64,
) -> SolverResult<DMatrix<f64>>
where
    S: NonlinearSystem + ?Sized,
{
    let n = x.len();
    let mut jac = DMatrix::zeros(system.dimension(), n);

    let mut shifted = x.clone();
    for j in 0..n {
        let h = step(x[j], epsilon);
        shifted[j] = x[j] + h;
        let f_plus = system.residual(&shifted)?;
        shifted[j] = x[j] - h;
        let f_minus = system.residual(&shifted)?;
        shifted[j] = x[j];
        jac.set_column(j, &((f_plus - f_minus) / (2.0 * h)));
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// f(x, y) = (x^2 - y, 3 y)
    struct Parabola;

    impl NonlinearSystem for Parabola {
        fn dimension(&self) -> usize {
            2
        }

        fn residual(&self, x: &DVector<f64>) -> SolverResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] * x[0] - x[1], 3.0 * x[1]]))
        }
    }

    #[test]
    fn forward_difference_matches_derivative() {
        let x = DVector::from_vec(vec![3.0, 1.0]);
        let jac = finite_difference_jacobian(&Parabola, &x, 1e-7).unwrap();

        assert!((jac[(0, 0)] - 6.0).abs() < 1e-5);
        assert!((jac[(0, 1)] + 1.0).abs() < 1e-6);
        assert!(jac[(1, 0)].abs() < 1e-9);
        assert!((jac[(1, 1)] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn central_difference_is_exact_for_quadratics() {
        let x = DVector::from_vec(vec![-2.0, 5.0]);
        let jac = central_difference_jacobian(&Parabola, &x, 1e-5).unwrap();

        assert!((jac[(0, 0)] + 4.0).abs() < 1e-8);
        assert!((jac[(1, 1)] - 3.0).abs() < 1e-8);
    }

    #[test]
    fn default_trait_jacobian_uses_forward_differences() {
        let x = DVector::from_vec(vec![1.5, 0.0]);
        let jac = Parabola.jacobian(&x).unwrap();
        assert!((jac[(0, 0)] - 3.0).abs() < 1e-5);
    }
}
