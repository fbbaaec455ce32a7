use crate::HnError;

/// Floating point type used throughout system
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, HnError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(HnError::NonFinite { what, value: v })
    }
}

/// Flow-weighted mean of `(mass_flow, temperature)` streams.
///
/// Returns `None` when the summed flow is zero, leaving the fallback to the caller.
pub fn weighted_mean<I>(streams: I) -> Option<Real>
where
    I: IntoIterator<Item = (Real, Real)>,
{
    let (weighted, total) = streams
        .into_iter()
        .fold((0.0, 0.0), |(w, t), (m, temp)| (w + m * temp, t + m));
    if total == 0.0 {
        None
    } else {
        Some(weighted / total)
    }
}
