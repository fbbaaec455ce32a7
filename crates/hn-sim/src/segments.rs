//! Axial discretization of pipes into equal-length segments.

use hn_graph::{Network, Pipe};

/// Number of equal segments so that none exceeds `max_length`; at least one.
pub fn segment_count(length: f64, max_length: f64) -> usize {
    ((length / max_length).ceil() as usize).max(1)
}

/// Geometry of a discretized pipe.
#[derive(Clone, Debug, PartialEq)]
pub struct PipeGrid {
    pub count: usize,
    /// Segment length (m).
    pub dx: f64,
    /// Inner diameter (m).
    pub diameter: f64,
    /// Heat transfer coefficient (W/(m² K)).
    pub htc: f64,
}

impl PipeGrid {
    pub fn new(pipe: &Pipe, max_length: f64) -> Self {
        let length = pipe.length_m();
        let count = segment_count(length, max_length);
        Self {
            count,
            dx: length / count as f64,
            diameter: pipe.diameter_m(),
            htc: pipe.params.htc,
        }
    }

    pub fn length(&self) -> f64 {
        self.dx * self.count as f64
    }

    pub fn flow_area(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.diameter / 4.0
    }

    /// Inner surface of one segment (m²).
    pub fn segment_surface(&self) -> f64 {
        std::f64::consts::PI * self.diameter * self.dx
    }

    /// Axial position of every segment centre, measured from the pipe start.
    pub fn centres(&self) -> Vec<f64> {
        (0..self.count)
            .map(|i| (i as f64 + 0.5) * self.dx)
            .collect()
    }
}

pub fn grids(network: &Network, max_length: f64) -> Vec<PipeGrid> {
    network
        .pipes()
        .iter()
        .map(|p| PipeGrid::new(p, max_length))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_multiple() {
        assert_eq!(segment_count(100.0, 10.0), 10);
        assert_eq!(segment_count(101.0, 10.0), 11);
        assert_eq!(segment_count(0.5, 10.0), 1);
    }

    proptest! {
        #[test]
        fn segments_never_exceed_bound(length in 0.1f64..5000.0, max in 0.5f64..50.0) {
            let n = segment_count(length, max);
            prop_assert!(n >= 1);
            prop_assert!(length / n as f64 <= max * (1.0 + 1e-12));
            if n > 1 {
                prop_assert!(length / (n - 1) as f64 > max);
            }
        }
    }
}
