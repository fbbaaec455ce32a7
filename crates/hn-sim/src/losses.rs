//! Heat lost to the soil per pipe over one hydraulic step.

use serde::{Deserialize, Serialize};

use crate::segments::PipeGrid;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipeLoss {
    /// Mean heat flow into the soil over the step (W).
    pub heat_loss_w: f64,
    /// `htc / (c_p·|ṁ|)`; undefined for a stagnant pipe.
    pub specific_loss: Option<f64>,
}

/// Running mean of each pipe's segment temperatures across substeps.
#[derive(Clone, Debug)]
pub struct LossAccumulator {
    sums: Vec<f64>,
    samples: usize,
}

impl LossAccumulator {
    pub fn new(pipe_count: usize) -> Self {
        Self {
            sums: vec![0.0; pipe_count],
            samples: 0,
        }
    }

    /// Add one substep's segment temperatures.
    pub fn record(&mut self, segments: &[Vec<f64>]) {
        for (sum, temps) in self.sums.iter_mut().zip(segments) {
            if !temps.is_empty() {
                *sum += temps.iter().sum::<f64>() / temps.len() as f64;
            }
        }
        self.samples += 1;
    }

    pub fn mean_temperature(&self, pipe: usize) -> Option<f64> {
        (self.samples > 0).then(|| self.sums[pipe] / self.samples as f64)
    }

    pub fn finish(&self, grids: &[PipeGrid], mass_flows: &[f64], soil: f64, cp: f64) -> Vec<PipeLoss> {
        grids
            .iter()
            .enumerate()
            .map(|(i, grid)| {
                let mean = self.mean_temperature(i).unwrap_or(soil);
                let m = mass_flows.get(i).copied().unwrap_or(0.0).abs();
                PipeLoss {
                    heat_loss_w: grid.htc * grid.segment_surface() * grid.count as f64 * (mean - soil),
                    specific_loss: (m > 0.0).then(|| grid.htc / (cp * m)),
                }
            })
            .collect()
    }
}
