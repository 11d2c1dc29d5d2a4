//! Per-element randomization of parameter values
//!
//! Multi-value evaluation can perturb each cell of an input before the
//! matrix operations run. The perturbation is controlled per binding
//! by [`ParameterMetaData`]: the drawn value is
//! `relative_mean * v + s * deviation`, with `s` a standard normal
//! draw and the deviation optionally scaled by the value itself.
//! Results can be clamped to a band of `clamp_factor` deviations
//! around the mean.

use ndarray::Array2;
use rand::prelude::*;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::model::RangeSel;

/// Source of standard normal draws for randomized evaluation.
///
/// The engine pulls one draw per matrix cell. Implementations other
/// than [`NormalRandomizer`] are mostly useful in tests, where fixed
/// sequences make results exact.
pub trait Randomizer {
    /// The next standard normal draw.
    fn sample(&mut self) -> f64;
}

/// Standard normal randomizer backed by a seedable RNG.
#[derive(Debug, Clone)]
pub struct NormalRandomizer {
    rng: StdRng,
}

impl NormalRandomizer {
    /// Create a randomizer seeded from system entropy.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a randomizer with a fixed seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for NormalRandomizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Randomizer for NormalRandomizer {
    fn sample(&mut self) -> f64 {
        StandardNormal.sample(&mut self.rng)
    }
}

/// How the deviation setting is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviationMode {
    /// The deviation is used as-is.
    Absolute,

    /// The deviation is multiplied by the cell value.
    Relative,
}

/// Per-binding settings for multi-value evaluation.
///
/// Carried by every parameter binding; only consulted in multi-value
/// mode. The row/column ranges select a window of a table-backed
/// parameter's value before randomization applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetaData {
    /// Whether this binding's values are perturbed at all.
    pub randomize: bool,

    /// Factor applied to the value to form the draw's mean.
    pub relative_mean: f64,

    /// Width of the perturbation.
    pub deviation: f64,

    /// Interpretation of `deviation`.
    pub deviation_mode: DeviationMode,

    /// Whether draws are clamped around the mean.
    pub clamp: bool,

    /// Half-width of the clamp band, in deviations.
    pub clamp_factor: f64,

    /// Row window into a table-backed value.
    pub rows: RangeSel,

    /// Column window into a table-backed value.
    pub cols: RangeSel,
}

impl Default for ParameterMetaData {
    fn default() -> Self {
        Self {
            randomize: false,
            relative_mean: 1.0,
            deviation: 0.0,
            deviation_mode: DeviationMode::Absolute,
            clamp: false,
            clamp_factor: 1.0,
            rows: RangeSel::full(),
            cols: RangeSel::full(),
        }
    }
}

/// Perturb one value according to the metadata.
pub fn randomize_value(value: f64, meta: &ParameterMetaData, randomizer: &mut dyn Randomizer) -> f64 {
    let mean = meta.relative_mean * value;
    let deviation = match meta.deviation_mode {
        DeviationMode::Absolute => meta.deviation,
        DeviationMode::Relative => meta.deviation * value,
    };

    let drawn = mean + randomizer.sample() * deviation;
    if !meta.clamp {
        return drawn;
    }

    // A negative deviation flips the band, so order the bounds before
    // clamping. NaN passes through untouched.
    let half_width = meta.clamp_factor * deviation;
    let (lo, hi) = if half_width >= 0.0 {
        (mean - half_width, mean + half_width)
    } else {
        (mean + half_width, mean - half_width)
    };
    if drawn < lo {
        lo
    } else if drawn > hi {
        hi
    } else {
        drawn
    }
}

/// Perturb every cell of a matrix, one fresh draw per cell.
///
/// Cells are visited in row-major order, so a fixed draw sequence
/// gives reproducible matrices.
pub fn randomize_matrix(
    values: &Array2<f64>,
    meta: &ParameterMetaData,
    randomizer: &mut dyn Randomizer,
) -> Array2<f64> {
    values.map(|&v| randomize_value(v, meta, randomizer))
}

/// Replays a fixed sequence of draws.
#[cfg(test)]
pub(crate) struct FixedRandomizer {
    draws: Vec<f64>,
    next: usize,
}

#[cfg(test)]
impl FixedRandomizer {
    pub(crate) fn new(draws: &[f64]) -> Self {
        Self {
            draws: draws.to_vec(),
            next: 0,
        }
    }
}

#[cfg(test)]
impl Randomizer for FixedRandomizer {
    fn sample(&mut self) -> f64 {
        let draw = self.draws[self.next % self.draws.len()];
        self.next += 1;
        draw
    }
}
