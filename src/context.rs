//! Compute Context: Explicit Construction State
//!
//! Every weight allocation goes through a `ComputeContext` handed down by the
//! caller. It carries the seeded generator and the initialisation scheme, so
//! two models built from the same seed and config are bit-identical and no
//! construction call reaches for ambient global state.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};

/// Default Xavier gain (≈ √2, the rectifier gain).
pub const DEFAULT_GAIN: f64 = 1.414;

/// Weight initialisation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Initialization {
    /// U(-a, a) with a = gain·√(6 / (fan_in + fan_out))
    XavierUniform,
    /// N(0, σ²) with σ = gain·√(2 / (fan_in + fan_out))
    #[default]
    XavierNormal,
    /// All weights zero
    Zeros,
}

/// Construction-time state threaded through layer and model builders.
#[derive(Debug, Clone)]
pub struct ComputeContext {
    rng: StdRng,
    init: Initialization,
    gain: f64,
    seed: u64,
}

impl ComputeContext {
    /// Context with the default scheme (Xavier normal, gain 1.414)
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            init: Initialization::default(),
            gain: DEFAULT_GAIN,
            seed,
        }
    }

    pub fn with_init(mut self, init: Initialization) -> Self {
        self.init = init;
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn init(&self) -> Initialization {
        self.init
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Mutable access to the generator for callers that need extra draws
    /// (synthetic data, shuffles) from the same stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Allocate an `[fan_in, fan_out]` weight matrix under the configured scheme.
    pub fn weight(&mut self, fan_in: usize, fan_out: usize) -> Result<Array2<f64>> {
        if fan_in == 0 || fan_out == 0 {
            return Err(ConvError::config(format!(
                "weight shape [{fan_in}, {fan_out}] has a zero extent"
            )));
        }
        let denom = (fan_in + fan_out) as f64;

        match self.init {
            Initialization::Zeros => Ok(Array2::zeros((fan_in, fan_out))),
            Initialization::XavierUniform => {
                let bound = self.gain * (6.0 / denom).sqrt();
                if bound <= 0.0 {
                    return Ok(Array2::zeros((fan_in, fan_out)));
                }
                let dist = Uniform::new(-bound, bound)
                    .map_err(|e| ConvError::config(format!("xavier uniform: {e}")))?;
                Ok(Array2::from_shape_simple_fn((fan_in, fan_out), || {
                    dist.sample(&mut self.rng)
                }))
            }
            Initialization::XavierNormal => {
                let std = self.gain * (2.0 / denom).sqrt();
                if std <= 0.0 {
                    return Ok(Array2::zeros((fan_in, fan_out)));
                }
                let dist = Normal::new(0.0, std)
                    .map_err(|e| ConvError::config(format!("xavier normal: {e}")))?;
                Ok(Array2::from_shape_simple_fn((fan_in, fan_out), || {
                    dist.sample(&mut self.rng)
                }))
            }
        }
    }
}

impl Default for ComputeContext {
    fn default() -> Self {
        Self::new(0)
    }
}
