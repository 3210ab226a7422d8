//! Higher-Order Convolution Layer
//!
//! Runs a [`LayerConfig`] against one complex. For every stage:
//!
//! 1. each term reads its source signal from the current table and produces
//!    an `n_target × c_out` contribution;
//! 2. contributions are summed per target rank;
//! 3. the update function is applied and the target's signal is replaced.
//!
//! A stage reads the table as it was when the stage started, so terms inside
//! one stage never see each other's output.

use std::borrow::Cow;

use ndarray::Array2;
use tracing::{debug, trace};

use super::aggregate::aggregate;
use super::attention::AttentionGate;
use super::cross_rank::cross_rank_filter;
use super::polynomial::polynomial_filter;
use super::signal::{signal_on, Signals};
use super::term::{LayerConfig, TermShape, TermSpec};
use crate::complex::{OperatorSet, RankTable};
use crate::context::ComputeContext;
use crate::error::{ConvError, Result};
use crate::params::Parameterized;

/// Weights of one term: one `[c_in, c_out]` matrix per degree, plus the
/// attention gate when the term is gated.
#[derive(Debug, Clone, PartialEq)]
pub struct TermParams {
    spec: TermSpec,
    weights: Vec<Array2<f64>>,
    gate: Option<AttentionGate>,
}

impl TermParams {
    fn new(spec: TermSpec, shape: TermShape, negative_slope: f64, ctx: &mut ComputeContext) -> Result<Self> {
        let weights = spec
            .degrees
            .iter()
            .map(|_| ctx.weight(shape.input, shape.output))
            .collect::<Result<Vec<_>>>()?;
        let gate = if spec.attention {
            Some(AttentionGate::new(shape.input, shape.gate_dst, negative_slope, ctx)?)
        } else {
            None
        };
        Ok(Self { spec, weights, gate })
    }

    pub fn spec(&self) -> &TermSpec {
        &self.spec
    }

    /// `weights[k]` belongs to degree `spec.degrees.min() + k`
    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut [Array2<f64>] {
        &mut self.weights
    }

    pub fn gate(&self) -> Option<&AttentionGate> {
        self.gate.as_ref()
    }

    pub fn gate_mut(&mut self) -> Option<&mut AttentionGate> {
        self.gate.as_mut()
    }

    /// This term's contribution to its target rank
    fn apply(&self, current: &Signals, ops: &OperatorSet, aggr_norm: bool) -> Result<Array2<f64>> {
        let spec = &self.spec;
        let c_in = self.weights.first().map(|w| w.nrows());
        let x = signal_on(current, spec.source, ops, c_in)?;

        let incidence = match spec.incidence {
            Some(kind) => {
                let op = ops.get(kind)?;
                Some(match &self.gate {
                    Some(gate) => {
                        let dst = signal_on(current, spec.target, ops, None)?;
                        Cow::Owned(gate.weigh(op, x, dst)?)
                    }
                    None => Cow::Borrowed(op),
                })
            }
            None => None,
        };

        match (incidence, spec.filter) {
            (Some(b), None) => cross_rank_filter(x, &b, &self.weights[0]),
            (Some(b), Some(kind)) => {
                let lifted = b.matmul(x)?;
                polynomial_filter(&lifted, ops.get(kind)?, spec.degrees, &self.weights, aggr_norm)
            }
            (None, Some(kind)) => {
                let op = ops.get(kind)?;
                let op = match &self.gate {
                    Some(gate) => Cow::Owned(gate.weigh(op, x, x)?),
                    None => Cow::Borrowed(op),
                };
                polynomial_filter(x, &op, spec.degrees, &self.weights, aggr_norm)
            }
            (None, None) => Ok(x.dot(&self.weights[0])),
        }
    }

    fn params(&self) -> impl Iterator<Item = &Array2<f64>> {
        self.weights
            .iter()
            .chain(self.gate.iter().flat_map(|g| g.params()))
    }

    fn params_mut(&mut self) -> impl Iterator<Item = &mut Array2<f64>> {
        self.weights
            .iter_mut()
            .chain(self.gate.iter_mut().flat_map(|g| g.params_mut()))
    }
}

/// One higher-order convolution layer with its weights
#[derive(Debug, Clone)]
pub struct HigherOrderConv {
    config: LayerConfig,
    stages: Vec<Vec<TermParams>>,
    output_channels: RankTable<usize>,
}

impl HigherOrderConv {
    /// Validate `config` and allocate every weight from `ctx`.
    pub fn new(config: LayerConfig, ctx: &mut ComputeContext) -> Result<Self> {
        let output_channels = config.output_channels()?;
        let stages = Self::allocate(&config, ctx)?;
        let n_terms: usize = stages.iter().map(Vec::len).sum();
        debug!(
            stages = stages.len(),
            terms = n_terms,
            in_ranks = ?config.in_channels.ranks(),
            out_ranks = ?config.out_channels.ranks(),
            "built higher-order convolution layer"
        );
        Ok(Self {
            config,
            stages,
            output_channels,
        })
    }

    fn allocate(config: &LayerConfig, ctx: &mut ComputeContext) -> Result<Vec<Vec<TermParams>>> {
        let plan = config.plan()?;
        config
            .stages
            .iter()
            .zip(plan)
            .map(|(terms, shapes)| {
                terms
                    .iter()
                    .zip(shapes)
                    .map(|(spec, shape)| TermParams::new(spec.clone(), shape, config.negative_slope, ctx))
                    .collect()
            })
            .collect()
    }

    /// Redraw every weight from `ctx`
    pub fn reset_parameters(&mut self, ctx: &mut ComputeContext) -> Result<()> {
        self.stages = Self::allocate(&self.config, ctx)?;
        Ok(())
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Width of every rank the layer emits
    pub fn output_channels(&self) -> &RankTable<usize> {
        &self.output_channels
    }

    pub fn terms(&self) -> impl Iterator<Item = &TermParams> {
        self.stages.iter().flatten()
    }

    /// Term `index` of stage `stage`, both in `LayerConfig::stages` order
    pub fn term_mut(&mut self, stage: usize, index: usize) -> Option<&mut TermParams> {
        self.stages.get_mut(stage).and_then(|s| s.get_mut(index))
    }

    /// Run every stage over `signals` on the complex described by `ops`.
    ///
    /// Every rank the layer consumes must be present with its configured
    /// width. The result holds the updated ranks plus any consumed rank no
    /// stage rewrote.
    pub fn forward(&self, signals: &Signals, ops: &OperatorSet) -> Result<Signals> {
        let mut current = Signals::new();
        for (rank, &c) in self.config.in_channels.iter() {
            current.insert(rank, signal_on(signals, rank, ops, Some(c))?.clone());
        }

        for (s, stage) in self.stages.iter().enumerate() {
            let mut pending: RankTable<Vec<Array2<f64>>> = RankTable::new();
            for term in stage {
                let y = term.apply(&current, ops, self.config.aggr_norm)?;
                match pending.get_mut(term.spec.target) {
                    Some(list) => list.push(y),
                    None => {
                        pending.insert(term.spec.target, vec![y]);
                    }
                }
            }

            for (rank, contributions) in pending {
                let width = *self.config.out_channels.get(rank).ok_or_else(|| {
                    ConvError::config(format!("rank {rank} has no output width"))
                })?;
                let n = ops.n_cells(rank)?;
                let terms = contributions.len();
                let y = self.config.update.apply(aggregate(n, width, contributions)?);
                trace!(stage = s, rank, cells = n, terms, "aggregated rank");
                current.insert(rank, y);
            }
        }

        Ok(current)
    }
}

impl Parameterized for HigherOrderConv {
    fn parameters(&self) -> Vec<&Array2<f64>> {
        self.stages.iter().flatten().flat_map(TermParams::params).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        self.stages
            .iter_mut()
            .flatten()
            .flat_map(TermParams::params_mut)
            .collect()
    }
}
