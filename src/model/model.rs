//! Model: stacked layers, per-rank readout, reduction.
//!
//! ```text
//!   signals ─► layer 1 ─► … ─► layer L ─► readout_r ─► pool ─► Σ_r  (whole complex)
//!                                          └─────────► [B ·]        (per cell)
//! ```

use std::borrow::Cow;

use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::pooling::Pooling;
use super::readout::Readout;
use crate::complex::{OperatorKind, OperatorSet, RankTable};
use crate::context::ComputeContext;
use crate::conv::{signal_on, HigherOrderConv, LayerConfig, Signals};
use crate::error::{ConvError, Result};
use crate::params::Parameterized;

/// What the model predicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Task {
    /// One vector per complex: pooled readouts summed over ranks
    #[default]
    WholeComplex,
    /// One row per cell of `rank`. With `via`, the readout runs on the
    /// incidence's source rank and is carried to `rank` through it.
    Cells {
        rank: usize,
        #[serde(default)]
        via: Option<OperatorKind>,
    },
}

impl Task {
    /// Rank whose readout feeds the prediction (cell tasks only)
    fn readout_rank(&self) -> Result<Option<usize>> {
        match self {
            Task::WholeComplex => Ok(None),
            Task::Cells { rank, via: None } => Ok(Some(*rank)),
            Task::Cells { rank, via: Some(kind) } => {
                let (source, target) = kind.ranks()?;
                if target != *rank {
                    return Err(ConvError::config(format!(
                        "{kind} lands on rank {target}, task predicts rank {rank}"
                    )));
                }
                Ok(Some(source))
            }
        }
    }
}

/// Model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub layers: Vec<LayerConfig>,
    /// Output width of the readout on each rank
    pub readout: RankTable<usize>,
    #[serde(default)]
    pub pooling: Pooling,
    #[serde(default)]
    pub task: Task,
}

impl ModelConfig {
    pub fn new(layers: Vec<LayerConfig>, readout: RankTable<usize>) -> Self {
        Self {
            layers,
            readout,
            pooling: Pooling::default(),
            task: Task::default(),
        }
    }

    /// `n_layers` layers from `build(is_first)`, so the first layer can take
    /// the input widths and the rest the hidden widths.
    pub fn repeated(
        n_layers: usize,
        build: impl Fn(bool) -> Result<LayerConfig>,
        readout: RankTable<usize>,
    ) -> Result<Self> {
        let layers = (0..n_layers).map(|i| build(i == 0)).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(layers, readout))
    }

    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn with_task(mut self, task: Task) -> Self {
        self.task = task;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConvError::config(format!("model config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Widths after the last layer
    pub fn final_channels(&self) -> Result<RankTable<usize>> {
        let mut widths: Option<RankTable<usize>> = None;
        for (i, layer) in self.layers.iter().enumerate() {
            let out = layer.output_channels()?;
            if let Some(prev) = &widths {
                for (rank, &c) in layer.in_channels.iter() {
                    match prev.get(rank) {
                        Some(&p) if p == c => {}
                        Some(&p) => {
                            return Err(ConvError::config(format!(
                                "mismatched channel widths: layer {} emits {p} on rank {rank}, layer {i} expects {c}",
                                i - 1
                            )))
                        }
                        None => {
                            return Err(ConvError::config(format!(
                                "layer {i} consumes rank {rank} which layer {} does not emit",
                                i - 1
                            )))
                        }
                    }
                }
            }
            widths = Some(out);
        }
        widths.ok_or_else(|| ConvError::config("model has no layers"))
    }

    pub fn validate(&self) -> Result<()> {
        let widths = self.final_channels()?;
        if self.readout.is_empty() {
            return Err(ConvError::config("model has no readout"));
        }
        for (rank, &out) in self.readout.iter() {
            if out == 0 {
                return Err(ConvError::config(format!("readout on rank {rank} has zero width")));
            }
            if !widths.contains(rank) {
                return Err(ConvError::config(format!(
                    "readout on rank {rank} but the last layer does not emit it"
                )));
            }
        }
        match self.task.readout_rank()? {
            None => {
                let mut dims = self.readout.iter().map(|(_, &d)| d);
                let first = dims.next().unwrap_or_default();
                if dims.any(|d| d != first) {
                    return Err(ConvError::config(
                        "whole-complex readouts must share one output width",
                    ));
                }
            }
            Some(rank) if !self.readout.contains(rank) => {
                return Err(ConvError::config(format!("cell task needs a readout on rank {rank}")));
            }
            Some(_) => {}
        }
        Ok(())
    }
}

/// Output of one forward pass
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Complex(Array1<f64>),
    Cells(Array2<f64>),
}

impl Prediction {
    /// Row-major flattening, for losses that do not care about the shape
    pub fn flatten(&self) -> Array1<f64> {
        match self {
            Prediction::Complex(v) => v.clone(),
            Prediction::Cells(m) => m.iter().copied().collect(),
        }
    }
}

/// One complex with its input signals
#[derive(Debug, Clone)]
pub struct Sample {
    pub signals: Signals,
    pub operators: OperatorSet,
}

#[derive(Debug, Clone)]
pub struct Model {
    config: ModelConfig,
    layers: Vec<HigherOrderConv>,
    readouts: RankTable<Readout>,
}

impl Model {
    pub fn new(config: ModelConfig, ctx: &mut ComputeContext) -> Result<Self> {
        config.validate()?;
        let widths = config.final_channels()?;

        let layers = config
            .layers
            .iter()
            .map(|l| HigherOrderConv::new(l.clone(), ctx))
            .collect::<Result<Vec<_>>>()?;
        let mut readouts = RankTable::new();
        for (rank, &out) in config.readout.iter() {
            let c = *widths.get(rank).ok_or(ConvError::MissingSignal(rank))?;
            readouts.insert(rank, Readout::new(c, out, ctx)?);
        }

        let model = Self {
            config,
            layers,
            readouts,
        };
        info!(
            layers = model.layers.len(),
            parameters = model.num_parameters(),
            task = ?model.config.task,
            seed = ctx.seed(),
            "built model"
        );
        Ok(model)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn layers(&self) -> &[HigherOrderConv] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [HigherOrderConv] {
        &mut self.layers
    }

    /// Readout for `rank`, as keyed in `ModelConfig::readout`
    pub fn readout_mut(&mut self, rank: usize) -> Option<&mut Readout> {
        self.readouts.get_mut(rank)
    }

    /// Signals after the last layer
    pub fn forward_signals(&self, signals: &Signals, ops: &OperatorSet) -> Result<Signals> {
        let mut current = Cow::Borrowed(signals);
        for (i, layer) in self.layers.iter().enumerate() {
            current = Cow::Owned(layer.forward(&current, ops)?);
            debug!(layer = i, ranks = ?current.ranks(), "layer forward");
        }
        Ok(current.into_owned())
    }

    pub fn forward(&self, signals: &Signals, ops: &OperatorSet) -> Result<Prediction> {
        let h = self.forward_signals(signals, ops)?;
        match self.config.task {
            Task::WholeComplex => {
                let mut total: Option<Array1<f64>> = None;
                for (rank, readout) in self.readouts.iter() {
                    let x = signal_on(&h, rank, ops, Some(readout.in_channels()))?;
                    let pooled = self.config.pooling.reduce(&readout.apply(x)?);
                    total = Some(match total {
                        Some(t) => t + &pooled,
                        None => pooled,
                    });
                }
                total
                    .map(Prediction::Complex)
                    .ok_or_else(|| ConvError::config("model has no readout"))
            }
            Task::Cells { rank, via } => {
                let source = via.map_or(Ok(rank), |k| k.ranks().map(|(s, _)| s))?;
                let readout = self.readouts.get(source).ok_or(ConvError::MissingSignal(source))?;
                let y = readout.apply(signal_on(&h, source, ops, Some(readout.in_channels()))?)?;
                match via {
                    Some(kind) => Ok(Prediction::Cells(ops.get(kind)?.matmul(&y)?)),
                    None => Ok(Prediction::Cells(y)),
                }
            }
        }
    }

    /// Forward every sample in parallel; weights are only read.
    pub fn forward_batch(&self, samples: &[Sample]) -> Vec<Result<Prediction>> {
        samples
            .par_iter()
            .map(|s| self.forward(&s.signals, &s.operators))
            .collect()
    }
}

impl Parameterized for Model {
    fn parameters(&self) -> Vec<&Array2<f64>> {
        let mut params: Vec<&Array2<f64>> = self.layers.iter().flat_map(|l| l.parameters()).collect();
        for (_, r) in self.readouts.iter() {
            params.extend(r.parameters());
        }
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        let mut params: Vec<&mut Array2<f64>> =
            self.layers.iter_mut().flat_map(|l| l.parameters_mut()).collect();
        for (_, r) in self.readouts.iter_mut() {
            params.extend(r.parameters_mut());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::CellComplex;
    use crate::context::Initialization;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn path_graph() -> OperatorSet {
        CellComplex::new(3, vec![(0, 1), (1, 2)], vec![])
            .unwrap()
            .operator_set()
            .unwrap()
    }

    fn signals() -> Signals {
        RankTable::from_iter([(0, array![[1.0], [2.0], [3.0]]), (1, array![[1.0], [-1.0]])])
    }

    fn two_rank_config(n_layers: usize) -> ModelConfig {
        ModelConfig::repeated(
            n_layers,
            |_| LayerConfig::sccnn(&[1, 1], &[1, 1], 1, 1),
            RankTable::from_iter([(0, 2), (1, 2)]),
        )
        .unwrap()
    }

    #[test]
    fn test_whole_complex_sums_pooled_ranks() {
        let cfg = two_rank_config(1);
        let mut model = Model::new(cfg, &mut ComputeContext::new(0).with_init(Initialization::Zeros)).unwrap();
        *model.readout_mut(0).unwrap().bias_mut() = array![[1.0, 0.0]];
        *model.readout_mut(1).unwrap().bias_mut() = array![[0.5, 2.0]];
        match model.forward(&signals(), &path_graph()).unwrap() {
            Prediction::Complex(v) => assert_eq!(v, array![1.5, 2.0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_empty_rank_does_not_poison_output() {
        let layer = LayerConfig::sccnn(&[1, 1, 1], &[2, 2, 2], 1, 2).unwrap();
        let cfg = ModelConfig::new(vec![layer], RankTable::from_iter([(0, 1), (1, 1), (2, 1)]))
            .with_pooling(Pooling::Mean);
        let model = Model::new(cfg, &mut ComputeContext::new(3)).unwrap();
        let mut s = signals();
        s.insert(2, Array2::zeros((0, 1)));
        let out = model.forward(&s, &path_graph()).unwrap().flatten();
        assert_eq!(out.len(), 1);
        assert!(out[0].is_finite());
    }

    #[test]
    fn test_cell_task_with_projection() {
        let cfg = two_rank_config(2).with_task(Task::Cells {
            rank: 0,
            via: Some(OperatorKind::Boundary(1)),
        });
        let ops = path_graph();
        let mut model = Model::new(cfg, &mut ComputeContext::new(0).with_init(Initialization::Zeros)).unwrap();
        *model.readout_mut(1).unwrap().bias_mut() = array![[1.0, 1.0]];
        match model.forward(&signals(), &ops).unwrap() {
            Prediction::Cells(y) => {
                assert_eq!(y.dim(), (3, 2));
                // B_1 · 1 on a path: -1 at the start, +1 at the end
                assert_abs_diff_eq!(y[[0, 0]], -1.0);
                assert_abs_diff_eq!(y[[1, 0]], 0.0);
                assert_abs_diff_eq!(y[[2, 1]], 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_layer_widths() {
        let cfg = ModelConfig::new(
            vec![
                LayerConfig::scnn(1, 2, 4, 1, 1).unwrap(),
                LayerConfig::scnn(1, 3, 4, 1, 1).unwrap(),
            ],
            RankTable::from_iter([(1, 1)]),
        );
        let err = Model::new(cfg, &mut ComputeContext::new(0)).unwrap_err();
        assert!(matches!(err, ConvError::Config(ref m) if m.contains("mismatched channel widths")));
    }

    #[test]
    fn test_readout_validation() {
        let layer = LayerConfig::sccnn(&[1, 1], &[1, 1], 1, 1).unwrap();
        let unequal = ModelConfig::new(vec![layer.clone()], RankTable::from_iter([(0, 1), (1, 2)]));
        assert!(unequal.validate().is_err());
        let absent = ModelConfig::new(vec![layer.clone()], RankTable::from_iter([(2, 1)]));
        assert!(absent.validate().is_err());
        let wrong_via = ModelConfig::new(vec![layer], RankTable::from_iter([(1, 1)])).with_task(Task::Cells {
            rank: 1,
            via: Some(OperatorKind::Boundary(1)),
        });
        assert!(wrong_via.validate().is_err());
    }

    #[test]
    fn test_batch_matches_sequential() {
        let model = Model::new(two_rank_config(2), &mut ComputeContext::new(8)).unwrap();
        let sample = Sample {
            signals: signals(),
            operators: path_graph(),
        };
        let batch = model.forward_batch(&[sample.clone(), sample.clone()]);
        let single = model.forward(&sample.signals, &sample.operators).unwrap();
        for out in batch {
            assert_eq!(out.unwrap(), single);
        }
    }

    #[test]
    fn test_json_config() {
        let cfg = two_rank_config(1).with_pooling(Pooling::Max);
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(ModelConfig::from_json(&json).unwrap(), cfg);
        assert!(matches!(ModelConfig::from_json("{\"layers\": 3}"), Err(ConvError::Config(_))));
    }
}
