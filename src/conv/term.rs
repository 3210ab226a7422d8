//! Declarative Layer Configuration
//!
//! A layer is a list of *stages*; a stage is a list of *terms*; a term is one
//! (source rank, operator, degree range) combination whose output is summed
//! into a target rank:
//!
//! ```text
//!   term(x) = Σ_{p ∈ degrees} ( F^p · [A] · B · x_src ) W_p
//!             └ filter F ┘      └ attention ┘ └ incidence ┘
//! ```
//!
//! - no incidence, no filter, degree 0        → self term      x W
//! - filter only                              → polynomial     Σ (L^p x) W_p
//! - incidence only                           → lift/project   B x W
//! - incidence and filter                     → lift then filter at the target
//!
//! Every rank targeted in a stage is aggregated and passed through the
//! layer's update function before the next stage runs; ranks a stage does
//! not target carry over unchanged. The node/edge/face variants are presets
//! over this one description, not separate layer types.

use serde::{Deserialize, Serialize};

use super::polynomial::DegreeRange;
use super::update::Update;
use super::attention::DEFAULT_NEGATIVE_SLOPE;
use crate::complex::{OperatorKind, RankTable};
use crate::error::{ConvError, Result};

/// One summed contribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermSpec {
    pub source: usize,
    pub target: usize,
    /// Cross-rank map applied first
    #[serde(default)]
    pub incidence: Option<OperatorKind>,
    /// Same-rank operator on the target, raised to each degree
    #[serde(default)]
    pub filter: Option<OperatorKind>,
    pub degrees: DegreeRange,
    /// Gate the incidence (or, without one, the filter) with attention
    #[serde(default)]
    pub attention: bool,
}

impl TermSpec {
    /// `x W` on one rank
    pub fn linear(rank: usize) -> Self {
        Self {
            source: rank,
            target: rank,
            incidence: None,
            filter: None,
            degrees: DegreeRange::identity(),
            attention: false,
        }
    }

    /// `Σ_p (L^p x) W_p` with a same-rank operator
    pub fn polynomial(filter: OperatorKind, degrees: DegreeRange) -> Result<Self> {
        let (rank, _) = filter.ranks()?;
        let term = Self {
            source: rank,
            target: rank,
            incidence: None,
            filter: Some(filter),
            degrees,
            attention: false,
        };
        term.validate()?;
        Ok(term)
    }

    /// `B x W` across ranks
    pub fn cross(incidence: OperatorKind) -> Result<Self> {
        let (source, target) = incidence.ranks()?;
        let term = Self {
            source,
            target,
            incidence: Some(incidence),
            filter: None,
            degrees: DegreeRange::identity(),
            attention: false,
        };
        term.validate()?;
        Ok(term)
    }

    /// `Σ_p (L^p B x) W_p`: lift/project, then filter on the target rank
    pub fn cross_filtered(
        incidence: OperatorKind,
        filter: OperatorKind,
        degrees: DegreeRange,
    ) -> Result<Self> {
        let (source, target) = incidence.ranks()?;
        let term = Self {
            source,
            target,
            incidence: Some(incidence),
            filter: Some(filter),
            degrees,
            attention: false,
        };
        term.validate()?;
        Ok(term)
    }

    pub fn with_attention(mut self) -> Self {
        self.attention = true;
        self
    }

    /// Operator the attention gate re-weights, if any
    pub fn gated_operator(&self) -> Option<OperatorKind> {
        self.incidence.or(self.filter)
    }

    pub fn validate(&self) -> Result<()> {
        match self.incidence {
            Some(kind) => {
                let (s, t) = kind.ranks()?;
                if (s, t) != (self.source, self.target) {
                    return Err(ConvError::config(format!(
                        "{kind} maps rank {s} to {t}, term declares {} to {}",
                        self.source, self.target
                    )));
                }
            }
            None if self.source != self.target => {
                return Err(ConvError::config(format!(
                    "term from rank {} to {} needs an incidence operator",
                    self.source, self.target
                )));
            }
            None => {}
        }
        match self.filter {
            Some(kind) => {
                let (s, t) = kind.ranks()?;
                if s != t || t != self.target {
                    return Err(ConvError::config(format!(
                        "filter {kind} is not a same-rank operator on rank {}",
                        self.target
                    )));
                }
            }
            None if self.degrees != DegreeRange::identity() => {
                return Err(ConvError::config(
                    "a term without a filter operator only has degree 0",
                ));
            }
            None => {}
        }
        if self.attention && self.gated_operator().is_none() {
            return Err(ConvError::config("attention needs an operator to gate"));
        }
        Ok(())
    }
}

/// Resolved widths of one term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TermShape {
    /// Channels of the signal the weights multiply
    pub input: usize,
    /// Channels of the attention destination cells
    pub gate_dst: usize,
    pub output: usize,
}

/// Full description of one convolution layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub in_channels: RankTable<usize>,
    pub out_channels: RankTable<usize>,
    pub stages: Vec<Vec<TermSpec>>,
    #[serde(default)]
    pub update: Update,
    /// Rescale every filter hop by the neighborhood count
    #[serde(default)]
    pub aggr_norm: bool,
    #[serde(default = "default_negative_slope")]
    pub negative_slope: f64,
}

fn default_negative_slope() -> f64 {
    DEFAULT_NEGATIVE_SLOPE
}

impl LayerConfig {
    /// Empty configuration; add stages with [`LayerConfig::stage`].
    pub fn new(in_channels: RankTable<usize>, out_channels: RankTable<usize>) -> Self {
        Self {
            in_channels,
            out_channels,
            stages: Vec::new(),
            update: Update::Identity,
            aggr_norm: false,
            negative_slope: DEFAULT_NEGATIVE_SLOPE,
        }
    }

    pub fn stage(mut self, terms: Vec<TermSpec>) -> Self {
        self.stages.push(terms);
        self
    }

    pub fn with_update(mut self, update: Update) -> Self {
        self.update = update;
        self
    }

    pub fn with_aggr_norm(mut self, aggr_norm: bool) -> Self {
        self.aggr_norm = aggr_norm;
        self
    }

    /// Turn attention on for every cross-rank term and every adjacency filter
    pub fn with_attention(mut self) -> Self {
        for term in self.stages.iter_mut().flatten() {
            if term.incidence.is_some() || matches!(term.filter, Some(OperatorKind::Adjacency(_))) {
                term.attention = true;
            }
        }
        self
    }

    /// Single-rank convolution with separate down and up polynomial filters:
    ///
    ///   y = x W_0 + Σ_{p=1}^{P_d} (L_down^p x) W_p^d + Σ_{p=1}^{P_u} (L_up^p x) W_p^u
    pub fn scnn(
        rank: usize,
        in_channels: usize,
        out_channels: usize,
        conv_order_down: usize,
        conv_order_up: usize,
    ) -> Result<Self> {
        let mut terms = vec![TermSpec::linear(rank)];
        if conv_order_down > 0 {
            terms.push(TermSpec::polynomial(
                OperatorKind::LaplacianDown(rank),
                DegreeRange::hops(conv_order_down),
            )?);
        }
        if conv_order_up > 0 {
            terms.push(TermSpec::polynomial(
                OperatorKind::LaplacianUp(rank),
                DegreeRange::hops(conv_order_up),
            )?);
        }
        Ok(Self::new(
            RankTable::from_iter([(rank, in_channels)]),
            RankTable::from_iter([(rank, out_channels)]),
        )
        .stage(terms))
    }

    /// Joint convolution over ranks `0..in_channels.len()`.
    ///
    /// Every rank gets its own polynomial filter plus a lift from the rank
    /// below and a projection from the rank above, each followed by a
    /// polynomial filter on the target rank. `sc_order` is the dimension of
    /// the complex: when the top rank equals it, that rank has no upper
    /// neighborhood and is filtered with its Hodge Laplacian only.
    pub fn sccnn(
        in_channels: &[usize],
        out_channels: &[usize],
        conv_order: usize,
        sc_order: usize,
    ) -> Result<Self> {
        if in_channels.is_empty() || in_channels.len() != out_channels.len() {
            return Err(ConvError::config(format!(
                "joint convolution needs matching per-rank widths, got {} in and {} out",
                in_channels.len(),
                out_channels.len()
            )));
        }
        let top = in_channels.len() - 1;
        if sc_order < top {
            return Err(ConvError::config(format!(
                "complex of order {sc_order} has no rank {top}"
            )));
        }
        let degrees = DegreeRange::up_to(conv_order);
        let top_is_closed = top > 0 && sc_order == top;

        let mut terms = Vec::new();
        for r in 0..=top {
            // same-rank
            if r == 0 {
                terms.push(TermSpec::polynomial(OperatorKind::LaplacianHodge(0), degrees)?);
            } else if r == top && top_is_closed {
                terms.push(TermSpec::polynomial(OperatorKind::LaplacianHodge(r), degrees)?);
            } else {
                terms.push(TermSpec::linear(r));
                if conv_order > 0 {
                    terms.push(TermSpec::polynomial(
                        OperatorKind::LaplacianDown(r),
                        DegreeRange::hops(conv_order),
                    )?);
                    terms.push(TermSpec::polynomial(
                        OperatorKind::LaplacianUp(r),
                        DegreeRange::hops(conv_order),
                    )?);
                }
            }
            // lift from r - 1
            if r > 0 {
                let filter = if r == top && top_is_closed {
                    OperatorKind::LaplacianHodge(r)
                } else {
                    OperatorKind::LaplacianDown(r)
                };
                terms.push(TermSpec::cross_filtered(OperatorKind::Coboundary(r), filter, degrees)?);
            }
            // project from r + 1
            if r < top {
                let filter = if r == 0 {
                    OperatorKind::LaplacianHodge(0)
                } else {
                    OperatorKind::LaplacianUp(r)
                };
                terms.push(TermSpec::cross_filtered(OperatorKind::Boundary(r + 1), filter, degrees)?);
            }
        }

        Ok(Self::new(
            in_channels.iter().copied().enumerate().collect(),
            out_channels.iter().copied().enumerate().collect(),
        )
        .stage(terms))
    }

    /// Two hops per call: nodes convolve over their adjacency and lift to
    /// edges, then the fresh edge signal lifts to faces.
    pub fn node_edge_face(in_channels: [usize; 3], out_channels: [usize; 3]) -> Result<Self> {
        let first = vec![
            TermSpec::linear(0),
            TermSpec::polynomial(OperatorKind::Adjacency(0), DegreeRange::hops(1))?,
            TermSpec::linear(1),
            TermSpec::cross(OperatorKind::Coboundary(1))?,
        ];
        let second = vec![TermSpec::linear(2), TermSpec::cross(OperatorKind::Coboundary(2))?];

        Ok(Self::new(
            in_channels.iter().copied().enumerate().collect(),
            out_channels.iter().copied().enumerate().collect(),
        )
        .stage(first)
        .stage(second))
    }

    /// Load from JSON; malformed input (negative degrees included) is a
    /// configuration error.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConvError::config(format!("layer config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.plan().map(|_| ())
    }

    /// Per-rank widths after the layer (untouched ranks keep their input width)
    pub fn output_channels(&self) -> Result<RankTable<usize>> {
        let (_, widths) = self.resolve()?;
        Ok(widths)
    }

    pub(crate) fn plan(&self) -> Result<Vec<Vec<TermShape>>> {
        self.resolve().map(|(plan, _)| plan)
    }

    /// Walk the stages tracking each rank's width; every check that can be
    /// made without a complex happens here.
    fn resolve(&self) -> Result<(Vec<Vec<TermShape>>, RankTable<usize>)> {
        if self.stages.is_empty() {
            return Err(ConvError::config("layer has no stages"));
        }
        if self.in_channels.is_empty() {
            return Err(ConvError::config("layer consumes no rank"));
        }
        for (rank, &c) in self.in_channels.iter().chain(self.out_channels.iter()) {
            if c == 0 {
                return Err(ConvError::config(format!("rank {rank} has zero channels")));
            }
        }
        if !self.negative_slope.is_finite() {
            return Err(ConvError::config("attention slope must be finite"));
        }

        let mut widths = self.in_channels.clone();
        let mut targeted = RankTable::new();
        let mut plan = Vec::with_capacity(self.stages.len());

        for (s, stage) in self.stages.iter().enumerate() {
            if stage.is_empty() {
                return Err(ConvError::config(format!("stage {s} has no terms")));
            }
            let mut shapes = Vec::with_capacity(stage.len());
            for term in stage {
                term.validate()?;
                let input = *widths.get(term.source).ok_or_else(|| {
                    ConvError::config(format!("stage {s}: rank {} carries no signal", term.source))
                })?;
                let output = *self.out_channels.get(term.target).ok_or_else(|| {
                    ConvError::config(format!("stage {s}: rank {} has no output width", term.target))
                })?;
                let gate_dst = if term.attention && term.incidence.is_some() {
                    *widths.get(term.target).ok_or_else(|| {
                        ConvError::config(format!(
                            "stage {s}: attention into rank {} needs a signal there",
                            term.target
                        ))
                    })?
                } else {
                    input
                };
                shapes.push(TermShape { input, gate_dst, output });
            }
            for term in stage {
                widths.insert(term.target, self.out_channels.get(term.target).copied().unwrap_or_default());
                targeted.insert(term.target, ());
            }
            plan.push(shapes);
        }

        for rank in self.out_channels.ranks() {
            if !targeted.contains(rank) {
                return Err(ConvError::config(format!(
                    "rank {rank} has an output width but no term writes to it"
                )));
            }
        }

        Ok((plan, widths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scnn_terms() {
        let cfg = LayerConfig::scnn(1, 4, 8, 2, 3).unwrap();
        let terms = &cfg.stages[0];
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[1].degrees, DegreeRange::new(1, 2).unwrap());
        assert_eq!(terms[2].filter, Some(OperatorKind::LaplacianUp(1)));
        assert_eq!(cfg.output_channels().unwrap().get(1), Some(&8));
    }

    #[test]
    fn test_scnn_order_zero_is_linear() {
        let cfg = LayerConfig::scnn(0, 1, 1, 0, 0).unwrap();
        assert_eq!(cfg.stages[0], vec![TermSpec::linear(0)]);
    }

    #[test]
    fn test_sccnn_triangle_complex() {
        let cfg = LayerConfig::sccnn(&[2, 3, 4], &[5, 5, 5], 2, 2).unwrap();
        let terms = &cfg.stages[0];
        let into = |r: usize| terms.iter().filter(|t| t.target == r).count();
        // nodes: self + projection; edges: id + down + up + lift + projection; faces: self + lift
        assert_eq!((into(0), into(1), into(2)), (2, 5, 2));
        let face_lift = terms.iter().find(|t| t.target == 2 && t.source == 1).unwrap();
        assert_eq!(face_lift.filter, Some(OperatorKind::LaplacianHodge(2)));
        cfg.validate().unwrap();
    }

    #[test]
    fn test_sccnn_open_top_rank() {
        let cfg = LayerConfig::sccnn(&[1, 1, 1], &[1, 1, 1], 1, 3).unwrap();
        let face_filters: Vec<_> = cfg.stages[0]
            .iter()
            .filter(|t| t.target == 2 && t.source == 2)
            .filter_map(|t| t.filter)
            .collect();
        assert_eq!(
            face_filters,
            vec![OperatorKind::LaplacianDown(2), OperatorKind::LaplacianUp(2)]
        );
    }

    #[test]
    fn test_sccnn_rejects_bad_order() {
        assert!(LayerConfig::sccnn(&[1, 1, 1], &[1, 1, 1], 1, 1).is_err());
        assert!(LayerConfig::sccnn(&[1, 1], &[1], 1, 2).is_err());
    }

    #[test]
    fn test_two_stage_widths() {
        let cfg = LayerConfig::node_edge_face([3, 2, 1], [4, 5, 6]).unwrap();
        let plan = cfg.plan().unwrap();
        // the edge → face lift reads the stage-one edge signal
        assert_eq!(plan[1][1], TermShape { input: 5, gate_dst: 5, output: 6 });
    }

    #[test]
    fn test_attention_only_on_cross_and_adjacency() {
        let cfg = LayerConfig::node_edge_face([1, 1, 1], [1, 1, 1]).unwrap().with_attention();
        let gated: Vec<bool> = cfg.stages.iter().flatten().map(|t| t.attention).collect();
        assert_eq!(gated, vec![false, true, false, true, false, true]);
        cfg.validate().unwrap();
    }

    #[test]
    fn test_invalid_terms() {
        // incidence direction disagrees with declared ranks
        let mut t = TermSpec::cross(OperatorKind::Boundary(1)).unwrap();
        t.target = 1;
        assert!(t.validate().is_err());
        // filter on the wrong rank
        assert!(TermSpec::cross_filtered(
            OperatorKind::Coboundary(1),
            OperatorKind::LaplacianUp(0),
            DegreeRange::up_to(1)
        )
        .is_err());
        // hops without an operator
        let mut t = TermSpec::linear(0);
        t.degrees = DegreeRange::hops(2);
        assert!(t.validate().is_err());
        // rank 0 boundary
        assert!(TermSpec::cross(OperatorKind::Boundary(0)).is_err());
    }

    #[test]
    fn test_untargeted_output_rejected() {
        let cfg = LayerConfig::new(
            RankTable::from_iter([(0, 1)]),
            RankTable::from_iter([(0, 1), (1, 1)]),
        )
        .stage(vec![TermSpec::linear(0)]);
        assert!(matches!(cfg.validate(), Err(ConvError::Config(_))));
    }

    #[test]
    fn test_json_round_trip_and_negative_degree() {
        let cfg = LayerConfig::scnn(1, 2, 2, 1, 1).unwrap().with_update(Update::Sigmoid);
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(LayerConfig::from_json(&json).unwrap(), cfg);

        let bad = json.replace("\"max\":1", "\"max\":-1");
        assert!(matches!(LayerConfig::from_json(&bad), Err(ConvError::Config(_))));
    }
}
