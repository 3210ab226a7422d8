//! Property tests for the convolution layer
//!
//! - relabeling the cells of any rank permutes the outputs the same way
//! - attention weights form a distribution over each nonempty row

use approx::AbsDiffEq;
use ndarray::Array2;
use proptest::prelude::*;

use topo_conv::{
    AttentionGate, CellComplex, ComputeContext, HigherOrderConv, LayerConfig, OperatorSet,
    SparseOperator, Signals, Update,
};

/// Two triangles sharing node 2, plus a dangling edge
fn bowtie() -> OperatorSet {
    CellComplex::simplicial(
        6,
        vec![(0, 1), (1, 2), (0, 2), (2, 3), (3, 4), (2, 4), (4, 5)],
        vec![(0, 1, 2), (2, 3, 4)],
    )
    .and_then(|c| c.operator_set())
    .expect("bowtie complex")
}

fn permute_rows(x: &Array2<f64>, perm: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros(x.dim());
    for (i, &p) in perm.iter().enumerate() {
        out.row_mut(p).assign(&x.row(i));
    }
    out
}

fn signals_from(ops: &OperatorSet, channels: usize, values: &[f64]) -> Signals {
    let mut signals = Signals::new();
    let mut offset = 0;
    for (rank, &n) in ops.cell_counts().iter().enumerate() {
        let len = n * channels;
        let x = Array2::from_shape_vec((n, channels), values[offset..offset + len].to_vec())
            .expect("signal shape");
        signals.insert(rank, x);
        offset += len;
    }
    signals
}

fn check_equivariance(layer: &HigherOrderConv, ops: &OperatorSet, signals: &Signals, rank: usize, perm: &[usize]) {
    let permuted_ops = ops.relabeled(rank, perm).expect("valid permutation");
    let mut permuted_signals = signals.clone();
    if let Some(x) = permuted_signals.get_mut(rank) {
        *x = permute_rows(x, perm);
    }

    let out = layer.forward(signals, ops).expect("forward");
    let out_perm = layer.forward(&permuted_signals, &permuted_ops).expect("forward permuted");

    for (r, y) in out.iter() {
        let expected = if r == rank { permute_rows(y, perm) } else { y.clone() };
        let actual = out_perm.get(r).expect("rank present");
        assert!(
            actual.abs_diff_eq(&expected, 1e-9),
            "rank {r} not equivariant under relabeling of rank {rank}"
        );
    }
}

const CHANNELS: usize = 2;
// 6 nodes + 7 edges + 2 faces
const N_VALUES: usize = (6 + 7 + 2) * CHANNELS;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_joint_layer_is_node_permutation_equivariant(
        perm in Just((0..6).collect::<Vec<usize>>()).prop_shuffle(),
        values in proptest::collection::vec(-1.0f64..1.0, N_VALUES),
        seed in 0u64..1000,
        aggr_norm in any::<bool>(),
    ) {
        let ops = bowtie();
        let cfg = LayerConfig::sccnn(&[CHANNELS; 3], &[3, 3, 3], 2, 2)
            .expect("config")
            .with_aggr_norm(aggr_norm)
            .with_update(Update::Sigmoid);
        let layer = HigherOrderConv::new(cfg, &mut ComputeContext::new(seed)).expect("layer");
        check_equivariance(&layer, &ops, &signals_from(&ops, CHANNELS, &values), 0, &perm);
    }

    #[test]
    fn prop_joint_layer_is_edge_permutation_equivariant(
        perm in Just((0..7).collect::<Vec<usize>>()).prop_shuffle(),
        values in proptest::collection::vec(-1.0f64..1.0, N_VALUES),
        seed in 0u64..1000,
    ) {
        let ops = bowtie();
        let cfg = LayerConfig::sccnn(&[CHANNELS; 3], &[3, 3, 3], 1, 3).expect("config");
        let layer = HigherOrderConv::new(cfg, &mut ComputeContext::new(seed)).expect("layer");
        check_equivariance(&layer, &ops, &signals_from(&ops, CHANNELS, &values), 1, &perm);
    }

    #[test]
    fn prop_attention_layer_is_equivariant(
        perm in Just((0..7).collect::<Vec<usize>>()).prop_shuffle(),
        values in proptest::collection::vec(-1.0f64..1.0, N_VALUES),
        seed in 0u64..1000,
    ) {
        let ops = bowtie();
        let cfg = LayerConfig::node_edge_face([CHANNELS; 3], [2, 2, 2])
            .expect("config")
            .with_attention()
            .with_update(Update::Relu);
        let layer = HigherOrderConv::new(cfg, &mut ComputeContext::new(seed)).expect("layer");
        check_equivariance(&layer, &ops, &signals_from(&ops, CHANNELS, &values), 1, &perm);
    }

    #[test]
    fn prop_attention_rows_are_distributions(
        pattern in proptest::collection::vec(any::<bool>(), 5 * 4),
        x_src in proptest::collection::vec(-3.0f64..3.0, 4 * 2),
        x_dst in proptest::collection::vec(-3.0f64..3.0, 5 * 3),
        seed in 0u64..1000,
    ) {
        let dense = Array2::from_shape_fn((5, 4), |(i, j)| if pattern[i * 4 + j] { 1.0 } else { 0.0 });
        let op = SparseOperator::from_dense(dense.view());
        let x_src = Array2::from_shape_vec((4, 2), x_src).expect("shape");
        let x_dst = Array2::from_shape_vec((5, 3), x_dst).expect("shape");
        let gate = AttentionGate::new(2, 3, 0.2, &mut ComputeContext::new(seed)).expect("gate");

        let weighted = gate.weigh(&op, &x_src, &x_dst).expect("weigh");
        let sums = weighted.row_sums();
        for (i, degree) in op.row_degrees().into_iter().enumerate() {
            if degree == 0 {
                prop_assert_eq!(sums[i], 0.0);
            } else {
                prop_assert!((sums[i] - 1.0).abs() < 1e-12);
            }
        }
        prop_assert!(weighted.values().iter().all(|&v| v > 0.0 && v <= 1.0));
    }
}
