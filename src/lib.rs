//! # Topo-Conv
//!
//! Higher-Order Convolution on Simplicial and Cell Complexes
//!
//! ## Framework
//!
//! A complex carries cells of several ranks (nodes, edges, faces, …) and a
//! signal on each rank: an `n_r × c_r` feature matrix. Structural operators
//! tie the ranks together:
//!
//! - incidence `B_r` (rank r → r-1) and its transpose (r-1 → r)
//! - Laplacians `L_r^down = B_rᵀ B_r`, `L_r^up = B_{r+1} B_{r+1}ᵀ`, and
//!   their sum, the Hodge Laplacian
//! - unsigned adjacencies
//!
//! A higher-order convolution layer mixes, for every output rank, polynomial
//! filters in that rank's Laplacians with signals lifted from the rank below
//! and projected from the rank above:
//!
//!   H_r' = σ( Σ_p (L_r^p H_r) W_p + Σ_p (L_r^p B_rᵀ H_{r-1}) W'_p
//!                                 + Σ_p (L_r^p B_{r+1} H_{r+1}) W''_p )
//!
//! optionally with attention re-weighting of each operator's nonzeros.
//!
//! ### Layer variants
//!
//! 1. **SCNN**: one rank, separate down/up polynomial filters
//! 2. **SCCNN**: joint convolution over all ranks of the complex
//! 3. **Node/edge/face**: node convolution, then node → edge → face lifts
//!
//! All three are presets of a single declarative [`LayerConfig`].
//!
//! ### Pipeline
//!
//! 1. **Complex**: build a [`CellComplex`] directly, or lift a point cloud
//!    with [`VietorisRips`]
//! 2. **Operators**: [`CellComplex::operator_set`] computes every boundary,
//!    Laplacian and adjacency into an [`OperatorSet`]
//! 3. **Model**: stacked [`HigherOrderConv`] layers, per-rank [`Readout`],
//!    empty-safe [`Pooling`]
//! 4. **Training**: [`Sgd`] over [`Parameterized`] weights with
//!    finite-difference gradients
//!
//! ## References
//!
//! - Yang, Isufi & Leus, "Simplicial Convolutional Neural Networks" (ICASSP 2022)
//! - Yang & Isufi, "Convolutional Learning on Simplicial Complexes" (2023)
//! - Hajij et al., "Topological Deep Learning: Going Beyond Graph Data" (2023)

pub mod error;
pub mod context;
pub mod complex;
pub mod conv;
pub mod params;
pub mod model;
pub mod training;

pub use error::{ConvError, Result};
pub use context::{ComputeContext, Initialization, DEFAULT_GAIN};
pub use params::Parameterized;

// Re-exports from complex
pub use complex::{
    CellComplex,
    OperatorKind,
    OperatorSet,
    RankTable,
    SparseOperator,
    // Point-cloud lifting
    VietorisRips,
};

// Re-exports from conv
pub use conv::{
    AttentionGate,
    DegreeRange,
    HigherOrderConv,
    LayerConfig,
    Signals,
    TermSpec,
    Update,
};

// Re-exports from model
pub use model::{
    Model,
    ModelConfig,
    Pooling,
    Prediction,
    Readout,
    Sample,
    Task,
};

// Re-exports from training
pub use training::{
    Sgd,
    TrainConfig,
    finite_difference,
    train_step,
    train_test_split,
};
