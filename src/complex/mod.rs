//! Complex Module: Cells, Incidence and Neighborhood Operators
//!
//! Supplies the structural inputs of the convolution layers:
//! - sparse operators between cell sets (boundaries, adjacencies, Laplacians)
//! - a rank-indexed operator set for one complex instance
//! - a 2-dimensional cell complex builder with signed incidences
//! - Vietoris-Rips lifting of point clouds
//!
//! ## Mathematical Background
//!
//! For a complex with boundary maps B_r : C_r → C_{r-1} the rank-r Hodge
//! Laplacian splits into a lower and an upper part
//!
//!   L_r = B_rᵀ B_r + B_{r+1} B_{r+1}ᵀ = L_r^down + L_r^up
//!
//! L_r^down mixes r-cells sharing an (r-1)-face, L_r^up mixes r-cells that
//! are faces of a common (r+1)-cell. Everything here is computed once per
//! complex and then only read.

mod operator;
mod operators;
mod cell_complex;
mod lifting;

pub use operator::SparseOperator;
pub use operators::{OperatorKind, OperatorSet, RankTable};
pub use cell_complex::CellComplex;
pub use lifting::VietorisRips;
