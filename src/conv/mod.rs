//! Higher-Order Convolution
//!
//! Building blocks of the layer, bottom-up:
//!
//! - `polynomial`: Σ_p (L^p H) W_p on one rank
//! - `cross_rank`: B H W between neighbouring ranks
//! - `attention`: softmax re-weighting of an operator's nonzeros
//! - `aggregate` / `update`: per-rank sum and elementwise nonlinearity
//! - `term`: declarative stages of terms, with the SCNN/SCCNN presets
//! - `layer`: the executable layer holding the weights

mod aggregate;
mod attention;
mod cross_rank;
mod layer;
mod polynomial;
mod signal;
mod term;
mod update;

pub use aggregate::aggregate;
pub use attention::{AttentionGate, DEFAULT_NEGATIVE_SLOPE};
pub use cross_rank::{cross_rank_filter, transport};
pub use layer::{HigherOrderConv, TermParams};
pub use polynomial::{neighborhood_scaling, polynomial_filter, DegreeRange};
pub use signal::{signal_on, Signals};
pub use term::{LayerConfig, TermSpec};
pub use update::Update;
