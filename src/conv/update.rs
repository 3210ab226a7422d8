//! Update functions applied elementwise after aggregation.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Elementwise nonlinearity chosen per layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Update {
    #[default]
    Identity,
    Sigmoid,
    Relu,
}

impl Update {
    pub fn apply(&self, x: Array2<f64>) -> Array2<f64> {
        match self {
            Update::Identity => x,
            Update::Sigmoid => x.mapv_into(|v| 1.0 / (1.0 + (-v).exp())),
            Update::Relu => x.mapv_into(|v| v.max(0.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_update_functions() {
        let x = array![[-1.0, 0.0, 2.0]];
        assert_eq!(Update::Identity.apply(x.clone()), x);
        assert_eq!(Update::Relu.apply(x.clone()), array![[0.0, 0.0, 2.0]]);
        let s = Update::Sigmoid.apply(x);
        assert_eq!(s[[0, 1]], 0.5);
        assert!(s.iter().all(|&v| v > 0.0 && v < 1.0));
    }

    #[test]
    fn test_serde_names() {
        let u: Update = serde_json::from_str("\"relu\"").unwrap();
        assert_eq!(u, Update::Relu);
    }
}
