//! Per-rank linear readout `y = x W + b`.

use ndarray::Array2;

use crate::context::ComputeContext;
use crate::error::{ConvError, Result};
use crate::params::Parameterized;

#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    /// `[c_in, c_out]`
    weight: Array2<f64>,
    /// `[1, c_out]`, broadcast over cells
    bias: Array2<f64>,
}

impl Readout {
    pub fn new(in_channels: usize, out_channels: usize, ctx: &mut ComputeContext) -> Result<Self> {
        Ok(Self {
            weight: ctx.weight(in_channels, out_channels)?,
            bias: Array2::zeros((1, out_channels)),
        })
    }

    pub fn in_channels(&self) -> usize {
        self.weight.nrows()
    }

    pub fn out_channels(&self) -> usize {
        self.weight.ncols()
    }

    pub fn weight_mut(&mut self) -> &mut Array2<f64> {
        &mut self.weight
    }

    pub fn bias_mut(&mut self) -> &mut Array2<f64> {
        &mut self.bias
    }

    /// Per-cell output, `n × c_out`
    pub fn apply(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.in_channels() {
            return Err(ConvError::shape("readout input channels", self.in_channels(), x.ncols()));
        }
        Ok(x.dot(&self.weight) + &self.bias)
    }
}

impl Parameterized for Readout {
    fn parameters(&self) -> Vec<&Array2<f64>> {
        vec![&self.weight, &self.bias]
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        vec![&mut self.weight, &mut self.bias]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Initialization;
    use ndarray::array;

    #[test]
    fn test_bias_broadcast() {
        let mut r = Readout::new(2, 1, &mut ComputeContext::new(0).with_init(Initialization::Zeros)).unwrap();
        *r.weight_mut() = array![[1.0], [2.0]];
        *r.bias_mut() = array![[0.5]];
        assert_eq!(r.apply(&array![[1.0, 1.0], [0.0, -1.0]]).unwrap(), array![[3.5], [-1.5]]);
        assert_eq!(r.num_parameters(), 3);
        assert!(r.apply(&array![[1.0]]).is_err());
    }
}
