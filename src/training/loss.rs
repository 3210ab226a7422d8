//! Losses over predictions.

use ndarray::{Array2, ArrayView1};

use crate::error::{ConvError, Result};

/// Mean squared error
pub fn mse(prediction: ArrayView1<'_, f64>, target: ArrayView1<'_, f64>) -> Result<f64> {
    if prediction.len() != target.len() {
        return Err(ConvError::shape("mse target length", prediction.len(), target.len()));
    }
    if prediction.is_empty() {
        return Ok(0.0);
    }
    let sum: f64 = prediction
        .iter()
        .zip(target.iter())
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    Ok(sum / prediction.len() as f64)
}

/// `-log softmax(logits)[class]`, computed through log-sum-exp
pub fn softmax_cross_entropy(logits: ArrayView1<'_, f64>, class: usize) -> Result<f64> {
    if class >= logits.len() {
        return Err(ConvError::config(format!(
            "class {class} out of range for {} logits",
            logits.len()
        )));
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let log_sum = logits.iter().map(|&z| (z - max).exp()).sum::<f64>().ln() + max;
    Ok(log_sum - logits[class])
}

/// Mean cross-entropy over the rows of a per-cell prediction
pub fn cell_cross_entropy(logits: &Array2<f64>, labels: &[usize]) -> Result<f64> {
    if logits.nrows() != labels.len() {
        return Err(ConvError::shape("cell labels", logits.nrows(), labels.len()));
    }
    if labels.is_empty() {
        return Ok(0.0);
    }
    let mut total = 0.0;
    for (row, &label) in logits.rows().into_iter().zip(labels) {
        total += softmax_cross_entropy(row, label)?;
    }
    Ok(total / labels.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_mse() {
        let p = array![1.0, 2.0];
        assert_eq!(mse(p.view(), array![1.0, 4.0].view()).unwrap(), 2.0);
        assert!(mse(p.view(), array![1.0].view()).is_err());
    }

    #[test]
    fn test_cross_entropy_uniform_logits() {
        let ce = softmax_cross_entropy(array![0.0, 0.0, 0.0, 0.0].view(), 2).unwrap();
        assert_abs_diff_eq!(ce, 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_cross_entropy_large_logits_stay_finite() {
        let ce = softmax_cross_entropy(array![1000.0, 0.0].view(), 0).unwrap();
        assert_abs_diff_eq!(ce, 0.0, epsilon = 1e-12);
        assert!(softmax_cross_entropy(array![0.0].view(), 1).is_err());
    }

    #[test]
    fn test_cell_cross_entropy_averages_rows() {
        let logits = array![[0.0, 0.0], [1000.0, 0.0]];
        let ce = cell_cross_entropy(&logits, &[1, 0]).unwrap();
        assert_abs_diff_eq!(ce, 2.0_f64.ln() / 2.0, epsilon = 1e-12);
    }
}
