use super::{log_softmax, softmax};
use crate::error::Result;
use ndarray::{Array2, ArrayView2, ErrorKind, ShapeError};

/// The training criterion of a classifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LossKind {
    /// Negative log-likelihood over log-probabilities.
    Nll,
    /// Softmax cross-entropy over raw logits.
    CrossEntropy,
}

/// The mean loss of a batch and its gradient with respect to the network output.
#[derive(Debug)]
pub struct LossOutput {
    pub loss: f32,
    pub grad: Array2<f32>,
}

impl LossKind {
    pub fn compute(self, output: ArrayView2<f32>, targets: &[usize]) -> Result<LossOutput> {
        match self {
            LossKind::Nll => nll_loss(output, targets),
            LossKind::CrossEntropy => cross_entropy(output, targets),
        }
    }
}

fn check_targets(output: &ArrayView2<f32>, targets: &[usize]) -> Result<()> {
    if output.nrows() != targets.len() {
        return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
    }
    if targets.iter().any(|&t| t >= output.ncols()) {
        return Err(ShapeError::from_kind(ErrorKind::OutOfBounds).into());
    }
    Ok(())
}

pub fn nll_loss(log_probs: ArrayView2<f32>, targets: &[usize]) -> Result<LossOutput> {
    check_targets(&log_probs, targets)?;
    let n = targets.len().max(1) as f32;
    let mut grad = Array2::<f32>::zeros(log_probs.raw_dim());
    let mut loss = 0f32;
    for (i, &t) in targets.iter().enumerate() {
        loss -= log_probs[[i, t]];
        grad[[i, t]] = -1. / n;
    }
    Ok(LossOutput {
        loss: loss / n,
        grad,
    })
}

pub fn cross_entropy(logits: ArrayView2<f32>, targets: &[usize]) -> Result<LossOutput> {
    check_targets(&logits, targets)?;
    let n = targets.len().max(1) as f32;
    let log_probs = log_softmax(logits);
    let mut grad = softmax(logits);
    let mut loss = 0f32;
    for (i, &t) in targets.iter().enumerate() {
        loss -= log_probs[[i, t]];
        grad[[i, t]] -= 1.;
    }
    grad.mapv_inplace(|g| g / n);
    Ok(LossOutput {
        loss: loss / n,
        grad,
    })
}
