//! Tensor kernels shared by the layers: patch extraction for convolutions and the numerically
//! stable softmax family used by the losses.

mod loss;

pub use self::loss::*;
use crate::geometry::{PaddedSquare, Square};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use num_traits::Float;

/// Unrolls the receptive fields of a CHW image into the columns of a
/// `(channels * side * side) × (out_h * out_w)` matrix so that a convolution becomes a single gemm.
/// Rows are ordered channel-major, then filter row, then filter column.
pub fn im2col<T: Float>(image: ArrayView3<T>, filter: &PaddedSquare, padding: usize) -> Array2<T> {
    let (channels, height, width) = image.dim();
    let k = filter.side();
    let out_h = (height + 2 * padding + 1).saturating_sub(k);
    let out_w = (width + 2 * padding + 1).saturating_sub(k);

    let mut cols = Array2::<T>::zeros((channels * k * k, out_h * out_w));
    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let mut row = cols.row_mut((c * k + ki) * k + kj);
                for y in 0..out_h {
                    // Source row of this filter tap, skipped when it lands in the padding
                    let sy = (y + ki) as isize - padding as isize;
                    if sy < 0 || sy >= height as isize {
                        continue;
                    }
                    for x in 0..out_w {
                        let sx = (x + kj) as isize - padding as isize;
                        if sx >= 0 && sx < width as isize {
                            row[y * out_w + x] = image[[c, sy as usize, sx as usize]];
                        }
                    }
                }
            }
        }
    }
    cols
}

/// The adjoint of `im2col`: accumulates column gradients back into a CHW image of
/// `channels × height × width`.
pub fn col2im<T: Float>(
    cols: ArrayView2<T>,
    channels: usize,
    height: usize,
    width: usize,
    filter: &PaddedSquare,
    padding: usize,
) -> Array3<T> {
    let k = filter.side();
    let out_h = (height + 2 * padding + 1).saturating_sub(k);
    let out_w = (width + 2 * padding + 1).saturating_sub(k);

    let mut image = Array3::<T>::zeros((channels, height, width));
    for c in 0..channels {
        for ki in 0..k {
            for kj in 0..k {
                let row = cols.row((c * k + ki) * k + kj);
                for y in 0..out_h {
                    let sy = (y + ki) as isize - padding as isize;
                    if sy < 0 || sy >= height as isize {
                        continue;
                    }
                    for x in 0..out_w {
                        let sx = (x + kj) as isize - padding as isize;
                        if sx >= 0 && sx < width as isize {
                            image[[c, sy as usize, sx as usize]] =
                                image[[c, sy as usize, sx as usize]] + row[y * out_w + x];
                        }
                    }
                }
            }
        }
    }
    image
}

/// Row-wise `log(softmax(x))`, shifted by the row maximum.
pub fn log_softmax<T: Float>(logits: ArrayView2<T>) -> Array2<T> {
    let mut out = logits.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(T::neg_infinity(), T::max);
        let log_sum = row.iter().map(|&v| (v - max).exp()).fold(T::zero(), |a, b| a + b).ln();
        row.mapv_inplace(|v| v - max - log_sum);
    }
    out
}

/// Row-wise softmax.
pub fn softmax<T: Float>(logits: ArrayView2<T>) -> Array2<T> {
    log_softmax(logits).mapv(T::exp)
}
