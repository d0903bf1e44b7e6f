use super::*;
use crate::augment::warp_plane;
use ndarray::{s, Axis};

/// Runs everything on the host. ndarray dispatches `dot` to `matrixmultiply`.
#[derive(Copy, Clone, Debug, Default)]
pub struct HostCompute;

impl Compute for HostCompute {
    fn name(&self) -> &str {
        "host"
    }

    fn gemm(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_gemm_dims(&a, &b)?;
        Ok(a.dot(&b))
    }

    fn warp_affine(
        &self,
        batch: ArrayView4<f32>,
        transforms: &[AffineTransform],
        interpolation: Interpolation,
    ) -> Result<Array4<f32>> {
        check_warp_dims(&batch, transforms)?;
        let (_, _, height, width) = batch.dim();
        let mut out = Array4::<f32>::zeros(batch.raw_dim());
        for (n, transform) in transforms.iter().enumerate() {
            let sample = batch.index_axis(Axis(0), n);
            for (c, plane) in sample.axis_iter(Axis(0)).enumerate() {
                let src = plane.as_standard_layout();
                let mut dst = out.slice_mut(s![n, c, .., ..]);
                let dst = dst
                    .as_slice_mut()
                    .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleLayout))?;
                let src = src
                    .as_slice()
                    .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleLayout))?;
                warp_plane(src, dst, width, height, transform, interpolation);
            }
        }
        Ok(out)
    }
}
