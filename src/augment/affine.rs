use rand::Rng;

/// Pixel lookup used when resampling a warped image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    Bilinear,
}

/// Sampling ranges of a random affine transform. Rotation and shear are in degrees, translation is
/// a fraction of the image width and height, and every range is inclusive.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RandomAffine {
    pub degrees: (f32, f32),
    /// Maximum horizontal and vertical shift as fractions of width and height.
    pub translate: (f32, f32),
    pub scale: (f32, f32),
    /// Range of the horizontal shear.
    pub shear: (f32, f32),
}

impl RandomAffine {
    /// Draws one transform for an image of `width` × `height`.
    pub fn sample<R: Rng>(&self, rng: &mut R, width: usize, height: usize) -> AffineTransform {
        let angle = uniform(rng, self.degrees);
        let max_dx = self.translate.0 * width as f32;
        let max_dy = self.translate.1 * height as f32;
        let translate = (
            uniform(rng, (-max_dx, max_dx)).round(),
            uniform(rng, (-max_dy, max_dy)).round(),
        );
        let scale = uniform(rng, self.scale);
        let shear = (uniform(rng, self.shear), 0.);
        AffineTransform::from_params(angle, translate, scale, shear, width, height)
    }
}

fn uniform<R: Rng>(rng: &mut R, (low, high): (f32, f32)) -> f32 {
    if low >= high {
        return low;
    }
    rng.gen_range(low..=high)
}

/// An inverse 2×3 affine map from output pixel coordinates to source pixel coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineTransform {
    matrix: [f32; 6],
}

impl AffineTransform {
    pub fn identity() -> AffineTransform {
        AffineTransform {
            matrix: [1., 0., 0., 0., 1., 0.],
        }
    }

    pub fn from_inverse_matrix(matrix: [f32; 6]) -> AffineTransform {
        AffineTransform { matrix }
    }

    /// Builds the inverse of a rotation + shear + scale about the image centre followed by a
    /// translation, all given in the forward direction.
    pub fn from_params(
        angle: f32,
        translate: (f32, f32),
        scale: f32,
        shear: (f32, f32),
        width: usize,
        height: usize,
    ) -> AffineTransform {
        let rot = angle.to_radians();
        let (sx, sy) = (shear.0.to_radians(), shear.1.to_radians());

        // Forward rotation + shear, before scaling
        let a = (rot - sy).cos() / sy.cos();
        let b = -(rot - sy).cos() * sx.tan() / sy.cos() - rot.sin();
        let c = (rot - sy).sin() / sy.cos();
        let d = -(rot - sy).sin() * sx.tan() / sy.cos() + rot.cos();

        let det = (a * d - b * c) * scale;
        if det.abs() < f32::EPSILON {
            return AffineTransform::identity();
        }
        let (i00, i01, i10, i11) = (d / det, -b / det, -c / det, a / det);

        let cx = (width as f32 - 1.) * 0.5;
        let cy = (height as f32 - 1.) * 0.5;
        let (ox, oy) = (cx + translate.0, cy + translate.1);
        AffineTransform {
            matrix: [
                i00,
                i01,
                cx - i00 * ox - i01 * oy,
                i10,
                i11,
                cy - i10 * ox - i11 * oy,
            ],
        }
    }

    pub fn matrix(&self) -> &[f32; 6] {
        &self.matrix
    }

    /// Maps an output pixel to the source position it samples from.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.matrix;
        (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
    }
}

fn sample_or_zero(src: &[f32], width: usize, height: usize, x: i64, y: i64) -> f32 {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return 0.;
    }
    src[y as usize * width + x as usize]
}

/// Resamples a single row-major plane. Pixels that map outside of the source are filled with zero.
pub fn warp_plane(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    transform: &AffineTransform,
    interpolation: Interpolation,
) {
    debug_assert_eq!(src.len(), width * height);
    debug_assert_eq!(dst.len(), width * height);

    for y in 0..height {
        for x in 0..width {
            let (sx, sy) = transform.apply(x as f32, y as f32);
            dst[y * width + x] = match interpolation {
                Interpolation::Nearest => {
                    sample_or_zero(src, width, height, sx.round() as i64, sy.round() as i64)
                }
                Interpolation::Bilinear => {
                    let (fx0, fy0) = (sx.floor(), sy.floor());
                    let (x0, y0) = (fx0 as i64, fy0 as i64);
                    let (ax, ay) = (sx - fx0, sy - fy0);
                    sample_or_zero(src, width, height, x0, y0) * (1. - ax) * (1. - ay)
                        + sample_or_zero(src, width, height, x0 + 1, y0) * ax * (1. - ay)
                        + sample_or_zero(src, width, height, x0, y0 + 1) * (1. - ax) * ay
                        + sample_or_zero(src, width, height, x0 + 1, y0 + 1) * ax * ay
                }
            };
        }
    }
}
