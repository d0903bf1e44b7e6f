use super::*;
use crate::cl_util;
use ocl::{flags, Context, Kernel, Program, Queue, SpatialDims};

const KERNEL_SRC: &str = r#"
__kernel void gemm(const int M, const int N, const int K,
                   __global const float* A,
                   __global const float* B,
                   __global float* C) {
    const int row = get_global_id(0);
    const int col = get_global_id(1);
    float acc = 0.0f;
    for (int k = 0; k < K; k++) {
        acc += A[row * K + k] * B[k * N + col];
    }
    C[row * N + col] = acc;
}

float sample_or_zero(__global const float* plane, const int W, const int H, const int x, const int y) {
    if (x < 0 || y < 0 || x >= W || y >= H) {
        return 0.0f;
    }
    return plane[y * W + x];
}

__kernel void warp_affine(const int H, const int W, const int C, const int bilinear,
                          __global const float* src,
                          __global const float* mats,
                          __global float* dst) {
    const int x = get_global_id(0);
    const int y = get_global_id(1);
    const int nc = get_global_id(2);
    __global const float* m = mats + (nc / C) * 6;
    __global const float* plane = src + nc * H * W;

    const float sx = m[0] * x + m[1] * y + m[2];
    const float sy = m[3] * x + m[4] * y + m[5];

    float v;
    if (bilinear) {
        const float fx0 = floor(sx);
        const float fy0 = floor(sy);
        const int x0 = (int)fx0;
        const int y0 = (int)fy0;
        const float ax = sx - fx0;
        const float ay = sy - fy0;
        v = sample_or_zero(plane, W, H, x0, y0) * (1.0f - ax) * (1.0f - ay)
          + sample_or_zero(plane, W, H, x0 + 1, y0) * ax * (1.0f - ay)
          + sample_or_zero(plane, W, H, x0, y0 + 1) * (1.0f - ax) * ay
          + sample_or_zero(plane, W, H, x0 + 1, y0 + 1) * ax * ay;
    } else {
        v = sample_or_zero(plane, W, H, (int)round(sx), (int)round(sy));
    }
    dst[nc * H * W + y * W + x] = v;
}
"#;

/// Runs gemm and the batched warp on the first OpenCL GPU found.
pub struct ClCompute {
    queue: Queue,
    program: Program,
    _context: Context,
}

impl ClCompute {
    pub fn new(device: Device) -> Result<ClCompute> {
        let unavailable = |e: ocl::Error| BenchError::device_unavailable(device, e);

        let (platform, cl_device) = cl_util::select_gpu()
            .map_err(|reason| BenchError::device_unavailable(device, reason))?
            .ok_or_else(|| BenchError::device_unavailable(device, "no OpenCL GPU found"))?;
        cl_util::describe_device(&cl_device).map_err(unavailable)?;

        let (queue, program, context) =
            cl_util::init_from_sources(platform, cl_device, &[KERNEL_SRC]).map_err(unavailable)?;
        Ok(ClCompute {
            queue,
            program,
            _context: context,
        })
    }

    fn err(e: ocl::Error) -> BenchError {
        BenchError::device_unavailable(Device::Gpu, e)
    }
}

impl Compute for ClCompute {
    fn name(&self) -> &str {
        "opencl"
    }

    fn gemm(&self, a: ArrayView2<f32>, b: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_gemm_dims(&a, &b)?;
        let (m, k) = a.dim();
        let n = b.ncols();
        if m == 0 || n == 0 || k == 0 {
            return Ok(Array2::zeros((m, n)));
        }
        let a = a.as_standard_layout();
        let b = b.as_standard_layout();
        let layout = || ShapeError::from_kind(ErrorKind::IncompatibleLayout);

        let a_buf = cl_util::create_buffer_from(
            a.as_slice().ok_or_else(layout)?,
            flags::MEM_READ_ONLY,
            &self.queue,
        )
        .map_err(Self::err)?;
        let b_buf = cl_util::create_buffer_from(
            b.as_slice().ok_or_else(layout)?,
            flags::MEM_READ_ONLY,
            &self.queue,
        )
        .map_err(Self::err)?;
        let c_buf = cl_util::create_buffer::<f32>(m * n, flags::MEM_WRITE_ONLY, &self.queue)
            .map_err(Self::err)?;

        let kernel = Kernel::builder()
            .program(&self.program)
            .name("gemm")
            .queue(self.queue.clone())
            .global_work_size(SpatialDims::Two(m, n))
            .arg(m as i32)
            .arg(n as i32)
            .arg(k as i32)
            .arg(&a_buf)
            .arg(&b_buf)
            .arg(&c_buf)
            .build()
            .map_err(Self::err)?;
        unsafe {
            kernel.enq().map_err(Self::err)?;
        }

        let out = cl_util::read_buf(&c_buf).map_err(Self::err)?;
        Ok(Array2::from_shape_vec((m, n), out)?)
    }

    fn warp_affine(
        &self,
        batch: ArrayView4<f32>,
        transforms: &[AffineTransform],
        interpolation: Interpolation,
    ) -> Result<Array4<f32>> {
        check_warp_dims(&batch, transforms)?;
        let (num, channels, height, width) = batch.dim();
        if batch.is_empty() {
            return Ok(Array4::zeros(batch.raw_dim()));
        }
        let batch = batch.as_standard_layout();
        let mats = transforms
            .iter()
            .flat_map(|t| t.matrix().iter().cloned())
            .collect::<Vec<f32>>();

        let src_buf = cl_util::create_buffer_from(
            batch
                .as_slice()
                .ok_or_else(|| ShapeError::from_kind(ErrorKind::IncompatibleLayout))?,
            flags::MEM_READ_ONLY,
            &self.queue,
        )
        .map_err(Self::err)?;
        let mats_buf = cl_util::create_buffer_from(&mats, flags::MEM_READ_ONLY, &self.queue)
            .map_err(Self::err)?;
        let dst_buf = cl_util::create_buffer::<f32>(batch.len(), flags::MEM_WRITE_ONLY, &self.queue)
            .map_err(Self::err)?;

        let bilinear = match interpolation {
            Interpolation::Nearest => 0,
            Interpolation::Bilinear => 1,
        };
        let kernel = Kernel::builder()
            .program(&self.program)
            .name("warp_affine")
            .queue(self.queue.clone())
            .global_work_size(SpatialDims::Three(width, height, num * channels))
            .arg(height as i32)
            .arg(width as i32)
            .arg(channels as i32)
            .arg(bilinear as i32)
            .arg(&src_buf)
            .arg(&mats_buf)
            .arg(&dst_buf)
            .build()
            .map_err(Self::err)?;
        unsafe {
            kernel.enq().map_err(Self::err)?;
        }

        let out = cl_util::read_buf(&dst_buf).map_err(Self::err)?;
        Ok(Array4::from_shape_vec((num, channels, height, width), out)?)
    }
}
