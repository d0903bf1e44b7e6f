//! Thin helpers over `ocl` for setting up a context, moving data and finding a GPU.

mod info;

pub use self::info::*;
use ocl::flags::DeviceType;
use ocl::{flags, Buffer, Context, Device, OclPrm, Platform, Program, Queue};

/// Finds the first GPU on any OpenCL platform. Platforms that fail to list their devices are
/// skipped; failing to enumerate platforms at all is reported as an error.
pub fn select_gpu() -> Result<Option<(Platform, Device)>, String> {
    let platform_ids = ocl::core::get_platform_ids().map_err(|e| e.to_string())?;
    for platform in platform_ids.into_iter().map(Platform::new) {
        match Device::list(platform, Some(DeviceType::GPU)) {
            Ok(devices) => {
                if let Some(device) = devices.into_iter().next() {
                    return Ok(Some((platform, device)));
                }
            }
            Err(err) => debug!("Skipping OpenCL platform without GPUs: {}", err),
        }
    }
    Ok(None)
}

/// Builds a context, a program from `kernel_srcs` and an in-order queue for `device`.
pub fn init_from_sources(
    platform: Platform,
    device: Device,
    kernel_srcs: &[&str],
) -> ocl::Result<(Queue, Program, Context)> {
    let context = Context::builder()
        .platform(platform)
        .devices(device)
        .build()?;

    let mut program_b = Program::builder();
    program_b.devices(device).cmplr_opt("-cl-std=CL1.2");
    // Input the kernel sources
    for &src in kernel_srcs {
        program_b.src(src);
    }
    let program = program_b.build(&context)?;

    let queue = Queue::new(&context, device, None)?;
    Ok((queue, program, context))
}

pub fn create_buffer<T>(length: usize, flags: flags::MemFlags, queue: &Queue) -> ocl::Result<Buffer<T>>
where
    T: OclPrm,
{
    Buffer::<T>::builder()
        .queue(queue.clone())
        .flags(flags)
        .len(length)
        .build()
}

/// Creates a device buffer initialized with a copy of `data`.
pub fn create_buffer_from<T>(data: &[T], flags: flags::MemFlags, queue: &Queue) -> ocl::Result<Buffer<T>>
where
    T: OclPrm,
{
    Buffer::<T>::builder()
        .queue(queue.clone())
        .flags(flags)
        .len(data.len())
        .copy_host_slice(data)
        .build()
}

/// Blocks until the contents of `buf` are read back into host memory.
pub fn read_buf<T: OclPrm>(buf: &Buffer<T>) -> ocl::Result<Vec<T>> {
    let mut out = vec![T::default(); buf.len()];
    buf.read(&mut out).enq()?;
    Ok(out)
}
