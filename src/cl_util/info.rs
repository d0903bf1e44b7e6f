use ocl::enums::{DeviceInfo, DeviceInfoResult};
use ocl::{flags, Device};

/// Returns the max work-group-size of the given OpenCL device.
pub fn max_wgs(device: &Device) -> ocl::Result<usize> {
    match device.info(DeviceInfo::MaxWorkGroupSize)? {
        DeviceInfoResult::MaxWorkGroupSize(max_wgs) => Ok(max_wgs),
        _ => Ok(1),
    }
}

pub fn describe_device(device: &Device) -> ocl::Result<()> {
    let device_type = match device.info(DeviceInfo::Type)? {
        DeviceInfoResult::Type(t) => match t {
            flags::DeviceType::CPU => "CPU",
            flags::DeviceType::GPU => "GPU",
            _ => "unknown device type",
        },
        _ => "unknown device type",
    };
    info!("Using {} \"{}\".", device_type, device.name()?);
    debug!("Maximum work-group-size: {}", max_wgs(device)?);
    Ok(())
}
