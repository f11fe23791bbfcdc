//! Device selection: CUDA > Metal > CPU fallback.

use candle_core::Device;
use propfusion_core::DevicePreference;

/// Resolve the configured preference to a concrete compute device.
///
/// `Cpu` always yields the CPU. `Auto` tries CUDA first (when compiled with
/// the `cuda` feature), then Metal (when compiled with the `metal` feature),
/// then falls back to CPU.
pub fn select_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Cpu => {
            tracing::debug!("Using CPU device");
            Device::Cpu
        }
        DevicePreference::Auto => best_available(),
    }
}

fn best_available() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            tracing::info!("Using CUDA device 0");
            return device;
        }
        tracing::warn!("CUDA feature enabled but no GPU available, falling back");
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            tracing::info!("Using Metal device 0");
            return device;
        }
        tracing::warn!("Metal feature enabled but no device available, falling back");
    }

    tracing::info!("No accelerator available, using CPU");
    Device::Cpu
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_preference_is_cpu() {
        assert!(matches!(select_device(DevicePreference::Cpu), Device::Cpu));
    }

    #[cfg(not(any(feature = "cuda", feature = "metal")))]
    #[test]
    fn test_auto_without_accelerators_is_cpu() {
        assert!(matches!(select_device(DevicePreference::Auto), Device::Cpu));
    }
}
