//! Backend abstraction - compute device negotiation
//!
//! Inference walks a fixed preference order (Metal, then CUDA, then CPU) and
//! picks the first device the binary was built with. CPU (Burn ndarray) is
//! always available, so negotiation never fails.

use std::fmt;
use std::str::FromStr;

use burn::backend::Autodiff;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::utils::error::MpoxError;

// --------------------------------------------------------------------------------
// TRAINING BACKEND: CUDA, then Metal via wgpu, then NdArray
// --------------------------------------------------------------------------------

#[cfg(feature = "cuda")]
pub type DefaultBackend = burn_cuda::Cuda;

#[cfg(all(not(feature = "cuda"), feature = "wgpu", target_os = "macos"))]
pub type DefaultBackend = burn_wgpu::Wgpu;

#[cfg(all(
    not(feature = "cuda"),
    not(all(feature = "wgpu", target_os = "macos"))
))]
pub type DefaultBackend = burn_ndarray::NdArray<f32>;

/// The default autodiff backend for training
pub type TrainingBackend = Autodiff<DefaultBackend>;

/// Get the default device of the training backend
pub fn default_device() -> <DefaultBackend as burn::tensor::backend::Backend>::Device {
    <DefaultBackend as burn::tensor::backend::Backend>::Device::default()
}

/// Get a human-readable name for the training backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(all(not(feature = "cuda"), feature = "wgpu", target_os = "macos"))]
    {
        "Metal (wgpu)"
    }

    #[cfg(all(
        not(feature = "cuda"),
        not(all(feature = "wgpu", target_os = "macos"))
    ))]
    {
        "NdArray (CPU)"
    }
}

/// A concrete compute device the model can run on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeDevice {
    /// Apple GPU through wgpu's Metal backend
    Metal,
    /// NVIDIA GPU
    Cuda,
    /// Burn ndarray backend
    Cpu,
}

impl ComputeDevice {
    /// Negotiation order, most preferred first
    pub const PREFERENCE_ORDER: [ComputeDevice; 3] =
        [ComputeDevice::Metal, ComputeDevice::Cuda, ComputeDevice::Cpu];

    /// Whether support for this device was compiled into the binary
    pub fn is_compiled_in(self) -> bool {
        match self {
            ComputeDevice::Metal => cfg!(all(feature = "wgpu", target_os = "macos")),
            ComputeDevice::Cuda => cfg!(feature = "cuda"),
            ComputeDevice::Cpu => true,
        }
    }

    pub fn backend_name(self) -> &'static str {
        match self {
            ComputeDevice::Metal => "Metal (wgpu)",
            ComputeDevice::Cuda => "CUDA (GPU)",
            ComputeDevice::Cpu => "NdArray (CPU)",
        }
    }

    /// All devices available in this build, in preference order
    pub fn available() -> Vec<ComputeDevice> {
        Self::PREFERENCE_ORDER
            .into_iter()
            .filter(|d| d.is_compiled_in())
            .collect()
    }
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.backend_name())
    }
}

/// Requested compute device, as written in the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl DevicePreference {
    /// Resolve the preference to a device this build supports
    pub fn resolve(self) -> ComputeDevice {
        let requested = match self {
            DevicePreference::Auto => {
                return ComputeDevice::PREFERENCE_ORDER
                    .into_iter()
                    .find(|d| d.is_compiled_in())
                    .unwrap_or(ComputeDevice::Cpu);
            }
            DevicePreference::Cpu => ComputeDevice::Cpu,
            DevicePreference::Cuda => ComputeDevice::Cuda,
            DevicePreference::Metal => ComputeDevice::Metal,
        };

        if requested.is_compiled_in() {
            requested
        } else {
            warn!(
                "{} requested but not available in this build, falling back to CPU",
                requested
            );
            ComputeDevice::Cpu
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DevicePreference::Auto => "auto",
            DevicePreference::Cpu => "cpu",
            DevicePreference::Cuda => "cuda",
            DevicePreference::Metal => "metal",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for DevicePreference {
    type Err = MpoxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DevicePreference::Auto),
            "cpu" | "ndarray" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" | "mps" => Ok(DevicePreference::Metal),
            other => Err(MpoxError::Config(format!("unknown device '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_available() {
        let _device = default_device();
        assert!(!backend_name().is_empty());
    }

    #[test]
    fn test_cpu_always_available() {
        assert!(ComputeDevice::Cpu.is_compiled_in());
        assert_eq!(ComputeDevice::available().last(), Some(&ComputeDevice::Cpu));
        assert_eq!(DevicePreference::Cpu.resolve(), ComputeDevice::Cpu);
    }

    #[test]
    fn test_auto_picks_first_compiled_device() {
        let expected = ComputeDevice::available()[0];
        assert_eq!(DevicePreference::Auto.resolve(), expected);
    }

    #[test]
    fn test_unavailable_request_falls_back_to_cpu() {
        for (pref, device) in [
            (DevicePreference::Cuda, ComputeDevice::Cuda),
            (DevicePreference::Metal, ComputeDevice::Metal),
        ] {
            let resolved = pref.resolve();
            if device.is_compiled_in() {
                assert_eq!(resolved, device);
            } else {
                assert_eq!(resolved, ComputeDevice::Cpu);
            }
        }
    }

    #[test]
    fn test_preference_parsing() {
        assert_eq!("AUTO".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!("mps".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
        assert!("tpu".parse::<DevicePreference>().is_err());

        let json = serde_json::to_string(&DevicePreference::Cuda).unwrap();
        assert_eq!(json, "\"cuda\"");
    }
}
