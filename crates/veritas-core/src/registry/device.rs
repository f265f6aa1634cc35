//! Device placement
//!
//! The device is probed once per model load and stored on the loaded
//! variant; requests never re-query it.

use std::sync::OnceLock;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use serde::{Deserialize, Serialize};

use crate::config::DevicePreference;

/// Where a model's session executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
}

impl DeviceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }

    /// True for devices with limited shared memory
    pub fn is_accelerator(&self) -> bool {
        matches!(self, Self::Cuda)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

static CUDA_AVAILABLE: OnceLock<bool> = OnceLock::new();

/// Whether the CUDA execution provider can be registered in this process
pub fn cuda_available() -> bool {
    *CUDA_AVAILABLE.get_or_init(|| {
        match CUDAExecutionProvider::default().is_available() {
            Ok(available) => {
                log::info!("Device probe: CUDA execution provider available = {}", available);
                available
            }
            Err(e) => {
                log::info!("Device probe: CUDA execution provider unavailable ({})", e);
                false
            }
        }
    })
}

/// Resolve a configured preference into a concrete device
pub fn select_device(preference: DevicePreference) -> DeviceKind {
    resolve_preference(preference, cuda_available)
}

fn resolve_preference(preference: DevicePreference, probe: impl FnOnce() -> bool) -> DeviceKind {
    match preference {
        DevicePreference::Cpu => DeviceKind::Cpu,
        DevicePreference::Auto => {
            if probe() {
                DeviceKind::Cuda
            } else {
                DeviceKind::Cpu
            }
        }
        DevicePreference::Cuda => {
            if probe() {
                DeviceKind::Cuda
            } else {
                log::warn!("CUDA requested but not available, placing models on CPU");
                DeviceKind::Cpu
            }
        }
    }
}
