//! ONNX Runtime session construction

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;

use crate::error::{DetectionError, Result};
use crate::registry::DeviceKind;

/// Open a session for `path` placed on `device`
pub(crate) fn open_session(path: &Path, device: DeviceKind, intra_threads: usize) -> Result<Session> {
    if !path.exists() {
        return Err(DetectionError::ModelLoad(format!(
            "Model weights not found: {:?}",
            path
        )));
    }

    Session::builder()
        .and_then(|b| {
            if intra_threads > 0 {
                b.with_intra_threads(intra_threads)
            } else {
                Ok(b)
            }
        })
        .and_then(|b| match device {
            DeviceKind::Cuda => {
                b.with_execution_providers([CUDAExecutionProvider::default().build()])
            }
            DeviceKind::Cpu => Ok(b),
        })
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| DetectionError::ModelLoad(format!("Failed to load {:?}: {}", path, e)))
}

/// Lock a shared session (`run()` requires `&mut`)
pub(crate) fn lock_session<'a>(
    session: &'a Mutex<Session>,
    context: &str,
) -> Result<MutexGuard<'a, Session>> {
    session
        .lock()
        .map_err(|_| DetectionError::Inference(format!("{}: session lock poisoned", context)))
}
