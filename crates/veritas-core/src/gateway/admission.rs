//! Bounded-concurrency admission in front of inference
//!
//! Only the scoring step contends for the device; decoding and preprocessing
//! run outside the gate.

use std::time::Duration;

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::config::AdmissionConfig;
use crate::error::{DetectionError, Result};
use crate::registry::DeviceKind;

pub struct AdmissionGate {
    accelerator: Semaphore,
    cpu: Semaphore,
    timeout: Duration,
}

impl AdmissionGate {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self {
            accelerator: Semaphore::new(config.gpu_max_concurrent),
            cpu: Semaphore::new(config.cpu_max_concurrent),
            timeout: Duration::from_secs(config.acquire_timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn semaphore(&self, device: DeviceKind) -> &Semaphore {
        if device.is_accelerator() {
            &self.accelerator
        } else {
            &self.cpu
        }
    }

    /// Wait for an inference slot on `device`
    ///
    /// The slot is released when the permit drops.
    pub async fn admit(&self, device: DeviceKind) -> Result<SemaphorePermit<'_>> {
        let semaphore = self.semaphore(device);
        match tokio::time::timeout(self.timeout, semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(DetectionError::ResourceExhausted(format!(
                "{} admission gate closed",
                device
            ))),
            Err(_) => {
                log::warn!(
                    "No {} inference slot within {:?}, rejecting request",
                    device,
                    self.timeout
                );
                Err(DetectionError::ResourceExhausted(format!(
                    "Timed out waiting for a {} inference slot",
                    device
                )))
            }
        }
    }

    /// Free slots on `device`
    pub fn available(&self, device: DeviceKind) -> usize {
        self.semaphore(device).available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(gpu: usize, cpu: usize) -> AdmissionGate {
        AdmissionGate::new(&AdmissionConfig {
            gpu_max_concurrent: gpu,
            cpu_max_concurrent: cpu,
            acquire_timeout_secs: 1,
        })
        .with_timeout(Duration::from_millis(50))
    }

    #[tokio::test]
    async fn test_accelerator_is_serialised() {
        let gate = gate(1, 4);
        let held = gate.admit(DeviceKind::Cuda).await.unwrap();
        assert_eq!(gate.available(DeviceKind::Cuda), 0);

        let second = gate.admit(DeviceKind::Cuda).await;
        assert!(matches!(second, Err(DetectionError::ResourceExhausted(_))));

        // CPU slots are independent
        assert!(gate.admit(DeviceKind::Cpu).await.is_ok());

        drop(held);
        assert!(gate.admit(DeviceKind::Cuda).await.is_ok());
    }

    #[tokio::test]
    async fn test_cpu_bound() {
        let gate = gate(1, 2);
        let a = gate.admit(DeviceKind::Cpu).await.unwrap();
        let _b = gate.admit(DeviceKind::Cpu).await.unwrap();
        assert!(gate.admit(DeviceKind::Cpu).await.is_err());
        drop(a);
        assert_eq!(gate.available(DeviceKind::Cpu), 1);
    }
}
