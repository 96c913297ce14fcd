use sweep_primitives::{DeviceError, KernelFault};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SortError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("insufficient device memory: requested {requested} bytes, {available} available")]
    InsufficientDeviceMemory { requested: usize, available: usize },
    #[error("device execution failed: {0}")]
    DeviceExecution(DeviceError),
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
    #[error("length mismatch: keys={keys}, values={values}")]
    LengthMismatch { keys: usize, values: usize },
}

impl From<DeviceError> for SortError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::OutOfMemory {
                requested,
                available,
            } => SortError::InsufficientDeviceMemory {
                requested,
                available,
            },
            DeviceError::KernelFault {
                kernel,
                group,
                fault: KernelFault::Invariant(msg),
            } => SortError::InternalInvariantViolation(format!(
                "{kernel} (work-group {group}): {msg}"
            )),
            e @ (DeviceError::LocalMemoryExceeded { .. } | DeviceError::WorkGroupTooLarge { .. }) => {
                SortError::InvalidParameter(e.to_string())
            }
            e => SortError::DeviceExecution(e),
        }
    }
}
