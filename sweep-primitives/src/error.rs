//! Device-level error types.

/// Failure raised by a single work-group while it runs a kernel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelFault {
    /// The kernel detected state it can never legitimately observe.
    #[error("invariant violated: {0}")]
    Invariant(String),
    /// Another work-group of the same dispatch faulted first.
    #[error("aborted after a fault in another work-group")]
    Aborted,
    /// The kernel body panicked.
    #[error("panicked: {0}")]
    Panic(String),
    /// The kernel asked for more local memory than it declared.
    #[error("local memory overrun: requested {requested} words, {available} available")]
    LocalOverrun { requested: usize, available: usize },
}

/// Central error type for device operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The allocator cannot satisfy a request.
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// A dispatch needs more work-group local memory than the device offers.
    #[error("kernel '{kernel}' needs {requested} bytes of local memory, device allows {limit}")]
    LocalMemoryExceeded {
        kernel: &'static str,
        requested: usize,
        limit: usize,
    },

    /// A dispatch uses a work-group wider than the device supports.
    #[error("kernel '{kernel}' uses work-group size {requested}, device allows {limit}")]
    WorkGroupTooLarge {
        kernel: &'static str,
        requested: u32,
        limit: u32,
    },

    /// The limits describe a device the executor cannot model.
    #[error("unsupported device limits: {0}")]
    UnsupportedLimits(String),

    /// A work-group failed while running a kernel.
    #[error("kernel '{kernel}' failed in work-group {group}: {fault}")]
    KernelFault {
        kernel: &'static str,
        group: usize,
        fault: KernelFault,
    },

    /// The queue worker is gone; nothing committed afterwards can run.
    #[error("command queue is shut down")]
    QueueClosed,
}
