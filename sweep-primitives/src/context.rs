//! Device initialization: limits, global-memory pool, command queue.

use crate::buffer::DeviceBuffer;
use crate::buffer_pool::BufferPool;
use crate::command::CommandQueue;
use crate::error::DeviceError;
use crate::hardware::DeviceLimits;

/// Core device state shared by everything that submits work.
///
/// Clones share the same pool and queue.
#[derive(Clone, Debug)]
pub struct DeviceContext {
    limits: DeviceLimits,
    pool: BufferPool,
    queue: CommandQueue,
}

impl DeviceContext {
    /// Context for the host device.
    pub fn new() -> Result<Self, DeviceError> {
        Self::with_limits(DeviceLimits::host())
    }

    pub fn with_limits(limits: DeviceLimits) -> Result<Self, DeviceError> {
        limits.validate()?;
        let queue = CommandQueue::new(limits.clone())?;
        let pool = BufferPool::new(limits.global_mem_bytes);
        log::debug!(
            "device '{}': {} units, {} B local/unit, {} B global",
            limits.name,
            limits.compute_units,
            limits.local_mem_per_unit,
            limits.global_mem_bytes
        );
        Ok(Self {
            limits,
            pool,
            queue,
        })
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Allocate a zeroed buffer of `words` 32-bit words.
    pub fn alloc_buffer(&self, words: usize) -> Result<DeviceBuffer, DeviceError> {
        self.pool.alloc(words)
    }

    /// Allocate a buffer initialized with `data`.
    pub fn alloc_buffer_with_data(&self, data: &[u32]) -> Result<DeviceBuffer, DeviceError> {
        self.pool.alloc_with_data(data)
    }
}
