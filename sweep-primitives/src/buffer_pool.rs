//! Buffer pool with 16KB page-aligned accounting, recycling, and peak tracking.
//!
//! Every allocation is charged against a fixed global-memory capacity in whole
//! pages. Storage released by a dropped [`DeviceBuffer`] goes back to the pool
//! and is handed out again, re-zeroed, to the next request of the same size.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::buffer::DeviceBuffer;
use crate::error::DeviceError;

/// Allocation granule in bytes.
pub const PAGE_SIZE: usize = 16384;

/// Released storages kept for reuse; older ones are freed beyond this.
const MAX_FREE_ENTRIES: usize = 16;

/// Round up to the nearest 16KB page boundary.
pub(crate) fn page_align(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

struct PoolInner {
    /// Released storages, keyed by aligned size.
    free: Vec<(usize, Box<[AtomicU32]>)>,
    /// Bytes currently held by live buffers.
    allocated_bytes: usize,
    /// High-water mark of `allocated_bytes`.
    peak_bytes: usize,
    next_id: u64,
}

pub(crate) struct PoolShared {
    capacity: usize,
    inner: Mutex<PoolInner>,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Called by a dropped buffer to give back its reservation.
    pub(crate) fn release(&self, reserved: usize, words: Box<[AtomicU32]>) {
        let mut inner = self.lock();
        inner.allocated_bytes = inner.allocated_bytes.saturating_sub(reserved);
        if words.is_empty() {
            return;
        }
        if inner.free.len() >= MAX_FREE_ENTRIES {
            inner.free.remove(0);
        }
        inner.free.push((reserved, words));
        log::trace!(
            "buffer pool: released {reserved} bytes, {} bytes still allocated",
            inner.allocated_bytes
        );
    }
}

/// A recycling allocator for device global memory.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create an empty pool that can hold `capacity_bytes` of live buffers.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                capacity: capacity_bytes,
                inner: Mutex::new(PoolInner {
                    free: Vec::new(),
                    allocated_bytes: 0,
                    peak_bytes: 0,
                    next_id: 0,
                }),
            }),
        }
    }

    /// Allocate (or recycle) a zeroed buffer of `words` 32-bit words.
    pub fn alloc(&self, words: usize) -> Result<DeviceBuffer, DeviceError> {
        let bytes = words
            .checked_mul(4)
            .ok_or(DeviceError::OutOfMemory {
                requested: usize::MAX,
                available: self.available_bytes(),
            })?;
        let aligned = page_align(bytes);

        let mut inner = self.shared.lock();
        let available = self.shared.capacity.saturating_sub(inner.allocated_bytes);
        if aligned > available {
            log::warn!("buffer pool: {aligned} bytes requested, {available} available");
            return Err(DeviceError::OutOfMemory {
                requested: aligned,
                available,
            });
        }

        let storage = match inner
            .free
            .iter()
            .position(|(size, s)| *size == aligned && s.len() == words)
        {
            Some(pos) => {
                let (_, storage) = inner.free.swap_remove(pos);
                for w in storage.iter() {
                    w.store(0, Ordering::Relaxed);
                }
                storage
            }
            None => (0..words).map(|_| AtomicU32::new(0)).collect(),
        };

        inner.allocated_bytes += aligned;
        inner.peak_bytes = inner.peak_bytes.max(inner.allocated_bytes);
        let id = inner.next_id;
        inner.next_id += 1;
        drop(inner);

        Ok(DeviceBuffer::from_parts(
            id,
            storage,
            aligned,
            Arc::clone(&self.shared),
        ))
    }

    /// Allocate a buffer and upload `data` into it.
    pub fn alloc_with_data(&self, data: &[u32]) -> Result<DeviceBuffer, DeviceError> {
        let buffer = self.alloc(data.len())?;
        buffer.write(0, data);
        Ok(buffer)
    }

    /// Bytes held by live buffers, in whole pages.
    pub fn allocated_bytes(&self) -> usize {
        self.shared.lock().allocated_bytes
    }

    /// Peak of [`allocated_bytes`](Self::allocated_bytes) observed.
    pub fn peak_bytes(&self) -> usize {
        self.shared.lock().peak_bytes
    }

    /// Total global memory this pool may hand out.
    pub fn capacity_bytes(&self) -> usize {
        self.shared.capacity
    }

    /// Bytes that can still be allocated.
    pub fn available_bytes(&self) -> usize {
        self.shared
            .capacity
            .saturating_sub(self.shared.lock().allocated_bytes)
    }

    /// Number of released storages waiting for reuse.
    pub fn available_count(&self) -> usize {
        self.shared.lock().free.len()
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.lock();
        f.debug_struct("BufferPool")
            .field("capacity", &self.shared.capacity)
            .field("allocated_bytes", &inner.allocated_bytes)
            .field("peak_bytes", &inner.peak_bytes)
            .field("free", &inner.free.len())
            .finish()
    }
}
