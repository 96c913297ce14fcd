//! Device global memory: a shared array of 32-bit words.
//!
//! Buffers are reference counted. Clones alias the same storage, which is how
//! a command buffer keeps its inputs alive until the device is done with them.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::buffer_pool::PoolShared;

struct BufferInner {
    id: u64,
    words: Box<[AtomicU32]>,
    reserved: usize,
    pool: Arc<PoolShared>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        let words = std::mem::take(&mut self.words);
        self.pool.release(self.reserved, words);
    }
}

/// Handle to a buffer in device global memory.
#[derive(Clone)]
pub struct DeviceBuffer {
    inner: Arc<BufferInner>,
}

impl DeviceBuffer {
    pub(crate) fn from_parts(
        id: u64,
        words: Box<[AtomicU32]>,
        reserved: usize,
        pool: Arc<PoolShared>,
    ) -> Self {
        Self {
            inner: Arc::new(BufferInner {
                id,
                words,
                reserved,
                pool,
            }),
        }
    }

    /// Pool-unique identifier of the underlying storage.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// True when both handles refer to the same storage.
    pub fn same_buffer(&self, other: &DeviceBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Length in 32-bit words.
    pub fn len_words(&self) -> usize {
        self.inner.words.len()
    }

    /// Bytes reserved from the pool for this buffer.
    pub fn reserved_bytes(&self) -> usize {
        self.inner.reserved
    }

    #[inline]
    pub fn load(&self, index: usize) -> u32 {
        self.inner.words[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn store(&self, index: usize, value: u32) {
        self.inner.words[index].store(value, Ordering::Relaxed);
    }

    /// Load that synchronizes with a [`store_release`](Self::store_release).
    #[inline]
    pub fn load_acquire(&self, index: usize) -> u32 {
        self.inner.words[index].load(Ordering::Acquire)
    }

    /// Store that publishes every earlier write of this work-group.
    #[inline]
    pub fn store_release(&self, index: usize, value: u32) {
        self.inner.words[index].store(value, Ordering::Release);
    }

    /// Atomic add, returning the previous value.
    #[inline]
    pub fn fetch_add(&self, index: usize, value: u32) -> u32 {
        self.inner.words[index].fetch_add(value, Ordering::AcqRel)
    }

    /// Set every word in `range` to `value`.
    pub fn fill(&self, range: Range<usize>, value: u32) {
        for w in &self.inner.words[range] {
            w.store(value, Ordering::Relaxed);
        }
    }

    /// Copy `data` into the buffer starting at word `offset`.
    pub fn write(&self, offset: usize, data: &[u32]) {
        let dst = &self.inner.words[offset..offset + data.len()];
        for (w, &v) in dst.iter().zip(data) {
            w.store(v, Ordering::Relaxed);
        }
    }

    /// Read back the words in `range`.
    pub fn read(&self, range: Range<usize>) -> Vec<u32> {
        self.inner.words[range]
            .iter()
            .map(|w| w.load(Ordering::Relaxed))
            .collect()
    }
}

impl std::fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.inner.id)
            .field("len_words", &self.inner.words.len())
            .finish()
    }
}
