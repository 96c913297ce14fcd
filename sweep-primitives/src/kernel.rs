//! Kernel interface: what one work-group sees while it runs.
//!
//! Work-items inside a group are emulated by loops over the group's lanes,
//! so a barrier is the boundary between two such loops. [`WorkGroup::barrier`]
//! marks those boundaries; it does not block.

use std::sync::atomic::{compiler_fence, AtomicBool, Ordering};

use crate::error::KernelFault;
use crate::hardware::SUB_GROUP_SIZE;

/// Spins between cooperative yields in [`WorkGroup::spin_wait`].
const SPINS_PER_YIELD: u32 = 64;

/// A compute kernel. One call to [`run`](Kernel::run) executes one work-group.
pub trait Kernel: Send + Sync {
    /// Name used in errors, logs, and timings.
    fn name(&self) -> &'static str;

    /// Local memory one work-group needs at the given group size.
    fn local_mem_bytes(&self, _group_size: u32) -> usize {
        0
    }

    /// Execute a single work-group.
    fn run(&self, group: &WorkGroup<'_>, local: &mut LocalMemory) -> Result<(), KernelFault>;
}

/// Identity and control for the work-group being executed.
pub struct WorkGroup<'a> {
    id: usize,
    num_groups: usize,
    size: u32,
    abort: &'a AtomicBool,
}

impl<'a> WorkGroup<'a> {
    /// Identity of group `id` of `num_groups`. The executor builds these; a
    /// kernel body can also be driven directly with one.
    pub fn new(id: usize, num_groups: usize, size: u32, abort: &'a AtomicBool) -> Self {
        Self {
            id,
            num_groups,
            size,
            abort,
        }
    }

    /// Sequential index of this group in the grid.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Work-items in this group.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn sub_group_size(&self) -> u32 {
        SUB_GROUP_SIZE
    }

    pub fn num_sub_groups(&self) -> u32 {
        self.size.div_ceil(SUB_GROUP_SIZE)
    }

    /// Group-wide barrier with local-memory fence.
    #[inline]
    pub fn barrier(&self) {
        compiler_fence(Ordering::SeqCst);
    }

    /// True once another group of the dispatch has faulted.
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// One iteration of a busy-wait on global memory.
    ///
    /// Returns [`KernelFault::Aborted`] if the dispatch is being torn down, so
    /// that a wait on a faulted predecessor ends instead of spinning forever.
    pub fn spin_wait(&self, spins: &mut u32) -> Result<(), KernelFault> {
        if self.is_aborted() {
            return Err(KernelFault::Aborted);
        }
        *spins = spins.wrapping_add(1);
        if *spins % SPINS_PER_YIELD == 0 {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
        Ok(())
    }
}

/// Work-group local memory, in 32-bit words, zeroed at group start.
pub struct LocalMemory {
    words: Vec<u32>,
}

impl LocalMemory {
    pub fn new(words: usize) -> Self {
        Self {
            words: vec![0; words],
        }
    }

    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Split local memory into `N` disjoint regions of the given lengths.
    pub fn carve<const N: usize>(
        &mut self,
        lens: [usize; N],
    ) -> Result<[&mut [u32]; N], KernelFault> {
        let requested: usize = lens.iter().sum();
        if requested > self.words.len() {
            return Err(KernelFault::LocalOverrun {
                requested,
                available: self.words.len(),
            });
        }
        let mut rest: &mut [u32] = &mut self.words[..requested];
        Ok(std::array::from_fn(|i| {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(lens[i]);
            rest = tail;
            head
        }))
    }
}
