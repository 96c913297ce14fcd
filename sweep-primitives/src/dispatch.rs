//! Grid launch on the emulated device.
//!
//! The executor owns a rayon pool with one thread per compute unit. Each
//! work-group of a dispatch becomes one task on that pool and runs to
//! completion without ever yielding to another group's task, so a group
//! that waits on global memory only ever waits on groups already running.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::error::{DeviceError, KernelFault};
use crate::hardware::{DeviceLimits, SUB_GROUP_SIZE};
use crate::kernel::{Kernel, LocalMemory, WorkGroup};
use crate::timing::DispatchTiming;

/// Launch shape: number of work-groups and work-items per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub groups: usize,
    pub group_size: u32,
}

impl Grid {
    pub fn new(groups: usize, group_size: u32) -> Self {
        Self { groups, group_size }
    }

    /// Enough groups to cover `n` elements at `per_group` elements each.
    pub fn for_elements(n: usize, per_group: usize, group_size: u32) -> Self {
        Self {
            groups: n.div_ceil(per_group.max(1)).max(1),
            group_size,
        }
    }
}

/// Check a launch against the device limits. Returns the local-memory
/// footprint in bytes.
pub fn validate_launch(
    limits: &DeviceLimits,
    kernel: &dyn Kernel,
    grid: Grid,
) -> Result<usize, DeviceError> {
    if grid.group_size == 0
        || grid.group_size > limits.max_work_group_size
        || grid.group_size % SUB_GROUP_SIZE != 0
    {
        return Err(DeviceError::WorkGroupTooLarge {
            kernel: kernel.name(),
            requested: grid.group_size,
            limit: limits.max_work_group_size,
        });
    }
    let local_bytes = kernel.local_mem_bytes(grid.group_size);
    if local_bytes > limits.max_local_mem_per_group {
        return Err(DeviceError::LocalMemoryExceeded {
            kernel: kernel.name(),
            requested: local_bytes,
            limit: limits.max_local_mem_per_group,
        });
    }
    Ok(local_bytes)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs kernels, one rayon task per work-group.
pub struct Executor {
    limits: DeviceLimits,
    pool: rayon::ThreadPool,
}

impl Executor {
    pub fn new(limits: DeviceLimits) -> Result<Self, DeviceError> {
        limits.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limits.compute_units as usize)
            .thread_name(|i| format!("sweep-cu-{i}"))
            .build()
            .map_err(|e| DeviceError::UnsupportedLimits(e.to_string()))?;
        Ok(Self { limits, pool })
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }

    /// Run every work-group of `grid` and wait for all of them.
    ///
    /// The first group to fault aborts the rest; its fault is the one reported.
    pub fn dispatch(&self, kernel: &dyn Kernel, grid: Grid) -> Result<DispatchTiming, DeviceError> {
        let local_bytes = validate_launch(&self.limits, kernel, grid)?;
        let local_words = local_bytes.div_ceil(4);
        let abort = AtomicBool::new(false);
        let first_fault: Mutex<Option<(usize, KernelFault)>> = Mutex::new(None);
        let start = Instant::now();

        log::trace!(
            "dispatch '{}': {} groups x {} items, {} local bytes",
            kernel.name(),
            grid.groups,
            grid.group_size,
            local_bytes
        );

        self.pool.scope(|scope| {
            for id in 0..grid.groups {
                let abort = &abort;
                let first_fault = &first_fault;
                scope.spawn(move |_| {
                    if abort.load(Ordering::Relaxed) {
                        return;
                    }
                    let group = WorkGroup::new(id, grid.groups, grid.group_size, abort);
                    let mut local = LocalMemory::new(local_words);
                    let fault = match catch_unwind(AssertUnwindSafe(|| kernel.run(&group, &mut local))) {
                        Ok(Ok(())) => return,
                        Ok(Err(fault)) => fault,
                        Err(payload) => KernelFault::Panic(panic_message(payload)),
                    };
                    abort.store(true, Ordering::Relaxed);
                    let mut slot = first_fault.lock().unwrap_or_else(|e| e.into_inner());
                    let replace = match slot.as_ref() {
                        None => true,
                        Some((_, KernelFault::Aborted)) => fault != KernelFault::Aborted,
                        Some(_) => false,
                    };
                    if replace {
                        *slot = Some((id, fault));
                    }
                });
            }
        });

        let fault = first_fault.into_inner().unwrap_or_else(|e| e.into_inner());
        if let Some((group, fault)) = fault {
            log::warn!("kernel '{}' faulted in group {group}: {fault}", kernel.name());
            return Err(DeviceError::KernelFault {
                kernel: kernel.name(),
                group,
                fault,
            });
        }

        Ok(DispatchTiming {
            label: kernel.name(),
            groups: grid.groups,
            group_size: grid.group_size,
            elapsed: start.elapsed(),
        })
    }
}
