use sweep_primitives::collectives::{exclusive_scan, sub_group_exclusive_scan, SUB_GROUP_SIZE};
use sweep_primitives::{DeviceBuffer, Kernel, KernelFault, LocalMemory, WorkGroup};

const LANES: usize = SUB_GROUP_SIZE as usize;

/// Exclusive scan of one histogram row per work-group.
pub(crate) struct ScanKernel {
    pub hist: DeviceBuffer,
    pub radix: usize,
    /// Expected row total, checked in debug builds.
    pub n: usize,
}

impl Kernel for ScanKernel {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn local_mem_bytes(&self, _group_size: u32) -> usize {
        (self.radix + self.radix.div_ceil(LANES)) * 4
    }

    fn run(&self, group: &WorkGroup<'_>, local: &mut LocalMemory) -> Result<(), KernelFault> {
        let row = group.id() * self.radix;
        let [counts, totals] = local.carve([self.radix, self.radix.div_ceil(LANES)])?;
        for (b, c) in counts.iter_mut().enumerate() {
            *c = self.hist.load(row + b);
        }
        group.barrier();

        // Scan within each sub-group, then across sub-group totals.
        for (chunk, total) in counts.chunks_mut(LANES).zip(totals.iter_mut()) {
            let mut lanes = [0u32; LANES];
            lanes[..chunk.len()].copy_from_slice(chunk);
            *total = sub_group_exclusive_scan(&mut lanes);
            chunk.copy_from_slice(&lanes[..chunk.len()]);
        }
        group.barrier();
        let total = exclusive_scan(totals);
        group.barrier();
        for (chunk, &base) in counts.chunks_mut(LANES).zip(totals.iter()) {
            for c in chunk {
                *c = c.wrapping_add(base);
            }
        }

        if cfg!(debug_assertions) && total as usize != self.n {
            return Err(KernelFault::Invariant(format!(
                "histogram row {} sums to {total}, expected {}",
                group.id(),
                self.n
            )));
        }
        group.barrier();
        self.hist.write(row, counts);
        Ok(())
    }
}
