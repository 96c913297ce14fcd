//! Global digit histogram over all stages at once.

use std::marker::PhantomData;

use sweep_primitives::{DeviceBuffer, Kernel, KernelFault, LocalMemory, WorkGroup};

use crate::key::{SortKey, SortOrder};
use crate::params::Geometry;
use crate::range::ElementView;

use super::HISTOGRAM_ITEMS_PER_THREAD;

/// Counts every digit of every key into `hist[stage * radix + digit]`.
///
/// The grid strides over chunks of `W_hist * 16` keys. Each work-item owns one
/// of `replicas` local sub-tables (item `i` uses replica `i % replicas`); the
/// replicas are folded into the first one and then added to the global table.
pub(crate) struct HistogramKernel<K> {
    pub keys: ElementView,
    pub hist: DeviceBuffer,
    pub n: usize,
    pub order: SortOrder,
    pub geometry: Geometry,
    pub replicas: usize,
    pub _key: PhantomData<fn() -> K>,
}

impl<K: SortKey> Kernel for HistogramKernel<K> {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn local_mem_bytes(&self, _group_size: u32) -> usize {
        self.replicas * self.geometry.histogram_table_words() * 4
    }

    fn run(&self, group: &WorkGroup<'_>, local: &mut LocalMemory) -> Result<(), KernelFault> {
        let table = self.geometry.histogram_table_words();
        let radix = self.geometry.radix;
        let stages = self.geometry.stages;
        let items = group.size() as usize;
        let chunk = items * HISTOGRAM_ITEMS_PER_THREAD;
        let chunks = self.n.div_ceil(chunk);

        let [tables] = local.carve([self.replicas * table])?;
        tables.fill(0);
        group.barrier();

        let mut c = group.id();
        while c < chunks {
            let base = c * chunk;
            for item in 0..items {
                let replica = &mut tables[(item % self.replicas) * table..][..table];
                for k in 0..HISTOGRAM_ITEMS_PER_THREAD {
                    let idx = base + k * items + item;
                    if idx >= self.n {
                        break;
                    }
                    let bits = self.keys.load::<K>(idx).ordered_bits(self.order);
                    for s in 0..stages {
                        let digit = (bits >> (s * self.geometry.radix_bits)) as usize & (radix - 1);
                        replica[s as usize * radix + digit] += 1;
                    }
                }
            }
            c += group.num_groups();
        }
        group.barrier();

        let (first, rest) = tables.split_at_mut(table);
        for replica in rest.chunks_exact(table) {
            for (acc, &v) in first.iter_mut().zip(replica) {
                *acc += v;
            }
        }
        group.barrier();

        for (slot, &count) in first.iter().enumerate() {
            if count != 0 {
                self.hist.fetch_add(slot, count);
            }
        }
        Ok(())
    }
}
