//! Whole sort inside one work-group, for inputs that fit a single tile.
//!
//! Keys (and values) stay in per-item registers across all stages. Each
//! stage ranks the tile, then routes keys through a local exchange buffer to
//! their new slots, and values through the same buffer after them.

use std::marker::PhantomData;

use sweep_primitives::{Kernel, KernelFault, LocalMemory, WorkGroup};

use crate::key::{SortKey, SortOrder};
use crate::params::Geometry;
use crate::range::ElementView;

use super::rank::{rank_tile, RankTables};
use super::ValuePair;

pub(crate) struct SingleGroupKernel<K> {
    pub src: ElementView,
    pub dst: ElementView,
    pub values: Option<ValuePair>,
    pub n: usize,
    pub order: SortOrder,
    pub geometry: Geometry,
    pub _key: PhantomData<fn() -> K>,
}

fn exchange(
    group: &WorkGroup<'_>,
    buffer: &mut [u32],
    items: &mut [[u32; 2]],
    ranks: &[u32],
    words: usize,
) {
    for (item, &r) in items.iter().zip(ranks) {
        buffer[r as usize * words..][..words].copy_from_slice(&item[..words]);
    }
    group.barrier();
    for (i, item) in items.iter_mut().enumerate() {
        item[..words].copy_from_slice(&buffer[i * words..][..words]);
    }
    group.barrier();
}

impl<K: SortKey> Kernel for SingleGroupKernel<K> {
    fn name(&self) -> &'static str {
        "single_group_sort"
    }

    fn local_mem_bytes(&self, _group_size: u32) -> usize {
        self.geometry.single_group_local_words() * 4
    }

    fn run(&self, group: &WorkGroup<'_>, local: &mut LocalMemory) -> Result<(), KernelFault> {
        let g = &self.geometry;
        let tile_len = g.tile;
        let radix = g.radix;
        let kw = g.key_words;
        let vw = g.value_words;
        if self.n > tile_len {
            return Err(KernelFault::Invariant(format!(
                "{} keys exceed the single-group tile of {tile_len}",
                self.n
            )));
        }

        let [exchange_buf, sg_counts, counts, offsets] = local.carve([
            tile_len * kw.max(vw),
            radix * g.num_sub_groups,
            radix,
            radix,
        ])?;

        let identity = K::identity(self.order).to_words();
        let mut keys: Vec<[u32; 2]> = (0..tile_len)
            .map(|i| if i < self.n { self.src.load_words(i) } else { identity })
            .collect();
        let mut values: Vec<[u32; 2]> = match &self.values {
            Some(v) => (0..tile_len)
                .map(|i| if i < self.n { v.src.load_words(i) } else { [0; 2] })
                .collect(),
            None => Vec::new(),
        };
        let mut digits = vec![0u32; tile_len];
        let mut ranks = vec![0u32; tile_len];
        group.barrier();

        for stage in 0..g.stages {
            for (d, key) in digits.iter_mut().zip(&keys) {
                *d = K::from_words(*key).bucket(self.order, stage, g.radix_bits);
            }
            let mut tables = RankTables {
                sg_counts: &mut sg_counts[..],
                counts: &mut counts[..],
                offsets: &mut offsets[..],
            };
            rank_tile(group, g, &digits, &mut ranks, &mut tables);
            exchange(group, exchange_buf, &mut keys, &ranks, kw);
            if vw > 0 {
                exchange(group, exchange_buf, &mut values, &ranks, vw);
            }
        }

        // Padding sorts to the tail in every stage, so the first n slots are the result.
        for (j, key) in keys.iter().take(self.n).enumerate() {
            self.dst.store_words(j, *key);
        }
        if let Some(v) = &self.values {
            for (j, value) in values.iter().take(self.n).enumerate() {
                v.dst.store_words(j, *value);
            }
        }
        Ok(())
    }
}
