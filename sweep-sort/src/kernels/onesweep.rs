//! One radix stage in one pass: rank each tile, look back for its global
//! bucket bases, scatter.

use std::marker::PhantomData;

use sweep_primitives::{DeviceBuffer, Kernel, KernelFault, LocalMemory, WorkGroup};

use crate::descriptor::{lookback, publish, DescriptorState};
use crate::key::{SortKey, SortOrder};
use crate::params::Geometry;
use crate::range::ElementView;

use super::rank::{rank_tile, RankTables};
use super::ValuePair;

/// Reorders `src` into `dst` by digit `stage`.
///
/// Tiles are claimed from `counters[stage]` rather than taken from the group
/// id, so a tile only ever waits on tiles claimed before it.
pub(crate) struct OnesweepKernel<K> {
    pub src: ElementView,
    pub dst: ElementView,
    pub values: Option<ValuePair>,
    /// Scanned histogram: global start of each (stage, digit).
    pub offsets: DeviceBuffer,
    /// `tiles x radix` partition descriptors, `INVALID` on entry.
    pub descriptors: DeviceBuffer,
    /// One virtual tile counter per stage.
    pub counters: DeviceBuffer,
    pub stage: u32,
    pub n: usize,
    pub order: SortOrder,
    pub geometry: Geometry,
    pub _key: PhantomData<fn() -> K>,
}

impl<K: SortKey> Kernel for OnesweepKernel<K> {
    fn name(&self) -> &'static str {
        "onesweep"
    }

    fn local_mem_bytes(&self, _group_size: u32) -> usize {
        self.geometry.onesweep_local_words() * 4
    }

    fn run(&self, group: &WorkGroup<'_>, local: &mut LocalMemory) -> Result<(), KernelFault> {
        let g = &self.geometry;
        let radix = g.radix;
        let tile_len = g.tile;
        let kw = g.key_words;
        let vw = g.value_words;
        let tiles = self.n.div_ceil(tile_len);
        let seeds = &self.offsets;
        let seed_row = self.stage as usize * radix;
        let identity = K::identity(self.order).to_words();

        let [local_keys, local_values, sg_counts, counts, offsets, global_base] = local.carve([
            tile_len * kw,
            tile_len * vw,
            radix * g.num_sub_groups,
            radix,
            radix,
            radix,
        ])?;

        // Per-item registers.
        let mut keys = vec![[0u32; 2]; tile_len];
        let mut values = vec![[0u32; 2]; if vw > 0 { tile_len } else { 0 }];
        let mut digits = vec![0u32; tile_len];
        let mut ranks = vec![0u32; tile_len];

        loop {
            let tile = self.counters.fetch_add(self.stage as usize, 1) as usize;
            if tile >= tiles {
                break;
            }
            let base = tile * tile_len;
            let valid = tile_len.min(self.n - base);

            for i in 0..tile_len {
                keys[i] = if i < valid {
                    self.src.load_words(base + i)
                } else {
                    identity
                };
                digits[i] = K::from_words(keys[i]).bucket(self.order, self.stage, g.radix_bits);
            }
            if let Some(v) = &self.values {
                for (i, slot) in values.iter_mut().enumerate().take(valid) {
                    *slot = v.src.load_words(base + i);
                }
            }
            group.barrier();

            let mut tables = RankTables {
                sg_counts: &mut sg_counts[..],
                counts: &mut counts[..],
                offsets: &mut offsets[..],
            };
            rank_tile(group, g, &digits, &mut ranks, &mut tables);
            // Padding is all in the last bucket and never written out.
            counts[radix - 1] -= (tile_len - valid) as u32;

            if tile == 0 {
                for b in 0..radix {
                    let seed = seeds.load(seed_row + b);
                    global_base[b] = seed;
                    publish(&self.descriptors, radix, 0, b, DescriptorState::Prefix(seed + counts[b]));
                }
            } else {
                for b in 0..radix {
                    publish(&self.descriptors, radix, tile, b, DescriptorState::Aggregate(counts[b]));
                }
                for b in 0..radix {
                    let seed = seeds.load(seed_row + b);
                    let exclusive = lookback(group, &self.descriptors, radix, tile, b, seed)?;
                    global_base[b] = exclusive;
                    publish(
                        &self.descriptors,
                        radix,
                        tile,
                        b,
                        DescriptorState::Prefix(exclusive + counts[b]),
                    );
                }
            }
            group.barrier();

            for i in 0..tile_len {
                let r = ranks[i] as usize;
                local_keys[r * kw..][..kw].copy_from_slice(&keys[i][..kw]);
                if vw > 0 && i < valid {
                    local_values[r * vw..][..vw].copy_from_slice(&values[i][..vw]);
                }
            }
            group.barrier();

            for j in 0..valid {
                let mut words = [0u32; 2];
                words[..kw].copy_from_slice(&local_keys[j * kw..][..kw]);
                let b = K::from_words(words).bucket(self.order, self.stage, g.radix_bits) as usize;
                let dst = (global_base[b] + j as u32 - offsets[b]) as usize;
                self.dst.store_words(dst, words);
                if let Some(v) = &self.values {
                    let mut vwords = [0u32; 2];
                    vwords[..vw].copy_from_slice(&local_values[j * vw..][..vw]);
                    v.dst.store_words(dst, vwords);
                }
            }
            group.barrier();
        }
        Ok(())
    }
}
