//! Tuning parameters and the per-key geometry derived from them.

use serde::{Deserialize, Serialize};
use sweep_primitives::SUB_GROUP_SIZE;

use crate::error::SortError;
use crate::key::DeviceRepr;

/// Radix widths the kernels are built for.
pub const SUPPORTED_RADIX_BITS: &[u32] = &[8];
/// Work-group sizes the onesweep and single-group kernels accept.
pub const SUPPORTED_WORK_GROUP_SIZES: &[u32] = &[32, 64, 128];

/// Tuning bundle `{radix_bits, W, D}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortParams {
    pub radix_bits: u32,
    pub work_group_size: u32,
    pub data_per_work_item: u32,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            radix_bits: 8,
            work_group_size: 128,
            data_per_work_item: 32,
        }
    }
}

impl SortParams {
    pub fn validate(&self) -> Result<(), SortError> {
        if !SUPPORTED_RADIX_BITS.contains(&self.radix_bits) {
            return Err(SortError::InvalidParameter(format!(
                "radix_bits must be one of {SUPPORTED_RADIX_BITS:?}, got {}",
                self.radix_bits
            )));
        }
        if !SUPPORTED_WORK_GROUP_SIZES.contains(&self.work_group_size) {
            return Err(SortError::InvalidParameter(format!(
                "work_group_size must be one of {SUPPORTED_WORK_GROUP_SIZES:?}, got {}",
                self.work_group_size
            )));
        }
        let d = self.data_per_work_item;
        if d < 32 || d % 32 != 0 {
            return Err(SortError::InvalidParameter(format!(
                "data_per_work_item must be a positive multiple of 32, got {d}"
            )));
        }
        Ok(())
    }

    /// Keys per work-group tile.
    pub fn tile_size(&self) -> usize {
        self.work_group_size as usize * self.data_per_work_item as usize
    }
}

/// Everything the kernels need to know about one key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Geometry {
    pub radix_bits: u32,
    /// Bins per digit.
    pub radix: usize,
    pub stages: u32,
    pub work_group_size: u32,
    pub items_per_lane: usize,
    pub tile: usize,
    pub num_sub_groups: usize,
    pub key_words: usize,
    /// Zero for keys-only sorts.
    pub value_words: usize,
}

impl Geometry {
    pub fn new<K: DeviceRepr>(params: &SortParams, value_words: usize) -> Self {
        let stages = K::BITS.div_ceil(params.radix_bits);
        Self {
            radix_bits: params.radix_bits,
            radix: 1 << params.radix_bits,
            stages,
            work_group_size: params.work_group_size,
            items_per_lane: params.data_per_work_item as usize,
            tile: params.tile_size(),
            num_sub_groups: (params.work_group_size / SUB_GROUP_SIZE) as usize,
            key_words: K::WORDS,
            value_words,
        }
    }

    /// Local-memory words of one onesweep work-group: key and value tiles,
    /// per-sub-group counts, tile counts, tile offsets, global bases.
    pub fn onesweep_local_words(&self) -> usize {
        self.tile * (self.key_words + self.value_words) + self.radix * (self.num_sub_groups + 3)
    }

    /// Local-memory words of the single-group kernel: one exchange tile wide
    /// enough for keys or values, per-sub-group counts, tile counts, offsets.
    pub fn single_group_local_words(&self) -> usize {
        self.tile * self.key_words.max(self.value_words) + self.radix * (self.num_sub_groups + 2)
    }

    /// Words of one histogram replica.
    pub fn histogram_table_words(&self) -> usize {
        self.stages as usize * self.radix
    }
}
