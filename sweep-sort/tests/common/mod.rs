#![allow(dead_code)]

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sweep_sort::{DeviceContext, DeviceLimits, GpuSorter, SortParams};

pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

pub fn sorter() -> GpuSorter {
    GpuSorter::new().unwrap()
}

/// 1024-key tiles, so modest inputs already span many tiles.
pub fn small_tile_params() -> SortParams {
    SortParams {
        radix_bits: 8,
        work_group_size: 32,
        data_per_work_item: 32,
    }
}

pub fn small_tile_sorter() -> GpuSorter {
    sorter_on(DeviceLimits::host(), small_tile_params())
}

pub fn sorter_on(limits: DeviceLimits, params: SortParams) -> GpuSorter {
    let ctx = DeviceContext::with_limits(limits).unwrap();
    GpuSorter::with_context(ctx, params).unwrap()
}

/// Verify that `indices` is a valid permutation of 0..n.
pub fn verify_permutation(indices: &[u32], n: usize) -> bool {
    if indices.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &idx in indices {
        let i = idx as usize;
        if i >= n || seen[i] {
            return false;
        }
        seen[i] = true;
    }
    true
}

/// Verify that data[indices[i]] <= data[indices[i+1]] for all consecutive pairs.
pub fn verify_sorted_by_indices<T: PartialOrd>(data: &[T], indices: &[u32]) -> bool {
    indices
        .windows(2)
        .all(|w| data[w[0] as usize] <= data[w[1] as usize])
}

/// Verify that the same multiset of (key, value) pairs exists before and after sorting.
pub fn verify_pairs_preserved<K: Ord + Copy, V: Ord + Copy>(
    orig_keys: &[K],
    orig_vals: &[V],
    sorted_keys: &[K],
    sorted_vals: &[V],
) -> bool {
    if orig_keys.len() != sorted_keys.len() || orig_vals.len() != sorted_vals.len() {
        return false;
    }
    let mut orig_pairs: Vec<(K, V)> = orig_keys.iter().copied().zip(orig_vals.iter().copied()).collect();
    let mut sorted_pairs: Vec<(K, V)> = sorted_keys.iter().copied().zip(sorted_vals.iter().copied()).collect();
    orig_pairs.sort();
    sorted_pairs.sort();
    orig_pairs == sorted_pairs
}

/// Stable host reference for a key-value sort: pairs ordered by key, ties in input order.
pub fn reference_pairs<K: Ord + Copy, V: Copy>(keys: &[K], vals: &[V], descending: bool) -> (Vec<K>, Vec<V>) {
    let mut pairs: Vec<(K, V)> = keys.iter().copied().zip(vals.iter().copied()).collect();
    if descending {
        pairs.sort_by(|a, b| b.0.cmp(&a.0));
    } else {
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
    }
    pairs.into_iter().unzip()
}

/// Index of the first mismatch, or `len` if none.
pub fn first_diff<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    a.iter().zip(b).position(|(x, y)| x != y).unwrap_or(a.len().min(b.len()))
}
