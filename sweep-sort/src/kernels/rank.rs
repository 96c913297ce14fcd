//! Stable in-tile ranking by digit, one sub-group at a time.
//!
//! Sub-group `sg` owns the contiguous chunk `[sg * 32 * D, (sg + 1) * 32 * D)`
//! of the tile and walks it in `D` rounds of 32 lanes. In each round, lanes
//! holding the same digit find each other with `match_any`; a lane's rank
//! among its peers is the popcount of the peers below it. Rounds and chunks
//! are in element order, so equal digits keep their input order.

use sweep_primitives::collectives::{exclusive_scan, lanemask_lt, match_any, SUB_GROUP_SIZE};
use sweep_primitives::WorkGroup;

use crate::params::Geometry;

const LANES: usize = SUB_GROUP_SIZE as usize;

/// Local-memory tables the ranking step works in.
pub(crate) struct RankTables<'a> {
    /// `num_sub_groups x radix`: per-sub-group counts, then their prefixes.
    pub sg_counts: &'a mut [u32],
    /// `radix`: the tile's count per digit.
    pub counts: &'a mut [u32],
    /// `radix`: first tile slot of each digit.
    pub offsets: &'a mut [u32],
}

/// Rank every element of the tile by `digits`.
///
/// On return `ranks[i]` is element `i`'s slot in the digit-sorted tile,
/// `counts[b]` how many elements have digit `b`, and `offsets[b]` the
/// exclusive prefix of `counts`.
pub(crate) fn rank_tile(
    group: &WorkGroup<'_>,
    geometry: &Geometry,
    digits: &[u32],
    ranks: &mut [u32],
    tables: &mut RankTables<'_>,
) {
    let radix = geometry.radix;
    let chunk = LANES * geometry.items_per_lane;
    debug_assert_eq!(digits.len(), geometry.tile);
    debug_assert_eq!(chunk * geometry.num_sub_groups, geometry.tile);

    tables.sg_counts.fill(0);
    group.barrier();

    // Ranks within each sub-group's chunk.
    for sg in 0..geometry.num_sub_groups {
        let running = &mut tables.sg_counts[sg * radix..(sg + 1) * radix];
        for round in 0..geometry.items_per_lane {
            let base = sg * chunk + round * LANES;
            let lane_digits: [u32; LANES] = std::array::from_fn(|lane| digits[base + lane]);
            let peers = match_any(&lane_digits, geometry.radix_bits);
            for lane in 0..LANES {
                let d = lane_digits[lane] as usize;
                ranks[base + lane] = running[d] + (peers[lane] & lanemask_lt(lane)).count_ones();
            }
            // The lowest lane of each peer set bumps the running count.
            for lane in 0..LANES {
                if peers[lane] & lanemask_lt(lane) == 0 {
                    running[lane_digits[lane] as usize] += peers[lane].count_ones();
                }
            }
        }
    }
    group.barrier();

    // Per digit: exclusive scan over sub-groups.
    for d in 0..radix {
        let mut total = 0u32;
        for sg in 0..geometry.num_sub_groups {
            let slot = &mut tables.sg_counts[sg * radix + d];
            let c = *slot;
            *slot = total;
            total += c;
        }
        tables.counts[d] = total;
    }
    tables.offsets.copy_from_slice(&tables.counts[..]);
    exclusive_scan(&mut tables.offsets[..]);
    group.barrier();

    for sg in 0..geometry.num_sub_groups {
        let prefix = &tables.sg_counts[sg * radix..(sg + 1) * radix];
        for i in sg * chunk..(sg + 1) * chunk {
            let d = digits[i] as usize;
            ranks[i] += tables.offsets[d] + prefix[d];
        }
    }
    group.barrier();
}
