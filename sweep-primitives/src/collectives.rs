//! Sub-group and work-group collectives.
//!
//! A sub-group is [`SUB_GROUP_SIZE`] lanes executing in lockstep. The
//! emulated kernels hold one value per lane in a fixed array and call these
//! helpers where device code would call its SIMD intrinsics.

pub use crate::hardware::SUB_GROUP_SIZE;

const LANES: usize = SUB_GROUP_SIZE as usize;

/// Mask with one bit per lane of a full sub-group.
pub const FULL_MASK: u32 = u32::MAX;

/// Bitmask of lanes whose predicate is set.
#[inline]
pub fn ballot(predicate: &[bool; LANES]) -> u32 {
    predicate
        .iter()
        .enumerate()
        .fold(0, |mask, (lane, &p)| if p { mask | (1 << lane) } else { mask })
}

/// Lanes strictly below `lane`.
#[inline]
pub fn lanemask_lt(lane: usize) -> u32 {
    debug_assert!(lane < LANES);
    (1u32 << lane) - 1
}

/// For every lane, the mask of lanes holding the same `bits`-bit digit.
///
/// Built from one ballot per digit bit, the way warp-level multisplit does
/// it: each lane starts from the active mask and keeps the lanes that agree
/// with it on every bit.
pub fn match_any(digits: &[u32; LANES], bits: u32) -> [u32; LANES] {
    let mut peers = [FULL_MASK; LANES];
    for bit in 0..bits {
        let set: [bool; LANES] = std::array::from_fn(|lane| (digits[lane] >> bit) & 1 == 1);
        let vote = ballot(&set);
        for lane in 0..LANES {
            peers[lane] &= if set[lane] { vote } else { !vote };
        }
    }
    peers
}

/// In-place exclusive prefix sum. Returns the total.
pub fn exclusive_scan(values: &mut [u32]) -> u32 {
    let mut running = 0u32;
    for v in values.iter_mut() {
        let x = *v;
        *v = running;
        running = running.wrapping_add(x);
    }
    running
}

/// In-place exclusive prefix sum over the lanes of one sub-group.
///
/// Computed as a Hillis-Steele shuffle-up scan, then shifted by one lane.
pub fn sub_group_exclusive_scan(values: &mut [u32; LANES]) -> u32 {
    let mut offset = 1;
    while offset < LANES {
        let prev = *values;
        for lane in offset..LANES {
            values[lane] = values[lane].wrapping_add(prev[lane - offset]);
        }
        offset <<= 1;
    }
    let total = values[LANES - 1];
    values.copy_within(0..LANES - 1, 1);
    values[0] = 0;
    total
}
