//! Partition descriptors for the chained scan.
//!
//! One `u32` per (tile, bucket). The top two bits are the tag, the low 30 bits
//! the payload:
//!
//! | bits 31..30 | state       | payload                         |
//! |-------------|-------------|---------------------------------|
//! | `00`        | `INVALID`   | 0                               |
//! | `01`        | `AGGREGATE` | the tile's count for the bucket |
//! | `10`        | `PREFIX`    | inclusive prefix through the tile |
//!
//! Tag `11` never appears in a well-formed region.

use sweep_primitives::{DeviceBuffer, KernelFault, WorkGroup};

pub const TAG_SHIFT: u32 = 30;
pub const TAG_MASK: u32 = 0b11 << TAG_SHIFT;
pub const PAYLOAD_MASK: u32 = (1 << TAG_SHIFT) - 1;

pub const INVALID: u32 = 0;
pub const AGGREGATE_TAG: u32 = 0b01 << TAG_SHIFT;
pub const PREFIX_TAG: u32 = 0b10 << TAG_SHIFT;

/// Largest count or prefix a descriptor can carry.
pub const MAX_PAYLOAD: u32 = PAYLOAD_MASK;

/// Decoded state of one descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    Invalid,
    Aggregate(u32),
    Prefix(u32),
}

impl DescriptorState {
    #[inline]
    pub fn encode(self) -> u32 {
        match self {
            DescriptorState::Invalid => INVALID,
            DescriptorState::Aggregate(v) => {
                debug_assert!(v <= MAX_PAYLOAD);
                AGGREGATE_TAG | (v & PAYLOAD_MASK)
            }
            DescriptorState::Prefix(v) => {
                debug_assert!(v <= MAX_PAYLOAD);
                PREFIX_TAG | (v & PAYLOAD_MASK)
            }
        }
    }

    #[inline]
    pub fn decode(word: u32) -> Result<Self, KernelFault> {
        let payload = word & PAYLOAD_MASK;
        match word & TAG_MASK {
            INVALID if payload == 0 => Ok(DescriptorState::Invalid),
            AGGREGATE_TAG => Ok(DescriptorState::Aggregate(payload)),
            PREFIX_TAG => Ok(DescriptorState::Prefix(payload)),
            _ => Err(KernelFault::Invariant(format!(
                "malformed partition descriptor {word:#010x}"
            ))),
        }
    }
}

/// Publish `state` for `tile`'s slot of `bucket`.
#[inline]
pub(crate) fn publish(
    descriptors: &DeviceBuffer,
    radix: usize,
    tile: usize,
    bucket: usize,
    state: DescriptorState,
) {
    descriptors.store_release(tile * radix + bucket, state.encode());
}

/// Exclusive global prefix of `bucket` for `tile`.
///
/// Walks predecessors `tile-1, tile-2, ...`: an `AGGREGATE` is added and the
/// walk continues, a `PREFIX` is added and ends it, an `INVALID` slot is
/// re-read until it is published. A walk that runs past tile 0 adds `seed`,
/// the bucket's global offset from the scanned histogram. Tile 0 folds the
/// seed into its own `PREFIX`, so in practice the walk stops there.
pub(crate) fn lookback(
    group: &WorkGroup<'_>,
    descriptors: &DeviceBuffer,
    radix: usize,
    tile: usize,
    bucket: usize,
    seed: u32,
) -> Result<u32, KernelFault> {
    let mut acc = 0u32;
    let mut pred = tile;
    let mut spins = 0u32;
    while pred > 0 {
        let slot = (pred - 1) * radix + bucket;
        match DescriptorState::decode(descriptors.load_acquire(slot))? {
            DescriptorState::Invalid => {
                group.spin_wait(&mut spins)?;
            }
            DescriptorState::Aggregate(a) => {
                acc += a;
                pred -= 1;
            }
            DescriptorState::Prefix(p) => return Ok(acc + p),
        }
    }
    Ok(acc + seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweep_primitives::{BufferPool, CommandQueue, DeviceLimits, Grid, Kernel, LocalMemory};

    #[test]
    fn test_encoding_is_bit_exact() {
        assert_eq!(DescriptorState::Invalid.encode(), 0);
        assert_eq!(DescriptorState::Aggregate(5).encode(), 0x4000_0005);
        assert_eq!(DescriptorState::Prefix(5).encode(), 0x8000_0005);
        assert_eq!(DescriptorState::Prefix(MAX_PAYLOAD).encode(), 0xBFFF_FFFF);
        assert_eq!(DescriptorState::Aggregate(0).encode(), 0x4000_0000);
    }

    #[test]
    fn test_decode() {
        assert_eq!(DescriptorState::decode(0).unwrap(), DescriptorState::Invalid);
        assert_eq!(
            DescriptorState::decode(0x4000_0007).unwrap(),
            DescriptorState::Aggregate(7)
        );
        assert_eq!(
            DescriptorState::decode(0x8000_0000).unwrap(),
            DescriptorState::Prefix(0)
        );
        assert!(matches!(
            DescriptorState::decode(0xC000_0001),
            Err(KernelFault::Invariant(_))
        ));
        // Payload without a tag is torn state.
        assert!(DescriptorState::decode(0x0000_0003).is_err());
    }

    /// Runs `lookback` for every (tile, bucket) in the region, one tile per
    /// group, publishing aggregates first. After publishing, each group
    /// re-reads every slot up to its own and checks any `PREFIX` it sees
    /// against the final inclusive prefix.
    struct ChainedScan {
        counts: Vec<Vec<u32>>,
        seeds: Vec<u32>,
        inclusive: Vec<Vec<u32>>,
        descriptors: DeviceBuffer,
        out: DeviceBuffer,
        counter: DeviceBuffer,
        /// Word 0: `PREFIX` slots re-read. Word 1: those whose payload differed.
        watch: DeviceBuffer,
    }

    impl ChainedScan {
        fn new(counts: Vec<Vec<u32>>, seeds: Vec<u32>, pool: &BufferPool) -> Self {
            let tiles = counts.len();
            let radix = seeds.len();
            let inclusive = (0..tiles)
                .map(|t| {
                    (0..radix)
                        .map(|b| seeds[b] + counts[..=t].iter().map(|c| c[b]).sum::<u32>())
                        .collect()
                })
                .collect();
            Self {
                counts,
                seeds,
                inclusive,
                descriptors: pool.alloc(tiles * radix).unwrap(),
                out: pool.alloc(tiles * radix).unwrap(),
                counter: pool.alloc(1).unwrap(),
                watch: pool.alloc(2).unwrap(),
            }
        }

        fn recheck(&self, through: usize) -> Result<(), KernelFault> {
            let radix = self.seeds.len();
            for t in 0..=through {
                for b in 0..radix {
                    if let DescriptorState::Prefix(p) =
                        DescriptorState::decode(self.descriptors.load_acquire(t * radix + b))?
                    {
                        self.watch.fetch_add(0, 1);
                        if p != self.inclusive[t][b] {
                            self.watch.fetch_add(1, 1);
                        }
                    }
                }
            }
            Ok(())
        }
    }

    impl Kernel for ChainedScan {
        fn name(&self) -> &'static str {
            "chained_scan"
        }

        fn run(&self, group: &WorkGroup<'_>, _local: &mut LocalMemory) -> Result<(), KernelFault> {
            let radix = self.seeds.len();
            let tile = self.counter.fetch_add(0, 1) as usize;
            let counts = &self.counts[tile];
            if tile == 0 {
                for b in 0..radix {
                    publish(&self.descriptors, radix, 0, b, DescriptorState::Prefix(self.seeds[b] + counts[b]));
                    self.out.store(b, self.seeds[b]);
                }
                return self.recheck(0);
            }
            for b in 0..radix {
                publish(&self.descriptors, radix, tile, b, DescriptorState::Aggregate(counts[b]));
            }
            for b in 0..radix {
                let excl = lookback(group, &self.descriptors, radix, tile, b, self.seeds[b])?;
                publish(&self.descriptors, radix, tile, b, DescriptorState::Prefix(excl + counts[b]));
                self.out.store(tile * radix + b, excl);
            }
            self.recheck(tile)
        }
    }

    #[test]
    fn test_lookback_yields_exclusive_prefixes() {
        let tiles = 64;
        let radix = 4;
        let seeds = vec![0, 1000, 2000, 3000];
        let counts: Vec<Vec<u32>> = (0..tiles)
            .map(|t| (0..radix).map(|b| ((t * 7 + b * 3) % 11) as u32).collect())
            .collect();

        let pool = BufferPool::new(1 << 20);
        let scan = ChainedScan::new(counts.clone(), seeds.clone(), &pool);
        let descriptors = scan.descriptors.clone();
        let out = scan.out.clone();
        let queue = CommandQueue::new(DeviceLimits::discrete()).unwrap();
        let mut cb = queue.command_buffer();
        cb.dispatch(scan, Grid::new(tiles, 32)).unwrap();
        cb.commit().wait().unwrap();

        let got = out.read(0..tiles * radix);
        for b in 0..radix {
            let mut running = seeds[b];
            for t in 0..tiles {
                assert_eq!(got[t * radix + b], running, "tile {t} bucket {b}");
                running += counts[t][b];
            }
        }
        // Every slot ended as PREFIX.
        assert!(descriptors
            .read(0..tiles * radix)
            .iter()
            .all(|&w| w & TAG_MASK == PREFIX_TAG));
    }

    #[test]
    fn test_prefix_payload_never_changes() {
        let tiles = 200;
        let radix = 8;
        let seeds: Vec<u32> = (0..radix as u32).map(|b| b * 50_000).collect();
        let counts: Vec<Vec<u32>> = (0..tiles)
            .map(|t| (0..radix).map(|b| ((t * 13 + b * 5) % 17) as u32).collect())
            .collect();

        let pool = BufferPool::new(1 << 20);
        let scan = ChainedScan::new(counts, seeds, &pool);
        let inclusive = scan.inclusive.clone();
        let descriptors = scan.descriptors.clone();
        let watch = scan.watch.clone();
        let queue = CommandQueue::new(DeviceLimits::discrete()).unwrap();
        let mut cb = queue.command_buffer();
        cb.dispatch(scan, Grid::new(tiles, 32)).unwrap();
        cb.commit().wait().unwrap();

        let seen = watch.read(0..2);
        // Each group sees at least its own PREFIX slots.
        assert!(seen[0] as usize >= tiles * radix, "{seen:?}");
        assert_eq!(seen[1], 0, "a PREFIX payload was rewritten");
        for t in 0..tiles {
            for b in 0..radix {
                assert_eq!(
                    DescriptorState::decode(descriptors.load(t * radix + b)).unwrap(),
                    DescriptorState::Prefix(inclusive[t][b])
                );
            }
        }
    }

    #[test]
    fn test_lookback_faults_on_reserved_tag() {
        let pool = BufferPool::new(1 << 20);
        let descriptors = pool.alloc(8).unwrap();
        descriptors.store(0, 0xC000_0000);
        struct One {
            descriptors: DeviceBuffer,
        }
        impl Kernel for One {
            fn name(&self) -> &'static str {
                "one"
            }
            fn run(&self, group: &WorkGroup<'_>, _local: &mut LocalMemory) -> Result<(), KernelFault> {
                lookback(group, &self.descriptors, 4, 1, 0, 0).map(|_| ())
            }
        }
        let queue = CommandQueue::new(DeviceLimits::integrated()).unwrap();
        let mut cb = queue.command_buffer();
        cb.dispatch(One { descriptors }, Grid::new(1, 32)).unwrap();
        let err = cb.commit().wait().unwrap_err();
        assert!(matches!(
            err,
            sweep_primitives::DeviceError::KernelFault {
                fault: KernelFault::Invariant(_),
                ..
            }
        ));
    }
}
