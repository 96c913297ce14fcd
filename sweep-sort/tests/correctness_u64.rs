mod common;

use common::seeded_rng;
use rand::Rng;
use sweep_sort::{Placement, SortOrder};

#[test]
fn test_sort_u64_boundaries() {
    let mut data = vec![u64::MAX, 0, 1, u64::MAX - 1];
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, vec![0, 1, u64::MAX - 1, u64::MAX]);
}

#[test]
fn test_sort_u64_byte_boundary_values() {
    // Values that isolate each of the 8 bytes
    let mut data: Vec<u64> = (0..8u32)
        .map(|b| 0xFFu64 << (b * 8))
        .chain((0..8u32).map(|b| 0x01u64 << (b * 8)))
        .chain(std::iter::once(0u64))
        .chain(std::iter::once(u64::MAX))
        .collect();
    let mut expected = data.clone();
    expected.sort();
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_u64_random_300k() {
    let mut rng = seeded_rng(6400);
    let mut data: Vec<u64> = (0..300_000).map(|_| rng.gen()).collect();
    let mut expected = data.clone();
    expected.sort();
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_u64_high_word_only() {
    let mut rng = seeded_rng(6402);
    let mut data: Vec<u64> = (0..100_000).map(|_| (rng.gen::<u32>() as u64) << 32).collect();
    let mut expected = data.clone();
    expected.sort();
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_u64_eight_stages_in_place() {
    let sorter = common::sorter();
    let plan = sorter.plan::<u64>(100_000, Placement::InPlace, 0).unwrap();
    assert_eq!(plan.stages, 8);
    assert!(!plan.copyback);

    let mut rng = seeded_rng(6403);
    let data: Vec<u64> = (0..100_000).map(|_| rng.gen()).collect();
    let mut buf = sorter.alloc_sort_buffer::<u64>(data.len()).unwrap();
    buf.copy_from_slice(&data);
    sorter.sort_buffer(&buf, SortOrder::Descending).unwrap();
    let mut expected = data;
    expected.sort_by(|a, b| b.cmp(a));
    assert_eq!(buf.to_vec(), expected);
}
