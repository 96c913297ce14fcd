mod common;

use common::seeded_rng;
use rand::Rng;
use sweep_sort::{Placement, SortOrder};

#[test]
fn test_sort_u8_single_stage_copyback() {
    let sorter = common::sorter();
    let n = 100_000;
    let plan = sorter.plan::<u8>(n, Placement::InPlace, 0).unwrap();
    assert_eq!(plan.stages, 1);
    assert!(plan.copyback);

    let mut rng = seeded_rng(3000);
    let mut data: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
    let mut expected = data.clone();
    expected.sort();
    sorter.sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_i8_all_values() {
    let mut data: Vec<i8> = (i8::MIN..=i8::MAX).rev().cycle().take(50_000).collect();
    let mut expected = data.clone();
    expected.sort();
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_u16_two_stages() {
    let mut rng = seeded_rng(3001);
    let mut data: Vec<u16> = (0..200_000).map(|_| rng.gen()).collect();
    let mut expected = data.clone();
    expected.sort();
    common::sorter().sort(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_i16_descending() {
    let mut rng = seeded_rng(3002);
    let mut data: Vec<i16> = (0..100_000).map(|_| rng.gen()).collect();
    let mut expected = data.clone();
    expected.sort_by(|a, b| b.cmp(a));
    common::sorter().sort_descending(&mut data).unwrap();
    assert_eq!(data, expected);
}

#[test]
fn test_sort_pairs_u8_copyback_moves_values() {
    // Keys collide constantly; the values record input order.
    let sorter = common::small_tile_sorter();
    let mut rng = seeded_rng(3003);
    let n = 20_000;
    let keys: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
    let vals: Vec<u32> = (0..n as u32).collect();

    let mut kbuf = sorter.alloc_sort_buffer::<u8>(n).unwrap();
    let mut vbuf = sorter.alloc_sort_buffer::<u32>(n).unwrap();
    kbuf.copy_from_slice(&keys);
    vbuf.copy_from_slice(&vals);
    sorter.sort_pairs_buffer(&kbuf, &vbuf, SortOrder::Ascending).unwrap();

    let (exp_keys, exp_vals) = common::reference_pairs(&keys, &vals, false);
    assert_eq!(kbuf.to_vec(), exp_keys);
    assert_eq!(vbuf.to_vec(), exp_vals);
}

#[test]
fn test_sort_u8_out_of_place_single_stage() {
    let sorter = common::sorter();
    let n = 10_000;
    let plan = sorter.plan::<u8>(n, Placement::OutOfPlace, 0).unwrap();
    assert!(!plan.copyback);
    assert!(!plan.needs_scratch());

    let data: Vec<u8> = (0..n).map(|i| (i * 7 % 251) as u8).collect();
    let mut input = sorter.alloc_sort_buffer::<u8>(n).unwrap();
    let mut output = sorter.alloc_sort_buffer::<u8>(n).unwrap();
    input.copy_from_slice(&data);
    output.set_len(n);
    sorter
        .sort_range(&input, &output, SortOrder::Descending)
        .unwrap()
        .wait()
        .unwrap();

    let mut expected = data.clone();
    expected.sort_by(|a, b| b.cmp(a));
    assert_eq!(output.to_vec(), expected);
    assert_eq!(input.to_vec(), data);
}
