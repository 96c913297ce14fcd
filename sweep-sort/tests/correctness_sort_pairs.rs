mod common;

use common::{reference_pairs, seeded_rng, verify_pairs_preserved};
use rand::Rng;
use sweep_sort::{SortError, SortOrder};

#[test]
fn test_sort_pairs_u32_basic() {
    let mut keys = vec![30u32, 10, 20];
    let mut values = vec![300u32, 100, 200];
    common::sorter().sort_pairs(&mut keys, &mut values).unwrap();
    assert_eq!(keys, vec![10, 20, 30]);
    assert_eq!(values, vec![100, 200, 300]);
}

#[test]
fn test_sort_pairs_u32_stable() {
    let mut keys = vec![2u32, 1, 2, 1];
    let mut values = vec![10u32, 20, 30, 40];
    common::sorter().sort_pairs(&mut keys, &mut values).unwrap();
    assert_eq!(keys, vec![1, 1, 2, 2]);
    assert_eq!(values, vec![20, 40, 10, 30]);
}

#[test]
fn test_sort_pairs_u32_multiset_preserved() {
    let mut rng = seeded_rng(2000);
    let n = 100_000;
    let orig_keys: Vec<u32> = (0..n).map(|_| rng.gen::<u32>() % 1000).collect();
    let orig_vals: Vec<u32> = (0..n).map(|_| rng.gen()).collect();
    let mut keys = orig_keys.clone();
    let mut values = orig_vals.clone();
    common::sorter().sort_pairs(&mut keys, &mut values).unwrap();
    assert!(
        verify_pairs_preserved(&orig_keys, &orig_vals, &keys, &values),
        "multiset of (key, value) pairs must be preserved"
    );
}

#[test]
fn test_sort_pairs_stable_across_tiles() {
    // Few distinct keys over many tiles: ties resolve by input position.
    let sorter = common::small_tile_sorter();
    let mut rng = seeded_rng(2001);
    let n = 150_000;
    let keys: Vec<u32> = (0..n).map(|_| rng.gen_range(0..16) * 0x0101_0101).collect();
    let vals: Vec<u32> = (0..n as u32).collect();
    for (order, descending) in [(SortOrder::Ascending, false), (SortOrder::Descending, true)] {
        let mut k = keys.clone();
        let mut v = vals.clone();
        sorter.sort_pairs_by_order(&mut k, &mut v, order).unwrap();
        let (ek, ev) = reference_pairs(&keys, &vals, descending);
        assert_eq!(k, ek, "{order:?}");
        assert_eq!(v, ev, "{order:?}");
    }
}

#[test]
fn test_sort_pairs_i32_keys() {
    let mut keys = vec![5i32, -3, 0, -1, 2];
    let mut values = vec![50u32, 30, 0, 10, 20];
    common::sorter().sort_pairs(&mut keys, &mut values).unwrap();
    assert_eq!(keys, vec![-3, -1, 0, 2, 5]);
    assert_eq!(values, vec![30, 10, 0, 20, 50]);
}

#[test]
fn test_sort_pairs_f32_keys_u64_values() {
    let mut rng = seeded_rng(2002);
    let n = 40_000;
    let keys: Vec<f32> = (0..n).map(|_| rng.gen::<f32>() - 0.5).collect();
    let vals: Vec<u64> = (0..n).map(|_| rng.gen()).collect();
    let mut pairs: Vec<(f32, u64)> = keys.iter().copied().zip(vals.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut k = keys.clone();
    let mut v = vals.clone();
    common::sorter().sort_pairs(&mut k, &mut v).unwrap();
    let bits: Vec<u32> = k.iter().map(|x| x.to_bits()).collect();
    let exp_bits: Vec<u32> = pairs.iter().map(|p| p.0.to_bits()).collect();
    assert_eq!(bits, exp_bits);
    assert_eq!(v, pairs.iter().map(|p| p.1).collect::<Vec<_>>());
}

#[test]
fn test_sort_pairs_u64_keys_u32_values() {
    let mut rng = seeded_rng(2003);
    let n = 60_000;
    let keys: Vec<u64> = (0..n).map(|_| rng.gen::<u64>() >> rng.gen_range(0..64u32)).collect();
    let vals: Vec<u32> = (0..n as u32).collect();
    let mut k = keys.clone();
    let mut v = vals.clone();
    common::sorter().sort_pairs(&mut k, &mut v).unwrap();
    let (ek, ev) = reference_pairs(&keys, &vals, false);
    assert_eq!(k, ek);
    assert_eq!(v, ev);
}

#[test]
fn test_sort_pairs_out_of_place() {
    let sorter = common::sorter();
    let mut rng = seeded_rng(2004);
    let n = 30_000;
    let keys: Vec<u32> = (0..n).map(|_| rng.gen_range(0..500)).collect();
    let vals: Vec<i64> = (0..n as i64).map(|i| -i).collect();

    let mut ki = sorter.alloc_sort_buffer::<u32>(n).unwrap();
    let mut ko = sorter.alloc_sort_buffer::<u32>(n).unwrap();
    let mut vi = sorter.alloc_sort_buffer::<i64>(n).unwrap();
    let mut vo = sorter.alloc_sort_buffer::<i64>(n).unwrap();
    ki.copy_from_slice(&keys);
    vi.copy_from_slice(&vals);
    ko.set_len(n);
    vo.set_len(n);

    sorter
        .sort_pairs_range(&ki, &ko, &vi, &vo, SortOrder::Ascending)
        .unwrap()
        .wait()
        .unwrap();

    let (ek, ev) = reference_pairs(&keys, &vals, false);
    assert_eq!(ko.to_vec(), ek);
    assert_eq!(vo.to_vec(), ev);
    assert_eq!(ki.to_vec(), keys);
    assert_eq!(vi.to_vec(), vals);
}

#[test]
fn test_sort_pairs_length_mismatch() {
    let mut keys = vec![1u32, 2, 3];
    let mut values = vec![1u32, 2];
    let err = common::sorter().sort_pairs(&mut keys, &mut values).unwrap_err();
    assert_eq!(err, SortError::LengthMismatch { keys: 3, values: 2 });
}

#[test]
fn test_sort_pairs_empty_and_single() {
    let sorter = common::sorter();
    let mut keys: Vec<u32> = vec![];
    let mut values: Vec<u32> = vec![];
    sorter.sort_pairs(&mut keys, &mut values).unwrap();
    let mut keys = vec![7u32];
    let mut values = vec![70u32];
    sorter.sort_pairs(&mut keys, &mut values).unwrap();
    assert_eq!((keys[0], values[0]), (7, 70));
}
