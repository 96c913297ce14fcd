mod common;

use common::seeded_rng;
use rand::Rng;

fn assert_bits_eq(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a.to_bits(),
            e.to_bits(),
            "bit mismatch at index {i}: actual={a} (0x{:016x}), expected={e} (0x{:016x})",
            a.to_bits(),
            e.to_bits(),
        );
    }
}

#[test]
fn test_sort_f64_ieee754_special() {
    let mut data = vec![
        f64::NAN,
        -f64::NAN,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::MAX,
        f64::MIN,
        f64::MIN_POSITIVE,
        -f64::MIN_POSITIVE,
        0.0,
        -0.0,
        1.0,
        -1.0,
        f64::from_bits(1),
        f64::from_bits(0x8000_0000_0000_0001),
    ];
    let mut expected = data.clone();
    expected.sort_by(f64::total_cmp);
    common::sorter().sort(&mut data).unwrap();
    assert_bits_eq(&data, &expected);
}

#[test]
fn test_sort_f64_random_bits() {
    let mut rng = seeded_rng(900);
    let mut data: Vec<f64> = (0..200_000).map(|_| f64::from_bits(rng.gen())).collect();
    let mut expected = data.clone();
    expected.sort_by(f64::total_cmp);
    common::sorter().sort(&mut data).unwrap();
    assert_bits_eq(&data, &expected);
}

#[test]
fn test_sort_f64_uniform() {
    let mut rng = seeded_rng(901);
    let mut data: Vec<f64> = (0..300_000).map(|_| rng.gen::<f64>() * 2.0 - 1.0).collect();
    let mut expected = data.clone();
    expected.sort_by(f64::total_cmp);
    common::sorter().sort(&mut data).unwrap();
    assert_bits_eq(&data, &expected);
}

#[test]
fn test_sort_f64_descending() {
    let mut rng = seeded_rng(902);
    let mut data: Vec<f64> = (0..50_000).map(|_| f64::from_bits(rng.gen())).collect();
    let mut expected = data.clone();
    expected.sort_by(|a, b| b.total_cmp(a));
    common::sorter().sort_descending(&mut data).unwrap();
    assert_bits_eq(&data, &expected);
}
