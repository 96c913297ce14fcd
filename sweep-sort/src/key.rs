//! Sortable key types and their order-preserving bit transforms.
//!
//! Every key is mapped to an unsigned integer of the same width whose natural
//! order matches the requested sort order. Digits are taken from that image,
//! never from the stored bytes.

use serde::{Deserialize, Serialize};

mod private {
    pub trait Sealed {}
}

/// Requested direction of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_ascending(self) -> bool {
        self == SortOrder::Ascending
    }
}

/// How a key's bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Unsigned,
    Signed,
    Float,
}

/// A plain scalar that can live in device memory and be moved bitwise.
///
/// Sealed: implemented for the eight integer widths plus `f32` and `f64`.
pub trait DeviceRepr: private::Sealed + Copy + Send + Sync + std::fmt::Debug + 'static {
    /// Width in bits.
    const BITS: u32;
    /// 32-bit device words per element (1 or 2).
    const WORDS: usize;

    /// Raw bit pattern, zero-extended.
    fn to_bits(self) -> u64;
    fn from_bits(bits: u64) -> Self;

    #[inline]
    fn to_words(self) -> [u32; 2] {
        let bits = self.to_bits();
        [bits as u32, (bits >> 32) as u32]
    }

    #[inline]
    fn from_words(words: [u32; 2]) -> Self {
        Self::from_bits(words[0] as u64 | ((words[1] as u64) << 32))
    }
}

/// Trait for types that can be radix-sorted.
///
/// Sealed: `u8, i8, u16, i16, u32, i32, u64, i64, f32, f64`.
pub trait SortKey: DeviceRepr + PartialOrd {
    const KIND: KeyKind;

    /// Order-preserving image of the key under `order`.
    #[inline]
    fn ordered_bits(self, order: SortOrder) -> u64 {
        order_bits(Self::KIND, Self::BITS, order, self.to_bits())
    }

    /// Inverse of [`ordered_bits`](SortKey::ordered_bits).
    #[inline]
    fn from_ordered_bits(bits: u64, order: SortOrder) -> Self {
        Self::from_bits(unorder_bits(Self::KIND, Self::BITS, order, bits))
    }

    /// Padding key that sorts after every real key under `order`.
    fn identity(order: SortOrder) -> Self;

    /// Digit `stage` of the ordered image.
    #[inline]
    fn bucket(self, order: SortOrder, stage: u32, radix_bits: u32) -> u32 {
        let shift = stage * radix_bits;
        ((self.ordered_bits(order) >> shift) & ((1u64 << radix_bits) - 1)) as u32
    }
}

#[inline]
fn width_mask(bits: u32) -> u64 {
    if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

#[inline]
fn order_bits(kind: KeyKind, bits: u32, order: SortOrder, x: u64) -> u64 {
    let mask = width_mask(bits);
    let sign = 1u64 << (bits - 1);
    match (kind, order) {
        (KeyKind::Unsigned, SortOrder::Ascending) => x,
        (KeyKind::Unsigned, SortOrder::Descending) => !x & mask,
        (KeyKind::Signed, SortOrder::Ascending) => x ^ sign,
        (KeyKind::Signed, SortOrder::Descending) => x ^ (mask ^ sign),
        (KeyKind::Float, SortOrder::Ascending) => {
            if x & sign != 0 {
                !x & mask
            } else {
                x ^ sign
            }
        }
        (KeyKind::Float, SortOrder::Descending) => {
            if x & sign != 0 {
                x
            } else {
                x ^ (mask ^ sign)
            }
        }
    }
}

#[inline]
fn unorder_bits(kind: KeyKind, bits: u32, order: SortOrder, y: u64) -> u64 {
    let mask = width_mask(bits);
    let sign = 1u64 << (bits - 1);
    match (kind, order) {
        // XOR-based transforms are involutions.
        (KeyKind::Unsigned, _) | (KeyKind::Signed, _) => order_bits(kind, bits, order, y),
        (KeyKind::Float, SortOrder::Ascending) => {
            if y & sign != 0 {
                y ^ sign
            } else {
                !y & mask
            }
        }
        (KeyKind::Float, SortOrder::Descending) => {
            if y & sign != 0 {
                y
            } else {
                y ^ (mask ^ sign)
            }
        }
    }
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {$(
        impl private::Sealed for $t {}

        impl DeviceRepr for $t {
            const BITS: u32 = <$t>::BITS;
            const WORDS: usize = if <$t>::BITS > 32 { 2 } else { 1 };

            #[inline]
            fn to_bits(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $t
            }
        }

        impl SortKey for $t {
            const KIND: KeyKind = KeyKind::Unsigned;

            fn identity(order: SortOrder) -> Self {
                match order {
                    SortOrder::Ascending => <$t>::MAX,
                    SortOrder::Descending => <$t>::MIN,
                }
            }
        }
    )*};
}

macro_rules! impl_signed {
    ($($t:ty => $u:ty),*) => {$(
        impl private::Sealed for $t {}

        impl DeviceRepr for $t {
            const BITS: u32 = <$t>::BITS;
            const WORDS: usize = if <$t>::BITS > 32 { 2 } else { 1 };

            #[inline]
            fn to_bits(self) -> u64 {
                self as $u as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                bits as $u as $t
            }
        }

        impl SortKey for $t {
            const KIND: KeyKind = KeyKind::Signed;

            fn identity(order: SortOrder) -> Self {
                match order {
                    SortOrder::Ascending => <$t>::MAX,
                    SortOrder::Descending => <$t>::MIN,
                }
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($t:ty => $u:ty),*) => {$(
        impl private::Sealed for $t {}

        impl DeviceRepr for $t {
            const BITS: u32 = <$u>::BITS;
            const WORDS: usize = if <$u>::BITS > 32 { 2 } else { 1 };

            #[inline]
            fn to_bits(self) -> u64 {
                <$t>::to_bits(self) as u64
            }

            #[inline]
            fn from_bits(bits: u64) -> Self {
                <$t>::from_bits(bits as $u)
            }
        }

        impl SortKey for $t {
            const KIND: KeyKind = KeyKind::Float;

            fn identity(order: SortOrder) -> Self {
                match order {
                    // Largest positive NaN pattern / all-ones negative NaN pattern.
                    SortOrder::Ascending => <$t>::from_bits(<$u>::MAX >> 1),
                    SortOrder::Descending => <$t>::from_bits(<$u>::MAX),
                }
            }
        }
    )*};
}

impl_unsigned!(u8, u16, u32, u64);
impl_signed!(i8 => u8, i16 => u16, i32 => u32, i64 => u64);
impl_float!(f32 => u32, f64 => u64);
