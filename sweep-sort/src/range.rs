//! Device-resident buffers and the ranges the sorter accepts.
//!
//! Anything that can name a device address and a length can be sorted:
//! a whole [`SortBuffer`], a contiguous or strided view into one, or a
//! [`RawRange`] built from a bare [`DeviceAddress`].

use std::marker::PhantomData;
use std::ops::Range;

use sweep_primitives::DeviceBuffer;

use crate::error::SortError;
use crate::key::DeviceRepr;

/// Element address in device memory: a buffer plus an element offset.
#[derive(Clone, Debug)]
pub struct DeviceAddress {
    buffer: DeviceBuffer,
    offset: usize,
}

impl DeviceAddress {
    pub fn new(buffer: DeviceBuffer, offset: usize) -> Self {
        Self { buffer, offset }
    }

    pub fn buffer(&self) -> &DeviceBuffer {
        &self.buffer
    }

    /// Offset in elements from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl PartialEq for DeviceAddress {
    fn eq(&self, other: &Self) -> bool {
        self.buffer.same_buffer(&other.buffer) && self.offset == other.offset
    }
}

impl Eq for DeviceAddress {}

/// A readable run of `T` in device memory.
pub trait DeviceRange<T: DeviceRepr> {
    /// Address of the first element.
    fn address(&self) -> DeviceAddress;
    /// Number of elements.
    fn length(&self) -> usize;
    /// Distance in elements between consecutive elements.
    fn stride(&self) -> usize {
        1
    }
}

/// A range the sorter may write to.
pub trait DeviceRangeMut<T: DeviceRepr>: DeviceRange<T> {}

/// A device buffer sized for `capacity` elements of `T`.
///
/// Created via [`GpuSorter::alloc_sort_buffer`](crate::GpuSorter::alloc_sort_buffer).
pub struct SortBuffer<T: DeviceRepr> {
    buffer: DeviceBuffer,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: DeviceRepr> SortBuffer<T> {
    pub(crate) fn new(buffer: DeviceBuffer, capacity: usize) -> Self {
        Self {
            buffer,
            len: 0,
            capacity,
            _marker: PhantomData,
        }
    }

    /// Number of elements currently in this buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set the number of valid elements. Must be <= capacity.
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.capacity,
            "len {} exceeds capacity {}",
            len,
            self.capacity
        );
        self.len = len;
    }

    /// Copy data from a slice into the buffer. Sets len automatically.
    pub fn copy_from_slice(&mut self, data: &[T]) {
        assert!(
            data.len() <= self.capacity,
            "data len {} exceeds capacity {}",
            data.len(),
            self.capacity
        );
        let view = ElementView::whole(&self.buffer, T::WORDS, data.len());
        for (i, &x) in data.iter().enumerate() {
            view.store_words(i, x.to_words());
        }
        self.len = data.len();
    }

    /// Copy the valid elements out to a slice.
    pub fn copy_to_slice(&self, dest: &mut [T]) {
        let view = ElementView::whole(&self.buffer, T::WORDS, self.len);
        for (i, d) in dest.iter_mut().take(self.len).enumerate() {
            *d = T::from_words(view.load_words(i));
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        let view = ElementView::whole(&self.buffer, T::WORDS, self.len);
        (0..self.len).map(|i| T::from_words(view.load_words(i))).collect()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        (index < self.len)
            .then(|| T::from_words(ElementView::whole(&self.buffer, T::WORDS, self.len).load_words(index)))
    }

    /// Contiguous read-only view of `range`.
    pub fn view(&self, range: Range<usize>) -> RangeView<'_, T> {
        self.check_bounds(range.start, 1, range.end.saturating_sub(range.start));
        RangeView {
            buf: self,
            offset: range.start,
            stride: 1,
            len: range.end - range.start,
        }
    }

    /// Contiguous writable view of `range`.
    pub fn view_mut(&self, range: Range<usize>) -> RangeViewMut<'_, T> {
        self.check_bounds(range.start, 1, range.end.saturating_sub(range.start));
        RangeViewMut {
            buf: self,
            offset: range.start,
            stride: 1,
            len: range.end - range.start,
        }
    }

    /// Every `stride`-th element starting at `offset`, `len` elements.
    pub fn strided(&self, offset: usize, stride: usize, len: usize) -> RangeView<'_, T> {
        self.check_bounds(offset, stride, len);
        RangeView {
            buf: self,
            offset,
            stride,
            len,
        }
    }

    pub fn strided_mut(&self, offset: usize, stride: usize, len: usize) -> RangeViewMut<'_, T> {
        self.check_bounds(offset, stride, len);
        RangeViewMut {
            buf: self,
            offset,
            stride,
            len,
        }
    }

    /// Access the underlying device buffer (for pipeline integration).
    pub fn device_buffer(&self) -> &DeviceBuffer {
        &self.buffer
    }

    fn check_bounds(&self, offset: usize, stride: usize, len: usize) {
        assert!(stride >= 1, "stride must be at least 1");
        let end = if len == 0 {
            Some(offset)
        } else {
            (len - 1)
                .checked_mul(stride)
                .and_then(|s| s.checked_add(offset))
                .and_then(|s| s.checked_add(1))
        };
        let end = end.unwrap_or(usize::MAX);
        assert!(
            end <= self.len,
            "view end {} exceeds buffer len {}",
            end,
            self.len
        );
    }
}

impl<T: DeviceRepr> DeviceRange<T> for SortBuffer<T> {
    fn address(&self) -> DeviceAddress {
        DeviceAddress::new(self.buffer.clone(), 0)
    }

    fn length(&self) -> usize {
        self.len
    }
}

impl<T: DeviceRepr> DeviceRangeMut<T> for SortBuffer<T> {}

/// Read-only view into a [`SortBuffer`].
#[derive(Clone, Copy)]
pub struct RangeView<'a, T: DeviceRepr> {
    buf: &'a SortBuffer<T>,
    offset: usize,
    stride: usize,
    len: usize,
}

/// Writable view into a [`SortBuffer`].
///
/// Device memory is shared, so several writable views of one buffer may
/// coexist; the sorter rejects overlapping outputs at dispatch.
#[derive(Clone, Copy)]
pub struct RangeViewMut<'a, T: DeviceRepr> {
    buf: &'a SortBuffer<T>,
    offset: usize,
    stride: usize,
    len: usize,
}

macro_rules! impl_view_range {
    ($($view:ident),*) => {$(
        impl<T: DeviceRepr> DeviceRange<T> for $view<'_, T> {
            fn address(&self) -> DeviceAddress {
                DeviceAddress::new(self.buf.buffer.clone(), self.offset)
            }

            fn length(&self) -> usize {
                self.len
            }

            fn stride(&self) -> usize {
                self.stride
            }
        }

        impl<T: DeviceRepr> $view<'_, T> {
            pub fn to_vec(&self) -> Vec<T> {
                let view = ElementView::of::<T, _>(self);
                (0..self.len).map(|i| T::from_words(view.load_words(i))).collect()
            }
        }
    )*};
}

impl_view_range!(RangeView, RangeViewMut);

impl<T: DeviceRepr> DeviceRangeMut<T> for RangeViewMut<'_, T> {}

/// A range described only by a device address, a length, and a stride.
#[derive(Clone, Debug)]
pub struct RawRange<T: DeviceRepr> {
    address: DeviceAddress,
    len: usize,
    stride: usize,
    _marker: PhantomData<T>,
}

impl<T: DeviceRepr> RawRange<T> {
    pub fn new(address: DeviceAddress, len: usize) -> Self {
        Self::with_stride(address, len, 1)
    }

    pub fn with_stride(address: DeviceAddress, len: usize, stride: usize) -> Self {
        Self {
            address,
            len,
            stride,
            _marker: PhantomData,
        }
    }
}

impl<T: DeviceRepr> DeviceRange<T> for RawRange<T> {
    fn address(&self) -> DeviceAddress {
        self.address.clone()
    }

    fn length(&self) -> usize {
        self.len
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl<T: DeviceRepr> DeviceRangeMut<T> for RawRange<T> {}

/// Word-level addressing of a range, as the kernels see it.
#[derive(Clone, Debug)]
pub(crate) struct ElementView {
    pub buffer: DeviceBuffer,
    /// Element offset.
    pub offset: usize,
    /// Element stride.
    pub stride: usize,
    pub len: usize,
    /// Words per element.
    pub words: usize,
}

impl ElementView {
    pub fn whole(buffer: &DeviceBuffer, words: usize, len: usize) -> Self {
        Self {
            buffer: buffer.clone(),
            offset: 0,
            stride: 1,
            len,
            words,
        }
    }

    pub fn of<T: DeviceRepr, R: DeviceRange<T> + ?Sized>(range: &R) -> Self {
        let address = range.address();
        Self {
            buffer: address.buffer,
            offset: address.offset,
            stride: range.stride(),
            len: range.length(),
            words: T::WORDS,
        }
    }

    /// Validate a user-supplied range against its buffer.
    pub fn checked<T: DeviceRepr, R: DeviceRange<T> + ?Sized>(
        range: &R,
        what: &str,
    ) -> Result<Self, SortError> {
        let view = Self::of::<T, R>(range);
        if view.stride == 0 {
            return Err(SortError::InvalidParameter(format!("{what}: stride must be at least 1")));
        }
        if view.len > 0 {
            let (_, end) = view.word_span().ok_or_else(|| {
                SortError::InvalidParameter(format!(
                    "{what}: offset {} with stride {} and length {} overflows the address space",
                    view.offset, view.stride, view.len
                ))
            })?;
            if end > view.buffer.len_words() {
                return Err(SortError::InvalidParameter(format!(
                    "{what}: range ends at word {end}, buffer holds {}",
                    view.buffer.len_words()
                )));
            }
        }
        Ok(view)
    }

    #[inline]
    fn word_index(&self, i: usize) -> usize {
        (self.offset + i * self.stride) * self.words
    }

    #[inline]
    pub fn load_words(&self, i: usize) -> [u32; 2] {
        let w = self.word_index(i);
        if self.words == 2 {
            [self.buffer.load(w), self.buffer.load(w + 1)]
        } else {
            [self.buffer.load(w), 0]
        }
    }

    #[inline]
    pub fn store_words(&self, i: usize, words: [u32; 2]) {
        let w = self.word_index(i);
        self.buffer.store(w, words[0]);
        if self.words == 2 {
            self.buffer.store(w + 1, words[1]);
        }
    }

    #[inline]
    pub fn load<T: DeviceRepr>(&self, i: usize) -> T {
        T::from_words(self.load_words(i))
    }

    /// `[first, end)` words touched, or `None` if the span overflows.
    /// Only meaningful for `len > 0`.
    fn word_span(&self) -> Option<(usize, usize)> {
        let first = self.offset.checked_mul(self.words)?;
        let end = self
            .len
            .checked_sub(1)?
            .checked_mul(self.stride)?
            .checked_add(self.offset)?
            .checked_add(1)?
            .checked_mul(self.words)?;
        Some((first, end))
    }

    /// Same buffer, same elements, same layout.
    pub fn same_range(&self, other: &ElementView) -> bool {
        self.buffer.same_buffer(&other.buffer)
            && self.offset == other.offset
            && self.len == other.len
            && self.words == other.words
            && (self.stride == other.stride || self.len <= 1)
    }

    /// True if any word is touched by both ranges.
    pub fn overlaps(&self, other: &ElementView) -> bool {
        if self.len == 0 || other.len == 0 || !self.buffer.same_buffer(&other.buffer) {
            return false;
        }
        let (Some((a0, a1)), Some((b0, b1))) = (self.word_span(), other.word_span()) else {
            return true;
        };
        if a1 <= b0 || b1 <= a0 {
            return false;
        }
        if self.len > 1 && other.len > 1 && self.stride * self.words == other.stride * other.words {
            let step = self.stride * self.words;
            // Two arithmetic progressions with one period: they interleave
            // without touching iff each element fits in the gap before the other.
            let delta = (b0 + step - a0 % step) % step;
            return !(delta >= self.words && step - delta >= other.words);
        }
        true
    }
}
