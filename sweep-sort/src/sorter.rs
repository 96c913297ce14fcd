use std::marker::PhantomData;

use sweep_primitives::{DeviceContext, DispatchTiming, Event};

use crate::error::SortError;
use crate::kernels::{
    HistogramKernel, ValuePair, COPY_WORK_GROUP_SIZE, HISTOGRAM_WORK_GROUP_SIZE,
};
use crate::key::{DeviceRepr, SortKey, SortOrder};
use crate::params::{Geometry, SortParams};
use crate::pipeline::{self, SortJob};
use crate::plan::{HistogramLaunch, Placement, SortPlan};
use crate::range::{DeviceRange, DeviceRangeMut, ElementView, SortBuffer};

/// Completion handle of an asynchronous sort.
///
/// Borrows the sorted ranges until the device is done with them. Dropping
/// the handle blocks until the sort has finished.
#[must_use = "dropping a SortEvent blocks until the sort completes"]
pub struct SortEvent<'a> {
    event: Event,
    _ranges: PhantomData<&'a ()>,
}

impl SortEvent<'_> {
    fn new(event: Event) -> Self {
        Self {
            event,
            _ranges: PhantomData,
        }
    }

    /// Block until every kernel of the sort has completed.
    pub fn wait(&self) -> Result<(), SortError> {
        self.event.wait().map_err(SortError::from)
    }

    pub fn is_complete(&self) -> bool {
        self.event.is_complete()
    }

    /// Commands that ran, in order. Empty until complete, and for sorts of
    /// fewer than two elements.
    pub fn timings(&self) -> Vec<DispatchTiming> {
        self.event.timings()
    }
}

impl Drop for SortEvent<'_> {
    fn drop(&mut self) {
        let _ = self.event.wait();
    }
}

/// Radix sorter bound to one device.
pub struct GpuSorter {
    ctx: DeviceContext,
    params: SortParams,
}

impl GpuSorter {
    /// Sorter on the host device with default parameters.
    pub fn new() -> Result<Self, SortError> {
        let ctx = DeviceContext::new()?;
        Self::with_context(ctx, SortParams::default())
    }

    pub fn with_context(ctx: DeviceContext, params: SortParams) -> Result<Self, SortError> {
        params.validate()?;
        let radix = 1u32 << params.radix_bits;
        let widest = params
            .work_group_size
            .max(HISTOGRAM_WORK_GROUP_SIZE)
            .max(COPY_WORK_GROUP_SIZE)
            .max(radix);
        let limits = ctx.limits();
        if widest > limits.max_work_group_size {
            return Err(SortError::InvalidParameter(format!(
                "kernels need work-groups of {widest} items, device '{}' allows {}",
                limits.name, limits.max_work_group_size
            )));
        }
        log::debug!(
            "sorter on '{}': W={} D={} radix_bits={}",
            limits.name,
            params.work_group_size,
            params.data_per_work_item,
            params.radix_bits
        );
        Ok(Self { ctx, params })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    pub fn params(&self) -> &SortParams {
        &self.params
    }

    /// Allocate a device buffer for `capacity` elements.
    pub fn alloc_sort_buffer<T: DeviceRepr>(&self, capacity: usize) -> Result<SortBuffer<T>, SortError> {
        let buffer = self.ctx.alloc_buffer(capacity * T::WORDS)?;
        Ok(SortBuffer::new(buffer, capacity))
    }

    /// Plan a sort of `n` keys of type `K`, carrying `value_words` device words
    /// per value (0 for keys only), without launching anything.
    pub fn plan<K: SortKey>(
        &self,
        n: usize,
        placement: Placement,
        value_words: usize,
    ) -> Result<SortPlan, SortError> {
        let geometry = Geometry::new::<K>(&self.params, value_words);
        SortPlan::build(&geometry, self.ctx.limits(), n, placement)
    }

    /// Sort `input` into `output`, leaving `input` unchanged.
    pub fn sort_range<'a, K: SortKey>(
        &self,
        input: &'a impl DeviceRange<K>,
        output: &'a impl DeviceRangeMut<K>,
        order: SortOrder,
    ) -> Result<SortEvent<'a>, SortError> {
        let keys_in = ElementView::checked::<K, _>(input, "keys input")?;
        let keys_out = ElementView::checked::<K, _>(output, "keys output")?;
        self.submit::<K>(keys_in, keys_out, None, 0, order)
    }

    pub fn sort_range_in_place<'a, K: SortKey>(
        &self,
        keys: &'a impl DeviceRangeMut<K>,
        order: SortOrder,
    ) -> Result<SortEvent<'a>, SortError> {
        let view = ElementView::checked::<K, _>(keys, "keys")?;
        self.submit::<K>(view.clone(), view, None, 0, order)
    }

    /// Sort keys and move the values along with them.
    pub fn sort_pairs_range<'a, K: SortKey, V: DeviceRepr>(
        &self,
        keys_in: &'a impl DeviceRange<K>,
        keys_out: &'a impl DeviceRangeMut<K>,
        values_in: &'a impl DeviceRange<V>,
        values_out: &'a impl DeviceRangeMut<V>,
        order: SortOrder,
    ) -> Result<SortEvent<'a>, SortError> {
        let ki = ElementView::checked::<K, _>(keys_in, "keys input")?;
        let ko = ElementView::checked::<K, _>(keys_out, "keys output")?;
        let values = ValuePair {
            src: ElementView::checked::<V, _>(values_in, "values input")?,
            dst: ElementView::checked::<V, _>(values_out, "values output")?,
        };
        self.submit::<K>(ki, ko, Some(values), V::WORDS, order)
    }

    pub fn sort_pairs_range_in_place<'a, K: SortKey, V: DeviceRepr>(
        &self,
        keys: &'a impl DeviceRangeMut<K>,
        values: &'a impl DeviceRangeMut<V>,
        order: SortOrder,
    ) -> Result<SortEvent<'a>, SortError> {
        let k = ElementView::checked::<K, _>(keys, "keys")?;
        let v = ElementView::checked::<V, _>(values, "values")?;
        let pair = ValuePair {
            src: v.clone(),
            dst: v,
        };
        self.submit::<K>(k.clone(), k, Some(pair), V::WORDS, order)
    }

    /// Sort a device buffer in place and wait.
    pub fn sort_buffer<K: SortKey>(&self, buf: &SortBuffer<K>, order: SortOrder) -> Result<(), SortError> {
        self.sort_range_in_place(buf, order)?.wait()
    }

    pub fn sort_pairs_buffer<K: SortKey, V: DeviceRepr>(
        &self,
        keys: &SortBuffer<K>,
        values: &SortBuffer<V>,
        order: SortOrder,
    ) -> Result<(), SortError> {
        self.sort_pairs_range_in_place(keys, values, order)?.wait()
    }

    /// Sort a host slice ascending.
    pub fn sort<K: SortKey>(&self, data: &mut [K]) -> Result<(), SortError> {
        self.sort_by_order(data, SortOrder::Ascending)
    }

    pub fn sort_descending<K: SortKey>(&self, data: &mut [K]) -> Result<(), SortError> {
        self.sort_by_order(data, SortOrder::Descending)
    }

    pub fn sort_by_order<K: SortKey>(&self, data: &mut [K], order: SortOrder) -> Result<(), SortError> {
        if data.len() < 2 {
            return Ok(());
        }
        let mut buf = self.alloc_sort_buffer::<K>(data.len())?;
        buf.copy_from_slice(data);
        self.sort_buffer(&buf, order)?;
        buf.copy_to_slice(data);
        Ok(())
    }

    /// Sort host keys ascending, permuting `values` the same way.
    pub fn sort_pairs<K: SortKey, V: DeviceRepr>(&self, keys: &mut [K], values: &mut [V]) -> Result<(), SortError> {
        self.sort_pairs_by_order(keys, values, SortOrder::Ascending)
    }

    pub fn sort_pairs_by_order<K: SortKey, V: DeviceRepr>(
        &self,
        keys: &mut [K],
        values: &mut [V],
        order: SortOrder,
    ) -> Result<(), SortError> {
        if keys.len() != values.len() {
            return Err(SortError::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            });
        }
        if keys.len() < 2 {
            return Ok(());
        }
        let mut kbuf = self.alloc_sort_buffer::<K>(keys.len())?;
        let mut vbuf = self.alloc_sort_buffer::<V>(values.len())?;
        kbuf.copy_from_slice(keys);
        vbuf.copy_from_slice(values);
        self.sort_pairs_buffer(&kbuf, &vbuf, order)?;
        kbuf.copy_to_slice(keys);
        vbuf.copy_to_slice(values);
        Ok(())
    }

    /// Indices that sort `data` ascending. Equal keys keep input order.
    pub fn argsort<K: SortKey>(&self, data: &[K]) -> Result<Vec<u32>, SortError> {
        self.argsort_by_order(data, SortOrder::Ascending)
    }

    pub fn argsort_by_order<K: SortKey>(&self, data: &[K], order: SortOrder) -> Result<Vec<u32>, SortError> {
        let mut indices: Vec<u32> = (0..data.len() as u32).collect();
        if data.len() < 2 {
            return Ok(indices);
        }
        let mut kbuf = self.alloc_sort_buffer::<K>(data.len())?;
        let mut ibuf = self.alloc_sort_buffer::<u32>(data.len())?;
        kbuf.copy_from_slice(data);
        ibuf.copy_from_slice(&indices);
        self.sort_pairs_buffer(&kbuf, &ibuf, order)?;
        ibuf.copy_to_slice(&mut indices);
        Ok(indices)
    }

    /// Per-stage digit counts of `keys`: `S` rows of `R` bins.
    pub fn histogram<K: SortKey>(
        &self,
        keys: &impl DeviceRange<K>,
        order: SortOrder,
    ) -> Result<Vec<Vec<u32>>, SortError> {
        let view = ElementView::checked::<K, _>(keys, "keys")?;
        let geometry = Geometry::new::<K>(&self.params, 0);
        let table = geometry.histogram_table_words();
        let hist = self.ctx.alloc_buffer(table)?;
        if view.len > 0 {
            let launch = HistogramLaunch::new(&geometry, self.ctx.limits(), view.len);
            let mut cb = self.ctx.queue().command_buffer();
            cb.dispatch(
                HistogramKernel::<K> {
                    keys: view.clone(),
                    hist: hist.clone(),
                    n: view.len,
                    order,
                    geometry,
                    replicas: launch.replicas,
                    _key: PhantomData,
                },
                sweep_primitives::Grid::new(launch.groups, HISTOGRAM_WORK_GROUP_SIZE),
            )?;
            cb.commit().wait()?;
        }
        Ok(hist
            .read(0..table)
            .chunks_exact(geometry.radix)
            .map(<[u32]>::to_vec)
            .collect())
    }

    fn submit<'a, K: SortKey>(
        &self,
        keys_in: ElementView,
        keys_out: ElementView,
        values: Option<ValuePair>,
        value_words: usize,
        order: SortOrder,
    ) -> Result<SortEvent<'a>, SortError> {
        let placement = check_ranges(&keys_in, &keys_out, values.as_ref())?;
        let geometry = Geometry::new::<K>(&self.params, value_words);
        let plan = SortPlan::build(&geometry, self.ctx.limits(), keys_in.len, placement)?;
        log::debug!(
            "sort {} x {}-bit keys ({:?}, {:?}): {:?}, {} tiles, {} sweep groups",
            plan.n,
            K::BITS,
            order,
            placement,
            plan.path,
            plan.tiles,
            plan.sweep_groups
        );
        let job = SortJob {
            keys_in,
            keys_out,
            values,
            order,
            geometry,
            plan,
        };
        let event = pipeline::submit::<K>(&self.ctx, job)?;
        Ok(SortEvent::new(event))
    }
}

/// Lengths, placement, and aliasing of the four ranges of a sort.
///
/// Each output must be disjoint from every other range, except that it may
/// be exactly its own input.
fn check_ranges(
    keys_in: &ElementView,
    keys_out: &ElementView,
    values: Option<&ValuePair>,
) -> Result<Placement, SortError> {
    if keys_in.len != keys_out.len {
        return Err(SortError::InvalidParameter(format!(
            "keys input has {} elements, keys output {}",
            keys_in.len, keys_out.len
        )));
    }
    let placement = if keys_in.same_range(keys_out) {
        Placement::InPlace
    } else {
        Placement::OutOfPlace
    };

    let mut ranges: Vec<(&str, &ElementView)> = vec![("keys input", keys_in), ("keys output", keys_out)];
    if let Some(pair) = values {
        for v in [&pair.src, &pair.dst] {
            if v.len != keys_in.len {
                return Err(SortError::LengthMismatch {
                    keys: keys_in.len,
                    values: v.len,
                });
            }
        }
        let values_in_place = pair.src.same_range(&pair.dst);
        if values_in_place != (placement == Placement::InPlace) {
            return Err(SortError::InvalidParameter(
                "keys and values must both be sorted in place or both out of place".to_string(),
            ));
        }
        ranges.push(("values input", &pair.src));
        ranges.push(("values output", &pair.dst));
    }

    // Outputs sit at odd indices, each right after its input.
    for out_idx in (1..ranges.len()).step_by(2) {
        let (out_name, out) = ranges[out_idx];
        for (idx, &(name, other)) in ranges.iter().enumerate() {
            if idx == out_idx || (idx + 1 == out_idx && out.same_range(other)) {
                continue;
            }
            if out.overlaps(other) {
                return Err(SortError::InvalidParameter(format!("{out_name} overlaps {name}")));
            }
        }
    }
    Ok(placement)
}
