//! Encodes a planned sort into one command buffer.
//!
//! Order of commands for the full pipeline:
//!
//! ```text
//! fill hist = 0, fill counters = 0
//! histogram                         (1 dispatch)
//! scan                              (S groups x R items)
//! for s in 0..S:
//!     fill descriptors = INVALID
//!     onesweep(s)
//! copyback                          (in place, S odd)
//! ```
//!
//! Temporaries are allocated before anything is encoded and are released by
//! the command buffer's completed handler, or on the way out of an error.

use std::marker::PhantomData;

use sweep_primitives::{CommandBuffer, CommandStatus, DeviceBuffer, DeviceContext, Event, Grid};

use crate::descriptor::INVALID;
use crate::error::SortError;
use crate::kernels::{
    CopyKernel, HistogramKernel, OnesweepKernel, ScanKernel, SingleGroupKernel, ValuePair,
    COPY_WORK_GROUP_SIZE, HISTOGRAM_WORK_GROUP_SIZE,
};
use crate::key::{SortKey, SortOrder};
use crate::params::Geometry;
use crate::plan::{BufferRole, Placement, SortPath, SortPlan, StageState};
use crate::range::ElementView;

/// A validated sort request.
pub(crate) struct SortJob {
    pub keys_in: ElementView,
    pub keys_out: ElementView,
    pub values: Option<ValuePair>,
    pub order: SortOrder,
    pub geometry: Geometry,
    pub plan: SortPlan,
}

/// Engine-owned device memory for one onesweep sort.
struct Scratch {
    keys: Option<DeviceBuffer>,
    values: Option<DeviceBuffer>,
    hist: DeviceBuffer,
    descriptors: DeviceBuffer,
    counters: DeviceBuffer,
}

impl Scratch {
    fn allocate(ctx: &DeviceContext, job: &SortJob) -> Result<Self, SortError> {
        let plan = &job.plan;
        let g = &job.geometry;
        let (keys, values) = if plan.needs_scratch() {
            let keys = ctx.alloc_buffer(plan.n * g.key_words)?;
            let values = match job.values {
                Some(_) => Some(ctx.alloc_buffer(plan.n * g.value_words)?),
                None => None,
            };
            (Some(keys), values)
        } else {
            (None, None)
        };
        Ok(Self {
            keys,
            values,
            hist: ctx.alloc_buffer(g.histogram_table_words())?,
            descriptors: ctx.alloc_buffer(plan.tiles * g.radix)?,
            counters: ctx.alloc_buffer(g.stages as usize)?,
        })
    }

    fn bytes(&self) -> usize {
        [
            self.keys.as_ref(),
            self.values.as_ref(),
            Some(&self.hist),
            Some(&self.descriptors),
            Some(&self.counters),
        ]
        .into_iter()
        .flatten()
        .map(DeviceBuffer::reserved_bytes)
        .sum()
    }
}

/// Encode and commit `job`.
pub(crate) fn submit<K: SortKey>(ctx: &DeviceContext, job: SortJob) -> Result<Event, SortError> {
    match job.plan.path {
        SortPath::Trivial => {
            if job.plan.n == 1 && job.plan.placement == Placement::OutOfPlace {
                job.keys_out.store_words(0, job.keys_in.load_words(0));
                if let Some(v) = &job.values {
                    v.dst.store_words(0, v.src.load_words(0));
                }
            }
            Ok(Event::completed())
        }
        SortPath::SingleGroup => {
            let mut cb = ctx.queue().command_buffer();
            let group_size = job.geometry.work_group_size;
            cb.dispatch(
                SingleGroupKernel::<K> {
                    src: job.keys_in,
                    dst: job.keys_out,
                    values: job.values,
                    n: job.plan.n,
                    order: job.order,
                    geometry: job.geometry,
                    _key: PhantomData,
                },
                Grid::new(1, group_size),
            )?;
            Ok(cb.commit())
        }
        SortPath::Onesweep => submit_onesweep::<K>(ctx, job),
    }
}

fn submit_onesweep<K: SortKey>(ctx: &DeviceContext, job: SortJob) -> Result<Event, SortError> {
    let scratch = Scratch::allocate(ctx, &job)?;
    let plan = &job.plan;
    let g = job.geometry;
    let n = plan.n;
    log::trace!("onesweep: {} bytes of scratch for {n} keys", scratch.bytes());

    let key_view = |role: BufferRole| -> Result<ElementView, SortError> {
        match role {
            BufferRole::Input => Ok(job.keys_in.clone()),
            BufferRole::Output => Ok(job.keys_out.clone()),
            BufferRole::Scratch => scratch
                .keys
                .as_ref()
                .map(|b| ElementView::whole(b, g.key_words, n))
                .ok_or_else(|| missing_scratch("keys")),
        }
    };
    let value_view = |role: BufferRole, pair: &ValuePair| -> Result<ElementView, SortError> {
        match role {
            BufferRole::Input => Ok(pair.src.clone()),
            BufferRole::Output => Ok(pair.dst.clone()),
            BufferRole::Scratch => scratch
                .values
                .as_ref()
                .map(|b| ElementView::whole(b, g.value_words, n))
                .ok_or_else(|| missing_scratch("values")),
        }
    };

    let mut cb = ctx.queue().command_buffer();
    let table = g.histogram_table_words();
    cb.fill(&scratch.hist, 0, table, 0);
    cb.fill(&scratch.counters, 0, g.stages as usize, 0);

    cb.dispatch(
        HistogramKernel::<K> {
            keys: job.keys_in.clone(),
            hist: scratch.hist.clone(),
            n,
            order: job.order,
            geometry: g,
            replicas: plan.histogram_replicas,
            _key: PhantomData,
        },
        Grid::new(plan.histogram_groups, HISTOGRAM_WORK_GROUP_SIZE),
    )?;
    cb.dispatch(
        ScanKernel {
            hist: scratch.hist.clone(),
            radix: g.radix,
            n,
        },
        Grid::new(g.stages as usize, g.radix as u32),
    )?;

    let mut states = vec![StageState::NotStarted; g.stages as usize];
    for (s, roles) in plan.roles.iter().enumerate() {
        cb.fill(&scratch.descriptors, 0, plan.tiles * g.radix, INVALID);
        states[s] = states[s].advance()?;

        let values = match &job.values {
            Some(pair) => Some(ValuePair {
                src: value_view(roles.src, pair)?,
                dst: value_view(roles.dst, pair)?,
            }),
            None => None,
        };
        cb.dispatch(
            OnesweepKernel::<K> {
                src: key_view(roles.src)?,
                dst: key_view(roles.dst)?,
                values,
                offsets: scratch.hist.clone(),
                descriptors: scratch.descriptors.clone(),
                counters: scratch.counters.clone(),
                stage: s as u32,
                n,
                order: job.order,
                geometry: g,
                _key: PhantomData,
            },
            Grid::new(plan.sweep_groups, g.work_group_size),
        )?;
        states[s] = states[s].advance()?;
        // The queue runs stage s only after stage s - 1 has finished.
        if s > 0 {
            states[s - 1] = states[s - 1].advance()?;
        }
        log::trace!("stage {s}: {:?} -> {:?}, {:?}", roles.src, roles.dst, states[s]);
    }

    if plan.copyback {
        encode_copyback(&mut cb, &key_view(BufferRole::Scratch)?, &job.keys_in, n)?;
        if let Some(pair) = &job.values {
            encode_copyback(&mut cb, &value_view(BufferRole::Scratch, pair)?, &pair.src, n)?;
        }
    }

    let last = states.len().saturating_sub(1);
    let last_state = states.last().copied();
    cb.add_completed_handler(move |status| {
        match (status, last_state.map(StageState::advance)) {
            (CommandStatus::Completed, Some(Ok(done))) => log::trace!("stage {last}: {done:?}"),
            (CommandStatus::Error(e), _) => log::trace!("onesweep stopped: {e}"),
            _ => {}
        }
        log::trace!("releasing {} scratch bytes", scratch.bytes());
        drop(scratch);
    });
    Ok(cb.commit())
}

fn encode_copyback(
    cb: &mut CommandBuffer,
    src: &ElementView,
    dst: &ElementView,
    n: usize,
) -> Result<(), SortError> {
    let grid = Grid::for_elements(n, COPY_WORK_GROUP_SIZE as usize, COPY_WORK_GROUP_SIZE);
    cb.dispatch(
        CopyKernel {
            src: src.clone(),
            dst: dst.clone(),
            n,
        },
        grid,
    )?;
    Ok(())
}

fn missing_scratch(what: &str) -> SortError {
    SortError::InternalInvariantViolation(format!("plan routes {what} through scratch that was not allocated"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SortParams;
    use sweep_primitives::{DeviceError, DeviceLimits};

    fn onesweep_job<K: SortKey>(
        ctx: &DeviceContext,
        keys_in: ElementView,
        keys_out: ElementView,
        placement: Placement,
    ) -> SortJob {
        let geometry = Geometry::new::<K>(&SortParams::default(), 0);
        let plan = SortPlan::build(&geometry, ctx.limits(), keys_in.len, placement).unwrap();
        SortJob {
            keys_in,
            keys_out,
            values: None,
            order: SortOrder::Ascending,
            geometry,
            plan,
        }
    }

    #[test]
    fn test_scratch_released_when_a_sweep_faults() {
        let ctx = DeviceContext::with_limits(DeviceLimits::host()).unwrap();
        let n = 20_000;
        let input = ctx
            .alloc_buffer_with_data(&(0..n as u32).rev().collect::<Vec<_>>())
            .unwrap();
        // Claims n elements but holds 16 words: the first sweep that
        // scatters into it faults.
        let short_output = ctx.alloc_buffer(16).unwrap();
        let job = onesweep_job::<u32>(
            &ctx,
            ElementView::whole(&input, 1, n),
            ElementView::whole(&short_output, 1, n),
            Placement::OutOfPlace,
        );
        assert_eq!(job.plan.path, SortPath::Onesweep);
        assert!(job.plan.roles.iter().any(|r| r.dst == BufferRole::Output));

        let baseline = ctx.buffer_pool().allocated_bytes();
        let event = submit::<u32>(&ctx, job).unwrap();
        let err = event.wait().unwrap_err();
        assert!(
            matches!(err, DeviceError::KernelFault { kernel: "onesweep", .. }),
            "{err:?}"
        );
        assert_eq!(ctx.buffer_pool().allocated_bytes(), baseline);
        assert!(ctx.buffer_pool().peak_bytes() > baseline);

        // The device stays usable after the fault.
        let output = ctx.alloc_buffer(n).unwrap();
        let job = onesweep_job::<u32>(
            &ctx,
            ElementView::whole(&input, 1, n),
            ElementView::whole(&output, 1, n),
            Placement::OutOfPlace,
        );
        submit::<u32>(&ctx, job).unwrap().wait().unwrap();
        assert!(output.read(0..n).iter().copied().eq(0..n as u32));
        drop(output);
        assert_eq!(ctx.buffer_pool().allocated_bytes(), baseline);
    }

    #[test]
    fn test_scratch_released_after_success() {
        let ctx = DeviceContext::with_limits(DeviceLimits::integrated()).unwrap();
        let n = 9_000;
        let keys = ctx
            .alloc_buffer_with_data(&(0..n as u32).map(|i| i.wrapping_mul(2_654_435_761)).collect::<Vec<_>>())
            .unwrap();
        let view = ElementView::whole(&keys, 1, n);
        let job = onesweep_job::<u32>(&ctx, view.clone(), view, Placement::InPlace);
        let baseline = ctx.buffer_pool().allocated_bytes();
        let event = submit::<u32>(&ctx, job).unwrap();
        event.wait().unwrap();
        assert_eq!(ctx.buffer_pool().allocated_bytes(), baseline);
        let out = keys.read(0..n);
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }
}
