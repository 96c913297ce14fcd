//! Launch planning: which path to take, grid sizes, buffer roles per stage.

use sweep_primitives::DeviceLimits;

use crate::descriptor::MAX_PAYLOAD;
use crate::error::SortError;
use crate::kernels::{HISTOGRAM_ITEMS_PER_THREAD, HISTOGRAM_WORK_GROUP_SIZE, MAX_HISTOGRAM_REPLICAS};
use crate::params::Geometry;

/// Which pipeline a sort runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPath {
    /// Fewer than two elements: nothing to launch.
    Trivial,
    /// One work-group sorts the whole input in local memory.
    SingleGroup,
    /// Histogram, scan, one onesweep pass per stage, optional copyback.
    Onesweep,
}

/// Whether the output is the input range itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    InPlace,
    OutOfPlace,
}

/// A buffer as seen by one onesweep stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferRole {
    /// The caller's input range (also the output when sorting in place).
    Input,
    /// The caller's output range of an out-of-place sort.
    Output,
    /// Engine-owned temporary.
    Scratch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRoles {
    pub src: BufferRole,
    pub dst: BufferRole,
}

/// Host-side lifecycle of one onesweep stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    NotStarted,
    DescriptorsZeroed,
    Sweeping,
    Done,
}

impl StageState {
    pub fn advance(self) -> Result<StageState, SortError> {
        match self {
            StageState::NotStarted => Ok(StageState::DescriptorsZeroed),
            StageState::DescriptorsZeroed => Ok(StageState::Sweeping),
            StageState::Sweeping => Ok(StageState::Done),
            StageState::Done => Err(SortError::InternalInvariantViolation(
                "stage advanced past Done".to_string(),
            )),
        }
    }
}

/// Everything decided about a sort before anything is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPlan {
    pub path: SortPath,
    pub n: usize,
    pub placement: Placement,
    /// Radix stages `S`.
    pub stages: u32,
    pub radix: usize,
    /// Keys per tile.
    pub tile: usize,
    /// `ceil(n / tile)`.
    pub tiles: usize,
    /// Work-groups in each onesweep dispatch.
    pub sweep_groups: usize,
    /// Local memory of one onesweep work-group, in bytes.
    pub sweep_local_bytes: usize,
    pub histogram_groups: usize,
    /// Local sub-table copies per histogram work-group.
    pub histogram_replicas: usize,
    /// Source and destination of each onesweep stage.
    pub roles: Vec<StageRoles>,
    /// Scratch holds the result after the last stage and must be copied back.
    pub copyback: bool,
}

impl SortPlan {
    /// True if any stage reads or writes the engine's temporary buffer.
    pub fn needs_scratch(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r.src == BufferRole::Scratch || r.dst == BufferRole::Scratch)
    }

    pub(crate) fn build(
        geometry: &Geometry,
        limits: &DeviceLimits,
        n: usize,
        placement: Placement,
    ) -> Result<Self, SortError> {
        if n > MAX_PAYLOAD as usize {
            return Err(SortError::InvalidParameter(format!(
                "{n} elements exceed the partition-descriptor payload limit of {MAX_PAYLOAD}"
            )));
        }
        let mut plan = SortPlan {
            path: SortPath::Trivial,
            n,
            placement,
            stages: geometry.stages,
            radix: geometry.radix,
            tile: geometry.tile,
            tiles: n.div_ceil(geometry.tile),
            sweep_groups: 0,
            sweep_local_bytes: 0,
            histogram_groups: 0,
            histogram_replicas: 0,
            roles: Vec::new(),
            copyback: false,
        };
        if n < 2 {
            return Ok(plan);
        }
        if n <= geometry.tile && geometry.single_group_local_words() * 4 <= limits.max_local_mem_per_group {
            plan.path = SortPath::SingleGroup;
            return Ok(plan);
        }

        plan.path = SortPath::Onesweep;
        let slm = geometry.onesweep_local_words() * 4;
        if slm > limits.max_local_mem_per_group {
            return Err(SortError::InvalidParameter(format!(
                "onesweep work-group needs {slm} bytes of local memory, device allows {}",
                limits.max_local_mem_per_group
            )));
        }
        let resident = limits.max_resident_groups(slm) as usize;
        if resident == 0 {
            return Err(SortError::InvalidParameter(format!(
                "no onesweep work-group of {slm} bytes fits in {} bytes of local memory per unit",
                limits.local_mem_per_unit
            )));
        }
        plan.sweep_local_bytes = slm;
        plan.sweep_groups = plan.tiles.min(resident).max(1);

        let hist = HistogramLaunch::new(geometry, limits, n);
        plan.histogram_groups = hist.groups;
        plan.histogram_replicas = hist.replicas;

        plan.roles = stage_roles(geometry.stages, placement);
        plan.copyback = plan
            .roles
            .last()
            .is_some_and(|r| r.dst == BufferRole::Scratch);
        Ok(plan)
    }
}

/// Grid and replica count of the histogram kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HistogramLaunch {
    pub groups: usize,
    pub replicas: usize,
}

impl HistogramLaunch {
    /// As many replicas as fit one work-group's local memory (at most 16),
    /// and no more groups than chunks or resident slots.
    pub fn new(geometry: &Geometry, limits: &DeviceLimits, n: usize) -> Self {
        let table_bytes = geometry.histogram_table_words() * 4;
        let replicas = (limits.max_local_mem_per_group / table_bytes).clamp(1, MAX_HISTOGRAM_REPLICAS);
        let chunks = n.div_ceil(HISTOGRAM_WORK_GROUP_SIZE as usize * HISTOGRAM_ITEMS_PER_THREAD);
        let resident = limits.max_resident_groups(replicas * table_bytes).max(1) as usize;
        Self {
            groups: chunks.clamp(1, resident),
            replicas,
        }
    }
}

/// Ping-pong roles for `stages` passes.
///
/// In place, the input alternates with scratch and an odd stage count ends in
/// scratch. Out of place, the first destination is picked so the last stage
/// always lands in the output and the input is never written.
fn stage_roles(stages: u32, placement: Placement) -> Vec<StageRoles> {
    let (home, first_dst) = match placement {
        Placement::InPlace => (BufferRole::Input, BufferRole::Scratch),
        Placement::OutOfPlace if stages % 2 == 0 => (BufferRole::Output, BufferRole::Scratch),
        Placement::OutOfPlace => (BufferRole::Output, BufferRole::Output),
    };
    let mut roles = Vec::with_capacity(stages as usize);
    let mut src = BufferRole::Input;
    let mut dst = first_dst;
    for _ in 0..stages {
        roles.push(StageRoles { src, dst });
        src = dst;
        dst = if dst == BufferRole::Scratch { home } else { BufferRole::Scratch };
    }
    roles
}
