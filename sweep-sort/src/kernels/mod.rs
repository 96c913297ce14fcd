//! Device kernels of the sort pipeline.

pub(crate) mod copyback;
pub(crate) mod histogram;
pub(crate) mod onesweep;
pub(crate) mod rank;
pub(crate) mod scan;
pub(crate) mod single_group;

pub(crate) use copyback::CopyKernel;
pub(crate) use histogram::HistogramKernel;
pub(crate) use onesweep::OnesweepKernel;
pub(crate) use scan::ScanKernel;
pub(crate) use single_group::SingleGroupKernel;

use crate::range::ElementView;

/// Work-items per histogram work-group.
pub const HISTOGRAM_WORK_GROUP_SIZE: u32 = 256;
/// Keys each histogram work-item reads per chunk.
pub const HISTOGRAM_ITEMS_PER_THREAD: usize = 16;
/// Upper bound on local histogram replicas per work-group.
pub const MAX_HISTOGRAM_REPLICAS: usize = 16;
/// Work-items per copyback work-group.
pub const COPY_WORK_GROUP_SIZE: u32 = 256;

/// Source and destination of the values that travel with the keys.
#[derive(Clone, Debug)]
pub(crate) struct ValuePair {
    pub src: ElementView,
    pub dst: ElementView,
}
