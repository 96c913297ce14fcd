//! Onesweep LSD radix sort with decoupled lookback.
//!
//! One histogram pass counts every digit of every stage, a scan turns the
//! counts into global bucket offsets, and each stage then reorders the keys
//! in a single pass: tiles rank their keys locally and chain their bucket
//! totals to the next tile through partition descriptors, so no second
//! scan is needed per stage.
//!
//! ```no_run
//! use sweep_sort::GpuSorter;
//!
//! let sorter = GpuSorter::new()?;
//! let mut data = vec![5u32, 1, 4, 2, 8, 5, 1, 3];
//! sorter.sort(&mut data)?;
//! assert_eq!(data, [1, 1, 2, 3, 4, 5, 5, 8]);
//! # Ok::<(), sweep_sort::SortError>(())
//! ```

pub mod descriptor;
pub mod error;
pub mod key;
pub mod params;
pub mod plan;
pub mod range;
pub mod sorter;

mod kernels;
mod pipeline;

pub use descriptor::DescriptorState;
pub use error::SortError;
pub use key::{DeviceRepr, KeyKind, SortKey, SortOrder};
pub use params::{SortParams, SUPPORTED_RADIX_BITS, SUPPORTED_WORK_GROUP_SIZES};
pub use plan::{BufferRole, Placement, SortPath, SortPlan, StageRoles, StageState};
pub use range::{DeviceAddress, DeviceRange, DeviceRangeMut, RangeView, RangeViewMut, RawRange, SortBuffer};
pub use sorter::{GpuSorter, SortEvent};

pub use sweep_primitives::{DeviceContext, DeviceLimits, DispatchTiming};
