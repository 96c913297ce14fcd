//! Device limits: compute units, local memory, work-group and sub-group widths.
//!
//! Kernels size their grids from these numbers. A preset can be looked up by
//! name, detected from the host, or deserialized from a JSON device profile.

use serde::{Deserialize, Serialize};

use crate::error::DeviceError;

/// Lane count of a sub-group. Ballot masks are `u32`, so this is fixed.
pub const SUB_GROUP_SIZE: u32 = 32;

/// Upper bound on emulated compute units detected from the host.
const MAX_HOST_UNITS: usize = 16;

/// Capabilities of the device the executor emulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLimits {
    /// Human-readable device name.
    pub name: String,
    /// Number of execution units; the executor runs one thread per unit.
    pub compute_units: u32,
    /// Local memory available on one execution unit, shared by its resident groups.
    pub local_mem_per_unit: usize,
    /// Largest local-memory footprint a single work-group may declare.
    pub max_local_mem_per_group: usize,
    /// Largest work-group size a dispatch may use.
    pub max_work_group_size: u32,
    /// Sub-group (SIMD) width. Must equal [`SUB_GROUP_SIZE`].
    pub sub_group_size: u32,
    /// Scheduler cap on resident work-groups per execution unit.
    pub max_groups_per_unit: u32,
    /// Capacity of device global memory.
    pub global_mem_bytes: usize,
}

impl DeviceLimits {
    /// Limits for the host machine: one compute unit per available core.
    pub fn host() -> Self {
        let units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .clamp(1, MAX_HOST_UNITS);
        Self {
            name: format!("host ({units} units)"),
            compute_units: units as u32,
            local_mem_per_unit: 256 * 1024,
            max_local_mem_per_group: 128 * 1024,
            max_work_group_size: 1024,
            sub_group_size: SUB_GROUP_SIZE,
            max_groups_per_unit: 8,
            global_mem_bytes: 4 << 30,
        }
    }

    /// A small integrated GPU: few units, tight local memory.
    pub fn integrated() -> Self {
        Self {
            name: "integrated".to_string(),
            compute_units: 4,
            local_mem_per_unit: 64 * 1024,
            max_local_mem_per_group: 64 * 1024,
            max_work_group_size: 512,
            sub_group_size: SUB_GROUP_SIZE,
            max_groups_per_unit: 4,
            global_mem_bytes: 1 << 30,
        }
    }

    /// A discrete GPU profile with many units.
    pub fn discrete() -> Self {
        Self {
            name: "discrete".to_string(),
            compute_units: 16,
            local_mem_per_unit: 128 * 1024,
            max_local_mem_per_group: 96 * 1024,
            max_work_group_size: 1024,
            sub_group_size: SUB_GROUP_SIZE,
            max_groups_per_unit: 16,
            global_mem_bytes: 8 << 30,
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "host" => Some(Self::host()),
            "integrated" => Some(Self::integrated()),
            "discrete" => Some(Self::discrete()),
            _ => None,
        }
    }

    /// Check that the executor can model these limits.
    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.compute_units == 0 {
            return Err(DeviceError::UnsupportedLimits(
                "compute_units must be at least 1".to_string(),
            ));
        }
        if self.sub_group_size != SUB_GROUP_SIZE {
            return Err(DeviceError::UnsupportedLimits(format!(
                "sub_group_size must be {SUB_GROUP_SIZE}, got {}",
                self.sub_group_size
            )));
        }
        if self.max_work_group_size < self.sub_group_size {
            return Err(DeviceError::UnsupportedLimits(format!(
                "max_work_group_size {} is below the sub-group size",
                self.max_work_group_size
            )));
        }
        if self.max_groups_per_unit == 0 {
            return Err(DeviceError::UnsupportedLimits(
                "max_groups_per_unit must be at least 1".to_string(),
            ));
        }
        if self.max_local_mem_per_group > self.local_mem_per_unit {
            return Err(DeviceError::UnsupportedLimits(format!(
                "max_local_mem_per_group {} exceeds local_mem_per_unit {}",
                self.max_local_mem_per_group, self.local_mem_per_unit
            )));
        }
        Ok(())
    }

    /// Work-groups the scheduler keeps resident across the whole device.
    pub fn max_concurrent_groups(&self) -> u32 {
        self.compute_units.saturating_mul(self.max_groups_per_unit)
    }

    /// Work-groups that can be co-resident when each declares `local_bytes`
    /// of local memory: `floor(local_mem_per_unit / local_bytes) * compute_units`,
    /// never above [`max_concurrent_groups`](Self::max_concurrent_groups).
    pub fn max_resident_groups(&self, local_bytes: usize) -> u32 {
        if local_bytes == 0 {
            return self.max_concurrent_groups();
        }
        let per_unit = (self.local_mem_per_unit / local_bytes).min(self.max_groups_per_unit as usize);
        (per_unit as u32).saturating_mul(self.compute_units)
    }
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::host()
    }
}
