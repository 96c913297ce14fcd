//! Emulated compute device: global memory, work-group kernels, and an
//! in-order command queue.
//!
//! Kernels are written against [`Kernel`] and launched through a
//! [`CommandBuffer`]. Global memory is word-addressed [`DeviceBuffer`]
//! storage with relaxed, acquire, and release accessors.

pub mod buffer;
pub mod buffer_pool;
pub mod collectives;
pub mod command;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod hardware;
pub mod kernel;
pub mod timing;

pub use buffer::DeviceBuffer;
pub use buffer_pool::BufferPool;
pub use command::{CommandBuffer, CommandQueue, CommandStatus, Event};
pub use context::DeviceContext;
pub use dispatch::{Executor, Grid};
pub use error::{DeviceError, KernelFault};
pub use hardware::{DeviceLimits, SUB_GROUP_SIZE};
pub use kernel::{Kernel, LocalMemory, WorkGroup};
pub use timing::{BenchTimer, DispatchTiming};
