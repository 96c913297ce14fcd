//! In-order command queue, command buffers, and completion events.
//!
//! A [`CommandQueue`] owns one worker thread that executes committed command
//! buffers strictly in commit order. Within a buffer, commands run in encode
//! order and each one sees every global-memory write of the one before it.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::buffer::DeviceBuffer;
use crate::dispatch::{validate_launch, Executor, Grid};
use crate::error::DeviceError;
use crate::hardware::DeviceLimits;
use crate::kernel::Kernel;
use crate::timing::DispatchTiming;

/// Lifecycle of a committed command buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Committed,
    Running,
    Completed,
    Error(DeviceError),
}

impl CommandStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, CommandStatus::Completed | CommandStatus::Error(_))
    }
}

enum Command {
    Dispatch {
        kernel: Arc<dyn Kernel>,
        grid: Grid,
    },
    Fill {
        buffer: DeviceBuffer,
        start: usize,
        end: usize,
        value: u32,
    },
}

type CompletedHandler = Box<dyn FnOnce(&CommandStatus) + Send>;

struct Job {
    commands: Vec<Command>,
    handlers: Vec<CompletedHandler>,
    event: Event,
}

struct EventInner {
    status: CommandStatus,
    timings: Vec<DispatchTiming>,
}

struct EventState {
    inner: Mutex<EventInner>,
    cond: Condvar,
}

/// Completion signal for a committed command buffer.
#[derive(Clone)]
pub struct Event {
    state: Arc<EventState>,
}

impl Event {
    fn with_status(status: CommandStatus) -> Self {
        Self {
            state: Arc::new(EventState {
                inner: Mutex::new(EventInner {
                    status,
                    timings: Vec::new(),
                }),
                cond: Condvar::new(),
            }),
        }
    }

    /// An event that is already complete.
    pub fn completed() -> Self {
        Self::with_status(CommandStatus::Completed)
    }

    fn lock(&self) -> MutexGuard<'_, EventInner> {
        self.state.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_running(&self) {
        self.lock().status = CommandStatus::Running;
    }

    fn finish(&self, status: CommandStatus, timings: Vec<DispatchTiming>) {
        let mut inner = self.lock();
        inner.status = status;
        inner.timings = timings;
        self.state.cond.notify_all();
    }

    /// Block until the command buffer has finished.
    pub fn wait(&self) -> Result<(), DeviceError> {
        let mut inner = self.lock();
        while !inner.status.is_finished() {
            inner = self
                .state
                .cond
                .wait(inner)
                .unwrap_or_else(|e| e.into_inner());
        }
        match &inner.status {
            CommandStatus::Error(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.lock().status.is_finished()
    }

    pub fn status(&self) -> CommandStatus {
        self.lock().status.clone()
    }

    /// Per-command timings, available once the buffer has finished.
    pub fn timings(&self) -> Vec<DispatchTiming> {
        self.lock().timings.clone()
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("status", &self.status()).finish()
    }
}

struct QueueShared {
    limits: DeviceLimits,
    sender: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for QueueShared {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued work drains.
        let sender = self.sender.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        drop(sender);
        let worker = self.worker.get_mut().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = worker {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

/// Serial queue of command buffers for one device.
#[derive(Clone)]
pub struct CommandQueue {
    shared: Arc<QueueShared>,
}

impl CommandQueue {
    pub fn new(limits: DeviceLimits) -> Result<Self, DeviceError> {
        let executor = Executor::new(limits.clone())?;
        let (sender, receiver) = crossbeam_channel::unbounded();
        let worker = std::thread::Builder::new()
            .name("sweep-queue".to_string())
            .spawn(move || worker_loop(executor, receiver))
            .map_err(|e| DeviceError::UnsupportedLimits(format!("cannot start queue worker: {e}")))?;
        log::debug!(
            "command queue up on '{}' ({} compute units)",
            limits.name,
            limits.compute_units
        );
        Ok(Self {
            shared: Arc::new(QueueShared {
                limits,
                sender: Mutex::new(Some(sender)),
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.shared.limits
    }

    pub fn command_buffer(&self) -> CommandBuffer {
        CommandBuffer {
            queue: self.clone(),
            commands: Vec::new(),
            handlers: Vec::new(),
        }
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("device", &self.shared.limits.name)
            .finish()
    }
}

/// A list of commands encoded for one submission.
pub struct CommandBuffer {
    queue: CommandQueue,
    commands: Vec<Command>,
    handlers: Vec<CompletedHandler>,
}

impl CommandBuffer {
    /// Encode a kernel launch. Fails if the launch can never run on this device.
    pub fn dispatch<K: Kernel + 'static>(&mut self, kernel: K, grid: Grid) -> Result<(), DeviceError> {
        validate_launch(self.queue.limits(), &kernel, grid)?;
        self.commands.push(Command::Dispatch {
            kernel: Arc::new(kernel),
            grid,
        });
        Ok(())
    }

    /// Encode a fill of `buffer[start..end]` with `value`.
    pub fn fill(&mut self, buffer: &DeviceBuffer, start: usize, end: usize, value: u32) {
        self.commands.push(Command::Fill {
            buffer: buffer.clone(),
            start,
            end,
            value,
        });
    }

    /// Run `handler` on the queue thread after the last command, before the
    /// event completes.
    pub fn add_completed_handler<F>(&mut self, handler: F)
    where
        F: FnOnce(&CommandStatus) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Commands encoded so far.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Submit to the queue.
    pub fn commit(self) -> Event {
        let event = Event::with_status(CommandStatus::Committed);
        let job = Job {
            commands: self.commands,
            handlers: self.handlers,
            event: event.clone(),
        };
        let sender = self
            .queue
            .shared
            .sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let rejected = match sender {
            Some(sender) => sender.send(job).err().map(|e| e.into_inner()),
            None => Some(job),
        };
        if let Some(job) = rejected {
            let status = CommandStatus::Error(DeviceError::QueueClosed);
            for handler in job.handlers {
                handler(&status);
            }
            job.event.finish(status, Vec::new());
        }
        event
    }
}

fn worker_loop(executor: Executor, receiver: Receiver<Job>) {
    for job in receiver {
        job.event.set_running();
        let mut timings = Vec::with_capacity(job.commands.len());
        let mut status = CommandStatus::Completed;
        for command in &job.commands {
            let result = match command {
                Command::Dispatch { kernel, grid } => executor.dispatch(kernel.as_ref(), *grid),
                Command::Fill {
                    buffer,
                    start,
                    end,
                    value,
                } => {
                    let t = Instant::now();
                    buffer.fill(*start..*end, *value);
                    Ok(DispatchTiming {
                        label: "fill",
                        groups: 0,
                        group_size: 0,
                        elapsed: t.elapsed(),
                    })
                }
            };
            match result {
                Ok(timing) => timings.push(timing),
                Err(e) => {
                    status = CommandStatus::Error(e);
                    break;
                }
            }
        }
        // Release the kernels' buffer handles before handlers observe the pool.
        drop(job.commands);
        for handler in job.handlers {
            handler(&status);
        }
        job.event.finish(status, timings);
    }
}
