use crate::estimator::EstimatorStats;
use crate::hal::{HalError, TaskSpawner};
use log::{debug, error};
use std::thread::{self, JoinHandle};

/// Body of the periodic estimator task; returns its statistics once stopped.
pub type EstimatorTask = Box<dyn FnOnce() -> EstimatorStats + Send + 'static>;

/// Smallest stack the host spawner hands out, whatever the `TaskSpec` asks for.
pub const HOST_MIN_STACK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    /// Stack budget in bytes on the target.
    pub stack_size: usize,
    /// Advisory on the host.
    pub priority: u8,
}

impl TaskSpec {
    pub const ESTIMATOR: TaskSpec = TaskSpec {
        name: "rpm_task",
        stack_size: 2048,
        priority: 10,
    };
}

pub struct TaskHandle {
    thread: Option<JoinHandle<EstimatorStats>>,
}

impl TaskHandle {
    pub fn from_thread(thread: JoinHandle<EstimatorStats>) -> Self {
        Self {
            thread: Some(thread),
        }
    }

    /// Handle for a task the caller cannot join.
    pub fn detached() -> Self {
        Self { thread: None }
    }

    /// Waits for the task to return. `None` for detached or panicked tasks.
    pub fn join(self) -> Option<EstimatorStats> {
        let thread = self.thread?;
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("RPM task panicked");
                None
            }
        }
    }
}

/// Spawns tasks as named OS threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSpawner;

impl TaskSpawner for ThreadSpawner {
    fn spawn(&self, spec: &TaskSpec, task: EstimatorTask) -> Result<TaskHandle, HalError> {
        let stack_size = spec.stack_size.max(HOST_MIN_STACK_SIZE);
        debug!(
            "spawning {} (stack {} bytes, priority {} ignored)",
            spec.name, stack_size, spec.priority
        );
        let thread = thread::Builder::new()
            .name(spec.name.to_string())
            .stack_size(stack_size)
            .spawn(task)?;
        Ok(TaskHandle::from_thread(thread))
    }
}
