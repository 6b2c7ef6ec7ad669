//! Cooperative task driver.
//!
//! The host acts as the event loop. Each task is a resumable computation; the
//! scheduler resumes ready tasks in FIFO order, parks tasks waiting for a host
//! future, and hands control back to the host once nothing is runnable.

use std::collections::VecDeque;

use ahash::AHashMap;
use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::{
    error::RunResult,
    runtime::Runtime,
    suspension::{OpResult, Resumable, Suspension, SuspensionKind},
    value::Value,
};

/// Identifier of a future the host must resolve.
///
/// Sequential integers allocated by `Runtime::host_future`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FutureId(u32);

impl FutureId {
    #[inline]
    pub(crate) fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Identifier of a task spawned on a `Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TaskId(u32);

impl TaskId {
    /// Returns the raw u32 value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// What the scheduler is waiting for after `run_until_blocked` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerProgress {
    /// Every task has finished.
    Idle,
    /// Remaining tasks wait for these host futures, in the order they blocked.
    Blocked(Vec<FutureId>),
}

/// Runs resumable tasks to completion, parking them on host futures.
#[derive(Debug, Default)]
pub struct Scheduler {
    next_task: u32,
    ready: VecDeque<(TaskId, Suspension<Value>)>,
    /// Tasks parked on each host future, in the order they blocked.
    waiting: IndexMap<FutureId, SmallVec<[(TaskId, Suspension<Value>); 1]>>,
    results: AHashMap<TaskId, RunResult<Value>>,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `start` as a new task. It first runs on the next `run_until_blocked`.
    pub fn spawn(&mut self, start: impl FnOnce(&mut Runtime) -> OpResult + 'static) -> TaskId {
        let task = self.allocate_task();
        let entry = Suspension::new(SuspensionKind::Yield, true, move |rt, _| start(rt));
        self.ready.push_back((task, entry));
        log::debug!("spawned task {}", task.raw());
        task
    }

    /// Adopts an operation that has already started, e.g. one that suspended
    /// at a call site with no way to propagate it.
    pub fn adopt(&mut self, started: OpResult) -> TaskId {
        let task = self.allocate_task();
        self.settle(task, started);
        task
    }

    /// Resumes ready tasks until each has finished or waits on a host future.
    pub fn run_until_blocked(&mut self, rt: &mut Runtime) -> SchedulerProgress {
        while let Some((task, suspension)) = self.ready.pop_front() {
            log::trace!("resuming task {} ({})", task.raw(), suspension.kind());
            let outcome = suspension.resume(rt);
            self.settle(task, outcome);
        }
        if self.waiting.is_empty() {
            SchedulerProgress::Idle
        } else {
            let blocked: Vec<FutureId> = self.waiting.keys().copied().collect();
            log::debug!("scheduler blocked on {} host future(s)", blocked.len());
            SchedulerProgress::Blocked(blocked)
        }
    }

    /// Delivers the host's outcome for `future` and makes every task waiting on it ready.
    ///
    /// An `Err` outcome is raised inside each task at its resume point.
    /// Returns `false` if no task waits on `future`.
    pub fn resolve(&mut self, future: FutureId, outcome: RunResult<Value>) -> bool {
        let Some(waiters) = self.waiting.shift_remove(&future) else {
            return false;
        };
        if waiters.len() > 1 {
            log::debug!("future {} wakes {} tasks", future.raw(), waiters.len());
        }
        for (task, suspension) in waiters {
            suspension.resolve(outcome.clone());
            self.ready.push_back((task, suspension));
        }
        true
    }

    /// Final outcome of a finished task.
    #[must_use]
    pub fn task_result(&self, task: TaskId) -> Option<&RunResult<Value>> {
        self.results.get(&task)
    }

    pub fn take_result(&mut self, task: TaskId) -> Option<RunResult<Value>> {
        self.results.remove(&task)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ready.is_empty() && self.waiting.is_empty()
    }

    fn allocate_task(&mut self) -> TaskId {
        let task = TaskId(self.next_task);
        self.next_task += 1;
        task
    }

    fn settle(&mut self, task: TaskId, outcome: OpResult) {
        match outcome {
            Ok(Resumable::Done(value)) => {
                self.results.insert(task, Ok(value));
            }
            Err(err) => {
                log::debug!("task {} failed: {err}", task.raw());
                self.results.insert(task, Err(err));
            }
            Ok(Resumable::Suspended(suspension)) => match suspension.kind().clone() {
                SuspensionKind::HostFuture(future) if !suspension.is_resolved() => {
                    self.waiting.entry(future).or_default().push((task, suspension));
                }
                _ => self.ready.push_back((task, suspension)),
            },
        }
    }
}
