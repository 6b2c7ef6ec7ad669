//! Resumable operations.
//!
//! Every abstract operation in the runtime may either complete immediately or
//! stop partway because some step needs something the runtime cannot produce
//! synchronously (a host future, a cooperative yield). The stopped state is a
//! [`Suspension`]: an owned continuation that, when resumed, picks up exactly
//! where the computation stopped and finishes the remaining steps.
//!
//! Intermediate steps wrap an inner suspension instead of unwinding, so one
//! suspension raised deep inside attribute lookup surfaces through every caller
//! as a chain of wrappers. Resuming the outermost wrapper resumes the innermost
//! step first and then runs each wrapper's remaining work in order.
//!
//! The fast path allocates nothing: when every step completes synchronously,
//! combinators such as [`chain`] call the next step directly.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;

use crate::{
    driver::FutureId,
    error::{ExcType, RunError, RunResult},
    runtime::Runtime,
    value::Value,
};

/// Outcome of an operation that may suspend.
pub type OpResult<T = Value> = RunResult<Resumable<T>>;

/// A completed value or a suspension that will eventually produce one.
pub enum Resumable<T> {
    Done(T),
    Suspended(Suspension<T>),
}

/// Why a computation stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuspensionKind {
    /// Cooperative yield; the scheduler requeues the task behind other ready tasks.
    Yield,
    /// Waiting for the host to resolve the given future.
    HostFuture(FutureId),
    /// Embedder-defined reason.
    Custom(Rc<str>),
}

impl fmt::Display for SuspensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yield => f.write_str("yield"),
            Self::HostFuture(id) => write!(f, "host future {}", id.raw()),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

/// Descriptive part of a suspension, shared between a wrapper and the
/// suspension it wraps until the wrapper overrides something.
#[derive(Debug, Clone)]
pub struct SuspensionInfo {
    kind: SuspensionKind,
    optional: bool,
    payload: IndexMap<Rc<str>, Value>,
}

impl SuspensionInfo {
    #[must_use]
    pub fn kind(&self) -> &SuspensionKind {
        &self.kind
    }

    /// Optional suspensions are scheduling hints; a synchronous caller may
    /// resume them in place instead of failing.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[must_use]
    pub fn payload(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }
}

/// Outcome recorded by the host, consumed by the innermost step on resume.
type Resolution = Rc<RefCell<Option<RunResult<Value>>>>;

type ResumeFn<T> = Box<dyn FnOnce(&mut Runtime) -> OpResult<T>>;

thread_local! {
    static SUSPENSIONS_CREATED: Cell<u64> = const { Cell::new(0) };
}

fn count_created() {
    SUSPENSIONS_CREATED.with(|c| c.set(c.get() + 1));
}

/// Number of suspensions (leaves and wrappers) created on this thread.
///
/// Lets tests assert that a fully synchronous chain never allocated one.
#[must_use]
pub fn suspensions_created() -> u64 {
    SUSPENSIONS_CREATED.with(Cell::get)
}

/// A stopped computation producing a `T` when resumed.
pub struct Suspension<T> {
    info: Rc<SuspensionInfo>,
    child: Option<Rc<SuspensionInfo>>,
    resolution: Resolution,
    resume: ResumeFn<T>,
}

impl<T: 'static> Suspension<T> {
    /// Creates a leaf suspension.
    ///
    /// `resume` receives the value the host resolved this suspension with, if any.
    /// An error recorded before resumption is raised instead of calling `resume`.
    pub fn new(
        kind: SuspensionKind,
        optional: bool,
        resume: impl FnOnce(&mut Runtime, Option<Value>) -> OpResult<T> + 'static,
    ) -> Self {
        count_created();
        let resolution: Resolution = Rc::default();
        let recorded = Rc::clone(&resolution);
        Self {
            info: Rc::new(SuspensionInfo {
                kind,
                optional,
                payload: IndexMap::new(),
            }),
            child: None,
            resolution,
            resume: Box::new(move |rt| {
                let outcome = recorded.borrow_mut().take();
                match outcome {
                    Some(Err(err)) => Err(err),
                    Some(Ok(value)) => resume(rt, Some(value)),
                    None => resume(rt, None),
                }
            }),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &SuspensionKind {
        &self.info.kind
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.info.optional
    }

    #[must_use]
    pub fn info(&self) -> &SuspensionInfo {
        &self.info
    }

    /// Description of the suspension this one wraps, `None` for a leaf.
    #[must_use]
    pub fn child(&self) -> Option<&SuspensionInfo> {
        self.child.as_deref()
    }

    #[must_use]
    pub fn payload(&self, key: &str) -> Option<&Value> {
        self.info.payload(key)
    }

    /// Sets a payload entry on this suspension without touching the one it wraps.
    #[must_use]
    pub fn with_payload(mut self, key: &str, value: Value) -> Self {
        Rc::make_mut(&mut self.info).payload.insert(Rc::from(key), value);
        self
    }

    /// Records the host's outcome. An `Err` is re-raised at the resume point.
    pub fn resolve(&self, outcome: RunResult<Value>) {
        *self.resolution.borrow_mut() = Some(outcome);
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolution.borrow().is_some()
    }

    /// Resumes the computation: the innermost step runs first, then each wrapper.
    pub fn resume(self, rt: &mut Runtime) -> OpResult<T> {
        (self.resume)(rt)
    }

    /// Wraps this suspension with a step that receives the inner outcome, error included.
    pub fn map_result<U: 'static>(
        self,
        f: impl FnOnce(&mut Runtime, OpResult<T>) -> OpResult<U> + 'static,
    ) -> Suspension<U> {
        count_created();
        let Self {
            info, resolution, resume, ..
        } = self;
        Suspension {
            child: Some(Rc::clone(&info)),
            info,
            resolution,
            resume: Box::new(move |rt| {
                let inner = resume(rt);
                f(rt, inner)
            }),
        }
    }

    /// Wraps this suspension with a step that runs once the inner computation completes.
    ///
    /// If the inner computation suspends again on resume, the step is carried
    /// over to the new suspension.
    pub fn and_then<U: 'static>(self, f: impl FnOnce(&mut Runtime, T) -> OpResult<U> + 'static) -> Suspension<U> {
        self.map_result(move |rt, result| match result? {
            Resumable::Done(value) => f(rt, value),
            Resumable::Suspended(next) => Ok(Resumable::Suspended(next.and_then(f))),
        })
    }
}

impl Suspension<Value> {
    /// A cooperative yield point. Resumes with `None` unless the host supplied a value.
    #[must_use]
    pub fn yield_now(optional: bool) -> Self {
        Self::new(SuspensionKind::Yield, optional, |_, value| {
            Ok(Resumable::Done(value.unwrap_or(Value::None)))
        })
    }

    /// A suspension waiting for the host to resolve `id`.
    #[must_use]
    pub fn host_future(id: FutureId) -> Self {
        Self::new(SuspensionKind::HostFuture(id), false, move |_, value| match value {
            Some(value) => Ok(Resumable::Done(value)),
            None => Err(RunError::new(
                ExcType::SuspensionError,
                format!("host future {} resumed before it was resolved", id.raw()),
            )),
        })
    }
}

impl<T> fmt::Debug for Suspension<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("kind", &self.info.kind)
            .field("optional", &self.info.optional)
            .field("wrapper", &self.child.is_some())
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Resumable<T> {
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended(_))
    }

    /// Returns the value if the operation completed.
    pub fn done(self) -> Option<T> {
        match self {
            Self::Done(value) => Some(value),
            Self::Suspended(_) => None,
        }
    }

    /// Transforms the eventual value.
    pub fn map<U: 'static>(self, f: impl FnOnce(T) -> U + 'static) -> Resumable<U> {
        match self {
            Self::Done(value) => Resumable::Done(f(value)),
            Self::Suspended(s) => Resumable::Suspended(s.and_then(move |_, value| Ok(Resumable::Done(f(value))))),
        }
    }

    /// Runs `f` with the value now if complete, otherwise after resumption.
    pub fn and_then<U: 'static>(
        self,
        rt: &mut Runtime,
        f: impl FnOnce(&mut Runtime, T) -> OpResult<U> + 'static,
    ) -> OpResult<U> {
        match self {
            Self::Done(value) => f(rt, value),
            Self::Suspended(s) => Ok(Resumable::Suspended(s.and_then(f))),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resumable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(value) => f.debug_tuple("Done").field(value).finish(),
            Self::Suspended(s) => f.debug_tuple("Suspended").field(s).finish(),
        }
    }
}

/// One step of a [`chain`].
pub type Step<T> = Box<dyn FnOnce(&mut Runtime, T) -> OpResult<T>>;

/// Threads `value` through `steps` in order.
///
/// Steps run directly while each completes synchronously. At the first
/// suspension the remaining steps are attached to it and the suspension is returned.
pub fn chain<T: 'static>(
    rt: &mut Runtime,
    value: Resumable<T>,
    steps: impl IntoIterator<Item = Step<T>>,
) -> OpResult<T> {
    run_steps(rt, value, steps.into_iter().collect())
}

fn run_steps<T: 'static>(rt: &mut Runtime, mut current: Resumable<T>, mut steps: VecDeque<Step<T>>) -> OpResult<T> {
    loop {
        match current {
            Resumable::Done(value) => match steps.pop_front() {
                Some(step) => current = step(rt, value)?,
                None => return Ok(Resumable::Done(value)),
            },
            Resumable::Suspended(s) if steps.is_empty() => return Ok(Resumable::Suspended(s)),
            Resumable::Suspended(s) => {
                return Ok(Resumable::Suspended(
                    s.map_result(move |rt, result| run_steps(rt, result?, steps)),
                ));
            }
        }
    }
}

/// Drives `value` to completion from a call site that cannot propagate suspensions.
///
/// Optional suspensions are resumed in place, repeatedly if needed. A
/// non-optional suspension raises `SuspensionError`.
pub fn retry_until_resumed<T: 'static>(rt: &mut Runtime, mut value: Resumable<T>) -> RunResult<T> {
    loop {
        match value {
            Resumable::Done(v) => return Ok(v),
            Resumable::Suspended(s) => {
                if !s.is_optional() {
                    return Err(ExcType::cannot_suspend(s.kind()));
                }
                log::trace!("resuming optional suspension ({}) in place", s.kind());
                value = s.resume(rt)?;
            }
        }
    }
}

/// Runs `try_fn`, routing any error it raises to `catch_fn`.
///
/// Errors raised after a suspension, when the computation is resumed later,
/// are routed to `catch_fn` as well.
pub fn try_catch<T: 'static>(
    rt: &mut Runtime,
    try_fn: impl FnOnce(&mut Runtime) -> OpResult<T>,
    catch_fn: impl FnOnce(&mut Runtime, RunError) -> OpResult<T> + 'static,
) -> OpResult<T> {
    match try_fn(rt) {
        Ok(result) => Ok(catch_after_resume(result, catch_fn)),
        Err(err) => catch_fn(rt, err),
    }
}

fn catch_after_resume<T: 'static, C>(result: Resumable<T>, catch_fn: C) -> Resumable<T>
where
    C: FnOnce(&mut Runtime, RunError) -> OpResult<T> + 'static,
{
    match result {
        Resumable::Done(value) => Resumable::Done(value),
        Resumable::Suspended(s) => Resumable::Suspended(s.map_result(move |rt, outcome| match outcome {
            Ok(next) => Ok(catch_after_resume(next, catch_fn)),
            Err(err) => catch_fn(rt, err),
        })),
    }
}

/// Control signal returned by the body of [`iterate_with_suspension`].
#[derive(Debug)]
pub enum LoopControl<A> {
    /// Keep iterating with the updated accumulator.
    Continue(A),
    /// Stop early; the value becomes the loop's result.
    Break(A),
}

/// Folds `body` over the items produced by `iterator`.
///
/// Both advancing the iterator and the body may suspend; the loop resumes
/// from the exact item it stopped at. Returns the final accumulator, or the
/// value carried by `LoopControl::Break`.
pub fn iterate_with_suspension<A, F>(rt: &mut Runtime, iterator: Value, initial: A, body: F) -> OpResult<A>
where
    A: 'static,
    F: FnMut(&mut Runtime, A, Value) -> OpResult<LoopControl<A>> + 'static,
{
    drive_loop(rt, iterator, initial, body, None)
}

fn drive_loop<A, F>(rt: &mut Runtime, iterator: Value, mut acc: A, mut body: F, mut pending: Option<Value>) -> OpResult<A>
where
    A: 'static,
    F: FnMut(&mut Runtime, A, Value) -> OpResult<LoopControl<A>> + 'static,
{
    loop {
        let item = match pending.take() {
            Some(item) => item,
            None => match rt.iter_next(&iterator)? {
                Resumable::Done(Some(item)) => item,
                Resumable::Done(None) => return Ok(Resumable::Done(acc)),
                Resumable::Suspended(s) => {
                    return Ok(Resumable::Suspended(s.and_then(move |rt, next| match next {
                        Some(item) => drive_loop(rt, iterator, acc, body, Some(item)),
                        None => Ok(Resumable::Done(acc)),
                    })));
                }
            },
        };
        match body(rt, acc, item)? {
            Resumable::Done(LoopControl::Continue(next)) => acc = next,
            Resumable::Done(LoopControl::Break(result)) => return Ok(Resumable::Done(result)),
            Resumable::Suspended(s) => {
                return Ok(Resumable::Suspended(s.and_then(move |rt, control| match control {
                    LoopControl::Continue(next) => drive_loop(rt, iterator, next, body, None),
                    LoopControl::Break(result) => Ok(Resumable::Done(result)),
                })));
            }
        }
    }
}

/// Folds `body` over a snapshot of `items`, like [`iterate_with_suspension`]
/// but without going through the iterator protocol.
///
/// Used by native container slots that already hold their items.
pub fn fold_items<T, A, F>(rt: &mut Runtime, items: Vec<T>, initial: A, body: F) -> OpResult<A>
where
    T: Clone + 'static,
    A: 'static,
    F: FnMut(&mut Runtime, A, T) -> OpResult<LoopControl<A>> + 'static,
{
    fold_from(rt, items, 0, initial, body)
}

fn fold_from<T, A, F>(rt: &mut Runtime, items: Vec<T>, mut index: usize, mut acc: A, mut body: F) -> OpResult<A>
where
    T: Clone + 'static,
    A: 'static,
    F: FnMut(&mut Runtime, A, T) -> OpResult<LoopControl<A>> + 'static,
{
    while let Some(item) = items.get(index).cloned() {
        index += 1;
        match body(rt, acc, item)? {
            Resumable::Done(LoopControl::Continue(next)) => acc = next,
            Resumable::Done(LoopControl::Break(result)) => return Ok(Resumable::Done(result)),
            Resumable::Suspended(s) => {
                return Ok(Resumable::Suspended(s.and_then(move |rt, control| match control {
                    LoopControl::Continue(next) => fold_from(rt, items, index, next, body),
                    LoopControl::Break(result) => Ok(Resumable::Done(result)),
                })));
            }
        }
    }
    Ok(Resumable::Done(acc))
}
