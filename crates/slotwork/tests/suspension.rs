//! Tests for suspension and resumption across runtime operations.
//!
//! A host future raised deep inside a user-defined dunder has to surface
//! through every operation that called it, and resuming the outermost
//! suspension has to finish all of them. The scheduler drives the same
//! machinery for whole tasks.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{
    ArgValues, BinaryOp, ClassDef, ClassScope, ExcType, FutureId, OpResult, Resumable, RunError, Runtime, Scheduler,
    SchedulerProgress, Step, Suspension, SuspensionKind, Value, chain, retry_until_resumed, suspensions_created,
    try_catch,
};

/// Unwraps an operation that must suspend.
fn suspended<T: 'static + std::fmt::Debug>(result: OpResult<T>) -> Suspension<T> {
    match result.expect("operation failed") {
        Resumable::Suspended(s) => s,
        Resumable::Done(value) => panic!("expected a suspension, got {value:?}"),
    }
}

/// An instance whose `__add__` waits on a fresh host future.
///
/// Returns the instance and a cell holding the id of the last future it issued.
fn deferred_adder(rt: &mut Runtime) -> (Value, Rc<Cell<Option<FutureId>>>) {
    let issued = Rc::new(Cell::new(None));
    let record = Rc::clone(&issued);
    let add = rt.new_function("__add__", move |rt, _| {
        let (id, suspension) = rt.host_future();
        record.set(Some(id));
        Ok(Resumable::Suspended(suspension.with_payload("op", Value::str("add"))))
    });
    let cls = class(rt, "Deferred", &[], vec![("__add__", add)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    (obj, issued)
}

// === Test: synchronous fast path ===

/// A chain of steps that never suspend allocates no suspension.
#[test]
fn chain_without_suspension_allocates_nothing() {
    let mut rt = Runtime::default();
    let before = suspensions_created();
    let steps: Vec<Step<Value>> = vec![
        Box::new(|rt: &mut Runtime, v: Value| rt.binary_op(&v, &Value::Int(1), BinaryOp::Add)),
        Box::new(|rt: &mut Runtime, v: Value| rt.binary_op(&v, &Value::Int(10), BinaryOp::Mul)),
    ];
    let result = sync(chain(&mut rt, Resumable::Done(Value::Int(2)), steps));

    assert_eq!(result.as_int(), Some(30));
    assert_eq!(suspensions_created() - before, 0);
}

/// Attribute lookup, calls and operators on user classes stay allocation-free when nothing suspends.
#[test]
fn synchronous_user_code_allocates_no_suspension() {
    let mut rt = Runtime::default();
    let add = rt.new_function("__add__", |_, _| Ok(Resumable::Done(Value::Int(1))));
    let cls = class(&mut rt, "Eager", &[], vec![("__add__", add)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let before = suspensions_created();
    sync(rt.binary_op(&obj, &obj, BinaryOp::Add));
    sync(rt.set_attribute(&obj, "x", Value::Int(1)));
    sync(rt.get_attribute(&obj, "x"));
    assert_eq!(suspensions_created() - before, 0);
}

/// Steps after a suspension run once it is resumed.
#[test]
fn chain_attaches_remaining_steps_to_suspension() {
    let mut rt = Runtime::default();
    let steps: Vec<Step<Value>> = vec![
        Box::new(|_: &mut Runtime, _: Value| {
            let pause = Suspension::new(SuspensionKind::Custom(Rc::from("io")), false, |_, v| {
                Ok(Resumable::Done(v.unwrap_or(Value::None)))
            });
            Ok(Resumable::Suspended(pause))
        }),
        Box::new(|rt: &mut Runtime, v: Value| rt.binary_op(&v, &Value::Int(10), BinaryOp::Add)),
    ];
    let s = suspended(chain(&mut rt, Resumable::Done(Value::None), steps));
    assert_eq!(s.kind(), &SuspensionKind::Custom(Rc::from("io")));

    s.resolve(Ok(Value::Int(5)));
    assert_eq!(sync(s.resume(&mut rt)).as_int(), Some(15));
}

// === Test: suspension inside a dunder ===

/// A host future inside `__add__` surfaces through the operator and resumes to its result.
#[test]
fn host_future_inside_dunder_surfaces_and_resumes() {
    let mut rt = Runtime::default();
    let (obj, issued) = deferred_adder(&mut rt);

    let s = suspended(rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add));
    let future = issued.get().expect("no future issued");
    assert_eq!(s.kind(), &SuspensionKind::HostFuture(future));
    assert!(!s.is_optional());
    assert!(s.child().is_some(), "the operator should wrap the leaf");
    assert_eq!(s.payload("op").and_then(Value::as_str), Some("add"));
    assert_eq!(rt.call_depth(), 0);

    s.resolve(Ok(Value::Int(42)));
    assert_eq!(sync(s.resume(&mut rt)).as_int(), Some(42));
}

/// Work queued after the suspending operation runs on resume, in order.
#[test]
fn continuation_runs_after_resume() {
    let mut rt = Runtime::default();
    let (obj, _) = deferred_adder(&mut rt);

    let pending = rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add).unwrap();
    let s = suspended(pending.and_then(&mut rt, |rt, v| rt.binary_op(&v, &Value::Int(1), BinaryOp::Add)));

    s.resolve(Ok(Value::Int(41)));
    assert_eq!(sync(s.resume(&mut rt)).as_int(), Some(42));
}

/// An error delivered by the host is caught by a handler installed before the suspension.
#[test]
fn try_catch_sees_errors_after_resume() {
    let mut rt = Runtime::default();
    let (obj, _) = deferred_adder(&mut rt);

    let s = suspended(try_catch(
        &mut rt,
        |rt| rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add),
        |_, err| {
            if err.is(ExcType::ValueError) {
                Ok(Resumable::Done(Value::str("recovered")))
            } else {
                Err(err)
            }
        },
    ));

    s.resolve(Err(RunError::new(ExcType::ValueError, "late failure")));
    assert_eq!(sync(s.resume(&mut rt)).as_str(), Some("recovered"));
}

/// Resuming a host future that was never resolved is an error.
#[test]
fn resuming_unresolved_future_fails() {
    let mut rt = Runtime::default();
    let (obj, _) = deferred_adder(&mut rt);
    let s = suspended(rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add));
    assert!(!s.is_resolved());
    let err = sync_err(s.resume(&mut rt));
    assert!(err.is(ExcType::SuspensionError));
}

/// A class body may suspend; the class is created once it resumes.
#[test]
fn class_body_can_suspend() {
    let mut rt = Runtime::default();
    let s = suspended(rt.build_class(ClassDef::new("Remote"), |rt: &mut Runtime, scope: &ClassScope| {
        scope.define(rt, "local", Value::Int(1))?;
        let (_, wait) = rt.host_future();
        let scope = scope.clone();
        Ok(Resumable::Suspended(wait.and_then(move |rt, fetched| {
            scope.define(rt, "fetched", fetched)?;
            Ok(Resumable::Done(()))
        })))
    }));

    s.resolve(Ok(Value::str("payload")));
    let cls = sync(s.resume(&mut rt));
    assert_eq!(sync(rt.get_attribute(&cls, "fetched")).as_str(), Some("payload"));
    assert_eq!(sync(rt.get_attribute(&cls, "local")).as_int(), Some(1));
}

/// A `__next__` that suspends mid-iteration resumes at the same item.
#[test]
fn iteration_resumes_at_the_suspended_item() {
    let mut rt = Runtime::default();
    let calls = Rc::new(Cell::new(0));
    let issued = Rc::new(Cell::new(None));
    let (counter, record) = (Rc::clone(&calls), Rc::clone(&issued));
    let next = rt.new_function("__next__", move |rt, _| {
        counter.set(counter.get() + 1);
        match counter.get() {
            1 => Ok(Resumable::Done(Value::Int(1))),
            2 => {
                let (id, wait) = rt.host_future();
                record.set(Some(id));
                Ok(Resumable::Suspended(wait))
            }
            _ => Err(RunError::new(ExcType::StopIteration, "")),
        }
    });
    let iter = rt.new_function("__iter__", |_, args| Ok(Resumable::Done(args.get_one_arg("__iter__")?)));
    let cls = class(&mut rt, "Stream", &[], vec![("__iter__", iter), ("__next__", next)]);
    let stream = sync(rt.call(&cls, ArgValues::empty()));

    let s = suspended(rt.collect(&stream));
    assert!(issued.get().is_some());
    s.resolve(Ok(Value::Int(2)));
    let items = sync(s.resume(&mut rt));

    let ints: Vec<Option<i64>> = items.iter().map(Value::as_int).collect();
    assert_eq!(ints, vec![Some(1), Some(2)]);
    assert_eq!(calls.get(), 3);
}

// === Test: synchronous call sites ===

/// Optional suspensions are resumed in place by a synchronous caller.
#[test]
fn retry_resumes_optional_suspensions() {
    let mut rt = Runtime::default();
    let value = Resumable::Suspended(Suspension::yield_now(true).and_then(|_, _| Ok(Resumable::Done(Value::Int(7)))));
    let result = retry_until_resumed(&mut rt, value).unwrap();
    assert_eq!(result.as_int(), Some(7));
}

/// A required suspension cannot be absorbed by a synchronous caller.
#[test]
fn retry_rejects_required_suspensions() {
    let mut rt = Runtime::default();
    let (obj, _) = deferred_adder(&mut rt);
    let pending = rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add).unwrap();
    let err = retry_until_resumed(&mut rt, pending).unwrap_err();
    assert!(err.is(ExcType::SuspensionError));
    assert!(err.message().starts_with("cannot suspend (host future"));
}

// === Test: scheduler ===

/// A task blocked on a host future finishes once the host resolves it.
#[test]
fn scheduler_parks_and_resumes_tasks() {
    let mut rt = Runtime::default();
    let (obj, issued) = deferred_adder(&mut rt);
    let mut scheduler = Scheduler::new();
    let task = scheduler.spawn(move |rt| rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add));

    let progress = scheduler.run_until_blocked(&mut rt);
    let future = issued.get().expect("task did not run");
    assert_eq!(progress, SchedulerProgress::Blocked(vec![future]));
    assert!(scheduler.task_result(task).is_none());

    assert!(scheduler.resolve(future, Ok(Value::Int(9))));
    assert!(!scheduler.resolve(future, Ok(Value::Int(9))), "a future resolves once");
    assert_eq!(scheduler.run_until_blocked(&mut rt), SchedulerProgress::Idle);
    assert!(scheduler.is_idle());

    let result = scheduler.take_result(task).expect("no result").expect("task failed");
    assert_eq!(result.as_int(), Some(9));
}

/// A host error is raised inside the task and becomes its result.
#[test]
fn scheduler_delivers_host_errors() {
    let mut rt = Runtime::default();
    let (obj, issued) = deferred_adder(&mut rt);
    let mut scheduler = Scheduler::new();
    let started = rt.binary_op(&obj, &Value::Int(1), BinaryOp::Add);
    let task = scheduler.adopt(started);

    let future = issued.get().expect("no future issued");
    assert_eq!(scheduler.run_until_blocked(&mut rt), SchedulerProgress::Blocked(vec![future]));
    scheduler.resolve(future, Err(RunError::new(ExcType::KeyError, "gone")));
    scheduler.run_until_blocked(&mut rt);

    let err = scheduler.task_result(task).expect("no result").as_ref().unwrap_err();
    assert!(err.is(ExcType::LookupError));
    assert_eq!(err.message(), "gone");
}

/// Yielding tasks go to the back of the ready queue.
#[test]
fn yield_lets_other_tasks_run() {
    let mut rt = Runtime::default();
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new();

    let a_log = Rc::clone(&log);
    scheduler.spawn(move |_| {
        a_log.borrow_mut().push("a1");
        let after = Rc::clone(&a_log);
        Ok(Resumable::Suspended(Suspension::yield_now(true).and_then(move |_, _| {
            after.borrow_mut().push("a2");
            Ok(Resumable::Done(Value::None))
        })))
    });
    let b_log = Rc::clone(&log);
    scheduler.spawn(move |_| {
        b_log.borrow_mut().push("b1");
        Ok(Resumable::Done(Value::None))
    });

    assert_eq!(scheduler.run_until_blocked(&mut rt), SchedulerProgress::Idle);
    assert_eq!(*log.borrow(), vec!["a1", "b1", "a2"]);
}

/// Every task waiting on the same host future wakes when it resolves.
#[test]
fn tasks_sharing_a_future_all_wake() {
    let mut rt = Runtime::default();
    let (future, _) = rt.host_future();
    let mut scheduler = Scheduler::new();
    let waiter = |offset: i64| {
        Suspension::host_future(future).and_then(move |_: &mut Runtime, v: Value| {
            Ok(Resumable::Done(Value::Int(v.as_int().unwrap_or(0) + offset)))
        })
    };
    let first = scheduler.adopt(Ok(Resumable::Suspended(waiter(1))));
    let second = scheduler.adopt(Ok(Resumable::Suspended(waiter(2))));

    assert_eq!(scheduler.run_until_blocked(&mut rt), SchedulerProgress::Blocked(vec![future]));
    assert!(scheduler.resolve(future, Ok(Value::Int(7))));
    assert_eq!(scheduler.run_until_blocked(&mut rt), SchedulerProgress::Idle);

    let first = scheduler.take_result(first).expect("first task lost").expect("first task failed");
    let second = scheduler.take_result(second).expect("second task lost").expect("second task failed");
    assert_eq!((first.as_int(), second.as_int()), (Some(8), Some(9)));
}
