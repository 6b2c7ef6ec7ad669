#![doc = include_str!("../../../README.md")]
// first so every module sees the heap types
mod heap;

mod args;
mod attr;
mod builtins;
mod call;
mod class_builder;
mod config;
mod driver;
mod error;
mod ops;
mod runtime;
pub mod slots;
mod suspension;
mod types;
mod value;

pub use crate::{
    args::ArgValues,
    builtins::CoreTypes,
    class_builder::{ClassBody, ClassDef, ClassScope},
    config::{DEFAULT_MAX_RECURSION_DEPTH, Dialect, MAX_INHERITANCE_DEPTH, MAX_MRO_LENGTH, RuntimeConfig},
    driver::{FutureId, Scheduler, SchedulerProgress, TaskId},
    error::{ExcType, RunError, RunResult},
    heap::{HeapId, HeapStats},
    runtime::{DialectMigration, RenamedHook, Runtime},
    slots::{BinaryOp, CompareOp, SlotId, UnaryOp},
    suspension::{
        LoopControl, OpResult, Resumable, Step, Suspension, SuspensionInfo, SuspensionKind, chain, fold_items,
        iterate_with_suspension, retry_until_resumed, suspensions_created, try_catch,
    },
    types::{
        CallConvention, GetSetDef, GetterFn, Layout, MethodDef, NativeFn, NativeMethodFn, NativeTypeSpec, SequenceSlots,
        SetterFn, TypeFlags, TypeObject,
    },
    value::{DictKey, Value},
};
