//! `NoneType`, `NotImplementedType` and `cell`.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    suspension::{OpResult, Resumable},
    types::{GetSetDef, Payload},
    value::Value,
};

pub(crate) fn none_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    if !args.is_empty() || args.has_kwargs() {
        return Err(ExcType::type_error("NoneType takes no arguments"));
    }
    Ok(Resumable::Done(if cls == rt.core.not_implemented_type {
        Value::NotImplemented
    } else {
        Value::None
    }))
}

pub(crate) fn singleton_repr(_rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    let text = if value.is_not_implemented() { "NotImplemented" } else { "None" };
    Ok(Resumable::Done(Rc::from(text)))
}

pub(crate) fn none_bool(_rt: &mut Runtime, _value: &Value) -> OpResult<bool> {
    Ok(Resumable::Done(false))
}

pub(crate) fn singleton_hash(_rt: &mut Runtime, value: &Value) -> OpResult<i64> {
    Ok(Resumable::Done(if value.is_not_implemented() { 0x4e49 } else { 0x4e4f }))
}

// === cell ===

pub(crate) fn cell_repr(rt: &mut Runtime, cell: &Value) -> OpResult<Rc<str>> {
    let address = cell.ref_id().map_or(0, HeapId::index);
    let text = match rt.cell_get(cell) {
        Some(contents) => format!("<cell at {address:#x}: {} object>", rt.value_type_name(&contents)),
        None => format!("<cell at {address:#x}: empty>"),
    };
    Ok(Resumable::Done(text.into()))
}

fn cell_contents_get(rt: &mut Runtime, cell: &Value) -> RunResult<Value> {
    rt.cell_get(cell).ok_or_else(|| ExcType::value_error("Cell is empty"))
}

fn cell_contents_set(rt: &mut Runtime, cell: &Value, value: Option<Value>) -> RunResult<()> {
    rt.cell_set(cell, value)
}

pub(crate) static CELL_GETSETS: [GetSetDef; 1] =
    [GetSetDef::new("cell_contents", cell_contents_get).with_setter(cell_contents_set)];

impl Runtime {
    /// Fills (or with `None`, empties) a cell.
    pub fn cell_set(&mut self, cell: &Value, value: Option<Value>) -> RunResult<()> {
        let type_name = self.value_type_name(cell);
        match cell.ref_id().and_then(|id| self.heap.payload_mut(id)) {
            Some(Payload::Cell(contents)) => {
                *contents = value;
                Ok(())
            }
            _ => Err(ExcType::type_error(format!("expected a cell, got '{type_name}'"))),
        }
    }
}
