//! Descriptors exposing native code as attributes: method descriptors,
//! classmethod descriptors, getset descriptors and slot wrappers.

use std::fmt;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{SlotFunc, registry::{SlotDef, SlotKind}},
    suspension::{OpResult, Resumable},
    value::Value,
};

/// Native method body: `f(receiver, args)`.
pub type NativeMethodFn = fn(&mut Runtime, &Value, ArgValues) -> OpResult;
pub type GetterFn = fn(&mut Runtime, &Value) -> RunResult<Value>;
/// Sets the attribute when `value` is `Some`, deletes it otherwise.
pub type SetterFn = fn(&mut Runtime, &Value, Option<Value>) -> RunResult<()>;

/// How a native method accepts its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallConvention {
    NoArgs,
    OneArg,
    /// Exactly `n` positional arguments.
    Fixed(usize),
    /// Any number of positional arguments, no keywords.
    VarArgs,
    /// Positional and keyword arguments, checked by the method itself.
    Keywords,
}

impl CallConvention {
    fn check(self, name: &str, args: &ArgValues) -> RunResult<()> {
        if self != Self::Keywords {
            args.check_no_kwargs(name)?;
        }
        let expected = match self {
            Self::NoArgs => 0,
            Self::OneArg => 1,
            Self::Fixed(n) => n,
            Self::VarArgs | Self::Keywords => return Ok(()),
        };
        if expected == 0 {
            args.check_zero_args(name)
        } else if args.len() == expected {
            Ok(())
        } else {
            Err(ExcType::arg_count(name, expected, args.len()))
        }
    }
}

/// A native method entry in a type's method table.
#[derive(Clone, Copy)]
pub struct MethodDef {
    pub name: &'static str,
    pub func: NativeMethodFn,
    pub convention: CallConvention,
    pub doc: &'static str,
}

impl MethodDef {
    #[must_use]
    pub const fn new(name: &'static str, func: NativeMethodFn, convention: CallConvention) -> Self {
        Self {
            name,
            func,
            convention,
            doc: "",
        }
    }

    #[must_use]
    pub const fn with_doc(mut self, doc: &'static str) -> Self {
        self.doc = doc;
        self
    }

    pub(crate) fn invoke(&self, rt: &mut Runtime, receiver: &Value, args: ArgValues) -> OpResult {
        self.convention.check(self.name, &args)?;
        (self.func)(rt, receiver, args)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("convention", &self.convention)
            .finish_non_exhaustive()
    }
}

/// A computed attribute with a native getter and optional setter.
#[derive(Clone, Copy)]
pub struct GetSetDef {
    pub name: &'static str,
    pub getter: GetterFn,
    pub setter: Option<SetterFn>,
    pub doc: &'static str,
}

impl GetSetDef {
    #[must_use]
    pub const fn new(name: &'static str, getter: GetterFn) -> Self {
        Self {
            name,
            getter,
            setter: None,
            doc: "",
        }
    }

    #[must_use]
    pub const fn with_setter(mut self, setter: SetterFn) -> Self {
        self.setter = Some(setter);
        self
    }
}

impl fmt::Debug for GetSetDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetSetDef")
            .field("name", &self.name)
            .field("writable", &self.setter.is_some())
            .finish_non_exhaustive()
    }
}

/// Payload of the native descriptor types.
#[derive(Debug, Clone, Copy)]
pub enum Descriptor {
    Method { owner: HeapId, def: &'static MethodDef },
    ClassMethod { owner: HeapId, def: &'static MethodDef },
    GetSet { owner: HeapId, def: &'static GetSetDef },
    /// A native slot exposed under its dunder name.
    SlotWrapper { owner: HeapId, def: SlotDef, func: SlotFunc },
}

impl Descriptor {
    #[must_use]
    pub fn owner(&self) -> HeapId {
        match self {
            Self::Method { owner, .. }
            | Self::ClassMethod { owner, .. }
            | Self::GetSet { owner, .. }
            | Self::SlotWrapper { owner, .. } => *owner,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Method { def, .. } | Self::ClassMethod { def, .. } => def.name,
            Self::GetSet { def, .. } => def.name,
            Self::SlotWrapper { def, .. } => def.name,
        }
    }
}

impl Runtime {
    fn descriptor_payload(&self, descr: &Value) -> RunResult<Descriptor> {
        match descr.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(crate::types::Payload::Descriptor(d)) => Ok(*d),
            _ => Err(ExcType::type_error(format!(
                "expected a descriptor, got '{}'",
                self.value_type_name(descr)
            ))),
        }
    }

    /// Checks the receiver of an unbound native method call.
    fn check_receiver(&self, descr: &Descriptor, receiver: &Value) -> RunResult<()> {
        let owner = descr.owner();
        if self.isinstance(receiver, owner) {
            Ok(())
        } else {
            Err(ExcType::type_error(format!(
                "descriptor '{}' for '{}' objects doesn't apply to a '{}' object",
                descr.name(),
                self.type_name(owner),
                self.value_type_name(receiver)
            )))
        }
    }
}

/// `__get__` of method descriptors and slot wrappers: bind to the instance.
pub(crate) fn method_descr_get(rt: &mut Runtime, descr: &Value, instance: Option<&Value>, _owner: HeapId) -> OpResult {
    let payload = rt.descriptor_payload(descr)?;
    let is_new = matches!(payload, Descriptor::SlotWrapper { def, .. } if def.kind == SlotKind::New);
    match instance {
        Some(instance) if !is_new => {
            rt.check_receiver(&payload, instance)?;
            Ok(Resumable::Done(rt.new_bound_method(instance.clone(), descr.clone())))
        }
        _ => Ok(Resumable::Done(descr.clone())),
    }
}

/// `__call__` of method descriptors: the first argument is the receiver.
pub(crate) fn method_descr_call(rt: &mut Runtime, descr: &Value, args: ArgValues) -> OpResult {
    let payload = rt.descriptor_payload(descr)?;
    let (receiver, rest) = args.split_first(payload.name())?;
    rt.check_receiver(&payload, &receiver)?;
    match payload {
        Descriptor::Method { def, .. } => def.invoke(rt, &receiver, rest),
        _ => Err(ExcType::type_error(format!("'{}' is not a method descriptor", payload.name()))),
    }
}

/// `__call__` of slot wrappers.
pub(crate) fn wrapper_descr_call(rt: &mut Runtime, descr: &Value, args: ArgValues) -> OpResult {
    let payload = rt.descriptor_payload(descr)?;
    let Descriptor::SlotWrapper { owner, def, func } = payload else {
        return Err(ExcType::type_error("expected a slot wrapper"));
    };
    let (receiver, rest) = args.split_first(def.name)?;
    if def.kind == SlotKind::New {
        let cls = rt.as_type(&receiver).ok_or_else(|| {
            ExcType::type_error(format!(
                "{}.__new__(X): X is not a type object ({})",
                rt.type_name(owner),
                rt.value_type_name(&receiver)
            ))
        })?;
        if !rt.is_subtype(cls, owner) {
            return Err(ExcType::type_error(format!(
                "{}.__new__({}): {} is not a subtype of {}",
                rt.type_name(owner),
                rt.type_name(cls),
                rt.type_name(cls),
                rt.type_name(owner)
            )));
        }
    } else {
        rt.check_receiver(&payload, &receiver)?;
    }
    def.invoke_wrapper(rt, func, &receiver, rest)
}

/// `__get__` of classmethod descriptors: bind to the owner type.
pub(crate) fn classmethod_descr_get(rt: &mut Runtime, descr: &Value, _instance: Option<&Value>, owner: HeapId) -> OpResult {
    Ok(Resumable::Done(rt.new_bound_method(Value::Ref(owner), descr.clone())))
}

/// `__call__` of classmethod descriptors: the first argument is the type.
pub(crate) fn classmethod_descr_call(rt: &mut Runtime, descr: &Value, args: ArgValues) -> OpResult {
    let payload = rt.descriptor_payload(descr)?;
    let Descriptor::ClassMethod { owner, def } = payload else {
        return Err(ExcType::type_error("expected a classmethod descriptor"));
    };
    let (cls, rest) = args.split_first(def.name)?;
    match rt.as_type(&cls) {
        Some(cls_id) if rt.is_subtype(cls_id, owner) => def.invoke(rt, &cls, rest),
        _ => Err(ExcType::type_error(format!(
            "descriptor '{}' for type '{}' needs a subtype of '{}' as arg 1",
            def.name,
            rt.type_name(owner),
            rt.type_name(owner)
        ))),
    }
}

/// `__get__` of getset descriptors.
pub(crate) fn getset_descr_get(rt: &mut Runtime, descr: &Value, instance: Option<&Value>, _owner: HeapId) -> OpResult {
    let Some(instance) = instance else {
        return Ok(Resumable::Done(descr.clone()));
    };
    let payload = rt.descriptor_payload(descr)?;
    let Descriptor::GetSet { def, .. } = payload else {
        return Err(ExcType::type_error("expected a getset descriptor"));
    };
    rt.check_receiver(&payload, instance)?;
    Ok(Resumable::Done((def.getter)(rt, instance)?))
}

/// `__set__`/`__delete__` of getset descriptors.
pub(crate) fn getset_descr_set(rt: &mut Runtime, descr: &Value, instance: &Value, value: Option<Value>) -> OpResult<()> {
    let payload = rt.descriptor_payload(descr)?;
    let Descriptor::GetSet { owner, def } = payload else {
        return Err(ExcType::type_error("expected a getset descriptor"));
    };
    rt.check_receiver(&payload, instance)?;
    match def.setter {
        Some(setter) => {
            setter(rt, instance, value)?;
            Ok(Resumable::Done(()))
        }
        None => Err(ExcType::attribute_not_writable(rt.type_name(owner), def.name)),
    }
}

pub(crate) fn descr_repr(rt: &mut Runtime, descr: &Value) -> OpResult<std::rc::Rc<str>> {
    let payload = rt.descriptor_payload(descr)?;
    let owner = rt.type_name(payload.owner());
    let text = match payload {
        Descriptor::Method { def, .. } => format!("<method '{}' of '{owner}' objects>", def.name),
        Descriptor::ClassMethod { def, .. } => format!("<method '{}' of '{owner}' objects>", def.name),
        Descriptor::GetSet { def, .. } => format!("<attribute '{}' of '{owner}' objects>", def.name),
        Descriptor::SlotWrapper { def, .. } => format!("<slot wrapper '{}' of '{owner}' objects>", def.name),
    };
    Ok(Resumable::Done(text.into()))
}
