use std::rc::Rc;

use crate::{
    args::ArgValues,
    builtins::{self, CoreTypes},
    config::{Dialect, RuntimeConfig},
    driver::FutureId,
    error::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId, HeapStats},
    slots::registry::{DunderRegistry, RENAMED_HOOKS},
    suspension::{OpResult, Suspension},
    types::{
        BoundMethod, Descriptor, Dict, Function, FunctionKind, Instance, NativeFn, Payload, Property, TypeFlags,
        TypeObject,
    },
    value::Value,
};

/// The object runtime: heap, core types, dunder registry and configuration.
///
/// All protocol operations (attribute access, calls, operators, iteration,
/// class creation) are methods on `Runtime` and may suspend.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) core: CoreTypes,
    pub(crate) registry: DunderRegistry,
    pub(crate) config: RuntimeConfig,
    call_depth: usize,
    next_future: u32,
}

/// One hook moved by a dialect switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamedHook {
    pub type_name: Rc<str>,
    pub old_name: &'static str,
    pub new_name: &'static str,
}

/// Report produced by `Runtime::set_dialect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectMigration {
    pub from: Dialect,
    pub to: Dialect,
    pub renamed: Vec<RenamedHook>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    /// Creates a runtime with the core types installed.
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        let registry = DunderRegistry::new(config.dialect);
        let mut heap = Heap::default();
        let (core, pending) = builtins::allocate_core_types(&mut heap);
        let mut rt = Self {
            heap,
            core,
            registry,
            config,
            call_depth: 0,
            next_future: 0,
        };
        builtins::install_core_members(&mut rt, pending);
        log::debug!(
            "runtime ready: {} core types, dialect {}",
            rt.core.all().len(),
            rt.config.dialect
        );
        rt
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    #[must_use]
    pub fn core(&self) -> &CoreTypes {
        &self.core
    }

    #[must_use]
    pub fn registry(&self) -> &DunderRegistry {
        &self.registry
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // --- type queries ---

    /// The type of any value.
    #[must_use]
    pub fn type_of(&self, value: &Value) -> HeapId {
        match value {
            Value::None => self.core.none_type,
            Value::NotImplemented => self.core.not_implemented_type,
            Value::Bool(_) => self.core.bool_,
            Value::Int(_) => self.core.int,
            Value::Float(_) => self.core.float,
            Value::Str(_) => self.core.str_,
            Value::Ref(id) => match self.heap.get(*id) {
                Some(HeapData::Type(t)) => t.metatype,
                Some(HeapData::Instance(inst)) => inst.class,
                None => self.core.object,
            },
        }
    }

    #[must_use]
    pub fn type_object(&self, ty: HeapId) -> Option<&TypeObject> {
        self.heap.type_obj(ty)
    }

    #[must_use]
    pub fn is_type_id(&self, id: HeapId) -> bool {
        self.heap.type_obj(id).is_some()
    }

    /// Returns the id when `value` is a type object.
    #[must_use]
    pub fn as_type(&self, value: &Value) -> Option<HeapId> {
        value.ref_id().filter(|id| self.is_type_id(*id))
    }

    #[must_use]
    pub fn type_name(&self, ty: HeapId) -> Rc<str> {
        self.heap
            .type_obj(ty)
            .map_or_else(|| Rc::from("?"), |t| t.name.clone())
    }

    #[must_use]
    pub fn value_type_name(&self, value: &Value) -> Rc<str> {
        self.type_name(self.type_of(value))
    }

    /// The MRO of `ty`, empty if `ty` is not a type.
    #[must_use]
    pub fn mro_of(&self, ty: HeapId) -> &[HeapId] {
        self.heap.type_obj(ty).map_or(&[][..], |t| t.mro.as_slice())
    }

    #[must_use]
    pub fn type_flags(&self, ty: HeapId) -> TypeFlags {
        self.heap.type_obj(ty).map_or(TypeFlags::empty(), |t| t.flags)
    }

    #[must_use]
    pub fn is_prototypical(&self, ty: HeapId) -> bool {
        self.type_flags(ty).contains(TypeFlags::PROTOTYPICAL)
    }

    /// Whether `sub` is `sup` or has it in its MRO.
    #[must_use]
    pub fn is_subtype(&self, sub: HeapId, sup: HeapId) -> bool {
        sub == sup || self.mro_of(sub).contains(&sup)
    }

    #[must_use]
    pub fn isinstance(&self, value: &Value, ty: HeapId) -> bool {
        self.is_subtype(self.type_of(value), ty)
    }

    /// `issubclass(cls, base)` on arbitrary values; both must be types.
    pub fn issubclass(&self, cls: &Value, base: &Value) -> RunResult<bool> {
        let Some(cls) = self.as_type(cls) else {
            return Err(ExcType::type_error("issubclass() arg 1 must be a class"));
        };
        let Some(base) = self.as_type(base) else {
            return Err(ExcType::type_error("issubclass() arg 2 must be a class"));
        };
        Ok(self.is_subtype(cls, base))
    }

    /// An entry of the type's own namespace, without MRO traversal.
    #[must_use]
    pub fn type_dict_get(&self, ty: HeapId, name: &str) -> Option<Value> {
        self.heap.type_obj(ty)?.dict.get_str(name).cloned()
    }

    // --- value extraction ---

    /// String content of a `str` or `str` subclass instance.
    #[must_use]
    pub fn str_of(&self, value: &Value) -> Option<Rc<str>> {
        match value {
            Value::Str(s) => Some(s.clone()),
            Value::Ref(id) => match self.heap.payload(*id)? {
                Payload::Primitive(Value::Str(s)) => Some(s.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer content of an `int`, `bool`, or `int` subclass instance.
    #[must_use]
    pub fn int_of(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Ref(id) => match self.heap.payload(*id)? {
                Payload::Primitive(inner) => inner.as_int(),
                _ => None,
            },
            other => other.as_int(),
        }
    }

    /// Numeric content as a float, for `float`, `int`, `bool` and their subclasses.
    #[must_use]
    pub fn float_of(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Ref(id) => match self.heap.payload(*id)? {
                Payload::Primitive(Value::Float(f)) => Some(*f),
                Payload::Primitive(inner) => inner.as_int().map(|i| i as f64),
                _ => None,
            },
            other => other.as_int().map(|i| i as f64),
        }
    }

    /// Items of a tuple or tuple subclass instance.
    #[must_use]
    pub fn tuple_items(&self, value: &Value) -> Option<Vec<Value>> {
        match self.heap.payload(value.ref_id()?)? {
            Payload::Tuple(items) => Some(items.clone()),
            _ => None,
        }
    }

    /// Items of a list or list subclass instance.
    #[must_use]
    pub fn list_items(&self, value: &Value) -> Option<Vec<Value>> {
        match self.heap.payload(value.ref_id()?)? {
            Payload::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    // --- allocation ---

    /// Allocates an instance of `class`, with an attribute dictionary when the class provides one.
    pub(crate) fn alloc_instance(&mut self, class: HeapId, payload: Payload) -> Value {
        let dict = if self.type_flags(class).contains(TypeFlags::HAS_DICT) {
            Some(self.alloc_dict_id(Dict::new()))
        } else {
            None
        };
        let id = self.heap.allocate(HeapData::Instance(Instance { class, payload, dict }));
        Value::Ref(id)
    }

    fn alloc_dict_id(&mut self, dict: Dict) -> HeapId {
        self.heap.allocate(HeapData::Instance(Instance {
            class: self.core.dict,
            payload: Payload::Dict(dict),
            dict: None,
        }))
    }

    #[must_use]
    pub fn new_tuple(&mut self, items: Vec<Value>) -> Value {
        self.alloc_instance(self.core.tuple, Payload::Tuple(items))
    }

    #[must_use]
    pub fn new_list(&mut self, items: Vec<Value>) -> Value {
        self.alloc_instance(self.core.list, Payload::List(items))
    }

    #[must_use]
    pub fn new_dict(&mut self) -> Value {
        Value::Ref(self.alloc_dict_id(Dict::new()))
    }

    /// Allocates a dict with string keys, e.g. a class namespace.
    #[must_use]
    pub fn new_namespace<'a>(&mut self, entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
        let mut dict = Dict::new();
        for (name, value) in entries {
            dict.insert_str(name, value);
        }
        Value::Ref(self.alloc_dict_id(dict))
    }

    /// Stores into a dict without dispatching through its slots.
    pub fn dict_set(&mut self, dict: &Value, key: Value, value: Value) -> RunResult<()> {
        let dict = self.dict_mut(dict)?;
        dict.insert(key, value)?;
        Ok(())
    }

    /// Reads from a dict without dispatching through its slots.
    pub fn dict_get(&self, dict: &Value, key: &Value) -> RunResult<Option<Value>> {
        let dict = self.dict_ref(dict)?;
        Ok(dict.get(key)?.cloned())
    }

    pub(crate) fn dict_ref(&self, value: &Value) -> RunResult<&Dict> {
        value
            .ref_id()
            .and_then(|id| self.heap.dict(id))
            .ok_or_else(|| ExcType::type_error(format!("expected dict, got '{}'", self.value_type_name(value))))
    }

    pub(crate) fn dict_mut(&mut self, value: &Value) -> RunResult<&mut Dict> {
        let type_name = self.value_type_name(value);
        value
            .ref_id()
            .and_then(|id| self.heap.dict_mut(id))
            .ok_or_else(|| ExcType::type_error(format!("expected dict, got '{type_name}'")))
    }

    /// Creates a function object backed by a host closure.
    ///
    /// Functions bind as methods when found on a type, so `f` receives the
    /// instance as its first positional argument in that case.
    pub fn new_function(
        &mut self,
        name: &str,
        f: impl Fn(&mut Self, ArgValues) -> OpResult + 'static,
    ) -> Value {
        let func = Function {
            name: Rc::from(name),
            kind: FunctionKind::Host(Rc::new(f)),
        };
        self.alloc_instance(self.core.function, Payload::Function(func))
    }

    /// Creates a builtin function. Unlike `new_function`, builtins never bind.
    pub fn new_builtin(&mut self, name: &str, f: NativeFn) -> Value {
        let func = Function {
            name: Rc::from(name),
            kind: FunctionKind::Native(f),
        };
        self.alloc_instance(self.core.builtin_function, Payload::Function(func))
    }

    pub(crate) fn new_bound_method(&mut self, receiver: Value, func: Value) -> Value {
        self.alloc_instance(self.core.method, Payload::BoundMethod(BoundMethod { receiver, func }))
    }

    pub fn new_staticmethod(&mut self, func: Value) -> Value {
        self.alloc_instance(self.core.staticmethod, Payload::StaticMethod(func))
    }

    pub fn new_classmethod(&mut self, func: Value) -> Value {
        self.alloc_instance(self.core.classmethod, Payload::ClassMethod(func))
    }

    /// Creates a property; pass `Value::None` for an absent accessor.
    pub fn new_property(&mut self, fget: Value, fset: Value, fdel: Value) -> Value {
        let property = Property {
            fget,
            fset,
            fdel,
            doc: Value::None,
        };
        self.alloc_instance(self.core.property, Payload::Property(property))
    }

    /// Creates an empty cell, the carrier for a class's `__classcell__`.
    pub fn new_cell(&mut self) -> Value {
        self.alloc_instance(self.core.cell, Payload::Cell(None))
    }

    /// Contents of a cell, `None` while it is empty.
    #[must_use]
    pub fn cell_get(&self, cell: &Value) -> Option<Value> {
        match self.heap.payload(cell.ref_id()?)? {
            Payload::Cell(contents) => contents.clone(),
            _ => None,
        }
    }

    /// The underlying function of a staticmethod, or the value itself.
    pub(crate) fn unwrap_staticmethod(&self, value: &Value) -> Value {
        match value.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::StaticMethod(func)) => func.clone(),
            _ => value.clone(),
        }
    }

    /// Id of an instance's attribute dictionary.
    pub(crate) fn instance_dict_id(&self, value: &Value) -> Option<HeapId> {
        self.heap.instance(value.ref_id()?)?.dict
    }

    /// Allocates a fresh host future and the suspension that waits for it.
    pub fn host_future(&mut self) -> (FutureId, Suspension<Value>) {
        let id = FutureId::new(self.next_future);
        self.next_future += 1;
        (id, Suspension::host_future(id))
    }

    // --- call depth guard ---

    pub(crate) fn enter_call(&mut self) -> RunResult<()> {
        if self.call_depth >= self.config.max_recursion_depth {
            return Err(ExcType::recursion_limit());
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    #[must_use]
    pub fn call_depth(&self) -> usize {
        self.call_depth
    }

    // --- dialect ---

    /// Switches the dunder dialect, renaming the affected hooks on core types.
    ///
    /// Only core type dicts are renamed. Dynamically declared types keep the
    /// spelling they were declared with, and their MRO-resolved slots still
    /// find hooks under that spelling.
    pub fn set_dialect(&mut self, dialect: Dialect) -> DialectMigration {
        let from = self.config.dialect;
        let mut renamed = Vec::new();
        if from != dialect {
            self.registry = DunderRegistry::new(dialect);
            self.config.dialect = dialect;
            for ty in self.core.all() {
                for (slot, modern, legacy) in RENAMED_HOOKS {
                    let (old_name, new_name) = match dialect {
                        Dialect::Legacy => (modern, legacy),
                        Dialect::Modern => (legacy, modern),
                    };
                    if self.rename_type_attr(ty, old_name, new_name, slot) {
                        renamed.push(RenamedHook {
                            type_name: self.type_name(ty),
                            old_name,
                            new_name,
                        });
                    }
                }
            }
            log::debug!("dialect {from} -> {dialect}: renamed {} hook(s)", renamed.len());
        }
        DialectMigration {
            from,
            to: dialect,
            renamed,
        }
    }

    fn rename_type_attr(&mut self, ty: HeapId, old_name: &str, new_name: &str, slot: crate::slots::SlotId) -> bool {
        let new_def = self.registry.defs_for_slot(slot).find(|def| def.name == new_name).copied();
        let Some(t) = self.heap.type_obj_mut(ty) else {
            return false;
        };
        let Some(value) = t.dict.remove_str(old_name) else {
            return false;
        };
        t.dict.insert_str(new_name, value.clone());
        if let (Some(new_def), Some(id)) = (new_def, value.ref_id())
            && let Some(Payload::Descriptor(Descriptor::SlotWrapper { def, .. })) = self.heap.payload_mut(id)
        {
            *def = new_def;
        }
        true
    }
}
