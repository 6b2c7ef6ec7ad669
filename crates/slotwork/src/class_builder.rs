//! The class-building pipeline.
//!
//! [`Runtime::build_class`] is the class-statement path: it picks the
//! metaclass, runs the class body against a fresh namespace and calls the
//! metaclass with `(name, bases, namespace)`. The default metaclass lands in
//! [`Runtime::type_new_from_parts`], which is also what the three-argument
//! form of `type()` reaches.
//!
//! Slot tables of declared types are derived, never edited by hand: a slot
//! comes from a dunder in the type's own namespace, else from the solid base
//! (prototypical types) or a by-name MRO lookup (everything else). Assigning
//! a dunder later re-derives that one slot down the subclass tree.

use std::rc::Rc;

use strum::IntoEnumIterator;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::{HeapData, HeapId},
    runtime::Runtime,
    slots::{Slot, SlotId, SlotTable},
    suspension::{LoopControl, OpResult, fold_items},
    types::{Descriptor, Dict, Layout, Payload, TypeFlags, TypeObject, object::DICT_GETSET},
    value::Value,
};

/// The body of a class statement.
///
/// It runs once, binding the class attributes through its [`ClassScope`]. A
/// body may suspend; the class is created when it completes.
pub trait ClassBody {
    fn run(self, rt: &mut Runtime, scope: &ClassScope) -> OpResult<()>;
}

impl<F> ClassBody for F
where
    F: FnOnce(&mut Runtime, &ClassScope) -> OpResult<()>,
{
    fn run(self, rt: &mut Runtime, scope: &ClassScope) -> OpResult<()> {
        self(rt, scope)
    }
}

/// The scope a class body executes in.
#[derive(Debug, Clone)]
pub struct ClassScope {
    name: Rc<str>,
    globals: Value,
    namespace: Value,
}

impl ClassScope {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn globals(&self) -> &Value {
        &self.globals
    }

    /// The dict the class attributes are collected in.
    #[must_use]
    pub fn namespace(&self) -> &Value {
        &self.namespace
    }

    /// Binds `name` in the class namespace.
    pub fn define(&self, rt: &mut Runtime, name: &str, value: Value) -> RunResult<()> {
        rt.dict_set(&self.namespace, Value::str(name), value)
    }

    /// Resolves `name` the way the class body sees it: namespace first, then globals.
    pub fn lookup(&self, rt: &Runtime, name: &str) -> RunResult<Option<Value>> {
        let key = Value::str(name);
        match rt.dict_get(&self.namespace, &key)? {
            Some(found) => Ok(Some(found)),
            None => rt.dict_get(&self.globals, &key),
        }
    }

    /// Creates the cell that receives the finished class and records it as `__classcell__`.
    pub fn classcell(&self, rt: &mut Runtime) -> RunResult<Value> {
        let cell = rt.new_cell();
        self.define(rt, "__classcell__", cell.clone())?;
        Ok(cell)
    }
}

/// Header of a class statement: `class Name(*bases, metaclass=..., **keywords)`.
#[derive(Debug, Clone)]
pub struct ClassDef {
    name: Rc<str>,
    bases: Vec<Value>,
    metaclass: Option<Value>,
    keywords: Vec<(Rc<str>, Value)>,
    globals: Option<Value>,
}

impl ClassDef {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: Rc::from(name),
            bases: Vec::new(),
            metaclass: None,
            keywords: Vec::new(),
            globals: None,
        }
    }

    #[must_use]
    pub fn base(mut self, base: impl Into<Value>) -> Self {
        self.bases.push(base.into());
        self
    }

    #[must_use]
    pub fn metaclass(mut self, metaclass: impl Into<Value>) -> Self {
        self.metaclass = Some(metaclass.into());
        self
    }

    /// A class keyword, forwarded to the metaclass and to `__init_subclass__`.
    #[must_use]
    pub fn keyword(mut self, name: &str, value: Value) -> Self {
        self.keywords.push((Rc::from(name), value));
        self
    }

    /// The defining module's globals; its `__name__` becomes the class's `__module__`.
    #[must_use]
    pub fn globals(mut self, globals: Value) -> Self {
        self.globals = Some(globals);
        self
    }
}

impl Runtime {
    /// Executes a class statement.
    pub fn build_class(&mut self, def: ClassDef, body: impl ClassBody) -> OpResult {
        let ClassDef {
            name,
            bases,
            metaclass,
            keywords,
            globals,
        } = def;
        let mut base_ids = Vec::with_capacity(bases.len());
        for base in &bases {
            let Some(id) = self.as_type(base) else {
                return Err(ExcType::type_error(format!(
                    "bases must be types, not '{}'",
                    self.value_type_name(base)
                )));
            };
            base_ids.push(id);
        }
        let metaclass = match metaclass {
            Some(explicit) => match self.as_type(&explicit) {
                Some(meta) => Value::Ref(self.calculate_metaclass(meta, &base_ids)?),
                None => explicit,
            },
            None => {
                let first = base_ids.first().map_or(self.core.type_, |b| self.type_of(&Value::Ref(*b)));
                Value::Ref(self.calculate_metaclass(first, &base_ids)?)
            }
        };

        let namespace = self.new_dict();
        let globals = globals.unwrap_or_else(|| self.new_dict());
        if let Some(module) = self.dict_get(&globals, &Value::str("__name__"))? {
            self.dict_set(&namespace, Value::str("__module__"), module)?;
        }
        self.dict_set(&namespace, Value::str("__qualname__"), Value::Str(name.clone()))?;
        let scope = ClassScope {
            name: name.clone(),
            globals,
            namespace: namespace.clone(),
        };
        log::trace!("running body of class {name}");
        body.run(self, &scope)?.and_then(self, move |rt, ()| {
            let bases = rt.new_tuple(bases);
            let mut args = ArgValues::new([Value::Str(name), bases, namespace]);
            for (keyword, value) in keywords {
                args = args.kwarg(&keyword, value);
            }
            rt.call(&metaclass, args)
        })
    }

    /// The most derived of `meta` and the metatypes of `bases`.
    pub(crate) fn calculate_metaclass(&self, meta: HeapId, bases: &[HeapId]) -> RunResult<HeapId> {
        let mut winner = meta;
        for &base in bases {
            let base_meta = self.type_of(&Value::Ref(base));
            if self.is_subtype(winner, base_meta) {
                continue;
            }
            if self.is_subtype(base_meta, winner) {
                winner = base_meta;
                continue;
            }
            return Err(ExcType::type_error(
                "metaclass conflict: the metaclass of a derived class must be a (non-strict) subclass of the metaclasses of all its bases",
            ));
        }
        Ok(winner)
    }

    /// `type.__new__(meta, name, bases, namespace, **kwargs)` after argument unpacking.
    pub(crate) fn type_new_from_parts(
        &mut self,
        meta: HeapId,
        name: &Value,
        bases: &Value,
        namespace: &Value,
        kwargs: Vec<(Rc<str>, Value)>,
    ) -> OpResult {
        let Some(name) = self.str_of(name) else {
            return Err(ExcType::type_error(format!(
                "type.__new__() argument 1 must be str, not {}",
                self.value_type_name(name)
            )));
        };
        let Some(base_values) = self.tuple_items(bases) else {
            return Err(ExcType::type_error(format!(
                "type.__new__() argument 2 must be tuple, not {}",
                self.value_type_name(bases)
            )));
        };
        let mut base_ids = Vec::with_capacity(base_values.len());
        for base in &base_values {
            let Some(id) = self.as_type(base) else {
                return Err(ExcType::type_error(format!(
                    "type.__new__() argument 2 must be a tuple of types, not containing '{}'",
                    self.value_type_name(base)
                )));
            };
            base_ids.push(id);
        }
        let Ok(dict) = self.dict_ref(namespace) else {
            return Err(ExcType::type_error(format!(
                "type.__new__() argument 3 must be dict, not {}",
                self.value_type_name(namespace)
            )));
        };
        let entries: Vec<(Value, Value)> = dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let meta = self.calculate_metaclass(meta, &base_ids)?;
        let id = self.build_dynamic_type(meta, name, base_ids, entries)?;
        self.finish_class(id, kwargs)
    }

    /// Wraps functions that are implicitly static or class methods.
    fn implicit_method_kind(&mut self, name: &str, value: Value) -> Value {
        if self.type_of(&value) != self.core.function {
            return value;
        }
        match name {
            "__new__" => self.new_staticmethod(value),
            "__init_subclass__" | "__class_getitem__" => self.new_classmethod(value),
            _ => value,
        }
    }

    /// Creates the type object. Nothing is allocated before the bases and MRO validate.
    fn build_dynamic_type(
        &mut self,
        meta: HeapId,
        name: Rc<str>,
        mut bases: Vec<HeapId>,
        entries: Vec<(Value, Value)>,
    ) -> RunResult<HeapId> {
        if bases.is_empty() {
            bases.push(self.core.object);
        }
        for (i, &base) in bases.iter().enumerate() {
            if bases[..i].contains(&base) {
                return Err(ExcType::type_error(format!(
                    "duplicate base class {}",
                    self.type_name(base)
                )));
            }
            if !self.type_flags(base).contains(TypeFlags::BASETYPE) {
                return Err(ExcType::type_error(format!(
                    "type '{}' is not an acceptable base type",
                    self.type_name(base)
                )));
            }
        }
        let best = self.best_base(&bases)?;
        let mut mro = self.compute_c3_mro(self.heap.next_id(), &bases)?;

        let mut dict = Dict::new();
        let mut qualname = name.clone();
        let mut classcell = None;
        for (key, value) in entries {
            let Some(key_text) = self.str_of(&key) else {
                dict.insert(key, value)?;
                continue;
            };
            match &*key_text {
                "__qualname__" => {
                    qualname = self.str_of(&value).ok_or_else(|| {
                        ExcType::type_error(format!(
                            "type __qualname__ must be a str, not {}",
                            self.value_type_name(&value)
                        ))
                    })?;
                }
                "__classcell__" => {
                    if self.type_of(&value) != self.core.cell {
                        return Err(ExcType::type_error(format!(
                            "__classcell__ must be a nonlocal cell, not {}",
                            self.value_type_name(&value)
                        )));
                    }
                    classcell = Some(value);
                }
                _ => {
                    let value = self.implicit_method_kind(&key_text, value);
                    dict.insert_str(&key_text, value);
                }
            }
        }
        if !dict.contains_str("__doc__") {
            dict.insert_str("__doc__", Value::None);
        }
        if dict.contains_str("__eq__") && !dict.contains_str("__hash__") {
            dict.insert_str("__hash__", Value::None);
        }

        let id = self.heap.next_id();
        mro[0] = id;
        let prototypical = self.is_prototypical(best) && self.chain_matches_mro(&mro, Some(best));
        let slots = self.derive_slots(&dict, best, &mro, prototypical);
        let needs_dict_getset = !dict.contains_str("__dict__")
            && !mro[1..].iter().any(|ty| self.type_dict_get(*ty, "__dict__").is_some());
        let mut flags = TypeFlags::HEAPTYPE | TypeFlags::BASETYPE | TypeFlags::HAS_DICT;
        flags.set(TypeFlags::PROTOTYPICAL, prototypical);
        let type_obj = TypeObject {
            name,
            qualname,
            base: Some(best),
            bases: bases.clone(),
            metatype: meta,
            mro,
            slots,
            dict,
            flags,
            layout: self.heap.type_obj(best).map_or(Layout::Object, |t| t.layout),
            methods: &[],
            getsets: &[],
            classmethods: &[],
            subclasses: Vec::new(),
        };
        let allocated = self.heap.allocate(HeapData::Type(Box::new(type_obj)));
        debug_assert_eq!(allocated, id);

        if needs_dict_getset {
            let getset = Descriptor::GetSet {
                owner: id,
                def: &DICT_GETSET,
            };
            let descr = self.alloc_instance(self.core.getset_descriptor, Payload::Descriptor(getset));
            if let Some(t) = self.heap.type_obj_mut(id) {
                t.dict.insert_str("__dict__", descr);
            }
        }
        for base in &bases {
            if let Some(t) = self.heap.type_obj_mut(*base) {
                t.subclasses.push(id);
            }
        }
        if let Some(cell) = classcell {
            self.cell_set(&cell, Some(Value::Ref(id)))?;
        }
        log::debug!(
            "built class {} (solid base {}, MRO length {}, prototypical: {prototypical})",
            self.type_name(id),
            self.type_name(best),
            self.mro_of(id).len()
        );
        Ok(id)
    }

    /// Runs the creation hooks: `__set_name__` on every attribute that defines
    /// it, then the parent's `__init_subclass__` with the class keywords.
    fn finish_class(&mut self, id: HeapId, kwargs: Vec<(Rc<str>, Value)>) -> OpResult {
        let cls = Value::Ref(id);
        let entries: Vec<(Value, Value)> = self
            .type_object(id)
            .map(|t| t.dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        let hooks: Vec<(Value, Value, Value)> = entries
            .into_iter()
            .filter_map(|(key, value)| {
                self.lookup_special(&value, "__set_name__")
                    .map(|hook| (hook, value, key))
            })
            .collect();
        let owner = cls.clone();
        fold_items(self, hooks, (), move |rt, (), (hook, value, key)| {
            Ok(rt
                .call_method(&hook, &value, ArgValues::two(owner.clone(), key))?
                .map(|_| LoopControl::Continue(())))
        })?
        .and_then(self, move |rt, ()| {
            let parent = rt.new_super(id, cls.clone())?;
            let mut args = ArgValues::empty();
            for (keyword, value) in kwargs {
                args = args.kwarg(&keyword, value);
            }
            Ok(rt
                .invoke_method(&parent, "__init_subclass__", args)?
                .map(move |_| cls))
        })
    }

    /// Derives one slot for a type with namespace `dict`, solid base `base` and MRO `mro`.
    fn derive_slot(&self, dict: &Dict, base: HeapId, mro: &[HeapId], prototypical: bool, slot: SlotId) -> Option<Slot> {
        for def in self.registry.defs_for_slot(slot) {
            if let Some(declared) = dict.get_str(def.name) {
                return def.slot_for(declared);
            }
        }
        if prototypical {
            self.heap.type_obj(base)?.slots.get(slot).cloned()
        } else if mro
            .iter()
            .skip(1)
            .any(|ty| self.heap.type_obj(*ty).is_some_and(|t| t.slots.is_populated(slot)))
        {
            Some(Slot::Lookup {
                name: self.registry.primary_name(slot),
            })
        } else {
            None
        }
    }

    fn derive_slots(&self, dict: &Dict, base: HeapId, mro: &[HeapId], prototypical: bool) -> SlotTable {
        let mut table = SlotTable::default();
        for slot in SlotId::iter() {
            table.set(slot, self.derive_slot(dict, base, mro, prototypical, slot));
        }
        table
    }

    fn declares_slot(&self, ty: HeapId, slot: SlotId) -> bool {
        self.heap
            .type_obj(ty)
            .is_some_and(|t| self.registry.defs_for_slot(slot).any(|def| t.dict.contains_str(def.name)))
    }

    /// Re-derives the slot fed by dunder `name` on `ty` and on every
    /// subclass that does not declare the slot itself.
    pub(crate) fn update_slot(&mut self, ty: HeapId, name: &str) {
        let Some(slot) = self.registry.lookup(name).map(|def| def.slot) else {
            return;
        };
        let mut pending = vec![ty];
        while let Some(current) = pending.pop() {
            let Some(t) = self.heap.type_obj(current) else {
                continue;
            };
            let base = t.base.unwrap_or(self.core.object);
            let derived = self.derive_slot(&t.dict, base, &t.mro, t.flags.contains(TypeFlags::PROTOTYPICAL), slot);
            let inheriting: Vec<HeapId> = t
                .subclasses
                .iter()
                .copied()
                .filter(|sub| !self.declares_slot(*sub, slot))
                .collect();
            if let Some(t) = self.heap.type_obj_mut(current) {
                t.slots.set(slot, derived);
            }
            log::trace!("re-derived slot {slot} of {}", self.type_name(current));
            pending.extend(inheriting);
        }
    }

    /// `ty` followed by all its transitive subclasses, parents before children.
    fn descendants(&self, ty: HeapId) -> Vec<HeapId> {
        let mut order = vec![ty];
        let mut index = 0;
        while let Some(&current) = order.get(index) {
            index += 1;
            if let Some(t) = self.heap.type_obj(current) {
                for &sub in &t.subclasses {
                    if !order.contains(&sub) {
                        order.push(sub);
                    }
                }
            }
        }
        order
    }

    /// Recomputes the MRO and prototypical flag of `ty` from its current bases.
    fn refresh_hierarchy(&mut self, ty: HeapId) -> RunResult<()> {
        let (bases, base) = match self.heap.type_obj(ty) {
            Some(t) => (t.bases.clone(), t.base),
            None => return Ok(()),
        };
        let mro = self.compute_c3_mro(ty, &bases)?;
        let prototypical = base.is_some_and(|b| self.is_prototypical(b)) && self.chain_matches_mro(&mro, base);
        if let Some(t) = self.heap.type_obj_mut(ty) {
            t.mro = mro;
            t.flags.set(TypeFlags::PROTOTYPICAL, prototypical);
        }
        Ok(())
    }

    /// `cls.__bases__ = bases`: relinks the type, then recomputes MROs and
    /// slots of the type and its subclasses. On failure nothing changes.
    pub(crate) fn set_bases(&mut self, id: HeapId, bases: Vec<HeapId>) -> RunResult<()> {
        let type_name = self.type_name(id);
        if bases.is_empty() {
            return Err(ExcType::type_error(format!(
                "can only assign non-empty tuple to {type_name}.__bases__, not ()"
            )));
        }
        for &base in &bases {
            if self.is_subtype(base, id) {
                return Err(ExcType::type_error("a __bases__ item causes an inheritance cycle"));
            }
            if !self.type_flags(base).contains(TypeFlags::BASETYPE) {
                return Err(ExcType::type_error(format!(
                    "type '{}' is not an acceptable base type",
                    self.type_name(base)
                )));
            }
        }
        let new_best = self.best_base(&bases)?;
        let old_best = self.type_object(id).and_then(|t| t.base).unwrap_or(self.core.object);
        let layout_of = |ty: HeapId| self.type_object(ty).map(|t| t.layout);
        if layout_of(new_best) != layout_of(old_best) {
            return Err(ExcType::type_error(format!(
                "__bases__ assignment: '{}' object layout differs from '{}'",
                self.type_name(new_best),
                self.type_name(old_best)
            )));
        }

        let affected = self.descendants(id);
        let saved: Vec<(HeapId, Vec<HeapId>, Option<HeapId>, Vec<HeapId>, TypeFlags)> = affected
            .iter()
            .filter_map(|ty| {
                let t = self.heap.type_obj(*ty)?;
                Some((*ty, t.bases.clone(), t.base, t.mro.clone(), t.flags))
            })
            .collect();
        let old_bases = self.type_object(id).map(|t| t.bases.clone()).unwrap_or_default();
        if let Some(t) = self.heap.type_obj_mut(id) {
            t.bases.clone_from(&bases);
            t.base = Some(new_best);
        }
        for &ty in &affected {
            if let Err(err) = self.refresh_hierarchy(ty) {
                for (ty, bases, base, mro, flags) in saved {
                    if let Some(t) = self.heap.type_obj_mut(ty) {
                        t.bases = bases;
                        t.base = base;
                        t.mro = mro;
                        t.flags = flags;
                    }
                }
                return Err(err);
            }
        }

        for old in old_bases {
            if let Some(t) = self.heap.type_obj_mut(old) {
                t.subclasses.retain(|sub| *sub != id);
            }
        }
        for &base in &bases {
            if let Some(t) = self.heap.type_obj_mut(base) {
                t.subclasses.push(id);
            }
        }
        for &ty in &affected {
            let Some(t) = self.heap.type_obj(ty) else {
                continue;
            };
            let base = t.base.unwrap_or(self.core.object);
            let slots = self.derive_slots(&t.dict, base, &t.mro, t.flags.contains(TypeFlags::PROTOTYPICAL));
            if let Some(t) = self.heap.type_obj_mut(ty) {
                t.slots = slots;
            }
        }
        log::debug!(
            "reassigned bases of {type_name}: {} type(s) re-linearized",
            affected.len()
        );
        Ok(())
    }
}
