//! Building native types from a declarative description.
//!
//! A [`NativeTypeSpec`] lists the slot functions a type implements plus its
//! method, getset and classmethod tables. Building it allocates the type
//! object, inherits the base's slot table, fills the declared slots (deriving
//! reflected companions, the six comparison slots and the sequence block) and
//! then exposes everything as descriptors in the type's namespace.

use std::rc::Rc;

use crate::{
    error::{ExcType, RunResult},
    heap::{Heap, HeapData, HeapId},
    runtime::Runtime,
    slots::{
        BinaryFn, CompareOp, ContainsFn, LenFn, RichCompareFn, SetItemFn, Slot, SlotFunc, SlotId, SlotTable,
    },
    types::{Descriptor, Dict, GetSetDef, Layout, MethodDef, Payload, TypeFlags, TypeObject},
    value::Value,
};

/// Sequence and mapping slots enabled as one block.
///
/// `concat` also fills `Add` and `repeat` fills both `Mul` and `RMul` unless
/// the type declares those explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceSlots {
    pub len: Option<LenFn>,
    pub contains: Option<ContainsFn>,
    pub get_item: Option<BinaryFn>,
    pub set_item: Option<SetItemFn>,
    pub concat: Option<BinaryFn>,
    pub repeat: Option<BinaryFn>,
}

/// Description of a native type.
#[derive(Debug, Clone)]
pub struct NativeTypeSpec {
    pub(crate) name: &'static str,
    pub(crate) layout: Layout,
    pub(crate) base: Option<HeapId>,
    pub(crate) metatype: Option<HeapId>,
    pub(crate) flags: TypeFlags,
    pub(crate) slots: Vec<(SlotId, SlotFunc)>,
    pub(crate) rich_compare: Option<RichCompareFn>,
    pub(crate) sequence: Option<SequenceSlots>,
    pub(crate) unhashable: bool,
    pub(crate) methods: &'static [MethodDef],
    pub(crate) getsets: &'static [GetSetDef],
    pub(crate) classmethods: &'static [MethodDef],
    pub(crate) doc: Option<&'static str>,
}

impl NativeTypeSpec {
    /// A spec deriving from `object` with the default metatype.
    #[must_use]
    pub fn new(name: &'static str, layout: Layout) -> Self {
        Self {
            name,
            layout,
            base: None,
            metatype: None,
            flags: TypeFlags::BASETYPE,
            slots: Vec::new(),
            rich_compare: None,
            sequence: None,
            unhashable: false,
            methods: &[],
            getsets: &[],
            classmethods: &[],
            doc: None,
        }
    }

    #[must_use]
    pub fn base(mut self, base: HeapId) -> Self {
        self.base = Some(base);
        self
    }

    #[must_use]
    pub fn metatype(mut self, metatype: HeapId) -> Self {
        self.metatype = Some(metatype);
        self
    }

    /// Replaces the flags. Native types are `BASETYPE` unless this clears it.
    #[must_use]
    pub fn flags(mut self, flags: TypeFlags) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn slot(mut self, id: SlotId, func: SlotFunc) -> Self {
        self.slots.push((id, func));
        self
    }

    /// One comparison function serving all six comparison slots.
    #[must_use]
    pub fn rich_compare(mut self, func: RichCompareFn) -> Self {
        self.rich_compare = Some(func);
        self
    }

    #[must_use]
    pub fn sequence(mut self, slots: SequenceSlots) -> Self {
        self.sequence = Some(slots);
        self.flags |= TypeFlags::SEQUENCE;
        self
    }

    /// Blocks the inherited hash slot and exposes `__hash__ = None`.
    #[must_use]
    pub fn unhashable(mut self) -> Self {
        self.unhashable = true;
        self
    }

    #[must_use]
    pub fn methods(mut self, methods: &'static [MethodDef]) -> Self {
        self.methods = methods;
        self
    }

    #[must_use]
    pub fn getsets(mut self, getsets: &'static [GetSetDef]) -> Self {
        self.getsets = getsets;
        self
    }

    #[must_use]
    pub fn classmethods(mut self, classmethods: &'static [MethodDef]) -> Self {
        self.classmethods = classmethods;
        self
    }

    #[must_use]
    pub fn doc(mut self, doc: &'static str) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Every slot this spec fills, in installation order.
    ///
    /// Explicit slots come first and win over derived ones. A forward binary
    /// slot without an explicit reflected companion also fills the companion,
    /// since native binary functions take their operands in operand order.
    pub(crate) fn declared_slots(&self) -> Vec<(SlotId, SlotFunc)> {
        let mut declared: Vec<(SlotId, SlotFunc)> = Vec::with_capacity(self.slots.len() + 8);
        let push = |declared: &mut Vec<(SlotId, SlotFunc)>, id: SlotId, func: SlotFunc| {
            if !declared.iter().any(|(existing, _)| *existing == id) {
                declared.push((id, func));
            }
        };
        for &(id, func) in &self.slots {
            push(&mut declared, id, func);
        }
        for &(id, func) in &self.slots {
            if let Some(reflected) = id.reflected() {
                push(&mut declared, reflected, func);
            }
        }
        if let Some(func) = self.rich_compare {
            for op in CompareOp::RICH {
                if let Some(id) = op.slot() {
                    push(&mut declared, id, SlotFunc::RichCompare(func, op));
                }
            }
        }
        if let Some(seq) = self.sequence {
            if let Some(f) = seq.len {
                push(&mut declared, SlotId::Len, SlotFunc::Len(f));
            }
            if let Some(f) = seq.contains {
                push(&mut declared, SlotId::Contains, SlotFunc::Contains(f));
            }
            if let Some(f) = seq.get_item {
                push(&mut declared, SlotId::GetItem, SlotFunc::Binary(f));
            }
            if let Some(f) = seq.set_item {
                push(&mut declared, SlotId::SetItem, SlotFunc::SetItem(f));
            }
            if let Some(f) = seq.concat {
                push(&mut declared, SlotId::Add, SlotFunc::Binary(f));
            }
            if let Some(f) = seq.repeat {
                push(&mut declared, SlotId::Mul, SlotFunc::Binary(f));
                push(&mut declared, SlotId::RMul, SlotFunc::Binary(f));
            }
        }
        declared
    }
}

/// Allocates the type object for `spec`, inheriting from `base`.
///
/// Only the object is created here. Members are installed separately by
/// [`install_native_members`] once the descriptor types exist.
pub(crate) fn alloc_native_type(heap: &mut Heap, spec: &NativeTypeSpec, base: Option<HeapId>, metatype: HeapId) -> HeapId {
    let id = heap.next_id();
    let (mut slots, mut mro) = match base.and_then(|b| heap.type_obj(b)) {
        Some(base_type) => (base_type.slots.clone(), base_type.mro.clone()),
        None => (SlotTable::default(), Vec::new()),
    };
    mro.insert(0, id);
    for (slot_id, func) in spec.declared_slots() {
        slots.set(slot_id, Some(Slot::Native(func)));
    }
    if spec.unhashable {
        slots.set(SlotId::Hash, None);
    }
    let name: Rc<str> = Rc::from(spec.name);
    let type_obj = TypeObject {
        qualname: name.clone(),
        name,
        base,
        bases: base.into_iter().collect(),
        metatype,
        mro,
        slots,
        dict: Dict::new(),
        flags: spec.flags | TypeFlags::PROTOTYPICAL | TypeFlags::IMMUTABLE,
        layout: spec.layout,
        methods: spec.methods,
        getsets: spec.getsets,
        classmethods: spec.classmethods,
        subclasses: Vec::new(),
    };
    let allocated = heap.allocate(HeapData::Type(Box::new(type_obj)));
    if let Some(base_type) = base.and_then(|b| heap.type_obj_mut(b)) {
        base_type.subclasses.push(allocated);
    }
    allocated
}

/// Exposes a native type's slots, methods and getsets as descriptors in its namespace.
pub(crate) fn install_native_members(rt: &mut Runtime, ty: HeapId, spec: &NativeTypeSpec) {
    let mut entries: Vec<(&'static str, Value)> = Vec::new();
    for (slot_id, func) in spec.declared_slots() {
        let defs: Vec<_> = rt.registry.defs_for_slot(slot_id).copied().collect();
        for def in defs {
            let wrapper = Descriptor::SlotWrapper { owner: ty, def, func };
            let value = rt.alloc_instance(rt.core.wrapper_descriptor, Payload::Descriptor(wrapper));
            entries.push((def.name, value));
        }
    }
    if spec.unhashable {
        entries.push(("__hash__", Value::None));
    }
    for def in spec.methods {
        let value = rt.alloc_instance(rt.core.method_descriptor, Payload::Descriptor(Descriptor::Method { owner: ty, def }));
        entries.push((def.name, value));
    }
    for def in spec.classmethods {
        let value = rt.alloc_instance(
            rt.core.classmethod_descriptor,
            Payload::Descriptor(Descriptor::ClassMethod { owner: ty, def }),
        );
        entries.push((def.name, value));
    }
    for def in spec.getsets {
        let value = rt.alloc_instance(rt.core.getset_descriptor, Payload::Descriptor(Descriptor::GetSet { owner: ty, def }));
        entries.push((def.name, value));
    }
    let doc = spec.doc.map_or(Value::None, Value::str);
    if let Some(t) = rt.heap.type_obj_mut(ty) {
        for (name, value) in entries {
            t.dict.insert_str(name, value);
        }
        if !t.dict.contains_str("__doc__") {
            t.dict.insert_str("__doc__", doc);
        }
    }
    log::trace!("installed members of native type {}", spec.name);
}

impl Runtime {
    /// Builds and registers a native type described by `spec`.
    ///
    /// The base defaults to `object` and the metatype to `type`.
    pub fn build_native_type(&mut self, spec: &NativeTypeSpec) -> RunResult<HeapId> {
        let base = spec.base.unwrap_or(self.core.object);
        if !self.is_type_id(base) {
            return Err(ExcType::type_error("base of a native type must be a type"));
        }
        if !self.type_flags(base).contains(TypeFlags::BASETYPE) {
            return Err(ExcType::type_error(format!(
                "type '{}' is not an acceptable base type",
                self.type_name(base)
            )));
        }
        let base_layout = self.heap.type_obj(base).map_or(Layout::Object, |t| t.layout);
        if !spec.layout.extends(base_layout) {
            return Err(ExcType::type_error(format!(
                "layout of '{}' is incompatible with its base '{}'",
                spec.name,
                self.type_name(base)
            )));
        }
        let metatype = spec.metatype.unwrap_or(self.core.type_);
        if !self.is_subtype(metatype, self.core.type_) {
            return Err(ExcType::type_error("metatype must be a subtype of 'type'"));
        }
        let depth = self.mro_of(base).len() + 1;
        if depth > self.config.max_inheritance_depth {
            return Err(ExcType::type_error(format!(
                "inheritance chain too deep (maximum depth {})",
                self.config.max_inheritance_depth
            )));
        }
        let id = alloc_native_type(&mut self.heap, spec, Some(base), metatype);
        install_native_members(self, id, spec);
        log::debug!("built native type {} (base {})", spec.name, self.type_name(base));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{runtime::Runtime, suspension::OpResult};

    fn add(_: &mut Runtime, _: &Value, _: &Value) -> OpResult {
        Ok(crate::suspension::Resumable::Done(Value::None))
    }

    #[test]
    fn forward_binary_fills_reflected_companion() {
        let spec = NativeTypeSpec::new("t", Layout::Object).slot(SlotId::Add, SlotFunc::Binary(add));
        let ids: Vec<SlotId> = spec.declared_slots().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, [SlotId::Add, SlotId::RAdd]);
    }

    #[test]
    fn sequence_block_derives_concat_and_repeat() {
        let spec = NativeTypeSpec::new("t", Layout::Object).sequence(SequenceSlots {
            concat: Some(add),
            repeat: Some(add),
            ..SequenceSlots::default()
        });
        let ids: Vec<SlotId> = spec.declared_slots().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, [SlotId::Add, SlotId::Mul, SlotId::RMul]);
        assert!(spec.flags.contains(TypeFlags::SEQUENCE));
    }
}
