//! Bootstrap of the core types.
//!
//! `object` and `type` refer to each other, so they are allocated first and
//! patched together; everything else derives from them. Types are allocated
//! before any member is installed because installing members allocates
//! descriptor instances whose own types must already exist.

use crate::{
    attr,
    heap::{Heap, HeapId},
    runtime::Runtime,
    slots::{SlotFunc, SlotId},
    types::{
        GetSetDef, Layout, NativeTypeSpec, SequenceSlots, TypeFlags,
        builder::{alloc_native_type, install_native_members},
        descriptor, dict, function, iter, numbers, object, property, sequence, singletons, str as str_type,
        super_proxy, type_,
    },
};

/// Ids of the core types.
#[derive(Debug, Clone)]
pub struct CoreTypes {
    pub object: HeapId,
    pub type_: HeapId,
    pub none_type: HeapId,
    pub not_implemented_type: HeapId,
    pub bool_: HeapId,
    pub int: HeapId,
    pub float: HeapId,
    pub str_: HeapId,
    pub tuple: HeapId,
    pub list: HeapId,
    pub dict: HeapId,
    pub function: HeapId,
    pub builtin_function: HeapId,
    pub method: HeapId,
    pub method_descriptor: HeapId,
    pub classmethod_descriptor: HeapId,
    pub getset_descriptor: HeapId,
    pub wrapper_descriptor: HeapId,
    pub staticmethod: HeapId,
    pub classmethod: HeapId,
    pub property: HeapId,
    pub super_: HeapId,
    pub dict_keyiterator: HeapId,
    pub list_iterator: HeapId,
    pub tuple_iterator: HeapId,
    /// The iterator `iter()` builds over a `__getitem__` sequence.
    pub iterator: HeapId,
    pub cell: HeapId,
}

impl CoreTypes {
    /// Every core type, `object` first.
    #[must_use]
    pub fn all(&self) -> Vec<HeapId> {
        vec![
            self.object,
            self.type_,
            self.none_type,
            self.not_implemented_type,
            self.bool_,
            self.int,
            self.float,
            self.str_,
            self.tuple,
            self.list,
            self.dict,
            self.function,
            self.builtin_function,
            self.method,
            self.method_descriptor,
            self.classmethod_descriptor,
            self.getset_descriptor,
            self.wrapper_descriptor,
            self.staticmethod,
            self.classmethod,
            self.property,
            self.super_,
            self.dict_keyiterator,
            self.list_iterator,
            self.tuple_iterator,
            self.iterator,
            self.cell,
        ]
    }
}

static FUNCTION_GETSETS: [GetSetDef; 1] = [GetSetDef::new("__name__", function::function_name_get)];

static METHOD_GETSETS: [GetSetDef; 2] = [
    GetSetDef::new("__self__", function::method_self_get),
    GetSetDef::new("__func__", function::method_func_get),
];

static WRAPPER_GETSETS: [GetSetDef; 1] = [GetSetDef::new("__func__", property::wrapped_func_get)];

static PROPERTY_GETSETS: [GetSetDef; 3] = [
    GetSetDef::new("fget", property::property_fget),
    GetSetDef::new("fset", property::property_fset),
    GetSetDef::new("fdel", property::property_fdel),
];

fn object_spec() -> NativeTypeSpec {
    NativeTypeSpec::new("object", Layout::Object)
        .slot(SlotId::GetAttribute, SlotFunc::GetAttro(attr::generic_getattr))
        .slot(SlotId::SetAttr, SlotFunc::SetAttro(attr::generic_setattr))
        .slot(SlotId::New, SlotFunc::New(object::object_new))
        .slot(SlotId::Init, SlotFunc::Init(object::object_init))
        .slot(SlotId::Repr, SlotFunc::Stringify(object::object_repr))
        .slot(SlotId::Str, SlotFunc::Stringify(object::object_str))
        .slot(SlotId::Hash, SlotFunc::Hash(object::object_hash))
        .rich_compare(object::object_richcompare)
        .getsets(&object::OBJECT_GETSETS)
        .methods(&object::OBJECT_METHODS)
        .classmethods(&object::OBJECT_CLASSMETHODS)
        .doc("The base class of the class hierarchy.")
}

fn type_spec() -> NativeTypeSpec {
    NativeTypeSpec::new("type", Layout::Type)
        .slot(SlotId::GetAttribute, SlotFunc::GetAttro(attr::type_getattro))
        .slot(SlotId::SetAttr, SlotFunc::SetAttro(attr::type_setattro))
        .slot(SlotId::Call, SlotFunc::Call(type_::type_call))
        .slot(SlotId::New, SlotFunc::New(type_::type_new))
        .slot(SlotId::Init, SlotFunc::Init(type_::type_init))
        .slot(SlotId::Repr, SlotFunc::Stringify(type_::type_repr))
        .getsets(&type_::TYPE_GETSETS)
        .methods(&type_::TYPE_METHODS)
}

fn int_spec() -> NativeTypeSpec {
    let mut spec = NativeTypeSpec::new("int", Layout::Int)
        .slot(SlotId::New, SlotFunc::New(numbers::int_new))
        .slot(SlotId::Repr, SlotFunc::Stringify(numbers::int_repr))
        .slot(SlotId::Hash, SlotFunc::Hash(numbers::int_hash))
        .slot(SlotId::Bool, SlotFunc::Bool(numbers::int_bool))
        .slot(SlotId::Neg, SlotFunc::Unary(numbers::int_neg))
        .slot(SlotId::Pos, SlotFunc::Unary(numbers::int_pos))
        .slot(SlotId::Abs, SlotFunc::Unary(numbers::int_abs))
        .slot(SlotId::Invert, SlotFunc::Unary(numbers::int_invert))
        .slot(SlotId::Int, SlotFunc::Unary(numbers::int_int))
        .slot(SlotId::Index, SlotFunc::Unary(numbers::int_int))
        .slot(SlotId::Float, SlotFunc::Unary(numbers::int_float))
        .rich_compare(numbers::int_richcompare);
    for (id, func) in numbers::INT_BINARY_SLOTS {
        spec = spec.slot(id, SlotFunc::Binary(func));
    }
    spec.doc("Integer numbers.")
}

fn float_spec() -> NativeTypeSpec {
    let mut spec = NativeTypeSpec::new("float", Layout::Float)
        .slot(SlotId::New, SlotFunc::New(numbers::float_new))
        .slot(SlotId::Repr, SlotFunc::Stringify(numbers::float_repr))
        .slot(SlotId::Hash, SlotFunc::Hash(numbers::float_hash))
        .slot(SlotId::Bool, SlotFunc::Bool(numbers::float_bool))
        .slot(SlotId::Neg, SlotFunc::Unary(numbers::float_neg))
        .slot(SlotId::Pos, SlotFunc::Unary(numbers::float_pos))
        .slot(SlotId::Abs, SlotFunc::Unary(numbers::float_abs))
        .slot(SlotId::Int, SlotFunc::Unary(numbers::float_int))
        .slot(SlotId::Float, SlotFunc::Unary(numbers::float_float))
        .rich_compare(numbers::float_richcompare);
    for (id, func) in numbers::FLOAT_BINARY_SLOTS {
        spec = spec.slot(id, SlotFunc::Binary(func));
    }
    spec
}

fn iterator_spec(name: &'static str, next: crate::slots::IterNextFn) -> NativeTypeSpec {
    NativeTypeSpec::new(name, Layout::Iterator)
        .flags(TypeFlags::empty())
        .slot(SlotId::Iter, SlotFunc::Unary(iter::iter_self))
        .slot(SlotId::Next, SlotFunc::IterNext(next))
}

/// Allocates every core type object. Members are installed by [`install_core_members`].
pub(crate) fn allocate_core_types(heap: &mut Heap) -> (CoreTypes, Vec<(HeapId, NativeTypeSpec)>) {
    let mut pending = Vec::new();

    let object_spec = object_spec();
    let placeholder = heap.next_id();
    let object = alloc_native_type(heap, &object_spec, None, placeholder);
    pending.push((object, object_spec));

    let type_spec = type_spec();
    let type_self = heap.next_id();
    let type_ = alloc_native_type(heap, &type_spec, Some(object), type_self);
    if let Some(t) = heap.type_obj_mut(object) {
        t.metatype = type_;
    }
    pending.push((type_, type_spec));

    let mut native = |spec: NativeTypeSpec, base: HeapId| -> HeapId {
        let id = alloc_native_type(heap, &spec, Some(base), type_);
        pending.push((id, spec));
        id
    };

    let none_type = native(
        NativeTypeSpec::new("NoneType", Layout::NoneType)
            .flags(TypeFlags::empty())
            .slot(SlotId::New, SlotFunc::New(singletons::none_new))
            .slot(SlotId::Repr, SlotFunc::Stringify(singletons::singleton_repr))
            .slot(SlotId::Bool, SlotFunc::Bool(singletons::none_bool))
            .slot(SlotId::Hash, SlotFunc::Hash(singletons::singleton_hash)),
        object,
    );
    let not_implemented_type = native(
        NativeTypeSpec::new("NotImplementedType", Layout::NotImplemented)
            .flags(TypeFlags::empty())
            .slot(SlotId::New, SlotFunc::New(singletons::none_new))
            .slot(SlotId::Repr, SlotFunc::Stringify(singletons::singleton_repr))
            .slot(SlotId::Hash, SlotFunc::Hash(singletons::singleton_hash)),
        object,
    );
    let int = native(int_spec(), object);
    let bool_ = native(
        NativeTypeSpec::new("bool", Layout::Bool)
            .flags(TypeFlags::empty())
            .slot(SlotId::New, SlotFunc::New(numbers::bool_new))
            .slot(SlotId::Repr, SlotFunc::Stringify(numbers::bool_repr))
            .slot(SlotId::And, SlotFunc::Binary(numbers::bool_and))
            .slot(SlotId::Or, SlotFunc::Binary(numbers::bool_or))
            .slot(SlotId::Xor, SlotFunc::Binary(numbers::bool_xor)),
        int,
    );
    let float = native(float_spec(), object);
    let str_ = native(
        NativeTypeSpec::new("str", Layout::Str)
            .slot(SlotId::New, SlotFunc::New(str_type::str_new))
            .slot(SlotId::Repr, SlotFunc::Stringify(str_type::str_repr))
            .slot(SlotId::Str, SlotFunc::Stringify(str_type::str_str))
            .slot(SlotId::Hash, SlotFunc::Hash(str_type::str_hash))
            .rich_compare(str_type::str_richcompare)
            .sequence(SequenceSlots {
                len: Some(str_type::str_len),
                contains: Some(str_type::str_contains),
                get_item: Some(str_type::str_getitem),
                set_item: None,
                concat: Some(str_type::str_concat),
                repeat: Some(str_type::str_repeat),
            })
            .methods(&str_type::STR_METHODS),
        object,
    );
    let tuple = native(
        NativeTypeSpec::new("tuple", Layout::Tuple)
            .slot(SlotId::New, SlotFunc::New(sequence::tuple_new))
            .slot(SlotId::Repr, SlotFunc::Stringify(sequence::tuple_repr))
            .slot(SlotId::Hash, SlotFunc::Hash(sequence::tuple_hash))
            .slot(SlotId::Iter, SlotFunc::Unary(sequence::tuple_iter))
            .rich_compare(sequence::tuple_richcompare)
            .sequence(SequenceSlots {
                len: Some(sequence::tuple_len),
                contains: Some(sequence::tuple_contains),
                get_item: Some(sequence::tuple_getitem),
                set_item: None,
                concat: Some(sequence::tuple_concat),
                repeat: Some(sequence::tuple_repeat),
            }),
        object,
    );
    let list = native(
        NativeTypeSpec::new("list", Layout::List)
            .slot(SlotId::New, SlotFunc::New(sequence::list_new))
            .slot(SlotId::Init, SlotFunc::Init(sequence::list_init))
            .slot(SlotId::Repr, SlotFunc::Stringify(sequence::list_repr))
            .slot(SlotId::Iter, SlotFunc::Unary(sequence::list_iter))
            .slot(SlotId::IAdd, SlotFunc::Binary(sequence::list_iadd))
            .rich_compare(sequence::list_richcompare)
            .sequence(SequenceSlots {
                len: Some(sequence::list_len),
                contains: Some(sequence::list_contains),
                get_item: Some(sequence::list_getitem),
                set_item: Some(sequence::list_setitem),
                concat: Some(sequence::list_concat),
                repeat: Some(sequence::list_repeat),
            })
            .unhashable()
            .methods(&sequence::LIST_METHODS),
        object,
    );
    let dict = native(
        NativeTypeSpec::new("dict", Layout::Dict)
            .slot(SlotId::New, SlotFunc::New(dict::dict_new))
            .slot(SlotId::Init, SlotFunc::Init(dict::dict_init))
            .slot(SlotId::Repr, SlotFunc::Stringify(dict::dict_repr))
            .slot(SlotId::Iter, SlotFunc::Unary(dict::dict_iter))
            .rich_compare(dict::dict_richcompare)
            .sequence(SequenceSlots {
                len: Some(dict::dict_len),
                contains: Some(dict::dict_contains),
                get_item: Some(dict::dict_getitem),
                set_item: Some(dict::dict_setitem),
                ..SequenceSlots::default()
            })
            .flags(TypeFlags::BASETYPE | TypeFlags::MAPPING)
            .unhashable()
            .methods(&dict::DICT_METHODS),
        object,
    );
    let function = native(
        NativeTypeSpec::new("function", Layout::Function)
            .flags(TypeFlags::METHOD_DESCRIPTOR)
            .slot(SlotId::Call, SlotFunc::Call(function::function_call))
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(function::function_descr_get))
            .slot(SlotId::Repr, SlotFunc::Stringify(function::function_repr))
            .getsets(&FUNCTION_GETSETS),
        object,
    );
    let builtin_function = native(
        NativeTypeSpec::new("builtin_function_or_method", Layout::BuiltinFunction)
            .flags(TypeFlags::empty())
            .slot(SlotId::Call, SlotFunc::Call(function::function_call))
            .slot(SlotId::Repr, SlotFunc::Stringify(function::function_repr))
            .getsets(&FUNCTION_GETSETS),
        object,
    );
    let method = native(
        NativeTypeSpec::new("method", Layout::BoundMethod)
            .flags(TypeFlags::empty())
            .slot(SlotId::Call, SlotFunc::Call(function::method_call))
            .slot(SlotId::Repr, SlotFunc::Stringify(function::method_repr))
            .getsets(&METHOD_GETSETS),
        object,
    );
    let method_descriptor = native(
        NativeTypeSpec::new("method_descriptor", Layout::Descriptor)
            .flags(TypeFlags::METHOD_DESCRIPTOR)
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(descriptor::method_descr_get))
            .slot(SlotId::Call, SlotFunc::Call(descriptor::method_descr_call))
            .slot(SlotId::Repr, SlotFunc::Stringify(descriptor::descr_repr)),
        object,
    );
    let classmethod_descriptor = native(
        NativeTypeSpec::new("classmethod_descriptor", Layout::Descriptor)
            .flags(TypeFlags::empty())
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(descriptor::classmethod_descr_get))
            .slot(SlotId::Call, SlotFunc::Call(descriptor::classmethod_descr_call))
            .slot(SlotId::Repr, SlotFunc::Stringify(descriptor::descr_repr)),
        object,
    );
    let getset_descriptor = native(
        NativeTypeSpec::new("getset_descriptor", Layout::Descriptor)
            .flags(TypeFlags::empty())
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(descriptor::getset_descr_get))
            .slot(SlotId::DescrSet, SlotFunc::DescrSet(descriptor::getset_descr_set))
            .slot(SlotId::Repr, SlotFunc::Stringify(descriptor::descr_repr)),
        object,
    );
    let wrapper_descriptor = native(
        NativeTypeSpec::new("wrapper_descriptor", Layout::Descriptor)
            .flags(TypeFlags::METHOD_DESCRIPTOR)
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(descriptor::method_descr_get))
            .slot(SlotId::Call, SlotFunc::Call(descriptor::wrapper_descr_call))
            .slot(SlotId::Repr, SlotFunc::Stringify(descriptor::descr_repr)),
        object,
    );
    let staticmethod = native(
        NativeTypeSpec::new("staticmethod", Layout::StaticMethod)
            .slot(SlotId::New, SlotFunc::New(property::staticmethod_new))
            .slot(SlotId::Init, SlotFunc::Init(property::wrapper_init))
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(property::staticmethod_descr_get))
            .getsets(&WRAPPER_GETSETS),
        object,
    );
    let classmethod = native(
        NativeTypeSpec::new("classmethod", Layout::ClassMethod)
            .slot(SlotId::New, SlotFunc::New(property::classmethod_new))
            .slot(SlotId::Init, SlotFunc::Init(property::wrapper_init))
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(property::classmethod_descr_get))
            .getsets(&WRAPPER_GETSETS),
        object,
    );
    let property = native(
        NativeTypeSpec::new("property", Layout::Property)
            .slot(SlotId::New, SlotFunc::New(property::property_new))
            .slot(SlotId::Init, SlotFunc::Init(property::property_init))
            .slot(SlotId::DescrGet, SlotFunc::DescrGet(property::property_descr_get))
            .slot(SlotId::DescrSet, SlotFunc::DescrSet(property::property_descr_set))
            .methods(&property::PROPERTY_METHODS)
            .getsets(&PROPERTY_GETSETS)
            .doc("Property attribute."),
        object,
    );
    let super_ = native(
        NativeTypeSpec::new("super", Layout::Super)
            .slot(SlotId::New, SlotFunc::New(super_proxy::super_new))
            .slot(SlotId::GetAttribute, SlotFunc::GetAttro(super_proxy::super_getattro))
            .slot(SlotId::Repr, SlotFunc::Stringify(super_proxy::super_repr))
            .getsets(&super_proxy::SUPER_GETSETS),
        object,
    );
    let dict_keyiterator = native(iterator_spec("dict_keyiterator", iter::dict_iter_next), object);
    let list_iterator = native(iterator_spec("list_iterator", iter::seq_iter_next), object);
    let tuple_iterator = native(iterator_spec("tuple_iterator", iter::seq_iter_next), object);
    let iterator = native(iterator_spec("iterator", iter::getitem_iter_next), object);
    let cell = native(
        NativeTypeSpec::new("cell", Layout::Cell)
            .flags(TypeFlags::empty())
            .slot(SlotId::Repr, SlotFunc::Stringify(singletons::cell_repr))
            .getsets(&singletons::CELL_GETSETS),
        object,
    );

    let core = CoreTypes {
        object,
        type_,
        none_type,
        not_implemented_type,
        bool_,
        int,
        float,
        str_,
        tuple,
        list,
        dict,
        function,
        builtin_function,
        method,
        method_descriptor,
        classmethod_descriptor,
        getset_descriptor,
        wrapper_descriptor,
        staticmethod,
        classmethod,
        property,
        super_,
        dict_keyiterator,
        list_iterator,
        tuple_iterator,
        iterator,
        cell,
    };
    (core, pending)
}

/// Exposes the slots, methods and getsets of every core type as descriptors.
pub(crate) fn install_core_members(rt: &mut Runtime, pending: Vec<(HeapId, NativeTypeSpec)>) {
    for (id, spec) in &pending {
        install_native_members(rt, *id, spec);
    }
    log::trace!("installed members of {} core types", pending.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_and_type_close_the_metatype_loop() {
        let rt = Runtime::default();
        let core = rt.core();
        assert_eq!(rt.type_of(&crate::value::Value::Ref(core.object)), core.type_);
        assert_eq!(rt.type_of(&crate::value::Value::Ref(core.type_)), core.type_);
        assert_eq!(rt.mro_of(core.type_), [core.type_, core.object]);
        assert_eq!(rt.mro_of(core.bool_), [core.bool_, core.int, core.object]);
    }

    #[test]
    fn every_core_type_is_prototypical_and_immutable() {
        let rt = Runtime::default();
        for ty in rt.core().all() {
            let flags = rt.type_flags(ty);
            assert!(flags.contains(TypeFlags::PROTOTYPICAL | TypeFlags::IMMUTABLE), "{}", rt.type_name(ty));
            assert!(!flags.contains(TypeFlags::HEAPTYPE));
        }
    }
}
