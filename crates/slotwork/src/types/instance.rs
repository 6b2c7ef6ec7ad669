use crate::{
    heap::HeapId,
    types::{BoundMethod, Descriptor, Dict, DictIter, Function, Property, SeqIter, SuperProxy},
    value::Value,
};

/// A heap object that is not a type: its class, native payload and
/// optional attribute dictionary.
#[derive(Debug)]
pub struct Instance {
    pub(crate) class: HeapId,
    pub(crate) payload: Payload,
    /// Heap id of the attribute dictionary, present when the class provides one.
    pub(crate) dict: Option<HeapId>,
}

impl Instance {
    #[must_use]
    pub fn class(&self) -> HeapId {
        self.class
    }

    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Native state carried by an instance. The class's `Layout` decides which variant is valid.
#[derive(Debug)]
pub enum Payload {
    /// Plain object with no native state.
    Empty,
    /// Value of an `int`, `float` or `str` subclass instance.
    Primitive(Value),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Dict),
    Function(Function),
    BoundMethod(BoundMethod),
    Descriptor(Descriptor),
    StaticMethod(Value),
    ClassMethod(Value),
    Property(Property),
    Super(SuperProxy),
    DictIter(DictIter),
    SeqIter(SeqIter),
    Cell(Option<Value>),
}

impl Payload {
    pub(crate) fn variant_name(&self) -> &'static str {
        match self {
            Self::Empty => "Object",
            Self::Primitive(_) => "Primitive",
            Self::Tuple(_) => "Tuple",
            Self::List(_) => "List",
            Self::Dict(_) => "Dict",
            Self::Function(_) => "Function",
            Self::BoundMethod(_) => "BoundMethod",
            Self::Descriptor(_) => "Descriptor",
            Self::StaticMethod(_) => "StaticMethod",
            Self::ClassMethod(_) => "ClassMethod",
            Self::Property(_) => "Property",
            Self::Super(_) => "Super",
            Self::DictIter(_) | Self::SeqIter(_) => "Iterator",
            Self::Cell(_) => "Cell",
        }
    }
}
