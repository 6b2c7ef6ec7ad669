//! Type objects, instance payloads and the native implementations of the core types.

pub(crate) mod builder;
pub(crate) mod descriptor;
pub(crate) mod dict;
pub(crate) mod function;
pub(crate) mod instance;
pub(crate) mod iter;
pub(crate) mod mro;
pub(crate) mod numbers;
pub(crate) mod object;
pub(crate) mod property;
pub(crate) mod sequence;
pub(crate) mod singletons;
pub(crate) mod str;
pub(crate) mod super_proxy;
pub(crate) mod type_;
pub(crate) mod type_object;

pub use builder::{NativeTypeSpec, SequenceSlots};
pub use descriptor::{CallConvention, Descriptor, GetSetDef, GetterFn, MethodDef, NativeMethodFn, SetterFn};
pub use dict::Dict;
pub use function::{BoundMethod, Function, FunctionKind, HostFn, NativeFn};
pub use instance::{Instance, Payload};
pub(crate) use iter::{DictIter, SeqIter};
pub use property::Property;
pub(crate) use super_proxy::SuperProxy;
pub use type_object::{Layout, TypeFlags, TypeObject};
