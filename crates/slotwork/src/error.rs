use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::value::Value;

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// Exception kinds raised by the runtime.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>` implementations.
/// The string representation matches the variant name exactly (e.g., `TypeError` -> "TypeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ExcType {
    /// Root of the hierarchy, matches every other kind.
    Exception,
    TypeError,
    AttributeError,
    ValueError,

    // --- LookupError hierarchy ---
    /// Intermediate kind for lookup errors.
    LookupError,
    /// Subclass of LookupError.
    KeyError,
    /// Subclass of LookupError.
    IndexError,

    // --- ArithmeticError hierarchy ---
    /// Intermediate kind for arithmetic errors.
    ArithmeticError,
    /// Subclass of ArithmeticError.
    ZeroDivisionError,
    /// Subclass of ArithmeticError.
    OverflowError,

    // --- RuntimeError hierarchy ---
    RuntimeError,
    /// Subclass of RuntimeError.
    NotImplementedError,
    /// Subclass of RuntimeError, raised by the call depth guard.
    RecursionError,

    /// Raised by iterators when exhausted.
    StopIteration,
    /// A non-optional suspension reached a synchronous-only call site.
    SuspensionError,
}

impl ExcType {
    /// Checks if this exception kind is caught by a handler for `handler_type`.
    ///
    /// Mirrors the exception hierarchy: `KeyError` is caught by `LookupError`,
    /// `RecursionError` by `RuntimeError`, and everything by `Exception`.
    #[must_use]
    pub fn is_subclass_of(self, handler_type: Self) -> bool {
        if self == handler_type {
            return true;
        }
        match handler_type {
            Self::Exception => true,
            Self::LookupError => matches!(self, Self::KeyError | Self::IndexError),
            Self::ArithmeticError => matches!(self, Self::ZeroDivisionError | Self::OverflowError),
            Self::RuntimeError => matches!(self, Self::RecursionError | Self::NotImplementedError),
            _ => false,
        }
    }

    #[must_use]
    pub(crate) fn type_error(msg: impl Into<String>) -> RunError {
        RunError::new(Self::TypeError, msg)
    }

    #[must_use]
    pub(crate) fn value_error(msg: impl Into<String>) -> RunError {
        RunError::new(Self::ValueError, msg)
    }

    /// Creates an AttributeError for a missing instance attribute.
    ///
    /// Matches CPython's format: "'Foo' object has no attribute 'bar'".
    #[must_use]
    pub(crate) fn attribute_error(type_name: impl fmt::Display, attr: &str) -> RunError {
        RunError::new(
            Self::AttributeError,
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    /// Creates an AttributeError for a missing attribute looked up on a type object.
    ///
    /// Matches CPython's format: "type object 'Foo' has no attribute 'bar'".
    #[must_use]
    pub(crate) fn type_attribute_error(type_name: impl fmt::Display, attr: &str) -> RunError {
        RunError::new(
            Self::AttributeError,
            format!("type object '{type_name}' has no attribute '{attr}'"),
        )
    }

    /// Creates an AttributeError for assignment to a read-only attribute.
    #[must_use]
    pub(crate) fn attribute_not_writable(type_name: impl fmt::Display, attr: &str) -> RunError {
        RunError::new(
            Self::AttributeError,
            format!("attribute '{attr}' of '{type_name}' objects is not writable"),
        )
    }

    /// Creates a TypeError for a binary operator with no applicable implementation.
    ///
    /// Matches CPython's format: "unsupported operand type(s) for +: 'A' and 'B'".
    #[must_use]
    pub(crate) fn unsupported_binary(symbol: &str, left: impl fmt::Display, right: impl fmt::Display) -> RunError {
        Self::type_error(format!(
            "unsupported operand type(s) for {symbol}: '{left}' and '{right}'"
        ))
    }

    /// Creates a TypeError for a unary operator with no applicable implementation.
    #[must_use]
    pub(crate) fn unsupported_unary(symbol: &str, operand: impl fmt::Display) -> RunError {
        Self::type_error(format!("bad operand type for {symbol}: '{operand}'"))
    }

    /// Creates a TypeError for an ordering comparison that neither side supports.
    #[must_use]
    pub(crate) fn unsupported_compare(symbol: &str, left: impl fmt::Display, right: impl fmt::Display) -> RunError {
        Self::type_error(format!(
            "'{symbol}' not supported between instances of '{left}' and '{right}'"
        ))
    }

    #[must_use]
    pub(crate) fn not_callable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    #[must_use]
    pub(crate) fn not_iterable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }

    #[must_use]
    pub(crate) fn unhashable(type_name: impl fmt::Display) -> RunError {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    /// Creates a TypeError for a call with the wrong number of positional arguments.
    #[must_use]
    pub(crate) fn arg_count(name: &str, expected: usize, actual: usize) -> RunError {
        let plural = if expected == 1 { "" } else { "s" };
        Self::type_error(format!(
            "{name}() takes exactly {expected} argument{plural} ({actual} given)"
        ))
    }

    #[must_use]
    pub(crate) fn no_kwargs(name: &str) -> RunError {
        Self::type_error(format!("{name}() takes no keyword arguments"))
    }

    /// Creates the error raised when a non-optional suspension reaches a call
    /// site that can only complete synchronously.
    #[must_use]
    pub(crate) fn cannot_suspend(kind: impl fmt::Display) -> RunError {
        RunError::new(
            Self::SuspensionError,
            format!("cannot suspend ({kind}) in a context that must complete synchronously"),
        )
    }

    #[must_use]
    pub(crate) fn dict_changed_size() -> RunError {
        RunError::new(Self::RuntimeError, "dictionary changed size during iteration")
    }

    #[must_use]
    pub(crate) fn recursion_limit() -> RunError {
        RunError::new(Self::RecursionError, "maximum recursion depth exceeded")
    }

    #[must_use]
    pub(crate) fn stop_iteration() -> RunError {
        RunError::new(Self::StopIteration, String::new())
    }

    #[must_use]
    pub(crate) fn zero_division(msg: &str) -> RunError {
        RunError::new(Self::ZeroDivisionError, msg)
    }

    #[must_use]
    pub(crate) fn overflow(msg: &str) -> RunError {
        RunError::new(Self::OverflowError, msg)
    }

    /// Error for a native slot function whose signature does not fit the slot it was stored in.
    #[must_use]
    pub(crate) fn slot_signature_mismatch(slot: impl fmt::Display) -> RunError {
        Self::type_error(format!("slot '{slot}' holds a function with an incompatible signature"))
    }
}

/// A raised exception: its kind, message and an optional payload value.
///
/// The payload carries data such as the value of a `StopIteration` or an
/// error recorded by the host while a task was suspended.
#[derive(Debug, Clone)]
pub struct RunError {
    exc_type: ExcType,
    message: String,
    payload: Option<Value>,
}

impl RunError {
    #[must_use]
    pub fn new(exc_type: ExcType, message: impl Into<String>) -> Self {
        Self {
            exc_type,
            message: message.into(),
            payload: None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn exc_type(&self) -> ExcType {
        self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    /// Whether a handler for `kind` would catch this error.
    #[must_use]
    pub fn is(&self, kind: ExcType) -> bool {
        self.exc_type.is_subclass_of(kind)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.exc_type)
        } else {
            write!(f, "{}: {}", self.exc_type, self.message)
        }
    }
}

impl Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_matches_handlers() {
        assert!(ExcType::KeyError.is_subclass_of(ExcType::LookupError));
        assert!(ExcType::RecursionError.is_subclass_of(ExcType::RuntimeError));
        assert!(ExcType::SuspensionError.is_subclass_of(ExcType::Exception));
        assert!(!ExcType::TypeError.is_subclass_of(ExcType::AttributeError));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let err = ExcType::attribute_error("Foo", "bar");
        assert_eq!(err.to_string(), "AttributeError: 'Foo' object has no attribute 'bar'");
        assert_eq!(ExcType::stop_iteration().to_string(), "StopIteration");
    }
}
