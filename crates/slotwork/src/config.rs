use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Recommended maximum call depth if not otherwise specified.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Maximum length of the Method Resolution Order (MRO) list for any class.
///
/// Limits the output of C3 linearization to prevent diamond-inheritance explosions
/// from consuming excessive memory or CPU.
pub const MAX_MRO_LENGTH: usize = 2600;

/// Maximum depth of single-path inheritance chains.
pub const MAX_INHERITANCE_DEPTH: usize = 1000;

/// Which spelling of the renamed protocol hooks the runtime recognises.
///
/// Only two hooks differ: truthiness (`__bool__` vs `__nonzero__`) and
/// iterator advance (`__next__` vs `next`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Dialect {
    #[default]
    Modern,
    Legacy,
}

/// Runtime configuration.
///
/// Every field has a default, so a partial serialized config is accepted.
/// Build custom configurations with the builder methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Protocol hook spelling, see `Dialect`.
    pub dialect: Dialect,
    /// Maximum nesting of calls made through the call protocol.
    pub max_recursion_depth: usize,
    /// Maximum number of entries in a computed MRO.
    pub max_mro_length: usize,
    /// Maximum length of the `base` chain of a new type.
    pub max_inheritance_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_mro_length: MAX_MRO_LENGTH,
            max_inheritance_depth: MAX_INHERITANCE_DEPTH,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = limit;
        self
    }

    #[must_use]
    pub fn max_mro_length(mut self, limit: usize) -> Self {
        self.max_mro_length = limit;
        self
    }

    #[must_use]
    pub fn max_inheritance_depth(mut self, limit: usize) -> Self {
        self.max_inheritance_depth = limit;
        self
    }
}
