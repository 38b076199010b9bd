use std::error::Error as StdError;

use thiserror::Error;

/// Error type factories return. Anything implementing `std::error::Error`
/// (and `anyhow::Error`) converts into it with `?`.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ModuleError {
    /// The module was never registered.
    #[error("module not found: {name}")]
    NotFound { name: String },

    /// Resolution re-entered a module that was still being resolved.
    ///
    /// `cycle` starts and ends with the re-entered module, e.g. `[x, y, x]`.
    #[error("circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// The module's factory failed. The module stays unmemoized.
    #[error("module '{name}' failed to initialize: {source}")]
    Factory {
        name: String,
        #[source]
        source: BoxError,
    },

    /// A module instance is not of the requested capability type.
    #[error("module '{name}' is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
}

impl ModuleError {
    /// Name of the module the error is about (the re-entered one for cycles).
    #[must_use]
    pub fn module(&self) -> &str {
        match self {
            Self::NotFound { name }
            | Self::Factory { name, .. }
            | Self::TypeMismatch { name, .. } => name,
            Self::CircularDependency { cycle } => cycle.last().map_or("", String::as_str),
        }
    }
}
