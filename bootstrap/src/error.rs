use atlas_api::ApiError;
use atlas_modules::{BoxError, ModuleError};
use thiserror::Error;

use crate::state::BootState;

#[derive(Debug, Error)]
pub enum BootError {
    #[error("invalid boot transition {from} -> {to}")]
    InvalidTransition { from: BootState, to: BootState },

    /// An asset could not be fetched.
    #[error("failed to fetch '{path}': {message}")]
    Fetch { path: String, message: String },

    /// A fetched asset was rejected by its installer.
    #[error("failed to install '{unit}': {source}")]
    Install {
        unit: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid selector '{selector}' for feature '{feature}'")]
    Selector { feature: String, selector: String },

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error(transparent)]
    Api(#[from] ApiError),
}
