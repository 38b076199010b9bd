//! Module registry: named asynchronous factories with declared dependencies.
//!
//! A module is a lazily-instantiated singleton. [`ModuleRegistry::load`]
//! resolves a module's dependencies depth-first and sequentially, invokes its
//! factory once, and memoizes the instance. Cycles are detected by tracking
//! the chain of modules under resolution ([`ResolutionState`]); a module that
//! re-enters the chain fails with [`ModuleError::CircularDependency`] instead
//! of hanging.
//!
//! Instances are type-erased (`Arc<dyn Any>`); consumers recover the concrete
//! capability type with [`ModuleRegistry::get_as`] / [`Dependencies::get`].
//!
//! ```ignore
//! let registry = ModuleRegistry::new();
//! registry.register("config", &[], |_| async { Ok::<_, BoxError>(Config::default()) });
//! registry.register("api", &["config"], |deps| async move {
//!     let config = deps.get::<Config>("config")?;
//!     Ok::<_, BoxError>(ApiClient::new(&config)?)
//! });
//! let api = registry.load_as::<ApiClient>("api").await?;
//! ```

mod error;
mod registry;

pub use error::{BoxError, ModuleError};
pub use registry::{
    Dependencies, Factory, FactoryFut, Instance, ModuleRegistry, ResolutionState,
};
