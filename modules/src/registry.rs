use std::any::{Any, type_name};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::future::try_join_all;
use tokio::sync::OnceCell;

use crate::error::{BoxError, ModuleError};

/// A memoized module instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Future returned by a type-erased factory.
pub type FactoryFut = Pin<Box<dyn Future<Output = Result<Instance, BoxError>> + Send>>;

/// Type-erased asynchronous constructor bound to a module.
pub type Factory = Arc<dyn Fn(Dependencies) -> FactoryFut + Send + Sync>;

type LoadFut<'a> = Pin<Box<dyn Future<Output = Result<Instance, ModuleError>> + Send + 'a>>;

/// Resolved dependency instances handed to a factory, in declared order.
pub struct Dependencies {
    entries: Vec<(String, Instance)>,
}

impl Dependencies {
    /// Fetch a dependency by name as its concrete capability type.
    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, ModuleError>
    where
        T: Any + Send + Sync,
    {
        let (_, instance) = self
            .entries
            .iter()
            .find(|(dep, _)| dep == name)
            .ok_or_else(|| ModuleError::NotFound {
                name: name.to_string(),
            })?;
        downcast(name, Arc::clone(instance))
    }

    /// Dependency names in declared order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Names currently being resolved along one resolution chain.
///
/// A name that re-enters the set before leaving it is a cycle.
#[derive(Debug, Default)]
pub struct ResolutionState {
    path: Vec<String>,
}

impl ResolutionState {
    fn enter(&mut self, name: &str) -> Result<(), ModuleError> {
        if let Some(pos) = self.path.iter().position(|n| n == name) {
            let mut cycle = self.path[pos..].to_vec();
            cycle.push(name.to_string());
            return Err(ModuleError::CircularDependency { cycle });
        }
        self.path.push(name.to_string());
        Ok(())
    }

    fn leave(&mut self, name: &str) {
        if let Some(pos) = self.path.iter().rposition(|n| n == name) {
            self.path.remove(pos);
        }
    }

    #[must_use]
    pub fn is_resolving(&self, name: &str) -> bool {
        self.path.iter().any(|n| n == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}

struct Descriptor {
    dependencies: Arc<[String]>,
    factory: Factory,
    instance: Arc<OnceCell<Instance>>,
}

/// Registry of named, lazily-instantiated singleton modules.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: Arc<Mutex<HashMap<String, Descriptor>>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}

impl ModuleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, Descriptor>> {
        self.modules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a module.
    ///
    /// Re-registering a name replaces the previous descriptor and drops its
    /// memoized instance. The factory is not invoked here.
    pub fn register<T, F, Fut>(&self, name: impl Into<String>, dependencies: &[&str], factory: F)
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let factory: Factory = Arc::new(move |deps: Dependencies| -> FactoryFut {
            let fut = factory(deps);
            Box::pin(async move { fut.await.map(|instance| Arc::new(instance) as Instance) })
        });
        self.register_factory(
            name,
            dependencies.iter().map(|d| (*d).to_string()).collect(),
            factory,
        );
    }

    /// Register a type-erased factory.
    pub fn register_factory(
        &self,
        name: impl Into<String>,
        dependencies: Vec<String>,
        factory: Factory,
    ) {
        let name = name.into();
        let descriptor = Descriptor {
            dependencies: dependencies.into(),
            factory,
            instance: Arc::new(OnceCell::new()),
        };
        if self.table().insert(name.clone(), descriptor).is_some() {
            tracing::debug!(module = %name, "Module re-registered");
        }
    }

    /// Register an already-built instance under `name`.
    pub fn provide<T>(&self, name: impl Into<String>, instance: T)
    where
        T: Any + Send + Sync,
    {
        let instance: Instance = Arc::new(instance);
        let memo = Arc::clone(&instance);
        let factory: Factory = Arc::new(move |_: Dependencies| -> FactoryFut {
            let instance = Arc::clone(&memo);
            Box::pin(async move { Ok::<_, BoxError>(instance) })
        });
        let descriptor = Descriptor {
            dependencies: Arc::from(Vec::new()),
            factory,
            instance: Arc::new(OnceCell::new_with(Some(instance))),
        };
        self.table().insert(name.into(), descriptor);
    }

    /// Resolve `name`, loading its dependencies first.
    ///
    /// Dependencies are loaded sequentially in declared order, so latency along
    /// a chain is additive. Concurrent loads of the same module share one
    /// factory invocation. A failed load leaves the module unmemoized.
    pub async fn load(&self, name: &str) -> Result<Instance, ModuleError> {
        let mut state = ResolutionState::default();
        self.resolve(name, &mut state).await
    }

    /// [`load`](Self::load) and downcast to the module's capability type.
    pub async fn load_as<T>(&self, name: &str) -> Result<Arc<T>, ModuleError>
    where
        T: Any + Send + Sync,
    {
        let instance = self.load(name).await?;
        downcast(name, instance)
    }

    /// Load independent top-level modules. No ordering is guaranteed across
    /// subtrees; the first error wins.
    pub async fn load_all(&self, names: &[&str]) -> Result<Vec<Instance>, ModuleError> {
        try_join_all(names.iter().map(|name| self.load(name))).await
    }

    /// The memoized instance, if the module has been loaded. Never loads.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Instance> {
        self.table()
            .get(name)
            .and_then(|d| d.instance.get().map(Arc::clone))
    }

    /// [`get`](Self::get) downcast to `T`. `None` if absent, unloaded, or another type.
    #[must_use]
    pub fn get_as<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.get(name).and_then(|i| i.downcast::<T>().ok())
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.table().contains_key(name)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.table()
            .get(name)
            .is_some_and(|d| d.instance.initialized())
    }

    /// Registered module names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table().keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve<'a>(&'a self, name: &'a str, state: &'a mut ResolutionState) -> LoadFut<'a> {
        Box::pin(async move {
            let (dependencies, factory, cell) = {
                let modules = self.table();
                let descriptor = modules.get(name).ok_or_else(|| ModuleError::NotFound {
                    name: name.to_string(),
                })?;
                if let Some(instance) = descriptor.instance.get() {
                    return Ok(Arc::clone(instance));
                }
                (
                    Arc::clone(&descriptor.dependencies),
                    Arc::clone(&descriptor.factory),
                    Arc::clone(&descriptor.instance),
                )
            };

            state.enter(name)?;
            let result = self
                .construct(name, &dependencies, &factory, &cell, state)
                .await;
            state.leave(name);
            result
        })
    }

    async fn construct(
        &self,
        name: &str,
        dependencies: &[String],
        factory: &Factory,
        cell: &OnceCell<Instance>,
        state: &mut ResolutionState,
    ) -> Result<Instance, ModuleError> {
        let mut resolved = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            let instance = self.resolve(dep, state).await?;
            resolved.push((dep.clone(), instance));
        }

        let instance = cell
            .get_or_try_init(|| async move {
                let started = Instant::now();
                let result = factory(Dependencies { entries: resolved }).await;
                match &result {
                    Ok(_) => tracing::debug!(
                        module = name,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Module loaded"
                    ),
                    Err(e) => tracing::warn!(module = name, error = %e, "Module factory failed"),
                }
                result.map_err(|source| ModuleError::Factory {
                    name: name.to_string(),
                    source,
                })
            })
            .await?;

        Ok(Arc::clone(instance))
    }
}

fn downcast<T>(name: &str, instance: Instance) -> Result<Arc<T>, ModuleError>
where
    T: Any + Send + Sync,
{
    instance
        .downcast::<T>()
        .map_err(|_| ModuleError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}
