use std::{any::type_name, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
    config::ContainerConfig,
    definition::BeanDefinition,
    dependency_graph::DependencyGraph,
    errors::{
        BuildError, DestroyFailure, IllegalStateError, RegistrationError, ResolutionError,
        ShutdownError,
    },
    instantiator::Instantiator,
    registry::{BeanDefinitionRegistry, BeanId},
    resolution::Resolver,
    scope::{Scope, ScopeManager},
    sorter::{self, InstantiationPlan},
    types::{BeanKey, Injectable, Instance, TypeInfo},
};

/// State of a [`Container`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting registrations
    Unbuilt,
    /// Serving beans
    Built,
    ShutDown,
}

/// Everything fixed by [`Container::build`]
struct Runtime {
    graph: DependencyGraph,
    plan: InstantiationPlan,
    scopes: ScopeManager,
}

/// Container owning every bean definition and singleton
///
/// Definitions are registered on an unbuilt container, [`Container::build`] then validates
/// the whole graph at once. Afterwards the container is read only and can be shared
/// between threads.
pub struct Container {
    config: ContainerConfig,
    registry: BeanDefinitionRegistry,
    runtime: Option<Runtime>,
    lifecycle: RwLock<Lifecycle>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            config,
            registry: BeanDefinitionRegistry::new(),
            runtime: None,
            lifecycle: RwLock::new(Lifecycle::Unbuilt),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    pub fn registry(&self) -> &BeanDefinitionRegistry {
        &self.registry
    }

    /// The dependency graph, once built
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.runtime.as_ref().map(|runtime| &runtime.graph)
    }

    /// The instantiation plan, once built
    pub fn plan(&self) -> Option<&InstantiationPlan> {
        self.runtime.as_ref().map(|runtime| &runtime.plan)
    }

    pub fn register(
        &mut self,
        definition: impl Into<BeanDefinition>,
    ) -> Result<BeanId, RegistrationError> {
        let state = *self.lifecycle.get_mut();
        if state != Lifecycle::Unbuilt {
            return Err(IllegalStateError {
                operation: "register",
                state,
            }
            .into());
        }
        Ok(self.registry.register(definition.into())?)
    }

    pub fn register_all(
        &mut self,
        definitions: impl IntoIterator<Item = BeanDefinition>,
    ) -> Result<Vec<BeanId>, RegistrationError> {
        definitions
            .into_iter()
            .map(|definition| self.register(definition))
            .collect()
    }

    /// Validates the definitions and computes the instantiation plan
    ///
    /// Eager singletons are created here, if one fails everything created so far is
    /// destroyed and the container is shut down.
    pub fn build(&mut self) -> Result<(), BuildError> {
        let state = *self.lifecycle.get_mut();
        if state != Lifecycle::Unbuilt {
            return Err(IllegalStateError {
                operation: "build",
                state,
            }
            .into());
        }

        let graph = DependencyGraph::build(&self.registry)?;
        let plan = sorter::plan(&graph, self.config.allow_circular_references)?;
        let scopes = ScopeManager::new(graph.len(), plan.group_count());
        let runtime = Runtime {
            graph,
            plan,
            scopes,
        };

        if let Err(error) = self.create_eager(&runtime) {
            tracing::warn!(
                "Container '{}' failed to create eager singletons, rolling back - error: {}",
                self.config.name,
                error
            );
            for failure in teardown(&self.registry, &runtime.scopes) {
                tracing::warn!("{}", failure);
            }
            *self.lifecycle.get_mut() = Lifecycle::ShutDown;
            return Err(error.into());
        }

        tracing::info!(
            "Container '{}' built with {} beans, {} circular reference(s) broken",
            self.config.name,
            runtime.graph.len(),
            runtime.plan.broken_edges().len()
        );
        self.runtime = Some(runtime);
        *self.lifecycle.get_mut() = Lifecycle::Built;
        Ok(())
    }

    fn create_eager(&self, runtime: &Runtime) -> Result<(), ResolutionError> {
        let mut resolver = Resolver::new(
            &self.registry,
            &runtime.graph,
            &runtime.plan,
            &runtime.scopes,
        );
        for &id in runtime.plan.order() {
            let definition = self.registry.definition(id);
            let eager = definition.is_eager() || self.config.eager_singletons;
            if eager && definition.scope() == Scope::Singleton {
                resolver.resolve(id)?;
            }
        }
        Ok(())
    }

    /// Returns the bean of type `T`
    ///
    /// Singletons are the same instance on every call, prototypes a fresh one.
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>, ResolutionError> {
        self.resolve::<T>(None)
    }

    pub fn get_qualified<T: Injectable>(&self, qualifier: &str) -> Result<Arc<T>, ResolutionError> {
        self.resolve::<T>(Some(qualifier))
    }

    pub fn resolve<T: Injectable>(
        &self,
        qualifier: Option<&str>,
    ) -> Result<Arc<T>, ResolutionError> {
        let key = BeanKey::new(TypeInfo::of::<T>(), qualifier);
        // Recursive so hooks and factories may request beans themselves
        let lifecycle = self.lifecycle.read_recursive();
        let runtime = self.runtime(*lifecycle, "get")?;

        let id = self.registry.lookup(&key)?;
        downcast(self.instance(runtime, id)?)
    }

    /// Every bean of type `T`, qualified or not, in registration order
    pub fn get_all<T: Injectable>(&self) -> Result<Vec<Arc<T>>, ResolutionError> {
        let lifecycle = self.lifecycle.read_recursive();
        let runtime = self.runtime(*lifecycle, "get_all")?;

        self.registry
            .candidates(TypeInfo::of::<T>())
            .iter()
            .map(|id| downcast(self.instance(runtime, *id)?))
            .collect()
    }

    /// Whether a request for `T` would find a definition
    pub fn contains<T: Injectable>(&self, qualifier: Option<&str>) -> bool {
        let key = BeanKey::new(TypeInfo::of::<T>(), qualifier);
        self.registry.lookup(&key).is_ok()
    }

    fn runtime(
        &self,
        state: Lifecycle,
        operation: &'static str,
    ) -> Result<&Runtime, IllegalStateError> {
        match (&self.runtime, state) {
            (Some(runtime), Lifecycle::Built) => Ok(runtime),
            _ => Err(IllegalStateError { operation, state }),
        }
    }

    fn instance(&self, runtime: &Runtime, id: BeanId) -> Result<Instance, ResolutionError> {
        Resolver::new(
            &self.registry,
            &runtime.graph,
            &runtime.plan,
            &runtime.scopes,
        )
        .resolve(id)
    }

    /// Runs destroy hooks in reverse creation order and releases every singleton
    ///
    /// All hooks run, even if some fail. Waits for requests that are in progress.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        {
            let mut lifecycle = self.lifecycle.write();
            if *lifecycle == Lifecycle::ShutDown {
                return Err(IllegalStateError {
                    operation: "shutdown",
                    state: *lifecycle,
                }
                .into());
            }
            *lifecycle = Lifecycle::ShutDown;
        }

        let failures = match &self.runtime {
            Some(runtime) => teardown(&self.registry, &runtime.scopes),
            None => Vec::new(),
        };

        tracing::info!(
            "Container '{}' shut down with {} failed destroy hook(s)",
            self.config.name,
            failures.len()
        );
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShutdownError::DestroyFailed(failures))
        }
    }
}

fn downcast<T: Injectable>(instance: Instance) -> Result<Arc<T>, ResolutionError> {
    instance
        .downcast()
        .map_err(|actual_type| ResolutionError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}

fn teardown(registry: &BeanDefinitionRegistry, scopes: &ScopeManager) -> Vec<DestroyFailure> {
    let mut failures = Vec::new();
    for (id, instance) in scopes.take_for_teardown() {
        let definition = registry.definition(id);
        if let Err(error) = Instantiator::destroy(definition, &instance) {
            tracing::warn!(
                "Destroy hook of '{}' failed - error: {}",
                definition.key(),
                error
            );
            failures.push(DestroyFailure {
                bean: definition.key().clone(),
                error: Arc::new(error),
            });
        }
    }
    failures
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_struct("Container");
        map.field("name", &self.config.name);
        map.field("lifecycle", &self.lifecycle());
        for (id, definition) in self.registry.iter() {
            let state = match &self.runtime {
                None => "registered",
                Some(runtime) if runtime.scopes.failure(id).is_some() => "failed",
                Some(runtime) if runtime.scopes.cached(id).is_some() => "created",
                Some(_) if definition.scope() == Scope::Prototype => "prototype",
                Some(_) => "pending",
            };
            map.field(definition.key().type_info.type_name, &state);
        }
        map.finish()
    }
}
