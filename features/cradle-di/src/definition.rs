use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    factories::{Arguments, BeanFactory, DynFactory, FactoryAdapter, FnFactory, Prebuilt},
    late::Late,
    scope::Scope,
    types::{BeanKey, DynError, Injectable, Instance, TypeInfo},
};

/// The point at which a dependency is supplied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InjectionStrategy {
    /// Passed to the constructor, must exist before the bean is allocated
    Constructor,
    /// Handed to a mutator after allocation
    Setter,
    /// Written into a [`Late`] field after allocation
    Field,
}
impl InjectionStrategy {
    pub fn is_constructor(&self) -> bool {
        matches!(self, InjectionStrategy::Constructor)
    }
}

/// How the bean comes into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Constructor,
    /// A user supplied factory function
    Factory,
    /// An instance that was created outside the container
    Instance,
}

pub(crate) type Injector = Arc<dyn Fn(&Instance, Instance) -> Result<(), DynError> + Send + Sync>;
pub(crate) type Hook = Arc<dyn Fn(&Instance) -> Result<(), DynError> + Send + Sync>;

/// A reference to another bean
#[derive(Clone)]
pub struct Dependency {
    key: BeanKey,
    strategy: InjectionStrategy,
    /// Writes the dependency into the bean, None for constructor dependencies
    injector: Option<Injector>,
}
impl Dependency {
    pub fn key(&self) -> &BeanKey {
        &self.key
    }

    pub fn strategy(&self) -> InjectionStrategy {
        self.strategy
    }

    pub(crate) fn injector(&self) -> Option<&Injector> {
        self.injector.as_ref()
    }
}
impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("key", &self.key)
            .field("strategy", &self.strategy)
            .finish()
    }
}

/// Declarative description of how to build a bean
#[derive(Clone)]
pub struct BeanDefinition {
    key: BeanKey,
    dependencies: Vec<Dependency>,
    scope: Scope,
    primary: bool,
    eager: bool,
    origin: Origin,
    factory: Arc<dyn DynFactory>,
    on_init: Option<Hook>,
    on_destroy: Option<Hook>,
}

impl BeanDefinition {
    /// Bean built by a constructor function
    ///
    /// Constructor dependencies are declared with [`BeanDefinitionBuilder::depends_on`]
    /// and read from [`Arguments`] in the same order.
    pub fn constructor<T, F>(constructor: F) -> BeanDefinitionBuilder<T>
    where
        T: Injectable,
        F: Fn(&mut Arguments<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(Origin::Constructor, Arc::new(FnFactory::new(constructor)))
    }

    /// Bean produced by a factory function instead of direct construction
    pub fn factory<T, F>(factory: F) -> BeanDefinitionBuilder<T>
    where
        T: Injectable,
        F: Fn(&mut Arguments<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    {
        BeanDefinitionBuilder::new(Origin::Factory, Arc::new(FnFactory::new(factory)))
    }

    /// Bean produced by a [`BeanFactory`], its declared dependencies become constructor arguments
    pub fn from_factory<F: BeanFactory>(factory: F) -> BeanDefinitionBuilder<F::Provides> {
        let dependencies = F::dependencies();
        let mut builder =
            BeanDefinitionBuilder::new(Origin::Factory, Arc::new(FactoryAdapter(factory)));
        for key in dependencies {
            builder = builder.push(key, InjectionStrategy::Constructor, None);
        }
        builder
    }

    /// An already created instance, always a singleton
    pub fn instance<T: Injectable>(instance: T) -> BeanDefinitionBuilder<T> {
        BeanDefinitionBuilder::new(Origin::Instance, Arc::new(Prebuilt(Instance::new(instance))))
    }

    /// Marks an already built definition as the default of its type
    pub fn mark_primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Type erased variant of [`BeanDefinition::instance`]
    pub fn from_instance(instance: Instance, qualifier: Option<&str>) -> BeanDefinition {
        BeanDefinition {
            key: BeanKey::new(instance.info, qualifier),
            dependencies: Vec::new(),
            scope: Scope::Singleton,
            primary: false,
            eager: false,
            origin: Origin::Instance,
            factory: Arc::new(Prebuilt(instance)),
            on_init: None,
            on_destroy: None,
        }
    }

    pub fn key(&self) -> &BeanKey {
        &self.key
    }

    pub fn type_info(&self) -> TypeInfo {
        self.key.type_info
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.key.qualifier()
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// The declared injection strategy
    ///
    /// Definitions mixing strategies report the first post allocation strategy.
    pub fn strategy(&self) -> InjectionStrategy {
        self.dependencies
            .iter()
            .map(Dependency::strategy)
            .find(|strategy| !strategy.is_constructor())
            .unwrap_or(InjectionStrategy::Constructor)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub(crate) fn create(&self, args: &mut Arguments<'_>) -> Result<Instance, DynError> {
        self.factory.create(args)
    }

    pub(crate) fn on_init(&self) -> Option<&Hook> {
        self.on_init.as_ref()
    }

    pub(crate) fn on_destroy(&self) -> Option<&Hook> {
        self.on_destroy.as_ref()
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("origin", &self.origin)
            .field("primary", &self.primary)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Typed builder for a [`BeanDefinition`]
pub struct BeanDefinitionBuilder<T> {
    definition: BeanDefinition,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> BeanDefinitionBuilder<T> {
    fn new(origin: Origin, factory: Arc<dyn DynFactory>) -> Self {
        let type_info = factory.supplies();
        BeanDefinitionBuilder {
            definition: BeanDefinition {
                key: BeanKey::new(type_info, None),
                dependencies: Vec::new(),
                scope: Scope::Singleton,
                primary: false,
                eager: false,
                origin,
                factory,
                on_init: None,
                on_destroy: None,
            },
            _marker: PhantomData,
        }
    }

    fn push(
        mut self,
        key: BeanKey,
        strategy: InjectionStrategy,
        injector: Option<Injector>,
    ) -> Self {
        self.definition.dependencies.push(Dependency {
            key,
            strategy,
            injector,
        });
        self
    }

    /// Name distinguishing this bean from other beans of the same type
    pub fn qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.definition.key.qualifier = Some(qualifier.into());
        self
    }

    /// Default choice when a type has several definitions and no qualifier is requested
    pub fn primary(mut self) -> Self {
        self.definition.primary = true;
        self
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        // Pre built instances can not be manufactured again
        if self.definition.origin != Origin::Instance {
            self.definition.scope = scope;
        }
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(Scope::Singleton)
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    /// Create the singleton while the container is built instead of on first request
    pub fn eager(mut self) -> Self {
        self.definition.eager = true;
        self
    }

    /// Constructor dependency, read with [`Arguments::next`]
    pub fn depends_on<D: Injectable>(self) -> Self {
        self.push(BeanKey::of::<D>(), InjectionStrategy::Constructor, None)
    }

    pub fn depends_on_qualified<D: Injectable>(self, qualifier: impl Into<String>) -> Self {
        self.push(
            BeanKey::qualified::<D>(qualifier),
            InjectionStrategy::Constructor,
            None,
        )
    }

    /// Setter dependency, the mutator is called once the bean is allocated
    pub fn setter<D, F>(self, setter: F) -> Self
    where
        D: Injectable,
        F: Fn(&T, Arc<D>) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.setter_with_key(BeanKey::of::<D>(), setter)
    }

    pub fn setter_qualified<D, F>(self, qualifier: impl Into<String>, setter: F) -> Self
    where
        D: Injectable,
        F: Fn(&T, Arc<D>) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.setter_with_key(BeanKey::qualified::<D>(qualifier), setter)
    }

    fn setter_with_key<D, F>(self, key: BeanKey, setter: F) -> Self
    where
        D: Injectable,
        F: Fn(&T, Arc<D>) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let injector: Injector = Arc::new(move |bean: &Instance, value: Instance| {
            let (bean, value) = downcast_pair::<T, D>(bean, value)?;
            setter(bean, value)
        });
        self.push(key, InjectionStrategy::Setter, Some(injector))
    }

    /// Field dependency, the container writes the [`Late`] slot once the bean is allocated
    pub fn field<D, F>(self, field: F) -> Self
    where
        D: Injectable,
        F: Fn(&T) -> &Late<D> + Send + Sync + 'static,
    {
        self.field_with_key(BeanKey::of::<D>(), field)
    }

    pub fn field_qualified<D, F>(self, qualifier: impl Into<String>, field: F) -> Self
    where
        D: Injectable,
        F: Fn(&T) -> &Late<D> + Send + Sync + 'static,
    {
        self.field_with_key(BeanKey::qualified::<D>(qualifier), field)
    }

    fn field_with_key<D, F>(self, key: BeanKey, field: F) -> Self
    where
        D: Injectable,
        F: Fn(&T) -> &Late<D> + Send + Sync + 'static,
    {
        let injector: Injector = Arc::new(move |bean: &Instance, value: Instance| {
            let (bean, value) = downcast_pair::<T, D>(bean, value)?;
            field(bean).set(value)?;
            Ok(())
        });
        self.push(key, InjectionStrategy::Field, Some(injector))
    }

    /// Runs once the bean is fully wired
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.definition.on_init = Some(erase_hook(hook));
        self
    }

    /// Runs on container shutdown, singletons only
    pub fn on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.definition.on_destroy = Some(erase_hook(hook));
        self
    }

    pub fn build(self) -> BeanDefinition {
        self.definition
    }
}

impl<T: Injectable> From<BeanDefinitionBuilder<T>> for BeanDefinition {
    fn from(builder: BeanDefinitionBuilder<T>) -> Self {
        builder.build()
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Expected an instance of '{expected}' but got '{actual}'")]
struct InjectionTypeMismatch {
    expected: &'static str,
    actual: &'static str,
}

fn downcast_pair<T: Injectable, D: Injectable>(
    bean: &Instance,
    value: Instance,
) -> Result<(&T, Arc<D>), InjectionTypeMismatch> {
    let bean = bean
        .downcast_ref::<T>()
        .map_err(|actual| InjectionTypeMismatch {
            expected: std::any::type_name::<T>(),
            actual,
        })?;
    let value = value
        .downcast::<D>()
        .map_err(|actual| InjectionTypeMismatch {
            expected: std::any::type_name::<D>(),
            actual,
        })?;
    Ok((bean, value))
}

fn erase_hook<T, F>(hook: F) -> Hook
where
    T: Injectable,
    F: Fn(&T) -> Result<(), DynError> + Send + Sync + 'static,
{
    Arc::new(move |bean: &Instance| {
        let bean = bean
            .downcast_ref::<T>()
            .map_err(|actual| InjectionTypeMismatch {
                expected: std::any::type_name::<T>(),
                actual,
            })?;
        hook(bean)
    })
}
