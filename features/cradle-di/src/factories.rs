use std::{marker::PhantomData, sync::Arc};

use crate::types::{BeanKey, DynError, Injectable, Instance, TypeInfo};

/// A Factory providing instances of a given type
///
/// Factories declare their own dependencies, which are resolved before [`BeanFactory::create`]
/// is called and handed over in declared order.
pub trait BeanFactory: Send + Sync + 'static {
    type Provides: Injectable;

    /// Returns the typeinfo about the factory's provided type
    fn supplies() -> TypeInfo {
        TypeInfo::of::<Self::Provides>()
    }

    /// Returns the dependencies the factory requires to supply it's type
    fn dependencies() -> Vec<BeanKey>;

    /// Creates a new instance of the factory's provided type
    fn create(
        &self,
        args: &mut Arguments<'_>,
    ) -> Result<Self::Provides, impl Into<DynError>>;
}

/// Constructor arguments, in the order the dependencies were declared
pub struct Arguments<'a> {
    bean: &'a BeanKey,
    values: &'a [Instance],
    cursor: usize,
}

/// Errors when reading constructor arguments
#[derive(thiserror::Error, Debug, Clone)]
pub enum ArgumentError {
    #[error("'{bean}' requested argument {index} but only {count} were declared")]
    Missing {
        bean: BeanKey,
        index: usize,
        count: usize,
    },
    #[error("'{bean}' argument {index} is '{actual}', not '{expected}'")]
    TypeMismatch {
        bean: BeanKey,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(bean: &'a BeanKey, values: &'a [Instance]) -> Self {
        Self {
            bean,
            values,
            cursor: 0,
        }
    }

    /// The bean being constructed
    pub fn bean(&self) -> &BeanKey {
        self.bean
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument
    pub fn next<T: Injectable>(&mut self) -> Result<Arc<T>, ArgumentError> {
        let value = self.get(self.cursor)?;
        self.cursor += 1;
        Ok(value)
    }

    /// Reads the argument at `index` without moving the cursor
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, ArgumentError> {
        let Some(instance) = self.values.get(index) else {
            return Err(ArgumentError::Missing {
                bean: self.bean.clone(),
                index,
                count: self.values.len(),
            });
        };

        instance
            .downcast::<T>()
            .map_err(|actual| ArgumentError::TypeMismatch {
                bean: self.bean.clone(),
                index,
                expected: std::any::type_name::<T>(),
                actual,
            })
    }
}

/// Wrapper Trait for factories, providing instances of Any
pub(crate) trait DynFactory: Send + Sync {
    fn supplies(&self) -> TypeInfo;

    /// Constructs a new instance of the factory's provided type
    fn create(&self, args: &mut Arguments<'_>) -> Result<Instance, DynError>;
}

/// Adapts a [`BeanFactory`] implementation
pub(crate) struct FactoryAdapter<F>(pub F);
impl<F: BeanFactory> DynFactory for FactoryAdapter<F> {
    fn supplies(&self) -> TypeInfo {
        F::supplies()
    }

    fn create(&self, args: &mut Arguments<'_>) -> Result<Instance, DynError> {
        // Forward the call to the specific implementation
        self.0.create(args).map(Instance::new).map_err(Into::into)
    }
}

/// Adapts a constructor or factory closure
pub(crate) struct FnFactory<T, F> {
    create: F,
    _marker: PhantomData<fn() -> T>,
}
impl<T, F> FnFactory<T, F> {
    pub(crate) fn new(create: F) -> Self {
        Self {
            create,
            _marker: PhantomData,
        }
    }
}
impl<T, F> DynFactory for FnFactory<T, F>
where
    T: Injectable,
    F: Fn(&mut Arguments<'_>) -> Result<T, DynError> + Send + Sync,
{
    fn supplies(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn create(&self, args: &mut Arguments<'_>) -> Result<Instance, DynError> {
        (self.create)(args).map(Instance::new)
    }
}

/// Hands out an instance that already exists
pub(crate) struct Prebuilt(pub Instance);
impl DynFactory for Prebuilt {
    fn supplies(&self) -> TypeInfo {
        self.0.info
    }

    fn create(&self, _: &mut Arguments<'_>) -> Result<Instance, DynError> {
        Ok(self.0.clone())
    }
}
