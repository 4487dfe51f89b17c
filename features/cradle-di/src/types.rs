use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// Boxed error returned by user supplied constructors, factories and hooks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Beans are shared between threads once the container is built
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Identity of a bean: its type plus an optional qualifier.
///
/// The same key is used to reference a dependency. A reference without a
/// qualifier matches any definition of the type (see
/// [`BeanDefinitionRegistry::lookup`](crate::registry::BeanDefinitionRegistry::lookup)).
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct BeanKey {
    pub type_info: TypeInfo,
    pub qualifier: Option<String>,
}
impl BeanKey {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: None,
        }
    }

    pub fn qualified<T: 'static + ?Sized>(qualifier: impl Into<String>) -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            qualifier: Some(qualifier.into()),
        }
    }

    pub fn new(type_info: TypeInfo, qualifier: Option<&str>) -> Self {
        Self {
            type_info,
            qualifier: qualifier.map(str::to_owned),
        }
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}
impl fmt::Display for BeanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}[{}]", self.type_info, qualifier),
            None => write!(f, "{}", self.type_info),
        }
    }
}

/// A constructed bean, type erased
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<T: Injectable>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    pub fn downcast_ref<T: Injectable>(&self) -> Result<&T, &'static str> {
        self.instance
            .downcast_ref::<T>()
            .ok_or(self.info.type_name)
    }

    /// Both handles point at the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}
