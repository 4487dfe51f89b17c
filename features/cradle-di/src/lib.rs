//! Dependency injection container with deterministic, cycle safe construction.
//!
//! Beans are described by [`BeanDefinition`]s and registered on a [`Container`].
//! [`Container::build`] resolves every reference up front, rejects constructor cycles and
//! computes the order beans are created in. Cycles through setter or field injection are
//! resolved by allocating first and wiring afterwards.
//!
//! ```
//! use std::sync::Arc;
//! use cradle_di::{BeanDefinition, Container};
//!
//! struct Engine;
//! struct Car {
//!     engine: Arc<Engine>,
//! }
//!
//! let mut container = Container::new();
//! container.register(BeanDefinition::constructor(|_| Ok(Engine))).unwrap();
//! container
//!     .register(
//!         BeanDefinition::constructor(|args| Ok(Car { engine: args.next()? }))
//!             .depends_on::<Engine>(),
//!     )
//!     .unwrap();
//! container.build().unwrap();
//!
//! let car = container.get::<Car>().unwrap();
//! assert!(Arc::ptr_eq(&car.engine, &container.get::<Engine>().unwrap()));
//! ```

mod config;
mod container;
mod definition;
mod dependency_graph;
mod errors;
mod factories;
mod instantiator;
mod late;
mod registry;
mod resolution;
mod scope;
mod sorter;
mod types;

pub use config::ContainerConfig;
pub use container::{Container, Lifecycle};
pub use definition::{BeanDefinition, BeanDefinitionBuilder, Dependency, InjectionStrategy, Origin};
pub use dependency_graph::{
    DependencyEdge, DependencyGraph, DependencyGraphError, DependencyGraphErrors, EdgeId,
};
pub use errors::*;
pub use factories::{ArgumentError, Arguments, BeanFactory};
pub use instantiator::Instantiator;
pub use late::{AlreadyWired, Late};
pub use registry::{BeanDefinitionRegistry, BeanId, LookupError};
pub use scope::{Scope, ScopeManager};
pub use sorter::{plan, GroupId, InstantiationPlan};
pub use types::{BeanKey, DynError, Injectable, Instance, TypeInfo};
