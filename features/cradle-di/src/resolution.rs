//! Request time construction of beans.
//!
//! A [`Resolver`] lives for a single request. Beans are built inside transactions, one per
//! construction group. A transaction holds the group lock from the moment its first
//! singleton needs constructing until every bean it allocated is wired, initialized and
//! committed to the [`ScopeManager`]. Setter and field dependencies inside the group are
//! queued and injected after allocation, which is what lets circular references resolve.
//!
//! When a transaction fails, every singleton it allocated is poisoned with the failure, so a
//! definition is never constructed twice.
//!
//! Groups are acyclic among themselves, so locks are only ever taken from dependent to
//! dependency and two requests can not wait on each other.

use std::collections::{HashMap, VecDeque};

use parking_lot::MutexGuard;

use crate::{
    dependency_graph::{DependencyGraph, EdgeId},
    errors::{CircularDependencyError, InstantiationError, ResolutionError},
    instantiator::Instantiator,
    registry::{BeanDefinitionRegistry, BeanId},
    scope::{Scope, ScopeManager},
    sorter::{GroupId, InstantiationPlan},
    types::Instance,
};

/// A post allocation dependency waiting to be injected
struct Wiring {
    bean: BeanId,
    instance: Instance,
    edge: EdgeId,
}

struct Transaction<'c> {
    group: GroupId,
    guard: Option<MutexGuard<'c, ()>>,
    /// Singletons allocated but not yet committed
    allocated: HashMap<BeanId, Instance>,
    /// Allocation order of `allocated`
    created: Vec<BeanId>,
    pending: VecDeque<Wiring>,
    initialize: Vec<(BeanId, Instance)>,
}
impl<'c> Transaction<'c> {
    fn new(group: GroupId) -> Self {
        Self {
            group,
            guard: None,
            allocated: HashMap::new(),
            created: Vec::new(),
            pending: VecDeque::new(),
            initialize: Vec::new(),
        }
    }
}

pub(crate) struct Resolver<'c> {
    registry: &'c BeanDefinitionRegistry,
    graph: &'c DependencyGraph,
    plan: &'c InstantiationPlan,
    scopes: &'c ScopeManager,
    transactions: Vec<Transaction<'c>>,
    /// Beans whose constructor arguments are being resolved
    allocating: Vec<BeanId>,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(
        registry: &'c BeanDefinitionRegistry,
        graph: &'c DependencyGraph,
        plan: &'c InstantiationPlan,
        scopes: &'c ScopeManager,
    ) -> Self {
        Self {
            registry,
            graph,
            plan,
            scopes,
            transactions: Vec::new(),
            allocating: Vec::new(),
        }
    }

    /// Returns the singleton, or a new prototype instance
    pub(crate) fn resolve(&mut self, id: BeanId) -> Result<Instance, ResolutionError> {
        if let Some(failure) = self.scopes.failure(id) {
            return Err(failure.clone().into());
        }

        let group = self.plan.group_of(id);
        match self.graph.scope(id) {
            Scope::Singleton => {
                if let Some(instance) = self.scopes.cached(id) {
                    return Ok(instance);
                }
                let allocated = self
                    .transaction(group)
                    .and_then(|transaction| transaction.allocated.get(&id).cloned());
                if let Some(instance) = allocated {
                    return Ok(instance);
                }
                self.in_transaction(group, |resolver| resolver.create_singleton(id, group))
            }
            Scope::Prototype => self.in_transaction(group, |resolver| {
                let instance = resolver.construct(id)?;
                resolver.wire(id, &instance)?;
                Ok(instance)
            }),
        }
    }

    fn create_singleton(&mut self, id: BeanId, group: GroupId) -> Result<Instance, ResolutionError> {
        let scopes = self.scopes;
        if let Some(transaction) = self.transaction(group) {
            if transaction.guard.is_none() {
                transaction.guard = scopes.lock_group(group);
            }
        }

        // Another request may have finished the bean while we waited
        if let Some(failure) = scopes.failure(id) {
            return Err(failure.clone().into());
        }
        if let Some(instance) = scopes.cached(id) {
            return Ok(instance);
        }

        let instance = self.construct(id)?;
        if let Some(transaction) = self.transaction(group) {
            transaction.allocated.insert(id, instance.clone());
            transaction.created.push(id);
        }
        self.wire(id, &instance)?;
        Ok(instance)
    }

    /// Resolves constructor dependencies and allocates the bean
    fn construct(&mut self, id: BeanId) -> Result<Instance, ResolutionError> {
        if let Some(position) = self.allocating.iter().position(|bean| *bean == id) {
            let mut chain: Vec<_> = self.allocating[position..]
                .iter()
                .map(|bean| self.graph.key(*bean).clone())
                .collect();
            chain.push(self.graph.key(id).clone());
            return Err(CircularDependencyError { chain }.into());
        }

        self.allocating.push(id);
        let arguments = self.constructor_arguments(id);
        self.allocating.pop();
        let arguments = arguments?;

        let definition = self.registry.definition(id);
        Instantiator::build(definition, &arguments).map_err(|error| self.poison(id, error))
    }

    fn constructor_arguments(&mut self, id: BeanId) -> Result<Vec<Instance>, ResolutionError> {
        let graph = self.graph;
        graph
            .dependencies_of(id)
            .iter()
            .map(|edge| graph.edge(*edge))
            .filter(|edge| edge.strategy.is_constructor())
            .map(|edge| self.resolve(edge.dependency))
            .collect()
    }

    /// Injects or queues setter and field dependencies, then queues the init hook
    fn wire(&mut self, id: BeanId, instance: &Instance) -> Result<(), ResolutionError> {
        let graph = self.graph;
        let group = self.plan.group_of(id);

        for &edge_id in graph.dependencies_of(id) {
            let edge = graph.edge(edge_id);
            if edge.strategy.is_constructor() {
                continue;
            }

            if self.plan.group_of(edge.dependency) == group {
                if let Some(transaction) = self.transaction(group) {
                    transaction.pending.push_back(Wiring {
                        bean: id,
                        instance: instance.clone(),
                        edge: edge_id,
                    });
                }
                continue;
            }

            let value = self.resolve(edge.dependency)?;
            self.inject(id, instance, edge_id, value)?;
        }

        if let Some(transaction) = self.transaction(group) {
            transaction.initialize.push((id, instance.clone()));
        }
        Ok(())
    }

    fn inject(
        &self,
        id: BeanId,
        instance: &Instance,
        edge: EdgeId,
        value: Instance,
    ) -> Result<(), ResolutionError> {
        let definition = self.registry.definition(id);
        let ordinal = self.graph.edge(edge).ordinal;
        Instantiator::inject(definition, instance, ordinal, value)
            .map_err(|error| self.poison(id, error))
    }

    /// Runs `work` inside the transaction of `group`, opening one if needed
    fn in_transaction(
        &mut self,
        group: GroupId,
        work: impl FnOnce(&mut Self) -> Result<Instance, ResolutionError>,
    ) -> Result<Instance, ResolutionError> {
        if self.transaction(group).is_some() {
            return work(self);
        }

        self.transactions.push(Transaction::new(group));
        let result = work(self).and_then(|instance| {
            self.complete(group)?;
            Ok(instance)
        });

        // Dropping the transaction releases the group lock, commit first
        let Some(transaction) = self.transactions.pop() else {
            return result;
        };
        match &result {
            Ok(_) => {
                for id in &transaction.created {
                    if let Some(instance) = transaction.allocated.get(id) {
                        self.scopes.commit(*id, instance.clone());
                        tracing::debug!("Committed singleton '{}'", self.graph.key(*id));
                    }
                }
            }
            Err(error) if !transaction.created.is_empty() => {
                tracing::debug!(
                    "Discarding {} uncommitted singleton(s) - error: {}",
                    transaction.created.len(),
                    error
                );
                // Allocated singletons can never complete, keep them from being built again
                if let ResolutionError::Instantiation(failure) = error {
                    for id in &transaction.created {
                        self.scopes.poison(*id, failure.clone());
                    }
                }
            }
            Err(_) => {}
        }
        result
    }

    /// Injects the queued dependencies, then runs init hooks
    fn complete(&mut self, group: GroupId) -> Result<(), ResolutionError> {
        while let Some(wiring) = self.next_wiring(group) {
            let dependency = self.graph.edge(wiring.edge).dependency;
            let value = self.resolve(dependency)?;
            self.inject(wiring.bean, &wiring.instance, wiring.edge, value)?;
        }

        let initialize = self
            .transaction(group)
            .map(|transaction| std::mem::take(&mut transaction.initialize))
            .unwrap_or_default();
        for (id, instance) in initialize {
            Instantiator::initialize(self.registry.definition(id), &instance)
                .map_err(|error| self.poison(id, error))?;
        }
        Ok(())
    }

    fn next_wiring(&mut self, group: GroupId) -> Option<Wiring> {
        self.transaction(group)?.pending.pop_front()
    }

    fn transaction(&mut self, group: GroupId) -> Option<&mut Transaction<'c>> {
        self.transactions
            .iter_mut()
            .rev()
            .find(|transaction| transaction.group == group)
    }

    fn poison(&self, id: BeanId, error: InstantiationError) -> ResolutionError {
        self.scopes.poison(id, error).into()
    }
}
