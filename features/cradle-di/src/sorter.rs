//! Cycle detection and instantiation order.
//!
//! Cycles are detected with a coloured depth first search over the beans in registration
//! order. A cycle made only of constructor edges can never be satisfied and aborts the
//! build. Any other cycle is resolved by breaking its earliest declared setter or field
//! edge, after which detection starts over. The remaining acyclic graph is ordered
//! dependency first with Kahn's algorithm, ties going to the bean registered first.

use std::collections::BTreeSet;

use crate::{
    dependency_graph::{DependencyEdge, DependencyGraph, DependencyGraphErrors, EdgeId},
    errors::CircularDependencyError,
    registry::BeanId,
};

/// Strongly connected component of the full dependency graph
///
/// Beans of a resolvable cycle share a group, every other bean is a group of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(usize);
impl GroupId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Result of sorting the dependency graph
#[derive(Debug, Clone)]
pub struct InstantiationPlan {
    order: Vec<BeanId>,
    broken_edges: Vec<EdgeId>,
    groups: Vec<GroupId>,
    group_count: usize,
}
impl InstantiationPlan {
    /// Every bean, dependencies before their dependents
    pub fn order(&self) -> &[BeanId] {
        &self.order
    }

    /// Edges ignored for ordering, they are wired after allocation
    pub fn broken_edges(&self) -> &[EdgeId] {
        &self.broken_edges
    }

    pub fn is_broken(&self, edge: EdgeId) -> bool {
        self.broken_edges.contains(&edge)
    }

    pub fn group_of(&self, bean: BeanId) -> GroupId {
        self.groups[bean.index()]
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Computes the instantiation plan
///
/// With `allow_circular_references` unset every cycle is rejected, not only the
/// constructor-only ones.
pub fn plan(
    graph: &DependencyGraph,
    allow_circular_references: bool,
) -> Result<InstantiationPlan, DependencyGraphErrors> {
    // Prototypes wired to each other would create instances forever
    let prototype_cycle = find_cycle(graph, |_, edge| {
        !graph.scope(edge.dependent).is_singleton() && !graph.scope(edge.dependency).is_singleton()
    });
    if let Some(cycle) = prototype_cycle {
        return Err(DependencyGraphErrors::single(chain(graph, &cycle)));
    }

    let mut active = vec![true; graph.edges().count()];
    let mut broken_edges = Vec::new();

    while let Some(cycle) = find_cycle(graph, |id, _| active[id.index()]) {
        let breakable = cycle
            .iter()
            .copied()
            .filter(|id| !graph.edge(*id).strategy.is_constructor())
            .min();

        let edge = match breakable {
            Some(edge) if allow_circular_references => edge,
            _ => return Err(DependencyGraphErrors::single(chain(graph, &cycle))),
        };

        let broken = graph.edge(edge);
        tracing::debug!(
            "Breaking circular reference '{}' -> '{}' ({:?} injection)",
            graph.key(broken.dependent),
            graph.key(broken.dependency),
            broken.strategy
        );
        active[edge.index()] = false;
        broken_edges.push(edge);
    }

    let order = kahn(graph, &active);
    let (groups, group_count) = components(graph);

    Ok(InstantiationPlan {
        order,
        broken_edges,
        groups,
        group_count,
    })
}

/// First cycle reachable through the edges accepted by `active`
///
/// Returned as its edges, starting with the edge leaving the bean the cycle closes on.
fn find_cycle(
    graph: &DependencyGraph,
    active: impl Fn(EdgeId, &DependencyEdge) -> bool,
) -> Option<Vec<EdgeId>> {
    let mut color = vec![Color::Unvisited; graph.len()];
    // Length of `path` when the bean was entered
    let mut entered = vec![0; graph.len()];
    let mut path: Vec<EdgeId> = Vec::new();

    for root in graph.beans() {
        if color[root.index()] != Color::Unvisited {
            continue;
        }
        color[root.index()] = Color::InProgress;
        let mut stack = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let bean = frame.0;
            let Some(&id) = graph.dependencies_of(bean).get(frame.1) else {
                color[bean.index()] = Color::Done;
                stack.pop();
                path.pop();
                continue;
            };
            frame.1 += 1;

            let edge = graph.edge(id);
            if !active(id, edge) {
                continue;
            }

            let next = edge.dependency;
            match color[next.index()] {
                Color::Unvisited => {
                    color[next.index()] = Color::InProgress;
                    entered[next.index()] = path.len();
                    path.push(id);
                    stack.push((next, 0));
                }
                Color::InProgress => {
                    let mut cycle = path[entered[next.index()]..].to_vec();
                    cycle.push(id);
                    return Some(cycle);
                }
                Color::Done => {}
            }
        }
    }

    None
}

fn chain(graph: &DependencyGraph, cycle: &[EdgeId]) -> CircularDependencyError {
    let mut chain: Vec<_> = cycle
        .iter()
        .map(|id| graph.key(graph.edge(*id).dependent).clone())
        .collect();
    if let Some(first) = chain.first().cloned() {
        chain.push(first);
    }
    CircularDependencyError { chain }
}

/// Dependency first order of the active edges, ties go to the lowest [`BeanId`]
fn kahn(graph: &DependencyGraph, active: &[bool]) -> Vec<BeanId> {
    let mut waiting_on = vec![0_usize; graph.len()];
    let mut dependents: Vec<Vec<BeanId>> = vec![Vec::new(); graph.len()];

    for (id, edge) in graph.edges() {
        if active[id.index()] {
            waiting_on[edge.dependent.index()] += 1;
            dependents[edge.dependency.index()].push(edge.dependent);
        }
    }

    let mut ready: BTreeSet<BeanId> = graph
        .beans()
        .filter(|bean| waiting_on[bean.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(bean) = ready.pop_first() {
        order.push(bean);
        for dependent in &dependents[bean.index()] {
            waiting_on[dependent.index()] -= 1;
            if waiting_on[dependent.index()] == 0 {
                ready.insert(*dependent);
            }
        }
    }

    order
}

/// Tarjan's strongly connected components over every edge
fn components(graph: &DependencyGraph) -> (Vec<GroupId>, usize) {
    let count = graph.len();
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack: Vec<usize> = Vec::new();
    let mut groups = vec![GroupId(0); count];
    let mut next_index = 0;
    let mut next_group = 0;

    for root in graph.beans() {
        if index[root.index()].is_some() {
            continue;
        }

        index[root.index()] = Some(next_index);
        lowlink[root.index()] = next_index;
        next_index += 1;
        stack.push(root.index());
        on_stack[root.index()] = true;
        let mut calls = vec![(root, 0)];

        while let Some(frame) = calls.last_mut() {
            let bean = frame.0.index();
            if let Some(&id) = graph.dependencies_of(frame.0).get(frame.1) {
                frame.1 += 1;
                let next = graph.edge(id).dependency;
                match index[next.index()] {
                    None => {
                        index[next.index()] = Some(next_index);
                        lowlink[next.index()] = next_index;
                        next_index += 1;
                        stack.push(next.index());
                        on_stack[next.index()] = true;
                        calls.push((next, 0));
                    }
                    Some(visited) if on_stack[next.index()] => {
                        lowlink[bean] = lowlink[bean].min(visited);
                    }
                    Some(_) => {}
                }
                continue;
            }

            calls.pop();
            if let Some(parent) = calls.last() {
                let parent = parent.0.index();
                lowlink[parent] = lowlink[parent].min(lowlink[bean]);
            }

            if Some(lowlink[bean]) == index[bean] {
                while let Some(member) = stack.pop() {
                    on_stack[member] = false;
                    groups[member] = GroupId(next_group);
                    if member == bean {
                        break;
                    }
                }
                next_group += 1;
            }
        }
    }

    (groups, next_group)
}
