use std::fmt::{self, Write};

use thiserror::Error;

use crate::{
    definition::InjectionStrategy,
    errors::{AmbiguousDefinitionError, BeanNotFoundError, CircularDependencyError},
    registry::{BeanDefinitionRegistry, BeanId, LookupError},
    scope::Scope,
    types::BeanKey,
};

/// Index of an edge, edges are numbered in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(usize);
impl EdgeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// `dependent` requires `dependency` to exist first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub dependent: BeanId,
    pub dependency: BeanId,
    pub strategy: InjectionStrategy,
    /// Position in the dependent's declared dependency list
    pub ordinal: usize,
}

#[derive(Debug, Clone)]
struct GraphNode {
    key: BeanKey,
    scope: Scope,
    /// Outgoing edges in declaration order
    edges: Vec<EdgeId>,
}

/// Graph of the entire application
/// Used to order instantiation, check circular dependencies and enables visualization
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<DependencyEdge>,
}
impl DependencyGraph {
    /// Resolves every declared dependency of every definition
    ///
    /// Returns a list of all issues
    pub fn build(registry: &BeanDefinitionRegistry) -> Result<Self, DependencyGraphErrors> {
        let mut errors: Vec<DependencyGraphError> = registry
            .validate()
            .into_iter()
            .map(DependencyGraphError::from)
            .collect();

        let mut graph = Self {
            nodes: Vec::with_capacity(registry.len()),
            edges: Vec::new(),
        };

        for (id, definition) in registry.iter() {
            let mut node = GraphNode {
                key: definition.key().clone(),
                scope: definition.scope(),
                edges: Vec::with_capacity(definition.dependencies().len()),
            };

            for (ordinal, dependency) in definition.dependencies().iter().enumerate() {
                let target = match registry.lookup(dependency.key()) {
                    Ok(target) => target,
                    Err(error) => {
                        errors.push(error.required_by(definition.key()).into());
                        continue;
                    }
                };

                node.edges.push(EdgeId(graph.edges.len()));
                graph.edges.push(DependencyEdge {
                    dependent: id,
                    dependency: target,
                    strategy: dependency.strategy(),
                    ordinal,
                });
            }

            graph.nodes.push(node);
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        tracing::debug!(
            "Dependency graph built with {} beans and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge(&self, id: EdgeId) -> &DependencyEdge {
        &self.edges[id.0]
    }

    /// All edges in declaration order
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &DependencyEdge)> {
        self.edges
            .iter()
            .enumerate()
            .map(|(index, edge)| (EdgeId(index), edge))
    }

    /// Outgoing edges of a bean in declaration order
    pub fn dependencies_of(&self, id: BeanId) -> &[EdgeId] {
        &self.nodes[id.index()].edges
    }

    pub fn key(&self, id: BeanId) -> &BeanKey {
        &self.nodes[id.index()].key
    }

    pub fn scope(&self, id: BeanId) -> Scope {
        self.nodes[id.index()].scope
    }

    pub fn beans(&self) -> impl Iterator<Item = BeanId> {
        (0..self.nodes.len()).map(BeanId::new)
    }

    /// Renders the graph in Graphviz DOT
    ///
    /// Constructor edges are solid, setter edges dashed and field edges dotted.
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph beans {\n    rankdir=LR;\n");
        for (index, node) in self.nodes.iter().enumerate() {
            let shape = match node.scope {
                Scope::Singleton => "box",
                Scope::Prototype => "ellipse",
            };
            let _ = writeln!(
                dot,
                "    n{index} [label=\"{}\", shape={shape}];",
                node.key.to_string().replace('"', "\\\"")
            );
        }
        for edge in &self.edges {
            let style = match edge.strategy {
                InjectionStrategy::Constructor => "solid",
                InjectionStrategy::Setter => "dashed",
                InjectionStrategy::Field => "dotted",
            };
            let _ = writeln!(
                dot,
                "    n{} -> n{} [style={style}];",
                edge.dependent.index(),
                edge.dependency.index()
            );
        }
        dot.push_str("}\n");
        dot
    }
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error(transparent)]
    MissingDependency(#[from] BeanNotFoundError),
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousDefinitionError),
    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),
}
impl From<LookupError> for DependencyGraphError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound(error) => Self::MissingDependency(error),
            LookupError::Ambiguous(error) => Self::Ambiguous(error),
        }
    }
}

impl fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
impl DependencyGraphErrors {
    pub(crate) fn single(error: impl Into<DependencyGraphError>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }

    pub fn has_circular_dependency(&self) -> bool {
        self.errors
            .iter()
            .any(|error| matches!(error, DependencyGraphError::CircularDependency(_)))
    }

    pub fn has_missing_dependency(&self) -> bool {
        self.errors
            .iter()
            .any(|error| matches!(error, DependencyGraphError::MissingDependency(_)))
    }

    pub fn has_ambiguous_definition(&self) -> bool {
        self.errors
            .iter()
            .any(|error| matches!(error, DependencyGraphError::Ambiguous(_)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use super::*;
    use crate::{definition::BeanDefinition, late::Late};

    struct Engine;
    struct Wheel;
    struct Car {
        _engine: Arc<Engine>,
        wheel: Late<Wheel>,
    }

    fn registry() -> BeanDefinitionRegistry {
        let mut registry = BeanDefinitionRegistry::new();
        registry
            .register(BeanDefinition::constructor(|_| Ok(Engine)).build())
            .unwrap();
        registry
            .register(BeanDefinition::constructor(|_| Ok(Wheel)).prototype().build())
            .unwrap();
        registry
            .register(
                BeanDefinition::constructor(|args| {
                    Ok(Car {
                        _engine: args.next()?,
                        wheel: Late::new(),
                    })
                })
                .depends_on::<Engine>()
                .field(|car| &car.wheel)
                .build(),
            )
            .unwrap();
        registry
    }

    #[rstest]
    fn edges_follow_declaration_order() {
        // Act
        let graph = DependencyGraph::build(&registry()).unwrap();

        // Assert
        let car = BeanId::new(2);
        let edges: Vec<_> = graph
            .dependencies_of(car)
            .iter()
            .map(|id| *graph.edge(*id))
            .collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].dependency, BeanId::new(0));
        assert_eq!(edges[0].strategy, InjectionStrategy::Constructor);
        assert_eq!(edges[1].dependency, BeanId::new(1));
        assert_eq!(edges[1].strategy, InjectionStrategy::Field);
        assert_eq!(edges[1].ordinal, 1);
    }

    #[rstest]
    fn every_missing_reference_is_reported() {
        // Arrange
        struct Radio;
        struct Map;
        let mut registry = BeanDefinitionRegistry::new();
        registry
            .register(
                BeanDefinition::constructor(|_| Ok(Engine))
                    .depends_on::<Radio>()
                    .depends_on::<Map>()
                    .build(),
            )
            .unwrap();

        // Act
        let errors = DependencyGraph::build(&registry).unwrap_err();

        // Assert
        assert_eq!(errors.errors.len(), 2);
        assert!(errors.has_missing_dependency());
        let message = errors.to_string();
        assert!(message.contains("Radio"), "{message}");
        assert!(message.contains("Map"), "{message}");
    }

    #[rstest]
    fn dot_output_styles_edges_by_strategy() {
        // Act
        let dot = DependencyGraph::build(&registry()).unwrap().to_dot();

        // Assert
        assert!(dot.starts_with("digraph beans {"));
        assert!(dot.contains("n2 -> n0 [style=solid];"));
        assert!(dot.contains("n2 -> n1 [style=dotted];"));
        assert!(dot.contains("shape=ellipse"));
    }
}
