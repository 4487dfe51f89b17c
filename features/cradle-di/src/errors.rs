use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    container::Lifecycle,
    dependency_graph::DependencyGraphErrors,
    types::{BeanKey, DynError},
};

/// A bean with the same type and qualifier is already registered
#[derive(Error, Debug, Clone)]
#[error("A bean has been registered twice: '{0}'")]
pub struct DuplicateDefinitionError(pub BeanKey);

/// No definition satisfies a reference
#[derive(Error, Debug, Clone)]
pub struct BeanNotFoundError {
    pub requested: BeanKey,
    /// The bean declaring the reference, None for direct requests
    pub required_by: Option<BeanKey>,
}
impl fmt::Display for BeanNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.required_by {
            Some(required_by) => write!(
                f,
                "'{required_by}' needs '{}' but it is missing",
                self.requested
            ),
            None => write!(f, "No bean satisfies '{}'", self.requested),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    /// Several candidates and none is primary
    NoPrimary,
    /// Several candidates are marked primary
    MultiplePrimaries,
}

/// More than one definition satisfies an unqualified reference
#[derive(Error, Debug, Clone)]
#[error("'{requested}' is ambiguous ({reason:?}), candidates: {}", display_keys(.candidates))]
pub struct AmbiguousDefinitionError {
    pub requested: BeanKey,
    pub candidates: Vec<BeanKey>,
    pub reason: Ambiguity,
    pub required_by: Option<BeanKey>,
}

/// A cycle in which every edge requires the dependency at construction time
#[derive(Error, Debug, Clone)]
#[error("A circular dependency exists through {} - consider setter or field injection", display_chain(.chain))]
pub struct CircularDependencyError {
    /// Beans on the cycle, the first one repeated at the end
    pub chain: Vec<BeanKey>,
}

/// The step of building a bean that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Constructor,
    Factory,
    Setter,
    Field,
    Init,
}
impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Constructor => "constructor",
            Stage::Factory => "factory",
            Stage::Setter => "setter injection",
            Stage::Field => "field injection",
            Stage::Init => "init hook",
        })
    }
}

/// Building a bean failed, the definition stays failed for the lifetime of the container
#[derive(Error, Debug, Clone)]
#[error("Failed to instantiate '{bean}' in {stage} - error: {error}")]
pub struct InstantiationError {
    pub bean: BeanKey,
    pub stage: Stage,
    pub error: Arc<DynError>,
}
impl InstantiationError {
    pub(crate) fn new(bean: BeanKey, stage: Stage, error: DynError) -> Self {
        Self {
            bean,
            stage,
            error: Arc::new(error),
        }
    }
}

/// An operation was called in the wrong lifecycle state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{operation}' is not allowed while the container is {state:?}")]
pub struct IllegalStateError {
    pub operation: &'static str,
    pub state: Lifecycle,
}

/// Errors of [`Container::register`](crate::Container::register)
#[derive(Error, Debug, Clone)]
pub enum RegistrationError {
    #[error(transparent)]
    Duplicate(#[from] DuplicateDefinitionError),
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
}

/// Errors of [`Container::build`](crate::Container::build)
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    /// The registered definitions do not form a valid graph
    #[error(transparent)]
    Graph(#[from] DependencyGraphErrors),
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
    /// An eagerly created singleton failed
    #[error(transparent)]
    Instantiation(#[from] InstantiationError),
    /// An eagerly created singleton could not be resolved for another reason
    #[error(transparent)]
    Resolution(ResolutionError),
}
impl From<ResolutionError> for BuildError {
    fn from(error: ResolutionError) -> Self {
        match error {
            ResolutionError::Instantiation(error) => BuildError::Instantiation(error),
            ResolutionError::IllegalState(error) => BuildError::IllegalState(error),
            error => BuildError::Resolution(error),
        }
    }
}

/// Errors when requesting a bean
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error(transparent)]
    NotFound(#[from] BeanNotFoundError),
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousDefinitionError),
    #[error(transparent)]
    Instantiation(#[from] InstantiationError),
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
    /// Constructor cycle met at runtime, the build phase rejects these
    #[error(transparent)]
    CircularDependency(#[from] CircularDependencyError),
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
}

/// A destroy hook failed during shutdown
#[derive(Error, Debug, Clone)]
#[error("Destroy hook of '{bean}' failed - error: {error}")]
pub struct DestroyFailure {
    pub bean: BeanKey,
    pub error: Arc<DynError>,
}

/// Errors of [`Container::shutdown`](crate::Container::shutdown)
#[derive(Error, Debug, Clone)]
pub enum ShutdownError {
    #[error(transparent)]
    IllegalState(#[from] IllegalStateError),
    /// Every hook ran, these failed
    #[error("{} destroy hook(s) failed: {}", .0.len(), display_failures(.0))]
    DestroyFailed(Vec<DestroyFailure>),
}

fn display_keys(keys: &[BeanKey]) -> String {
    keys.iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_chain(chain: &[BeanKey]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn display_failures(failures: &[DestroyFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.bean.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn circular_error_lists_chain() {
        let error = CircularDependencyError {
            chain: vec![BeanKey::of::<A>(), BeanKey::of::<B>(), BeanKey::of::<A>()],
        };

        let message = error.to_string();
        assert!(message.contains("::A -> "), "{message}");
        assert!(message.contains("::B -> "), "{message}");
    }

    #[test]
    fn not_found_names_dependent() {
        let direct = BeanNotFoundError {
            requested: BeanKey::of::<A>(),
            required_by: None,
        };
        let nested = BeanNotFoundError {
            requested: BeanKey::of::<A>(),
            required_by: Some(BeanKey::of::<B>()),
        };

        assert!(direct.to_string().starts_with("No bean satisfies"));
        assert!(nested.to_string().contains("needs"));
    }
}
