use std::{any::TypeId, collections::HashMap, fmt};

use crate::{
    definition::BeanDefinition,
    errors::{
        Ambiguity, AmbiguousDefinitionError, BeanNotFoundError, DuplicateDefinitionError,
        ResolutionError,
    },
    types::{BeanKey, TypeInfo},
};

/// Index of a definition, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BeanId(usize);
impl BeanId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}
impl fmt::Display for BeanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Failure of [`BeanDefinitionRegistry::lookup`]
#[derive(thiserror::Error, Debug, Clone)]
pub enum LookupError {
    #[error(transparent)]
    NotFound(#[from] BeanNotFoundError),
    #[error(transparent)]
    Ambiguous(#[from] AmbiguousDefinitionError),
}
impl LookupError {
    /// Attach the bean declaring the failed reference
    pub(crate) fn required_by(mut self, dependent: &BeanKey) -> Self {
        match &mut self {
            LookupError::NotFound(error) => error.required_by = Some(dependent.clone()),
            LookupError::Ambiguous(error) => error.required_by = Some(dependent.clone()),
        }
        self
    }
}
impl From<LookupError> for ResolutionError {
    fn from(error: LookupError) -> Self {
        match error {
            LookupError::NotFound(error) => ResolutionError::NotFound(error),
            LookupError::Ambiguous(error) => ResolutionError::Ambiguous(error),
        }
    }
}

/// Holds the definition of every known bean
///
/// Pure data, immutable once the container is built.
#[derive(Default, Debug)]
pub struct BeanDefinitionRegistry {
    definitions: Vec<BeanDefinition>,
    by_type: HashMap<TypeId, Vec<BeanId>>,
}

impl BeanDefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition
    ///
    /// Fails if a definition with the same type and qualifier exists. Unqualified duplicates
    /// are accepted here and must be settled with a primary before the container is built.
    pub fn register(
        &mut self,
        definition: BeanDefinition,
    ) -> Result<BeanId, DuplicateDefinitionError> {
        let key = definition.key();
        if key.qualifier.is_some() && self.find_exact(key).is_some() {
            return Err(DuplicateDefinitionError(key.clone()));
        }

        let id = BeanId(self.definitions.len());
        tracing::debug!("Registered '{}' as {} ({})", key, id, definition.scope());
        self.by_type
            .entry(key.type_info.type_id)
            .or_default()
            .push(id);
        self.definitions.push(definition);
        Ok(id)
    }

    /// Finds the unique definition satisfying `key`
    ///
    /// - with a qualifier, only the definition carrying exactly that qualifier matches
    /// - without one, the only definition of the type, or else its single primary
    pub fn lookup(&self, key: &BeanKey) -> Result<BeanId, LookupError> {
        if key.qualifier.is_some() {
            return self.find_exact(key).ok_or_else(|| {
                BeanNotFoundError {
                    requested: key.clone(),
                    required_by: None,
                }
                .into()
            });
        }

        match self.candidates(key.type_info) {
            [] => Err(BeanNotFoundError {
                requested: key.clone(),
                required_by: None,
            }
            .into()),
            [only] => Ok(*only),
            candidates => self.select_primary(key, candidates).map_err(Into::into),
        }
    }

    /// Checks that every unqualified lookup the registry may receive has a unique answer
    pub fn validate(&self) -> Vec<AmbiguousDefinitionError> {
        let mut errors = Vec::new();

        // Walk types in registration order so reports are stable
        let mut seen = std::collections::HashSet::new();
        for definition in &self.definitions {
            let type_info = definition.type_info();
            if !seen.insert(type_info.type_id) {
                continue;
            }

            let candidates = self.candidates(type_info);
            let primaries = candidates
                .iter()
                .filter(|id| self.definitions[id.0].is_primary())
                .count();
            let unqualified = candidates
                .iter()
                .filter(|id| self.definitions[id.0].qualifier().is_none())
                .count();

            let reason = if primaries > 1 {
                Ambiguity::MultiplePrimaries
            } else if unqualified > 1 && primaries == 0 {
                Ambiguity::NoPrimary
            } else {
                continue;
            };

            errors.push(AmbiguousDefinitionError {
                requested: BeanKey::new(type_info, None),
                candidates: self.keys(candidates),
                reason,
                required_by: None,
            });
        }

        errors
    }

    /// Every definition of a type, in registration order
    pub fn candidates(&self, type_info: TypeInfo) -> &[BeanId] {
        self.by_type
            .get(&type_info.type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn definition(&self, id: BeanId) -> &BeanDefinition {
        &self.definitions[id.0]
    }

    pub fn get(&self, id: BeanId) -> Option<&BeanDefinition> {
        self.definitions.get(id.0)
    }

    /// All definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = (BeanId, &BeanDefinition)> {
        self.definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| (BeanId(index), definition))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn find_exact(&self, key: &BeanKey) -> Option<BeanId> {
        self.candidates(key.type_info)
            .iter()
            .copied()
            .find(|id| self.definitions[id.0].key() == key)
    }

    fn select_primary(
        &self,
        key: &BeanKey,
        candidates: &[BeanId],
    ) -> Result<BeanId, AmbiguousDefinitionError> {
        let mut primaries = candidates
            .iter()
            .filter(|id| self.definitions[id.0].is_primary());

        match (primaries.next(), primaries.next()) {
            (Some(primary), None) => Ok(*primary),
            (first, _) => Err(AmbiguousDefinitionError {
                requested: key.clone(),
                candidates: self.keys(candidates),
                reason: if first.is_some() {
                    Ambiguity::MultiplePrimaries
                } else {
                    Ambiguity::NoPrimary
                },
                required_by: None,
            }),
        }
    }

    fn keys(&self, ids: &[BeanId]) -> Vec<BeanKey> {
        ids.iter()
            .map(|id| self.definitions[id.0].key().clone())
            .collect()
    }
}
