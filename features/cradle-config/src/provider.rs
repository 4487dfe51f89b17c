use std::{collections::HashMap, sync::Arc};

use cradle_di::{BeanDefinition, BeanKey, Container, Injectable, Instance};

use crate::errors::ConfigError;

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type, and optionally a name for
/// several configs of one type. Once filled, [`ConfigProvider::install`] hands every
/// config to a [`Container`] where they are injected like any other singleton.
#[derive(Default)]
pub struct ConfigProvider {
    /// Registration order is kept so installation is reproducible
    configs: Vec<(BeanKey, Instance)>,
    index: HashMap<BeanKey, usize>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn initialize() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    pub fn get_config<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get(&BeanKey::of::<T>())
    }

    /// Retrieve a named config with specified type.
    pub fn get_named_config<T: Injectable>(&self, name: &str) -> Option<Arc<T>> {
        self.get(&BeanKey::qualified::<T>(name))
    }

    /// Retrieve a config with specified type.
    ///
    /// If the config type is not available, it will return a [`ConfigError`]
    pub fn require_config<T: Injectable>(&self) -> Result<Arc<T>, ConfigError> {
        self.get_config()
            .ok_or_else(|| ConfigError::Missing(BeanKey::of::<T>()))
    }

    fn get<T: Injectable>(&self, key: &BeanKey) -> Option<Arc<T>> {
        let index = self.index.get(key)?;
        self.configs[*index].1.downcast().ok()
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigError`] runtime error
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        self.insert(BeanKey::of::<T>(), Instance::new(config))
    }

    /// Add a config under a name, it is injected as a qualified bean
    pub fn add_named_config<T: Injectable>(
        &mut self,
        name: impl Into<String>,
        config: T,
    ) -> Result<&mut Self, ConfigError> {
        self.insert(BeanKey::qualified::<T>(name), Instance::new(config))
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    fn insert(&mut self, key: BeanKey, config: Instance) -> Result<&mut Self, ConfigError> {
        if self.index.contains_key(&key) {
            return Err(ConfigError::AlreadyRegistered(key));
        }

        self.index.insert(key.clone(), self.configs.len());
        self.configs.push((key, config));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers every config as a pre built singleton bean
    ///
    /// Unnamed configs become the primary bean of their type, so named variants do not make
    /// plain references ambiguous.
    pub fn install(&self, container: &mut Container) -> Result<(), ConfigError> {
        for (key, config) in &self.configs {
            let definition = BeanDefinition::from_instance(config.clone(), key.qualifier());
            // The unnamed config is the default of its type
            let definition = match key.qualifier() {
                Some(_) => definition,
                None => definition.mark_primary(),
            };
            container.register(definition)?;
        }
        tracing::debug!("Installed {} config(s)", self.configs.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct ServerConfig {
        port: u16,
    }

    #[rstest]
    fn configs_are_retrieved_by_type_and_name() {
        // Arrange
        let mut provider = ConfigProvider::initialize();
        provider
            .add_config(ServerConfig { port: 80 })
            .unwrap()
            .add_named_config("admin", ServerConfig { port: 8080 })
            .unwrap();

        // Act
        let plain = provider.get_config::<ServerConfig>().unwrap();
        let admin = provider.get_named_config::<ServerConfig>("admin").unwrap();

        // Assert
        assert_eq!(plain.port, 80);
        assert_eq!(admin.port, 8080);
        assert_eq!(provider.len(), 2);
        assert!(provider.get_named_config::<ServerConfig>("other").is_none());
    }

    #[rstest]
    fn duplicates_are_rejected() {
        // Arrange
        let mut provider = ConfigProvider::initialize();
        provider.add_config(ServerConfig { port: 80 }).unwrap();

        // Act
        let result = provider.add_config(ServerConfig { port: 81 });

        // Assert
        assert!(matches!(result, Err(ConfigError::AlreadyRegistered(_))));
        assert_eq!(provider.require_config::<ServerConfig>().unwrap().port, 80);
    }

    #[rstest]
    #[case::some(Some(ServerConfig { port: 1 }), 1)]
    #[case::none(None, 0)]
    fn maybe_add_config_skips_none(#[case] config: Option<ServerConfig>, #[case] expected: usize) {
        // Arrange
        let mut provider = ConfigProvider::initialize();

        // Act
        provider.maybe_add_config(config).unwrap();

        // Assert
        assert_eq!(provider.len(), expected);
    }

    #[rstest]
    fn missing_config_is_an_error() {
        // Act
        let result = ConfigProvider::initialize().require_config::<ServerConfig>();

        // Assert
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }
}
