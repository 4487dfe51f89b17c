use cradle_di::{BeanKey, RegistrationError};

/// Errors of the [`ConfigProvider`](crate::provider::ConfigProvider)
#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    /// A config with the same type and name is already registered
    #[error("The config '{0}' is already registered")]
    AlreadyRegistered(BeanKey),
    /// The required config is not known
    #[error("The config '{0}' is not known")]
    Missing(BeanKey),
    /// Handing the configs to a container failed
    #[error("Failed to install configs into the container - error: {0}")]
    Install(#[from] RegistrationError),
}
