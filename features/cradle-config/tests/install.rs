use std::sync::Arc;

use cradle_config::{errors::ConfigError, provider::ConfigProvider};
use cradle_di::{BeanDefinition, Container, RegistrationError};
use rstest::rstest;

struct DatabaseConfig {
    url: &'static str,
}

struct Repository {
    primary: Arc<DatabaseConfig>,
    replica: Arc<DatabaseConfig>,
}

fn provider() -> ConfigProvider {
    let mut provider = ConfigProvider::initialize();
    provider
        .add_config(DatabaseConfig { url: "db://main" })
        .unwrap()
        .add_named_config("replica", DatabaseConfig { url: "db://replica" })
        .unwrap();
    provider
}

#[rstest]
fn installed_configs_are_injected() {
    // Arrange
    let mut container = Container::new();
    provider().install(&mut container).unwrap();
    container
        .register(
            BeanDefinition::constructor(|args| {
                Ok(Repository {
                    primary: args.next()?,
                    replica: args.next()?,
                })
            })
            .depends_on::<DatabaseConfig>()
            .depends_on_qualified::<DatabaseConfig>("replica"),
        )
        .unwrap();
    container.build().unwrap();

    // Act
    let repository = container.get::<Repository>().unwrap();

    // Assert
    assert_eq!(repository.primary.url, "db://main");
    assert_eq!(repository.replica.url, "db://replica");
    assert!(Arc::ptr_eq(
        &repository.primary,
        &container.get::<DatabaseConfig>().unwrap()
    ));
}

#[rstest]
fn installing_into_built_container_fails() {
    // Arrange
    let mut container = Container::new();
    container.build().unwrap();

    // Act
    let result = provider().install(&mut container);

    // Assert
    assert!(matches!(
        result,
        Err(ConfigError::Install(RegistrationError::IllegalState(_)))
    ));
}

#[rstest]
fn unnamed_config_wins_over_named_variants() {
    // Arrange
    let mut provider = ConfigProvider::initialize();
    provider
        .add_named_config("replica", DatabaseConfig { url: "db://replica" })
        .unwrap()
        .add_config(DatabaseConfig { url: "db://main" })
        .unwrap()
        .add_named_config("archive", DatabaseConfig { url: "db://archive" })
        .unwrap();
    let mut container = Container::new();
    provider.install(&mut container).unwrap();
    container.build().unwrap();

    // Act
    let config = container.get::<DatabaseConfig>().unwrap();

    // Assert
    assert_eq!(config.url, "db://main");
    assert_eq!(
        container
            .get_qualified::<DatabaseConfig>("archive")
            .unwrap()
            .url,
        "db://archive"
    );
}
