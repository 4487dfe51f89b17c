//! Cradle Config provides a registry of configs that can be injected in the rest of the
//! application.
//!
//! Configs are plain values. Once installed into a [`Container`](cradle_di::Container)
//! they are singleton beans, a bean declares a config as a dependency like any other.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cradle_config::provider::ConfigProvider;
//! use cradle_di::{BeanDefinition, Container};
//!
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! struct Server {
//!     config: Arc<AppConfig>,
//! }
//!
//! let mut provider = ConfigProvider::initialize();
//! provider
//!     .add_config(AppConfig {
//!         host: "localhost".to_string(),
//!         port: 8080,
//!     })
//!     .unwrap();
//!
//! let mut container = Container::new();
//! provider.install(&mut container).unwrap();
//! container
//!     .register(
//!         BeanDefinition::constructor(|args| Ok(Server { config: args.next()? }))
//!             .depends_on::<AppConfig>(),
//!     )
//!     .unwrap();
//! container.build().unwrap();
//!
//! let server = container.get::<Server>().unwrap();
//! assert_eq!(server.config.port, 8080);
//! assert_eq!(server.config.host, "localhost");
//! ```

pub mod errors;
pub mod provider;
