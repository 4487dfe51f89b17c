/// Settings of a [`Container`](crate::Container)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerConfig {
    /// Shown in log output
    pub name: String,
    /// Create every singleton during [`Container::build`](crate::Container::build)
    pub eager_singletons: bool,
    /// Resolve cycles through setter and field injection, otherwise every cycle fails the build
    pub allow_circular_references: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "cradle".to_string(),
            eager_singletons: false,
            allow_circular_references: true,
        }
    }
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn eager_singletons(mut self, eager: bool) -> Self {
        self.eager_singletons = eager;
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.allow_circular_references = allow;
        self
    }
}
