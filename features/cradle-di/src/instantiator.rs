use crate::{
    definition::{BeanDefinition, InjectionStrategy, Origin},
    errors::{InstantiationError, Stage},
    factories::Arguments,
    types::{DynError, Instance},
};

/// Runs the user supplied parts of a definition
///
/// Stateless, knows nothing of scopes or caching. Every failure is tagged with the stage
/// it happened in.
pub struct Instantiator;

impl Instantiator {
    /// Allocates a bean, `arguments` are its resolved constructor dependencies in declared order
    pub fn build(
        definition: &BeanDefinition,
        arguments: &[Instance],
    ) -> Result<Instance, InstantiationError> {
        let stage = match definition.origin() {
            Origin::Factory => Stage::Factory,
            Origin::Constructor | Origin::Instance => Stage::Constructor,
        };

        let mut args = Arguments::new(definition.key(), arguments);
        let instance = definition
            .create(&mut args)
            .map_err(|error| InstantiationError::new(definition.key().clone(), stage, error))?;

        tracing::debug!("Constructed '{}' via {}", definition.key(), stage);
        Ok(instance)
    }

    /// Writes the dependency declared at `ordinal` into an allocated bean
    pub fn inject(
        definition: &BeanDefinition,
        bean: &Instance,
        ordinal: usize,
        value: Instance,
    ) -> Result<(), InstantiationError> {
        let dependency = &definition.dependencies()[ordinal];
        let stage = match dependency.strategy() {
            InjectionStrategy::Field => Stage::Field,
            InjectionStrategy::Setter => Stage::Setter,
            InjectionStrategy::Constructor => {
                let error: DynError = format!(
                    "'{}' is a constructor argument of '{}' and can not be injected",
                    dependency.key(),
                    definition.key()
                )
                .into();
                return Err(InstantiationError::new(
                    definition.key().clone(),
                    Stage::Constructor,
                    error,
                ));
            }
        };

        let Some(injector) = dependency.injector() else {
            let error: DynError =
                format!("'{}' has no injector for '{}'", definition.key(), dependency.key()).into();
            return Err(InstantiationError::new(definition.key().clone(), stage, error));
        };

        injector(bean, value)
            .map_err(|error| InstantiationError::new(definition.key().clone(), stage, error))?;

        tracing::debug!(
            "Wired '{}' into '{}' ({})",
            dependency.key(),
            definition.key(),
            stage
        );
        Ok(())
    }

    /// Runs the init hook of a fully wired bean
    pub fn initialize(definition: &BeanDefinition, bean: &Instance) -> Result<(), InstantiationError> {
        let Some(hook) = definition.on_init() else {
            return Ok(());
        };
        hook(bean).map_err(|error| InstantiationError::new(definition.key().clone(), Stage::Init, error))
    }

    /// Runs the destroy hook
    pub fn destroy(definition: &BeanDefinition, bean: &Instance) -> Result<(), DynError> {
        match definition.on_destroy() {
            Some(hook) => hook(bean),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use rstest::rstest;

    use super::*;
    use crate::late::Late;

    struct Engine;
    struct Car {
        engine: Arc<Engine>,
        radio: Late<Radio>,
        started: AtomicBool,
    }
    struct Radio;

    fn car() -> BeanDefinition {
        BeanDefinition::constructor(|args| {
            Ok(Car {
                engine: args.next()?,
                radio: Late::new(),
                started: AtomicBool::new(false),
            })
        })
        .depends_on::<Engine>()
        .field(|car| &car.radio)
        .on_init(|car| {
            car.started.store(true, Ordering::SeqCst);
            Ok(())
        })
        .build()
    }

    #[rstest]
    fn builds_with_arguments_in_order() {
        // Arrange
        let engine = Instance::new(Engine);

        // Act
        let car = Instantiator::build(&car(), std::slice::from_ref(&engine)).unwrap();

        // Assert
        let car = car.downcast::<Car>().unwrap();
        assert!(Arc::ptr_eq(&car.engine, &engine.downcast::<Engine>().unwrap()));
        assert!(!car.radio.is_wired());
    }

    #[rstest]
    fn injects_then_initializes() {
        // Arrange
        let definition = car();
        let car = Instantiator::build(&definition, &[Instance::new(Engine)]).unwrap();

        // Act
        Instantiator::inject(&definition, &car, 1, Instance::new(Radio)).unwrap();
        Instantiator::initialize(&definition, &car).unwrap();

        // Assert
        let car = car.downcast_ref::<Car>().unwrap();
        assert!(car.radio.is_wired());
        assert!(car.started.load(Ordering::SeqCst));
    }

    #[rstest]
    #[case::constructor(BeanDefinition::constructor(|_| Err::<Engine, _>("boom".into())).build(), Stage::Constructor)]
    #[case::factory(BeanDefinition::factory(|_| Err::<Engine, _>("boom".into())).build(), Stage::Factory)]
    fn failures_name_their_stage(#[case] definition: BeanDefinition, #[case] stage: Stage) {
        // Act
        let error = Instantiator::build(&definition, &[]).unwrap_err();

        // Assert
        assert_eq!(error.stage, stage);
        assert_eq!(error.error.to_string(), "boom");
    }

    #[rstest]
    fn constructor_dependency_can_not_be_injected() {
        // Arrange
        let definition = car();
        let car = Instantiator::build(&definition, &[Instance::new(Engine)]).unwrap();

        // Act
        let error = Instantiator::inject(&definition, &car, 0, Instance::new(Engine))
            .err()
            .unwrap();

        // Assert
        assert_eq!(error.stage, Stage::Constructor);
        assert!(error.to_string().contains("constructor argument"), "{error}");
    }

    #[rstest]
    fn missing_argument_fails_construction() {
        // Act
        let error = Instantiator::build(&car(), &[]).err().unwrap();

        // Assert
        assert_eq!(error.stage, Stage::Constructor);
        assert!(error.to_string().contains("only 0 were declared"), "{error}");
    }
}
