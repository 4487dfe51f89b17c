use std::{error::Error, sync::Arc};

use cradle_di::{BeanDefinition, Container, ContainerConfig, Late};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct Engine {
    cylinders: u8,
}

#[derive(Debug)]
struct Car {
    engine: Arc<Engine>,
    garage: Late<Garage>,
}

#[derive(Debug)]
struct Garage {
    car: Late<Car>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut container = Container::with_config(ContainerConfig::new("demo"));
    container.register(BeanDefinition::constructor(|_| Ok(Engine { cylinders: 8 })))?;
    container.register(
        BeanDefinition::constructor(|args| {
            Ok(Car {
                engine: args.next()?,
                garage: Late::new(),
            })
        })
        .depends_on::<Engine>()
        .field(|car| &car.garage),
    )?;
    container.register(
        BeanDefinition::constructor(|_| Ok(Garage { car: Late::new() })).field(|garage| &garage.car),
    )?;
    container.build()?;

    if let Some(graph) = container.graph() {
        println!("{}", graph.to_dot());
    }

    let car = container.get::<Car>()?;
    println!("{:?}", container);
    println!("engine has {} cylinders", car.engine.cylinders);
    println!(
        "the garage holds the same car: {}",
        Arc::ptr_eq(&car, &car.garage.car)
    );

    container.shutdown()?;
    Ok(())
}
