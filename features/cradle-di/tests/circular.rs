use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use cradle_di::{BeanDefinition, BeanKey, BuildError, Container, DependencyGraphError, Late};
use rstest::rstest;

struct A {
    b: Arc<B>,
}

struct B {
    a: Late<A>,
}

fn a() -> BeanDefinition {
    BeanDefinition::constructor(|args| Ok(A { b: args.next()? }))
        .depends_on::<B>()
        .build()
}

#[rstest]
fn constructor_only_cycle_fails_the_build() {
    // Arrange
    let mut container = Container::new();
    container.register(a()).unwrap();
    container
        .register(
            BeanDefinition::constructor(|args| {
                let _ = args.next::<A>()?;
                Ok(B { a: Late::new() })
            })
            .depends_on::<A>(),
        )
        .unwrap();

    // Act
    let result = container.build();

    // Assert
    let errors = match result {
        Err(BuildError::Graph(errors)) => errors,
        other => panic!("expected a circular dependency, got {other:?}"),
    };
    let DependencyGraphError::CircularDependency(error) = &errors.errors[0] else {
        panic!("expected a circular dependency, got {errors}");
    };
    assert_eq!(
        error.chain,
        vec![BeanKey::of::<A>(), BeanKey::of::<B>(), BeanKey::of::<A>()]
    );
}

#[rstest]
fn setter_edge_resolves_the_cycle() {
    // Arrange
    let mut container = Container::new();
    container.register(a()).unwrap();
    container
        .register(
            BeanDefinition::constructor(|_| Ok(B { a: Late::new() })).setter(
                |b: &B, a: Arc<A>| {
                    b.a.set(a)?;
                    Ok(())
                },
            ),
        )
        .unwrap();

    // Act
    container.build().unwrap();
    let a = container.get::<A>().unwrap();

    // Assert
    assert!(Arc::ptr_eq(&a.b.a, &a));
    assert!(Arc::ptr_eq(&a.b, &container.get::<B>().unwrap()));
    assert_eq!(container.plan().unwrap().broken_edges().len(), 1);
}

struct Left {
    right: Late<Right>,
    ready: AtomicBool,
}

struct Right {
    left: Late<Left>,
}

fn left() -> BeanDefinition {
    BeanDefinition::constructor(|_| {
        Ok(Left {
            right: Late::new(),
            ready: AtomicBool::new(false),
        })
    })
    .field(|left| &left.right)
    .on_init(|left| {
        // Init hooks only run once the whole cycle is wired
        let wired = left.right.left.is_wired();
        left.ready.store(wired, Ordering::SeqCst);
        Ok(())
    })
    .build()
}

fn right() -> BeanDefinition {
    BeanDefinition::constructor(|_| Ok(Right { left: Late::new() }))
        .field(|right| &right.left)
        .build()
}

#[rstest]
#[case::left_first(true)]
#[case::right_first(false)]
fn field_cycle_is_fully_wired(#[case] left_first: bool) {
    // Arrange
    let mut container = Container::new();
    container.register_all(vec![left(), right()]).unwrap();
    container.build().unwrap();

    // Act
    let (left, right) = if left_first {
        let left = container.get::<Left>().unwrap();
        (left, container.get::<Right>().unwrap())
    } else {
        let right = container.get::<Right>().unwrap();
        (container.get::<Left>().unwrap(), right)
    };

    // Assert
    assert!(Arc::ptr_eq(&left.right, &right));
    assert!(Arc::ptr_eq(&right.left, &left));
    assert!(left.ready.load(Ordering::SeqCst));
}

#[rstest]
fn prototype_may_close_a_cycle_through_a_singleton() {
    // Arrange
    struct Session {
        registry: Arc<SessionRegistry>,
    }
    struct SessionRegistry {
        template: Late<Session>,
    }
    let mut container = Container::new();
    container
        .register(
            BeanDefinition::constructor(|args| {
                Ok(Session {
                    registry: args.next()?,
                })
            })
            .depends_on::<SessionRegistry>()
            .prototype(),
        )
        .unwrap();
    container
        .register(
            BeanDefinition::constructor(|_| {
                Ok(SessionRegistry {
                    template: Late::new(),
                })
            })
            .field(|registry| &registry.template),
        )
        .unwrap();
    container.build().unwrap();

    // Act
    let session = container.get::<Session>().unwrap();
    let registry = container.get::<SessionRegistry>().unwrap();

    // Assert
    assert!(Arc::ptr_eq(&session.registry, &registry));
    assert!(Arc::ptr_eq(&registry.template.registry, &registry));
    assert!(!Arc::ptr_eq(&session, &registry.template));
}
