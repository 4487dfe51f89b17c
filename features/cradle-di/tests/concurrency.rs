use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        mpsc, Arc, Barrier,
    },
    thread,
    time::Duration,
};

use cradle_di::{BeanDefinition, Container, Late};
use rstest::rstest;

const THREADS: usize = 50;

struct Expensive {
    serial: usize,
}

struct Dependent {
    expensive: Arc<Expensive>,
}

fn container(constructed: Arc<AtomicUsize>) -> Container {
    let mut container = Container::new();
    container
        .register(BeanDefinition::constructor(move |_| {
            let serial = constructed.fetch_add(1, Ordering::SeqCst);
            // Keep the window for a second construction open
            thread::sleep(Duration::from_millis(20));
            Ok(Expensive { serial })
        }))
        .unwrap();
    container
        .register(
            BeanDefinition::constructor(|args| {
                Ok(Dependent {
                    expensive: args.next()?,
                })
            })
            .depends_on::<Expensive>(),
        )
        .unwrap();
    container.build().unwrap();
    container
}

#[rstest]
fn concurrent_first_access_constructs_once() {
    // Arrange
    let constructed = Arc::new(AtomicUsize::new(0));
    let container = container(constructed.clone());
    let barrier = Barrier::new(THREADS);

    // Act
    let instances: Vec<Arc<Expensive>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    container.get::<Expensive>().unwrap()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    // Assert
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(instances
        .iter()
        .all(|instance| Arc::ptr_eq(instance, &instances[0])));
    assert_eq!(instances[0].serial, 0);
}

#[rstest]
fn dependents_racing_their_dependency_share_it() {
    // Arrange
    let constructed = Arc::new(AtomicUsize::new(0));
    let container = container(constructed.clone());
    let barrier = Barrier::new(THREADS);

    // Act
    let expensive: Vec<Arc<Expensive>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|index| {
                let container = &container;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    if index % 2 == 0 {
                        container.get::<Dependent>().unwrap().expensive.clone()
                    } else {
                        container.get::<Expensive>().unwrap()
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    // Assert
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(expensive
        .iter()
        .all(|instance| Arc::ptr_eq(instance, &expensive[0])));
}

#[rstest]
fn unrelated_definitions_do_not_wait_for_each_other() {
    // Arrange
    struct Slow;
    struct Fast;
    let entered = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (constructor_entered, constructor_release) = (entered.clone(), release.clone());
    let mut container = Container::new();
    container
        .register(BeanDefinition::constructor(move |_| {
            constructor_entered.wait();
            // Held inside the constructor until the main thread lets go
            constructor_release.wait();
            Ok(Slow)
        }))
        .unwrap();
    container
        .register(BeanDefinition::constructor(|_| Ok(Fast)))
        .unwrap();
    container.build().unwrap();
    let container = &container;

    // Act
    let fast = thread::scope(|scope| {
        let slow = scope.spawn(move || container.get::<Slow>().is_ok());
        entered.wait();

        let (sender, receiver) = mpsc::channel();
        scope.spawn(move || {
            let _ = sender.send(container.get::<Fast>().is_ok());
        });
        let fast = receiver.recv_timeout(Duration::from_secs(5));

        release.wait();
        assert!(slow.join().unwrap());
        fast
    });

    // Assert
    assert_eq!(fast, Ok(true));
}

struct Ping {
    pong: Late<Pong>,
}

struct Pong {
    ping: Late<Ping>,
}

#[rstest]
fn concurrent_access_to_a_cycle_sees_it_fully_wired() {
    // Arrange
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = constructed.clone();
    let mut container = Container::new();
    container
        .register(
            BeanDefinition::constructor(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                Ok(Ping { pong: Late::new() })
            })
            .field(|ping| &ping.pong),
        )
        .unwrap();
    container
        .register(
            BeanDefinition::constructor(|_| Ok(Pong { ping: Late::new() }))
                .field(|pong| &pong.ping),
        )
        .unwrap();
    container.build().unwrap();
    let barrier = Barrier::new(THREADS);

    // Act
    let pings: Vec<Arc<Ping>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|index| {
                let container = &container;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    if index % 2 == 0 {
                        container.get::<Ping>().unwrap()
                    } else {
                        // Dereferencing panics if the cycle is not wired yet
                        container.get::<Pong>().unwrap().ping.get().clone()
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    // Assert
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(pings.iter().all(|ping| Arc::ptr_eq(ping, &pings[0])));
    assert!(Arc::ptr_eq(&pings[0].pong.ping, &pings[0]));
}
