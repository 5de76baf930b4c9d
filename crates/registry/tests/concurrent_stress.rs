//! Concurrent resolution from many threads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use lazy_registry::prelude::*;

struct Slow {
    serial: usize,
}

const THREADS: usize = 16;

#[test]
fn racing_singleton_requests_agree_on_one_value() {
    let registry = Registry::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let builds_c = Arc::clone(&builds);
    registry
        .define(&Identifier::<Slow>::of(), move |_| {
            thread::yield_now();
            Ok(Slow {
                serial: builds_c.fetch_add(1, Ordering::SeqCst),
            })
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.resolve(&Identifier::<Slow>::of()).unwrap()
            })
        })
        .collect();
    let values: Vec<Arc<Slow>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let cached = registry.resolve(&Identifier::<Slow>::of()).unwrap();
    assert!(values.iter().all(|value| Arc::ptr_eq(value, &cached)));
    assert!(builds.load(Ordering::SeqCst) >= 1);
    assert!(cached.serial < builds.load(Ordering::SeqCst));
}

#[test]
fn builders_resolve_dependencies_while_others_bind() {
    let registry = Registry::new();
    let base = injection_key::<usize>("base");
    registry.define(&base, |_| Ok(1usize)).unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let registry = registry.clone();
            let base = base.clone();
            thread::spawn(move || {
                let key = injection_key::<usize>("derived");
                registry
                    .define(&key, move |ctx| Ok(index + *ctx.resolve(&base)?))
                    .unwrap();
                *registry.resolve(&key).unwrap()
            })
        })
        .collect();

    let mut results: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_unstable();
    assert_eq!(results, (1..=THREADS).collect::<Vec<_>>());
    assert_eq!(registry.stats().unwrap().bindings, THREADS + 1);
}

#[test]
fn scopes_created_concurrently_are_shared() {
    let registry = Registry::new();
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = registry.clone();
            thread::spawn(move || registry.scope("shared").unwrap().inherited().unwrap())
        })
        .collect();
    let children: Vec<Registry> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(children.windows(2).all(|pair| pair[0].ptr_eq(&pair[1])));
    assert_eq!(registry.scope_instances().unwrap().len(), 1);
}
