//! Concurrency stress for the handle registry.
//!
//! Several threads acquire and release handles through their own contexts
//! against one shared registry. The property under test: every handle the
//! engine handed out is closed exactly once, and per-context accounting
//! never bleeds across threads.

use std::sync::Arc;

use grove_api::{GroveError, HandleClass, HandleRegistry};
use grove_ffi::{MockEngine, NativeEngine};

fn shared_registry() -> (Arc<MockEngine>, Arc<HandleRegistry>) {
    let engine = Arc::new(MockEngine::new());
    let registry = Arc::new(HandleRegistry::new(
        Arc::clone(&engine) as Arc<dyn NativeEngine>
    ));
    (engine, registry)
}

#[test]
fn test_parallel_contexts_account_independently() {
    let (engine, registry) = shared_registry();
    let threads = 8;
    let per_thread = 200;

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let scope = registry.begin_context();
                for i in 0..per_thread {
                    let token = registry
                        .register(scope.id(), engine.alloc_memory(), HandleClass::Memory)
                        .unwrap();
                    // Release every other handle explicitly; leave the rest
                    // to the scope sweep.
                    if i % 2 == 0 {
                        registry.release(token).unwrap();
                    }
                    assert!(scope.live_handles() <= per_thread / 2 + 1);
                }
                assert_eq!(scope.live_handles(), per_thread / 2);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Every scope dropped at thread end; nothing stays open.
    assert_eq!(registry.total_live(), 0);
    assert_eq!(engine.open_handle_count(), 0);
}

#[test]
fn test_cross_thread_release_of_shared_token() {
    // A token may be handed to another thread; exactly one of two racing
    // releases wins, the other sees the caller-bug error.
    for _ in 0..100 {
        let (engine, registry) = shared_registry();
        let scope = registry.begin_context();
        let token = registry
            .register(scope.id(), engine.alloc_memory(), HandleClass::Memory)
            .unwrap();

        let r1 = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.release(token))
        };
        let r2 = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.release(token))
        };
        let results = [r1.join().unwrap(), r2.join().unwrap()];

        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1, "exactly one release must win: {results:?}");
        for result in &results {
            if let Err(err) = result {
                assert!(matches!(err, GroveError::DoubleRelease { .. }));
            }
        }
        assert_eq!(engine.open_handle_count(), 0);
    }
}

#[test]
fn test_sweep_storm_against_explicit_releases() {
    // One thread churns handles with explicit releases while the main
    // thread repeatedly opens and drops whole contexts. Totals must come
    // out exact despite the interleaving.
    let (engine, registry) = shared_registry();

    let churner = {
        let engine = Arc::clone(&engine);
        let registry = Arc::clone(&registry);
        std::thread::spawn(move || {
            for _ in 0..500 {
                let scope = registry.begin_context();
                let token = registry
                    .register(scope.id(), engine.alloc_memory(), HandleClass::Memory)
                    .unwrap();
                registry.release(token).unwrap();
            }
        })
    };

    for _ in 0..200 {
        let scope = registry.begin_context();
        for _ in 0..5 {
            registry
                .register(scope.id(), engine.alloc_memory(), HandleClass::Memory)
                .unwrap();
        }
        drop(scope);
    }

    churner.join().unwrap();
    assert_eq!(registry.total_live(), 0);
    assert_eq!(engine.open_handle_count(), 0);
}
