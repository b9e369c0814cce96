//! Integration tests for sharing one cycler between threads.

use cycler::Cycler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

const THREADS: usize = 8;
const PER_THREAD: usize = 200;

#[test]
fn test_concurrent_register_and_release() {
    let cycler = Arc::new(Cycler::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cycler = cycler.clone();
            let calls = calls.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let counter = calls.clone();
                    let entry = cycler.register(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                    // Release every other entry right away.
                    if i % 2 == 0 {
                        entry.release().unwrap();
                        entry.release().unwrap();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cycler.pending_count(), THREADS * PER_THREAD / 2);
    cycler.finalize_all().unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), THREADS * PER_THREAD);
    assert_eq!(cycler.pending_count(), 0);
}

#[test]
fn test_release_racing_drain_runs_once() {
    for _ in 0..50 {
        let cycler = Arc::new(Cycler::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let entries: Vec<_> = (0..64)
            .map(|_| {
                let counter = calls.clone();
                cycler.register(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        let releaser = thread::spawn(move || {
            for entry in entries.iter().rev() {
                entry.release().unwrap();
            }
        });
        cycler.finalize_all().unwrap();
        releaser.join().unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 64);
        assert_eq!(cycler.pending_count(), 0);
    }
}

#[test]
fn test_concurrent_transient_keeps_one_occupant() {
    let cycler = Arc::new(Cycler::new());
    let live = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cycler = cycler.clone();
            let live = live.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..PER_THREAD {
                    live.fetch_add(1, Ordering::SeqCst);
                    let live = live.clone();
                    cycler
                        .register_transient("shared", move || {
                            live.fetch_sub(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cycler.pending_count(), 1);
    assert_eq!(live.load(Ordering::SeqCst), 1);

    cycler.finalize_all().unwrap();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}
