//! Basic usage example for cycler.
//!
//! Demonstrates:
//! - Registering closures, disposables and subscriptions
//! - Releasing one entry early with `ManagedEntry::release()`
//! - Draining the rest with `finalize_all()`
//!
//! Run with: `cargo run --example basic_usage`

use cycler::{Cycler, Dependency, Disposable, Subscribable};

/// A pretend database connection.
struct Connection {
    name: &'static str,
}

impl Disposable for Connection {
    fn dispose(&mut self) {
        println!("   closed connection '{}'", self.name);
    }
}

/// A pretend event-bus listener.
struct Listener {
    topic: &'static str,
}

impl Subscribable for Listener {
    fn unsubscribe(&mut self) {
        println!("   stopped listening on '{}'", self.topic);
    }
}

fn main() {
    println!("=== cycler: Basic Usage ===\n");

    let cycler = Cycler::builder().name("request-handler").build();

    // -------------------------------------------------------------------------
    // 1. Register resources as they are acquired
    // -------------------------------------------------------------------------
    println!("1. Registering resources...");

    cycler.register(|| println!("   removed temp directory"));
    let primary = cycler.register_disposable(Connection { name: "primary" });
    cycler.register_subscribable(Listener { topic: "orders" });
    cycler.register_many([
        Dependency::disposable(Connection { name: "replica" }),
        Dependency::action(|| println!("   flushed metrics")),
    ]);

    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 2. Release one resource early
    // -------------------------------------------------------------------------
    println!("\n2. Releasing the primary connection early...");

    let ran = primary.release().unwrap();
    println!("   release ran the action: {ran}");
    println!("   release again ran the action: {}", primary.release().unwrap());
    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 3. End of scope
    // -------------------------------------------------------------------------
    println!("\n3. Finalizing everything else (in registration order)...");

    cycler.finalize_all().unwrap();
    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 4. Faulty cleanup does not block the rest
    // -------------------------------------------------------------------------
    println!("\n4. A panicking cleanup action...");

    cycler.register(|| panic!("lock file already removed"));
    cycler.register(|| println!("   still released the socket"));

    match cycler.finalize_all() {
        Ok(()) => println!("   all clean"),
        Err(e) => println!("   Error (expected): {}", e),
    }

    println!("\n=== Example Complete ===");
}
