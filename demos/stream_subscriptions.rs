//! Managed stream subscription example for cycler.
//!
//! Demonstrates:
//! - `subscribe_managed()` ties a subscription to a cycler
//! - A completed stream leaves the pending queue by itself
//! - A still-running stream is unsubscribed when the scope ends
//!
//! Run with: `cargo run --example stream_subscriptions`

use cycler::{Cycler, Subject};

fn main() {
    println!("=== cycler: Stream Subscriptions ===\n");

    let prices: Subject<f64> = Subject::new();
    let downloads: Subject<u32> = Subject::new();
    let cycler = Cycler::builder().name("dashboard").build();

    // -------------------------------------------------------------------------
    // 1. Subscribe to both streams
    // -------------------------------------------------------------------------
    println!("1. Subscribing...");

    cycler.subscribe_managed(&prices, |price: f64| println!("   price: {price:.2}"));
    cycler.subscribe_managed(&downloads, |percent: u32| {
        println!("   download: {percent}%")
    });

    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 2. The download finishes
    // -------------------------------------------------------------------------
    println!("\n2. Streaming values...");

    prices.next(101.5);
    downloads.next(50);
    downloads.next(100);
    downloads.complete();
    prices.next(99.25);

    println!("   pending after download completed: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 3. The dashboard closes while prices keep streaming
    // -------------------------------------------------------------------------
    println!("\n3. Closing the dashboard...");

    cycler.finalize_all().unwrap();
    prices.next(98.0);

    println!("   price observers left: {}", prices.observer_count());

    println!("\n=== Example Complete ===");
}
