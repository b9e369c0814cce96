//! Transient slot example for cycler.
//!
//! Demonstrates:
//! - Keeping at most one in-flight search request per slot
//! - The previous request is cancelled before the next one is tracked
//! - Independent slots for independent request streams
//!
//! Run with: `cargo run --example search_requests`

use cycler::{Cycler, Dependency, Disposable};

/// An in-flight request that can be cancelled.
struct Request {
    endpoint: &'static str,
    query: String,
}

impl Request {
    fn start(endpoint: &'static str, query: &str) -> Self {
        println!("   -> {endpoint}?q={query}");
        Self {
            endpoint,
            query: query.to_string(),
        }
    }
}

impl Disposable for Request {
    fn dispose(&mut self) {
        println!("   x  {}?q={}", self.endpoint, self.query);
    }
}

fn main() {
    println!("=== cycler: Search Requests ===\n");

    let cycler = Cycler::builder().name("search-view").build();

    // -------------------------------------------------------------------------
    // 1. The user types, one request per keystroke
    // -------------------------------------------------------------------------
    println!("1. Typing 'rust'...");

    for query in ["r", "ru", "rus", "rust"] {
        let request = Request::start("/search", query);
        cycler
            .register_transient("search", Dependency::disposable(request))
            .unwrap();
    }

    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 2. A second, independent slot
    // -------------------------------------------------------------------------
    println!("\n2. Loading suggestions in their own slot...");

    for query in ["ru", "rust"] {
        let request = Request::start("/suggest", query);
        cycler
            .register_transient("suggest", Dependency::disposable(request))
            .unwrap();
    }

    println!("   pending: {}", cycler.pending_count());

    // -------------------------------------------------------------------------
    // 3. The view closes
    // -------------------------------------------------------------------------
    println!("\n3. Closing the view...");

    drop(cycler);

    println!("\n=== Example Complete ===");
}
