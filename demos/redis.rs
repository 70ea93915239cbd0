//! Example of a quota shared across processes through Redis.
//!
//! # Quick Start
//!
//! 1. Start Redis 6.2 or later:
//!    ```bash
//!    docker run -p 6379:6379 redis:7-alpine
//!    ```
//!
//! 2. Run the example (from project root):
//!    ```bash
//!    cargo run --example redis --features redis-storage
//!    ```
//!
//! Run it in two terminals at once: both processes draw from the same
//! counters, so together they are admitted only as often as one would be.

use admission_control::{
    AdmissionConfig, AdmissionServiceBuilder, RedisCounterStore, RedisStorageConfig,
};
use std::time::Duration;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let store = RedisCounterStore::connect_with_config(
        "redis://127.0.0.1:6379",
        RedisStorageConfig {
            key_prefix: "demo:admission:".to_string(),
            ..Default::default()
        },
    )
    .await?;

    let service = AdmissionServiceBuilder::from_config(&AdmissionConfig::reference())
        .with_store(store)
        .build()?;

    println!("=== Redis-Backed Admission Example ===\n");
    println!("mint allows 5 requests per hour per wallet, shared by every process\n");

    for attempt in 1..=8 {
        let result = service.check_admission("mint", "wallet:0xdemo");
        println!(
            "  attempt {}: allowed={} remaining={} degraded={}",
            attempt, result.allowed, result.remaining, result.degraded
        );
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!("\nIf Redis stops, mint fails closed and listing fails open.");
    println!("Counters expire in Redis when their window ends.");

    Ok(())
}
