//! Basic example of per-caller admission control.
//!
//! Configures two resource classes and shows how each caller gets its own
//! quota, how denials look, and how a result turns into response headers.

use admission_control::application::ports::Clock;
use admission_control::{AdmissionService, FailureMode, RateLimitHeaders, SystemClock};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let service = AdmissionService::builder()
        .with_policy("auth", 3, Duration::from_secs(15 * 60))
        .with_policy("listing", 100, Duration::from_secs(60))
        .with_failure_mode("auth", FailureMode::FailClosed)
        .build()?;
    let clock = SystemClock::new();

    println!("=== Basic Admission Example ===\n");
    println!("Policy: auth allows 3 attempts per 15 minutes per caller\n");

    println!("Five login attempts from one IP:");
    for attempt in 1..=5 {
        let result = service.check_admission("auth", "ip:203.0.113.7");
        println!(
            "  attempt {}: allowed={} remaining={}",
            attempt, result.allowed, result.remaining
        );
    }

    println!("\nA different IP has its own quota:");
    let result = service.check_admission("auth", "ip:198.51.100.2");
    println!("  allowed={} remaining={}", result.allowed, result.remaining);

    println!("\nThe same IP under another class is counted separately:");
    let result = service.check_admission("listing", "ip:203.0.113.7");
    println!("  allowed={} remaining={}", result.allowed, result.remaining);

    println!("\nHeaders for a denied request:");
    let denied = service.check_admission("auth", "ip:203.0.113.7");
    for (name, value) in RateLimitHeaders::from_result(&denied, clock.now()).to_pairs() {
        println!("  {}: {}", name, value);
    }

    let snapshot = service.metrics().snapshot();
    println!(
        "\nadmitted={} denied={} denial rate={:.0}%",
        snapshot.admitted,
        snapshot.denied,
        snapshot.denial_rate() * 100.0
    );

    Ok(())
}
