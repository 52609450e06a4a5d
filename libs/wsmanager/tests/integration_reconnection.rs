//! Integration tests for reconnection strategies
//!
//! These tests verify the delay schedule both on the strategies alone and
//! as observed through a manager whose connections keep failing.

mod common;

use common::*;
use std::time::Duration;
use wsmanager::*;

/// Fail the live attempt, wait out the scheduled delay and return it
async fn fail_and_wait(h: &Harness) -> Option<Duration> {
    h.transport.last().fail("connection refused");
    let delay = h.manager.pending_reconnect();
    if let Some(delay) = delay {
        tokio::time::sleep(delay + Duration::from_millis(1)).await;
    }
    delay
}

#[test]
fn test_linear_backoff_full_sequence() {
    verbose_println!("Testing linear backoff full sequence...");

    let strategy = LinearBackoff::new(
        Duration::from_millis(1000),
        Duration::from_millis(3000),
        Some(5),
    );

    let expected_delays = [1000, 2000, 3000, 3000, 3000];

    for (attempt, &expected_ms) in expected_delays.iter().enumerate() {
        let delay = strategy.next_delay(attempt as u32).unwrap();
        verbose_println!("  Attempt {}: {:?}", attempt, delay);
        assert_eq!(
            delay.as_millis(),
            expected_ms,
            "Unexpected delay at attempt {}",
            attempt
        );
    }

    assert!(
        strategy.next_delay(5).is_none(),
        "Should return None after max attempts"
    );
}

#[test]
fn test_exponential_backoff_with_capping() {
    let strategy = ExponentialBackoff::new(
        Duration::from_millis(500),
        Duration::from_secs(2),
        None,
    );

    let delays: Vec<u64> = (0..5)
        .map(|i| strategy.next_delay(i).unwrap().as_millis() as u64)
        .collect();

    verbose_println!("  Delays: {:?}", delays);
    assert_eq!(delays, vec![500, 1000, 2000, 2000, 2000]);
}

#[test]
fn test_fixed_delay_consistency() {
    let strategy = FixedDelay::new(Duration::from_millis(250), Some(3));

    for attempt in 0..3 {
        assert_eq!(
            strategy.next_delay(attempt),
            Some(Duration::from_millis(250))
        );
    }
    assert!(!strategy.should_reconnect(3));
}

#[test]
fn test_reconnect_config_yaml_defaults() {
    let config: ReconnectConfig = serde_yaml::from_str("max_attempts: 4").unwrap();

    assert_eq!(config.base_interval, Duration::from_millis(1000));
    assert_eq!(config.max_interval, Duration::from_millis(3000));
    assert_eq!(config.strategy().next_delay(3), Some(Duration::from_millis(3000)));
    assert_eq!(config.strategy().next_delay(4), None);
}

#[tokio::test(start_paused = true)]
async fn test_manager_default_delay_schedule() {
    verbose_println!("Testing manager delay schedule...");
    let h = Harness::new();
    h.connect();

    let mut observed = Vec::new();
    for _ in 0..4 {
        let delay = fail_and_wait(&h).await.expect("reconnect scheduled");
        verbose_println!("  scheduled {:?}", delay);
        observed.push(delay.as_millis());
    }

    assert_eq!(observed, vec![1000, 2000, 3000, 3000]);
    assert_eq!(h.observer.reconnects(), 4);
    assert_eq!(h.transport.open_count(), 5);
    assert_eq!(h.manager.reconnect_attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_restarts_schedule() {
    let h = Harness::new();
    h.connect();

    fail_and_wait(&h).await;
    fail_and_wait(&h).await;
    assert_eq!(h.manager.reconnect_attempts(), 2);

    h.transport.last().accept();
    assert_eq!(h.manager.reconnect_attempts(), 0);

    let delay = fail_and_wait(&h).await;
    assert_eq!(delay, Some(Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_strategy_goes_disconnected() {
    let h = Harness::with(|b| {
        b.reconnect_config(ReconnectConfig {
            max_attempts: Some(2),
            ..ReconnectConfig::default()
        })
    });
    h.connect();

    assert!(fail_and_wait(&h).await.is_some());
    assert!(fail_and_wait(&h).await.is_some());
    assert_eq!(fail_and_wait(&h).await, None);

    assert_eq!(h.manager.current_status(), ConnectionStatus::Disconnected);
    assert_eq!(h.transport.open_count(), 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(h.transport.open_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_strategy_is_used() {
    let h = Harness::with(|b| b.reconnect_strategy(FixedDelay::new(Duration::from_millis(50), None)));
    h.connect();

    for _ in 0..3 {
        assert_eq!(fail_and_wait(&h).await, Some(Duration::from_millis(50)));
    }
    assert_eq!(h.observer.reconnects(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_connecting_failure_reschedules() {
    // A connect attempt that never opens counts toward the schedule too
    let h = Harness::new();
    h.manager.start_connect();

    assert_eq!(fail_and_wait(&h).await, Some(Duration::from_millis(1000)));
    assert_eq!(fail_and_wait(&h).await, Some(Duration::from_millis(2000)));
    assert_eq!(h.observer.opens(), 0);
    assert_eq!(h.observer.failures(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_restart_after_exhaustion_reschedules() {
    let h = Harness::with(|b| {
        b.reconnect_config(ReconnectConfig {
            max_attempts: Some(1),
            ..ReconnectConfig::default()
        })
    });
    h.connect();

    assert_eq!(fail_and_wait(&h).await, Some(Duration::from_millis(1000)));
    assert_eq!(fail_and_wait(&h).await, None);
    assert_eq!(h.manager.current_status(), ConnectionStatus::Disconnected);

    h.manager.stop_connect();
    assert_eq!(h.manager.reconnect_attempts(), 0);
    h.manager.start_connect();
    h.transport.last().fail("reset");

    assert_eq!(h.manager.current_status(), ConnectionStatus::Reconnecting);
    assert_eq!(h.manager.pending_reconnect(), Some(Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_start_after_exhaustion_without_stop_reschedules() {
    let h = Harness::with(|b| {
        b.reconnect_config(ReconnectConfig {
            max_attempts: Some(1),
            ..ReconnectConfig::default()
        })
    });
    h.connect();

    fail_and_wait(&h).await;
    assert_eq!(fail_and_wait(&h).await, None);

    h.manager.start_connect();
    h.transport.last().fail("reset");
    assert_eq!(h.manager.pending_reconnect(), Some(Duration::from_millis(1000)));
}

#[tokio::test(start_paused = true)]
async fn test_offline_failures_do_not_carry_into_next_session() {
    let h = Harness::new();
    h.connect();

    fail_and_wait(&h).await;
    h.network.set(false);
    h.transport.last().fail("offline");
    assert_eq!(h.manager.current_status(), ConnectionStatus::Disconnected);

    h.network.set(true);
    h.manager.start_connect();
    h.transport.last().fail("reset");
    assert_eq!(h.manager.pending_reconnect(), Some(Duration::from_millis(1000)));
}
