use super::*;
use std::time::Duration;
use tokio::time::Instant;

fn limiter(limit: usize) -> RateLimiter {
    RateLimiter::new(limit, Duration::from_millis(1000))
}

#[test]
fn test_rate_limiter_admits_up_to_limit() {
    let mut limiter = limiter(3);
    let now = Instant::now();

    for _ in 0..3 {
        assert!(limiter.admit_at(now));
        limiter.record_at(now);
    }

    assert!(!limiter.admit_at(now));
    assert_eq!(limiter.available(), 0);
}

#[test]
fn test_rate_limiter_admit_without_record_does_not_consume() {
    let mut limiter = limiter(1);
    let now = Instant::now();

    for _ in 0..5 {
        assert!(limiter.admit_at(now));
    }
    assert_eq!(limiter.available(), 1);
}

#[test]
fn test_rate_limiter_recovers_after_window() {
    let mut limiter = limiter(2);
    let start = Instant::now();
    limiter.record_at(start);
    limiter.record_at(start);

    // Still inside the window at exactly one window length
    assert!(!limiter.admit_at(start + Duration::from_millis(1000)));
    assert!(limiter.admit_at(start + Duration::from_millis(1001)));
    assert_eq!(limiter.status().in_window, 0);
}

#[test]
fn test_rate_limiter_sliding_window() {
    let mut limiter = limiter(2);
    let start = Instant::now();
    limiter.record_at(start);
    limiter.record_at(start + Duration::from_millis(600));

    // The first timestamp expires, the second is still counted
    let later = start + Duration::from_millis(1200);
    assert!(limiter.admit_at(later));
    limiter.record_at(later);
    assert!(!limiter.admit_at(later));
    assert_eq!(limiter.status().in_window, 2);
}

#[test]
fn test_rate_limiter_never_exceeds_limit_in_any_window() {
    let mut limiter = limiter(4);
    let start = Instant::now();
    let mut admitted = Vec::new();

    // Try every 50ms for three seconds
    for step in 0..60u64 {
        let now = start + Duration::from_millis(step * 50);
        if limiter.admit_at(now) {
            limiter.record_at(now);
            admitted.push(now);
        }
    }

    for (i, &t) in admitted.iter().enumerate() {
        let in_window = admitted[i..]
            .iter()
            .take_while(|&&other| other <= t + Duration::from_millis(1000))
            .count();
        assert!(in_window <= 4, "window starting at admission {} held {}", i, in_window);
    }
}

#[test]
fn test_health_gate_max_concurrency_wins() {
    let mut gate = HealthGate::new(limiter(0));

    // Every other check would also fail; max_concurrency is reported first
    let status = gate.check_at(4, 100, 3, Instant::now());
    assert_eq!(status, HealthStatus::unhealthy(UnhealthyReason::MaxConcurrency));
}

#[test]
fn test_health_gate_allows_running_equal_to_ceiling() {
    let mut gate = HealthGate::new(limiter(10));
    let status = gate.check_at(3, 0, 3, Instant::now());
    assert!(status.healthy);
    assert_eq!(status.reason, None);
}

#[test]
fn test_health_gate_queue_too_large() {
    let mut gate = HealthGate::new(limiter(10));
    let now = Instant::now();

    assert!(gate.check_at(2, 4, 3, now).healthy);
    assert_eq!(
        gate.check_at(2, 5, 3, now),
        HealthStatus::unhealthy(UnhealthyReason::QueueTooLarge)
    );
}

#[test]
fn test_health_gate_rate_limit() {
    let mut gate = HealthGate::new(limiter(1));
    let now = Instant::now();

    assert!(gate.check_at(0, 1, 3, now).healthy);
    gate.record_dispatch_at(now);
    assert_eq!(
        gate.check_at(0, 1, 3, now),
        HealthStatus::unhealthy(UnhealthyReason::RateLimit)
    );
}

#[test]
fn test_health_gate_check_is_repeatable() {
    let mut gate = HealthGate::new(limiter(1));
    let now = Instant::now();

    for _ in 0..10 {
        assert!(gate.check_at(0, 0, 1, now).healthy);
    }
    assert_eq!(gate.limiter().available(), 1);
}

#[test]
fn test_unhealthy_reason_labels() {
    assert_eq!(UnhealthyReason::MaxConcurrency.to_string(), "max_concurrency");
    assert_eq!(UnhealthyReason::QueueTooLarge.to_string(), "queue_too_large");
    assert_eq!(UnhealthyReason::RateLimit.to_string(), "rate_limit");
    assert_eq!(
        serde_json::to_value(UnhealthyReason::QueueTooLarge).unwrap(),
        "queue_too_large"
    );
}

#[test]
fn test_tuner_decreases_on_high_failure_ratio() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);

    let adjustment = tuner.tick(100, 15);
    assert_eq!(adjustment, Adjustment::Decreased { from: 3, to: 2 });
    assert_eq!(tuner.ceiling(), 2);
}

#[test]
fn test_tuner_floors_at_one() {
    let mut tuner = ConcurrencyTuner::new(1, 5, TuningMode::Cumulative);

    assert_eq!(tuner.tick(100, 15), Adjustment::Unchanged);
    assert_eq!(tuner.ceiling(), 1);
}

#[test]
fn test_tuner_increases_on_low_failure_ratio() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);

    assert_eq!(tuner.tick(100, 2), Adjustment::Increased { from: 3, to: 4 });
    assert_eq!(tuner.tick(100, 2), Adjustment::Increased { from: 4, to: 5 });
    assert_eq!(tuner.tick(100, 2), Adjustment::Unchanged);
    assert_eq!(tuner.ceiling(), 5);
}

#[test]
fn test_tuner_holds_between_thresholds() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);

    assert_eq!(tuner.tick(100, 7), Adjustment::Unchanged);
    assert_eq!(tuner.tick(100, 10), Adjustment::Unchanged);
    assert_eq!(tuner.ceiling(), 3);
}

#[test]
fn test_tuner_no_activity_is_unchanged() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);
    assert_eq!(tuner.tick(0, 0), Adjustment::Unchanged);
}

#[test]
fn test_tuner_clamps_initial_ceiling() {
    assert_eq!(ConcurrencyTuner::new(9, 5, TuningMode::Cumulative).ceiling(), 5);
    assert_eq!(ConcurrencyTuner::new(0, 5, TuningMode::Cumulative).ceiling(), 1);
}

#[test]
fn test_tuner_cumulative_counts_stay_sticky() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);
    tuner.tick(10, 5);
    assert_eq!(tuner.ceiling(), 2);

    // 20 clean completions later the lifetime ratio is still above 10%
    assert_eq!(tuner.tick(30, 5), Adjustment::Decreased { from: 2, to: 1 });
}

#[test]
fn test_tuner_windowed_only_sees_recent_counts() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Windowed);
    tuner.tick(10, 5);
    assert_eq!(tuner.ceiling(), 2);

    // The last interval had 20 completions and no failures
    assert_eq!(tuner.tick(30, 5), Adjustment::Increased { from: 2, to: 3 });
}

#[test]
fn test_tuner_shared_ceiling_reflects_updates() {
    let mut tuner = ConcurrencyTuner::new(3, 5, TuningMode::Cumulative);
    let shared = tuner.shared_ceiling();

    tuner.tick(100, 50);
    assert_eq!(shared.load(std::sync::atomic::Ordering::Acquire), 2);
}
