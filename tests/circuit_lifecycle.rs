use apilo_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerError, CircuitState};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Ten calls with five failures against MinimumRequests=10,
/// FailureThreshold=5: the circuit opens and the next call never reaches
/// upstream.
#[tokio::test]
async fn failure_burst_opens_the_circuit() {
    let breaker = CircuitBreakerConfig::<&str>::builder()
        .minimum_requests(10)
        .failure_threshold(5)
        .failure_rate(1.1) // rate path disabled; absolute count trips
        .open_timeout(Duration::from_secs(60))
        .name("burst")
        .build();

    for i in 0..10 {
        let fails = i % 2 == 0;
        let _ = breaker
            .call(async move { if fails { Err("boom") } else { Ok(()) } })
            .await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    let upstream = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&upstream);
    let result = breaker
        .call(async move {
            probe.fetch_add(1, Ordering::SeqCst);
            Ok::<_, &str>(())
        })
        .await;

    assert!(matches!(
        result.unwrap_err(),
        CircuitBreakerError::CircuitOpen
    ));
    assert_eq!(upstream.load(Ordering::SeqCst), 0, "upstream never invoked");
    assert_eq!(breaker.metrics().rejected_calls, 1);
}

/// Hold the circuit open, wait out the timeout, then succeed through
/// half-open until the success threshold closes it with fresh counters.
#[tokio::test]
async fn recovery_closes_and_resets_counters() {
    let breaker = CircuitBreakerConfig::<&str>::builder()
        .minimum_requests(2)
        .failure_threshold(2)
        .open_timeout(Duration::from_millis(40))
        .backoff_enabled(false)
        .half_open_max_requests(2)
        .half_open_success_threshold(2)
        .name("recovery")
        .build();

    for _ in 0..2 {
        let _: Result<(), _> = breaker.call(async { Err("down") }).await;
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(50)).await;

    for _ in 0..2 {
        breaker.call(async { Ok::<_, &str>(()) }).await.unwrap();
    }

    assert_eq!(breaker.state(), CircuitState::Closed);
    let metrics = breaker.metrics();
    assert_eq!(metrics.total_calls, 0);
    assert_eq!(metrics.failure_count, 0);
    assert_eq!(metrics.success_count, 0);
}

/// Closed cannot reach HalfOpen except through Open, and Open cannot reach
/// Closed except through HalfOpen: walk the full cycle and watch every
/// transition.
#[tokio::test]
async fn transitions_only_follow_legal_edges() {
    let observed = Arc::new(support::TransitionLog::default());
    let log = Arc::clone(&observed);

    let breaker = CircuitBreakerConfig::<&str>::builder()
        .minimum_requests(1)
        .failure_threshold(1)
        .open_timeout(Duration::from_millis(30))
        .backoff_enabled(false)
        .on_state_transition(move |from, to| log.push(from, to))
        .name("edges")
        .build();

    let _: Result<(), _> = breaker.call(async { Err("x") }).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    breaker.call(async { Ok::<_, &str>(()) }).await.unwrap();

    let edges = observed.edges();
    assert_eq!(
        edges,
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

/// Consecutive trips grow the open window exponentially, clamped at the
/// configured maximum.
#[tokio::test]
async fn backoff_bounds_the_open_window() {
    let breaker = CircuitBreakerConfig::<&str>::builder()
        .minimum_requests(1)
        .failure_threshold(1)
        .open_timeout(Duration::from_millis(50))
        .backoff_multiplier(2.0)
        .max_backoff(Duration::from_millis(80))
        .name("backoff")
        .build();

    // First trip.
    let _: Result<(), _> = breaker.call(async { Err("x") }).await;
    let first_open = Instant::now();

    // Within the base window: rejected.
    let early: Result<(), _> = breaker.call(async { Ok(()) }).await;
    assert!(matches!(
        early.unwrap_err(),
        CircuitBreakerError::CircuitOpen
    ));

    // Past the base window: a probe is admitted; fail it to re-open.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let _: Result<(), _> = breaker.call(async { Err("x") }).await;
    let second_open = Instant::now();
    assert!(second_open.duration_since(first_open) >= Duration::from_millis(50));
    assert_eq!(breaker.state(), CircuitState::Open);

    // Second trip: the window doubles to 100ms but clamps at 80ms. At
    // ~60ms it is still closed to calls; past 80ms a probe is admitted.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let still_open: Result<(), _> = breaker.call(async { Ok(()) }).await;
    assert!(matches!(
        still_open.unwrap_err(),
        CircuitBreakerError::CircuitOpen
    ));

    tokio::time::sleep(Duration::from_millis(40)).await;
    breaker.call(async { Ok::<_, &str>(()) }).await.unwrap();
    assert!(
        Instant::now().duration_since(second_open) <= Duration::from_millis(200),
        "probe admitted within the clamped window"
    );
}

/// Generation advances with each transition so in-flight outcomes from an
/// older window are discarded.
#[tokio::test]
async fn generation_tracks_transitions() {
    let breaker = CircuitBreakerConfig::<&str>::builder()
        .minimum_requests(1)
        .failure_threshold(1)
        .open_timeout(Duration::from_millis(20))
        .backoff_enabled(false)
        .name("generation")
        .build();

    let initial = breaker.generation();
    let _: Result<(), _> = breaker.call(async { Err("x") }).await;
    assert_eq!(breaker.generation(), initial + 1);

    tokio::time::sleep(Duration::from_millis(30)).await;
    breaker.call(async { Ok::<_, &str>(()) }).await.unwrap();
    // Open -> HalfOpen -> Closed: two more transitions.
    assert_eq!(breaker.generation(), initial + 3);
}

/// Ordered, thread-safe transition log shared with the listener callback.
mod support {
    use apilo_circuitbreaker::CircuitState;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct TransitionLog {
        edges: Mutex<Vec<(CircuitState, CircuitState)>>,
    }

    impl TransitionLog {
        pub fn push(&self, from: CircuitState, to: CircuitState) {
            self.edges.lock().unwrap().push((from, to));
        }

        pub fn edges(&self) -> Vec<(CircuitState, CircuitState)> {
            self.edges.lock().unwrap().clone()
        }
    }
}
