// std
use std::sync::Arc;
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use upload_admission::{
	AcquirePolicy, Admission, AdmissionController, Error, Grant, ManualClock, PrincipalKey,
	QuotaPolicy, error::ConfigError,
};

const QUOTA: u64 = 100;

fn start() -> OffsetDateTime {
	macros::datetime!(2025-11-10 12:00 UTC)
}

fn build_controller(quota: u64, acquire: AcquirePolicy) -> (AdmissionController, ManualClock) {
	let clock = ManualClock::new(start());
	let policy = QuotaPolicy::new(quota, Duration::HOUR).with_acquire(acquire);
	let controller = AdmissionController::with_clock(policy, Arc::new(clock.clone()))
		.expect("Integration test policy should validate.");

	(controller, clock)
}

fn key(id: &str) -> PrincipalKey {
	PrincipalKey::new(id).expect("Integration test principal should be valid.")
}

async fn consumed(controller: &AdmissionController, key: &PrincipalKey) -> u64 {
	controller.usage(key).await.map(|usage| usage.consumed).unwrap_or_default()
}

async fn race(
	controller: &AdmissionController,
	key: &PrincipalKey,
	callers: usize,
	size: u64,
) -> (usize, usize) {
	let barrier = Arc::new(tokio::sync::Barrier::new(callers));
	let tasks = (0..callers)
		.map(|_| {
			let controller = controller.clone();
			let key = key.clone();
			let barrier = barrier.clone();

			tokio::spawn(async move {
				barrier.wait().await;
				controller.try_consume(&key, size).await
			})
		})
		.collect::<Vec<_>>();
	let mut admitted = 0;
	let mut rejected = 0;

	for task in tasks {
		match task.await.expect("Racing caller should not panic.") {
			Admission::Admitted(_) => admitted += 1,
			Admission::Rejected(_) => rejected += 1,
		}
	}

	(admitted, rejected)
}

#[tokio::test]
async fn scenario_a_rejects_without_charging() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");
	let first = controller
		.try_consume_with(&user, 60, QUOTA, Duration::HOUR)
		.await
		.expect("One hour window should be accepted.");

	assert!(matches!(first, Admission::Admitted(Grant { consumed: 60, remaining: 40, .. })));

	let second = controller
		.try_consume_with(&user, 50, QUOTA, Duration::HOUR)
		.await
		.expect("One hour window should be accepted.");

	assert!(second.is_rejected(), "110 bytes exceed the 100 byte quota.");
	assert_eq!(consumed(&controller, &user).await, 60);
}

#[tokio::test]
async fn scenario_b_window_reset_applies_before_the_decision() {
	let (controller, clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(controller.try_consume(&user, 60).await.is_admitted());
	assert!(controller.try_consume(&user, 50).await.is_rejected());

	clock.advance(Duration::HOUR + Duration::SECOND);

	let after_reset = controller.try_consume(&user, 50).await;

	assert!(matches!(
		after_reset,
		Admission::Admitted(Grant { consumed: 50, window_end, .. })
			if window_end == start() + Duration::hours(2) + Duration::SECOND
	));
	assert_eq!(consumed(&controller, &user).await, 50);
}

#[tokio::test]
async fn scenario_c_anonymous_callers_share_one_budget() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let visitor_a = PrincipalKey::from_user(None).expect("Anonymous mapping cannot fail.");
	let visitor_b = PrincipalKey::from_user(None).expect("Anonymous mapping cannot fail.");

	assert!(controller.try_consume(&visitor_a, 70).await.is_admitted());
	assert!(controller.try_consume(&visitor_b, 30).await.is_admitted());
	assert!(controller.try_consume(&visitor_a, 1).await.is_rejected());
	assert_eq!(consumed(&controller, &PrincipalKey::anonymous()).await, QUOTA);
	assert_eq!(controller.len(), 1);
}

#[tokio::test]
async fn boundary_admits_exact_fit_only() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(controller.try_consume(&user, QUOTA - 10).await.is_admitted());
	assert!(controller.try_consume(&user, 11).await.is_rejected());
	assert!(controller.try_consume(&user, 10).await.is_admitted());
	assert!(controller.try_consume(&user, 0).await.is_admitted());
	assert!(controller.try_consume(&user, 1).await.is_rejected());
}

#[tokio::test]
async fn oversized_request_never_fits() {
	let (controller, clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(controller.try_consume(&user, QUOTA + 1).await.is_rejected());

	clock.advance(Duration::hours(3));

	assert!(controller.try_consume(&user, QUOTA + 1).await.is_rejected());
	assert_eq!(controller.metrics().rejected(), 2);
	assert_eq!(controller.metrics().admitted(), 0);
}

#[tokio::test]
async fn sequential_admissions_never_exceed_the_quota() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");
	let mut admitted_total = 0;

	for size in [7, 31, 2, 45, 19, 13, 1, 3, 8] {
		if let Admission::Admitted(grant) = controller.try_consume(&user, size).await {
			admitted_total += size;

			assert_eq!(grant.consumed, admitted_total);
		}

		assert!(admitted_total <= QUOTA);
	}

	assert_eq!(consumed(&controller, &user).await, admitted_total);
	assert_eq!(controller.metrics().admitted_bytes(), admitted_total);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_exact_split_admits_everyone() {
	const CALLERS: usize = 16;

	let (controller, _clock) = build_controller(
		1_600,
		AcquirePolicy::Backoff { attempts: 5, base_delay: Duration::milliseconds(1) },
	);
	let user = key("racer");
	let (admitted, rejected) = race(&controller, &user, CALLERS, 100).await;

	assert_eq!((admitted, rejected), (CALLERS, 0));
	assert_eq!(consumed(&controller, &user).await, 1_600);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overflow_rejects_exactly_one() {
	const CALLERS: usize = 16;

	for acquire in [
		AcquirePolicy::Backoff { attempts: 5, base_delay: Duration::milliseconds(1) },
		AcquirePolicy::Blocking,
	] {
		let (controller, _clock) = build_controller(1_600, acquire);
		let user = key("racer");
		let (admitted, rejected) = race(&controller, &user, CALLERS + 1, 100).await;

		assert_eq!((admitted, rejected), (CALLERS, 1), "{acquire:?} must admit exactly N.");
		assert_eq!(consumed(&controller, &user).await, 1_600);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_keys_stay_isolated() {
	let (controller, _clock) = build_controller(10_000, AcquirePolicy::Blocking);
	let alice = key("alice");
	let bob = key("bob");
	let (alice_race, bob_race) =
		tokio::join!(race(&controller, &alice, 20, 7), race(&controller, &bob, 30, 11));

	assert_eq!(alice_race, (20, 0));
	assert_eq!(bob_race, (30, 0));
	assert_eq!(consumed(&controller, &alice).await, 140);
	assert_eq!(consumed(&controller, &bob).await, 330);
}

#[tokio::test]
async fn sweep_forgets_expired_principals_without_changing_decisions() {
	let (controller, clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(controller.try_consume(&user, QUOTA).await.is_admitted());
	assert_eq!(controller.sweep(), 0);
	assert!(controller.try_consume(&user, 1).await.is_rejected());

	clock.advance(Duration::HOUR);

	assert_eq!(controller.sweep(), 1);
	assert!(controller.is_empty());
	assert!(controller.try_consume(&user, QUOTA).await.is_admitted());
}

#[tokio::test]
async fn usage_reports_remaining_budget() {
	let (controller, clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(controller.usage(&user).await.is_none());

	controller.try_consume(&user, 25).await;

	let usage = controller.usage(&user).await.expect("Tracked principal should report usage.");

	assert_eq!((usage.consumed, usage.remaining), (25, 75));
	assert_eq!(usage.window_end, start() + Duration::HOUR);

	clock.advance(Duration::hours(2));

	let rolled = controller.usage(&user).await.expect("Tracked principal should report usage.");

	assert_eq!((rolled.consumed, rolled.remaining), (0, QUOTA));
}

#[tokio::test]
async fn oversized_configured_window_is_refused_up_front() {
	let err = QuotaPolicy::from_json_str("{\"window_secs\":1000000000000}")
		.expect_err("A window of thousands of years should not validate.");

	assert!(matches!(err, ConfigError::WindowTooLong { .. }));

	let clock = ManualClock::new(start());
	let policy = QuotaPolicy::default().with_window(Duration::seconds(1_000_000_000_000));

	assert!(matches!(
		AdmissionController::with_clock(policy, Arc::new(clock)),
		Err(Error::Config(ConfigError::WindowTooLong { .. }))
	));
}

#[tokio::test]
async fn non_positive_explicit_window_cannot_bypass_the_quota() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	assert!(matches!(
		controller.try_consume_with(&user, QUOTA, QUOTA, Duration::ZERO).await,
		Err(Error::Config(ConfigError::NonPositiveWindow { .. }))
	));

	for _ in 0..2 {
		controller
			.try_consume_with(&user, 60, QUOTA, Duration::HOUR)
			.await
			.expect("One hour window should be accepted.");
	}

	assert_eq!(consumed(&controller, &user).await, 60, "Second call must see the first charge.");
}

#[tokio::test]
async fn usage_follows_the_quota_of_explicit_calls() {
	let (controller, _clock) = build_controller(QUOTA, AcquirePolicy::default());
	let user = key("u1");

	controller
		.try_consume_with(&user, 300, 1_000, Duration::minutes(10))
		.await
		.expect("Ten minute window should be accepted.");

	let usage = controller.usage(&user).await.expect("Tracked principal should report usage.");

	assert_eq!((usage.consumed, usage.remaining, usage.quota), (300, 700, 1_000));
	assert_eq!(usage.window_end, start() + Duration::minutes(10));
}
