//! Per-principal upload admission with serialized check-and-consume.
//!
//! [`AdmissionController::try_consume`] looks up (or lazily creates) the principal's record in
//! the registry, acquires exclusive access to it, rolls the window when it has elapsed, and
//! admits the request only if the new total stays within the quota. Acquisition follows the
//! configured [`AcquirePolicy`]: bounded non-blocking attempts with linear backoff that restart
//! the decision when exhausted, or a plain wait on the record lock. Access is released when the
//! guard drops, so every exit path (including a panic or a dropped future) leaves the record
//! consistent. Calls for different principals never contend.

mod metrics;
mod record;

pub use metrics::AdmissionMetrics;

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	config::{self, AcquirePolicy, QuotaPolicy},
	obs::{self, AdmissionOutcome, AdmissionSpan},
	principal::PrincipalKey,
};
use record::QuotaRecord;

type SharedRecord = Arc<AsyncMutex<QuotaRecord>>;

/// Message the embedding route returns with HTTP 429 on rejection.
pub const QUOTA_EXCEEDED_MESSAGE: &str = "Upload limit exceeded for this hour";

/// Result of a single admission check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Admission {
	/// The bytes were charged to the principal; the upload may proceed.
	Admitted(Grant),
	/// The request does not fit in the remaining budget; nothing was charged.
	Rejected(Rejection),
}
impl Admission {
	/// Returns true when the request was admitted.
	pub fn is_admitted(&self) -> bool {
		matches!(self, Self::Admitted(_))
	}

	/// Returns true when the request was rejected.
	pub fn is_rejected(&self) -> bool {
		matches!(self, Self::Rejected(_))
	}

	/// Converts a rejection into [`Error::QuotaExceeded`] for `?`-style call sites.
	pub fn into_result(self) -> Result<Grant> {
		match self {
			Self::Admitted(grant) => Ok(grant),
			Self::Rejected(rejection) => Err(rejection.into()),
		}
	}
}

/// Budget state right after an admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grant {
	/// Bytes charged in the current window, including this request.
	pub consumed: u64,
	/// Bytes still available in the current window.
	pub remaining: u64,
	/// Instant the window resets.
	pub window_end: OffsetDateTime,
}

/// Details of a refused request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rejection {
	/// Bytes the caller asked for.
	pub requested: u64,
	/// Bytes already charged in the current window.
	pub consumed: u64,
	/// Budget that applied to the decision.
	pub quota: u64,
	/// Instant the window resets.
	pub window_end: OffsetDateTime,
}
impl Rejection {
	/// Bytes still available in the current window.
	pub fn remaining(&self) -> u64 {
		self.quota.saturating_sub(self.consumed)
	}

	/// Time left until the window resets, clamped at zero.
	pub fn retry_after(&self, now: OffsetDateTime) -> Duration {
		(self.window_end - now).max(Duration::ZERO)
	}

	/// JSON body for the HTTP 429 response.
	pub fn body(&self) -> RejectionBody {
		RejectionBody {
			error: QUOTA_EXCEEDED_MESSAGE.into(),
			quota: self.quota,
			remaining: self.remaining(),
			reset_at: self.window_end.unix_timestamp(),
		}
	}
}
impl From<Rejection> for Error {
	fn from(rejection: Rejection) -> Self {
		Error::QuotaExceeded {
			requested: rejection.requested,
			remaining: rejection.remaining(),
			retry_at: rejection.window_end,
		}
	}
}

/// Serializable 429 payload, `{"error": "...", "quota": .., "remaining": .., "reset_at": ..}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionBody {
	/// Human-readable reason.
	pub error: String,
	/// Byte budget per window.
	pub quota: u64,
	/// Bytes still available in the current window.
	pub remaining: u64,
	/// Unix timestamp (seconds) at which the window resets.
	pub reset_at: i64,
}

/// Read-only view of a principal's budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaUsage {
	/// Bytes charged in the current window.
	pub consumed: u64,
	/// Bytes still available in the current window.
	pub remaining: u64,
	/// Budget applied by the most recent decision for this principal.
	pub quota: u64,
	/// Instant the window resets.
	pub window_end: OffsetDateTime,
}

/// Process-wide upload quota tracker.
///
/// Construct one per serving process and share clones with every request handler; clones
/// share the same registry. Backoff acquisition sleeps on the Tokio timer, so calls must run
/// inside a Tokio runtime with the time driver enabled.
#[derive(Clone)]
pub struct AdmissionController {
	policy: QuotaPolicy,
	clock: Arc<dyn Clock>,
	records: Arc<Mutex<HashMap<PrincipalKey, SharedRecord>>>,
	metrics: Arc<AdmissionMetrics>,
}
impl AdmissionController {
	/// Creates a controller driven by the wall clock.
	pub fn new(policy: QuotaPolicy) -> Result<Self> {
		Self::with_clock(policy, Arc::new(SystemClock))
	}

	/// Creates a controller driven by the provided clock.
	pub fn with_clock(policy: QuotaPolicy, clock: Arc<dyn Clock>) -> Result<Self> {
		policy.validate()?;

		Ok(Self { policy, clock, records: Default::default(), metrics: Default::default() })
	}

	/// Policy applied by [`AdmissionController::try_consume`].
	pub fn policy(&self) -> &QuotaPolicy {
		&self.policy
	}

	/// Shared decision counters.
	pub fn metrics(&self) -> &AdmissionMetrics {
		&self.metrics
	}

	/// Number of principals currently tracked.
	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	/// Returns true when no principal is tracked.
	pub fn is_empty(&self) -> bool {
		self.records.lock().is_empty()
	}

	/// Charges `size` bytes to `key` under the configured quota and window.
	pub async fn try_consume(&self, key: &PrincipalKey, size: u64) -> Admission {
		self.consume(key, size, self.policy.quota_bytes, self.policy.window).await
	}

	/// Charges `size` bytes to `key` under an explicit quota and window.
	///
	/// The window length only takes effect when a record is created or its window rolls over.
	/// Windows that are not positive or exceed [`QuotaPolicy::MAX_WINDOW`] are refused with
	/// [`Error::Config`] before the record is touched.
	pub async fn try_consume_with(
		&self,
		key: &PrincipalKey,
		size: u64,
		quota: u64,
		window: Duration,
	) -> Result<Admission> {
		config::validate_window(window)?;

		Ok(self.consume(key, size, quota, window).await)
	}

	async fn consume(
		&self,
		key: &PrincipalKey,
		size: u64,
		quota: u64,
		window: Duration,
	) -> Admission {
		let span = AdmissionSpan::new(key, size);

		span.instrument(async move {
			let mut round = 0_u32;
			let admission = loop {
				let record = self.record(key, quota, window);
				let Some(mut guard) = self.acquire(&record).await else {
					round = round.saturating_add(1);

					self.metrics.record_contention_restart();
					obs::record_admission_outcome(AdmissionOutcome::ContentionRestart);
					obs::log_contention_restart(round);

					continue;
				};

				break guard.decide(self.clock.now(), size, quota, window);
			};

			match &admission {
				Admission::Admitted(_) => {
					self.metrics.record_admitted(size);
					obs::record_admission_outcome(AdmissionOutcome::Admitted);
				},
				Admission::Rejected(rejection) => {
					self.metrics.record_rejected();
					obs::record_admission_outcome(AdmissionOutcome::Rejected);
					obs::log_rejection(rejection);
				},
			}

			admission
		})
		.await
	}

	/// Returns the principal's usage under the quota and window of its most recent decision.
	///
	/// Waits for any in-flight decision on the same principal; never mutates the record.
	pub async fn usage(&self, key: &PrincipalKey) -> Option<QuotaUsage> {
		let record = self.records.lock().get(key).cloned()?;
		let guard = record.lock_arc().await;

		Some(guard.usage_at(self.clock.now()))
	}

	/// Drops records whose window has elapsed and that no caller currently references.
	///
	/// Callers only obtain records while holding the registry lock, so a record referenced
	/// solely by the registry cannot be acquired concurrently with its removal. Returns the
	/// number of records removed.
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		let mut records = self.records.lock();
		let before = records.len();

		records.retain(|_, record| {
			if Arc::strong_count(record) > 1 {
				return true;
			}

			match record.try_lock() {
				Some(state) => !state.is_expired_at(now),
				None => true,
			}
		});

		before - records.len()
	}

	/// Runs [`AdmissionController::sweep`] every `period` until the future is dropped.
	pub async fn run_sweeper(&self, period: std::time::Duration) {
		let mut interval = tokio::time::interval(period);

		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			interval.tick().await;

			self.sweep();
		}
	}

	fn record(&self, key: &PrincipalKey, quota: u64, window: Duration) -> SharedRecord {
		let mut records = self.records.lock();

		records
			.entry(key.clone())
			.or_insert_with(|| {
				Arc::new(AsyncMutex::new(QuotaRecord::open(self.clock.now(), quota, window)))
			})
			.clone()
	}

	async fn acquire(&self, record: &SharedRecord) -> Option<MutexGuardArc<QuotaRecord>> {
		match self.policy.acquire {
			AcquirePolicy::Blocking => Some(record.lock_arc().await),
			AcquirePolicy::Backoff { attempts, base_delay } => {
				if let Some(guard) = record.try_lock_arc() {
					return Some(guard);
				}

				let base_delay = std::time::Duration::try_from(base_delay).unwrap_or_default();

				for attempt in 1..=attempts {
					tokio::time::sleep(base_delay.saturating_mul(attempt)).await;

					if let Some(guard) = record.try_lock_arc() {
						return Some(guard);
					}
				}

				None
			},
		}
	}
}
impl Debug for AdmissionController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionController")
			.field("policy", &self.policy)
			.field("principals", &self.len())
			.finish()
	}
}
