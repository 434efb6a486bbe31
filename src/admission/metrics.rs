// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for admission decisions.
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
	admitted: AtomicU64,
	rejected: AtomicU64,
	admitted_bytes: AtomicU64,
	contention_restarts: AtomicU64,
}
impl AdmissionMetrics {
	/// Returns the number of admitted requests.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Returns the number of rejected requests.
	pub fn rejected(&self) -> u64 {
		self.rejected.load(Ordering::Relaxed)
	}

	/// Returns the total bytes admitted across all principals.
	pub fn admitted_bytes(&self) -> u64 {
		self.admitted_bytes.load(Ordering::Relaxed)
	}

	/// Returns how many decision rounds restarted because a record stayed contended.
	pub fn contention_restarts(&self) -> u64 {
		self.contention_restarts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admitted(&self, bytes: u64) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
		self.admitted_bytes.fetch_add(bytes, Ordering::Relaxed);
	}

	pub(crate) fn record_rejected(&self) {
		self.rejected.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_contention_restart(&self) {
		self.contention_restarts.fetch_add(1, Ordering::Relaxed);
	}
}
