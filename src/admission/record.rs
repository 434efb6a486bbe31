//! Per-principal quota state and the window/decision rules applied under its lock.

// self
use crate::{
	_prelude::*,
	admission::{Admission, Grant, QuotaUsage, Rejection},
};

/// Bytes admitted for one principal within the current window, plus the limits last applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct QuotaRecord {
	consumed: u64,
	window_end: OffsetDateTime,
	quota: u64,
	window: Duration,
}
impl QuotaRecord {
	/// Opens an empty window starting at `now`.
	pub(crate) fn open(now: OffsetDateTime, quota: u64, window: Duration) -> Self {
		Self { consumed: 0, window_end: window_end_from(now, window), quota, window }
	}

	pub(crate) fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.window_end
	}

	/// Resets the window once `now` reaches its end. Returns true when a reset happened.
	pub(crate) fn roll_window(&mut self, now: OffsetDateTime, window: Duration) -> bool {
		if !self.is_expired_at(now) {
			return false;
		}

		self.consumed = 0;
		self.window_end = window_end_from(now, window);
		self.window = window;

		true
	}

	/// Rolls the window if needed, then admits `size` bytes when they fit in `quota`.
	pub(crate) fn decide(
		&mut self,
		now: OffsetDateTime,
		size: u64,
		quota: u64,
		window: Duration,
	) -> Admission {
		self.roll_window(now, window);
		self.quota = quota;
		self.window = window;

		match self.consumed.checked_add(size).filter(|total| *total <= quota) {
			Some(total) => {
				self.consumed = total;

				Admission::Admitted(Grant {
					consumed: total,
					remaining: quota - total,
					window_end: self.window_end,
				})
			},
			None => Admission::Rejected(Rejection {
				requested: size,
				consumed: self.consumed,
				quota,
				window_end: self.window_end,
			}),
		}
	}

	/// Usage under the limits of the last decision, without mutating the record.
	pub(crate) fn usage_at(&self, now: OffsetDateTime) -> QuotaUsage {
		let (consumed, window_end) = if self.is_expired_at(now) {
			(0, window_end_from(now, self.window))
		} else {
			(self.consumed, self.window_end)
		};

		QuotaUsage {
			consumed,
			remaining: self.quota.saturating_sub(consumed),
			quota: self.quota,
			window_end,
		}
	}
}

/// Window end clamped to the largest representable instant.
fn window_end_from(now: OffsetDateTime, window: Duration) -> OffsetDateTime {
	now.saturating_add(window)
}
