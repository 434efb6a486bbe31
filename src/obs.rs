//! Optional observability helpers for admission decisions.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every decision in a span named `upload_admission.try_consume`
//!   with the `principal` and `size` fields, and to emit debug events for rejections and
//!   contention restarts.
//! - Enable `metrics` to increment the `upload_admission_total` counter for every decision and
//!   contention restart, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each decision round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdmissionOutcome {
	/// Request fit in the remaining budget.
	Admitted,
	/// Request would have exceeded the budget.
	Rejected,
	/// Every acquisition attempt failed and the decision restarted.
	ContentionRestart,
}
impl AdmissionOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			AdmissionOutcome::Admitted => "admitted",
			AdmissionOutcome::Rejected => "rejected",
			AdmissionOutcome::ContentionRestart => "contention_restart",
		}
	}
}
impl Display for AdmissionOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
