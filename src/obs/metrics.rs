// self
use crate::obs::AdmissionOutcome;

/// Records an admission outcome via the global metrics recorder (when enabled).
pub fn record_admission_outcome(outcome: AdmissionOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("upload_admission_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
