// self
use crate::{_prelude::*, admission::Rejection, principal::PrincipalKey};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedAdmission<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedAdmission<F> = F;

/// Span wrapping a single admission decision.
#[derive(Clone, Debug)]
pub struct AdmissionSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl AdmissionSpan {
	/// Creates a new span tagged with the principal and requested size.
	pub fn new(principal: &PrincipalKey, size: u64) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"upload_admission.try_consume",
				principal = principal.as_ref(),
				size
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (principal, size);

			Self {}
		}
	}

	/// Instruments the decision future without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedAdmission<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event describing a rejected request.
pub fn log_rejection(rejection: &Rejection) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			requested = rejection.requested,
			consumed = rejection.consumed,
			quota = rejection.quota,
			window_end = %rejection.window_end,
			"upload rejected"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = rejection;
	}
}

/// Emits a debug event when every acquisition attempt of a round failed.
pub fn log_contention_restart(round: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(round, "record contended, restarting decision");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = round;
	}
}
