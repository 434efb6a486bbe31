//! Crate-level error types shared by the controller, configuration, and principal keys.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Principal key failed validation.
	#[error(transparent)]
	Principal(#[from] crate::principal::PrincipalKeyError),

	/// The principal's byte budget for the current window cannot cover the request.
	#[error("Upload limit exceeded: requested {requested} bytes with {remaining} remaining until {retry_at}.")]
	QuotaExceeded {
		/// Bytes the caller asked to upload.
		requested: u64,
		/// Bytes still available in the current window.
		remaining: u64,
		/// Instant the window resets.
		retry_at: OffsetDateTime,
	},
}

/// Configuration and validation failures raised while building a [`crate::QuotaPolicy`].
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Policy JSON could not be parsed.
	#[error("Quota policy is malformed at `{path}`.")]
	Parse {
		/// JSON path of the offending field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},

	/// Window length must be strictly positive.
	#[error("Quota window must be positive, got {window}.")]
	NonPositiveWindow {
		/// Rejected window length.
		window: Duration,
	},
	/// Window length exceeds the supported maximum.
	#[error("Quota window {window} exceeds the maximum of {max}.")]
	WindowTooLong {
		/// Rejected window length.
		window: Duration,
		/// Longest accepted window.
		max: Duration,
	},
	/// Backoff acquisition allows more attempts than supported.
	#[error("Acquire policy allows {attempts} attempts, more than the maximum of {max}.")]
	TooManyAttempts {
		/// Rejected attempt count.
		attempts: u32,
		/// Most attempts accepted.
		max: u32,
	},
	/// Backoff base delay exceeds the supported maximum.
	#[error("Acquire policy base delay {base_delay} exceeds the maximum of {max}.")]
	BaseDelayTooLong {
		/// Rejected base delay.
		base_delay: Duration,
		/// Longest accepted base delay.
		max: Duration,
	},
	/// Backoff acquisition needs at least one attempt.
	#[error("Acquire policy must allow at least one attempt.")]
	ZeroAttempts,
	/// Backoff acquisition needs a non-zero base delay.
	#[error("Acquire policy base delay must be positive.")]
	ZeroBaseDelay,
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}
