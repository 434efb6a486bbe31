//! Quota policy configuration supplied by the embedding application.

// self
use crate::{_prelude::*, error::ConfigError};

/// Per-window byte budget and lock acquisition settings applied by an
/// [`AdmissionController`](crate::AdmissionController).
///
/// Deserializes from JSON such as
/// `{"quota_bytes": 1048576, "window_secs": 600, "acquire": {"mode": "blocking"}}`; omitted
/// fields fall back to [`QuotaPolicy::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaPolicy {
	/// Maximum cumulative bytes admitted per principal within one window.
	pub quota_bytes: u64,
	/// Window length.
	#[serde(rename = "window_secs", with = "duration_secs")]
	pub window: Duration,
	/// How callers contend for a principal's record.
	pub acquire: AcquirePolicy,
}
impl QuotaPolicy {
	/// 200 MiB.
	pub const DEFAULT_QUOTA_BYTES: u64 = 200 * 1024 * 1024;
	/// One hour.
	pub const DEFAULT_WINDOW: Duration = Duration::HOUR;
	/// Longest accepted window.
	pub const MAX_WINDOW: Duration = Duration::days(366);

	/// Creates a policy with the given budget and window and the default acquire policy.
	pub fn new(quota_bytes: u64, window: Duration) -> Self {
		Self { quota_bytes, window, acquire: AcquirePolicy::default() }
	}

	/// Overrides the byte budget.
	pub fn with_quota_bytes(mut self, quota_bytes: u64) -> Self {
		self.quota_bytes = quota_bytes;

		self
	}

	/// Overrides the window length.
	pub fn with_window(mut self, window: Duration) -> Self {
		self.window = window;

		self
	}

	/// Overrides the acquire policy.
	pub fn with_acquire(mut self, acquire: AcquirePolicy) -> Self {
		self.acquire = acquire;

		self
	}

	/// Checks the policy for values the controller cannot operate with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		validate_window(self.window)?;

		self.acquire.validate()
	}

	/// Parses and validates a policy from JSON, reporting the path of malformed fields.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(json);
		let policy: Self = serde_path_to_error::deserialize(de)?;

		policy.validate()?;

		Ok(policy)
	}
}
impl Default for QuotaPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_QUOTA_BYTES, Self::DEFAULT_WINDOW)
	}
}

/// Strategy used when a principal's record is held by another caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AcquirePolicy {
	/// Non-blocking attempts with linear backoff (`base_delay * attempt`) between them. When
	/// every attempt fails the decision restarts from the registry lookup.
	Backoff {
		/// Attempts per decision round.
		attempts: u32,
		/// Delay unit multiplied by the attempt number.
		#[serde(rename = "base_delay_ms", with = "duration_millis")]
		base_delay: Duration,
	},
	/// Wait on the record lock until it is released.
	Blocking,
}
impl AcquirePolicy {
	/// Attempts per round used by [`AcquirePolicy::default`].
	pub const DEFAULT_ATTEMPTS: u32 = 5;
	/// Base delay used by [`AcquirePolicy::default`].
	pub const DEFAULT_BASE_DELAY: Duration = Duration::milliseconds(50);
	/// Most attempts accepted per round.
	pub const MAX_ATTEMPTS: u32 = 100;
	/// Longest accepted base delay.
	pub const MAX_BASE_DELAY: Duration = Duration::minutes(1);

	fn validate(&self) -> Result<(), ConfigError> {
		match *self {
			Self::Backoff { attempts: 0, .. } => Err(ConfigError::ZeroAttempts),
			Self::Backoff { attempts, .. } if attempts > Self::MAX_ATTEMPTS =>
				Err(ConfigError::TooManyAttempts { attempts, max: Self::MAX_ATTEMPTS }),
			Self::Backoff { base_delay, .. } if !base_delay.is_positive() =>
				Err(ConfigError::ZeroBaseDelay),
			Self::Backoff { base_delay, .. } if base_delay > Self::MAX_BASE_DELAY =>
				Err(ConfigError::BaseDelayTooLong { base_delay, max: Self::MAX_BASE_DELAY }),
			_ => Ok(()),
		}
	}
}
impl Default for AcquirePolicy {
	fn default() -> Self {
		Self::Backoff { attempts: Self::DEFAULT_ATTEMPTS, base_delay: Self::DEFAULT_BASE_DELAY }
	}
}

/// Checks a window length against the range the controller can represent.
pub(crate) fn validate_window(window: Duration) -> Result<(), ConfigError> {
	if !window.is_positive() {
		return Err(ConfigError::NonPositiveWindow { window });
	}
	if window > QuotaPolicy::MAX_WINDOW {
		return Err(ConfigError::WindowTooLong { window, max: QuotaPolicy::MAX_WINDOW });
	}

	Ok(())
}

mod duration_secs {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_i64(value.whole_seconds())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::seconds)
	}
}

mod duration_millis {
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer, ser::Error};
	use time::Duration;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let millis = i64::try_from(value.whole_milliseconds())
			.map_err(|_| S::Error::custom("duration exceeds i64 milliseconds"))?;

		serializer.serialize_i64(millis)
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		i64::deserialize(deserializer).map(Duration::milliseconds)
	}
}
