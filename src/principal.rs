//! Keys naming whose upload budget a request is charged to.
//!
//! Signed-in uploaders are charged under their user id. Everyone else is charged under the
//! shared [`PrincipalKey::ANONYMOUS`] key, so anonymous upload volume is capped in aggregate
//! instead of per visitor. User ids may not spell the sentinel, otherwise a registered account
//! named `anonymous` would drain (or be drained by) the shared budget.

// std
use std::borrow::Borrow;
// self
use crate::_prelude::*;

/// Longest user id accepted as an upload key, in bytes.
pub const USER_ID_MAX_BYTES: usize = 128;

/// Reasons a user id cannot be used to account uploads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum PrincipalKeyError {
	/// Sessions without a user id must go through [`PrincipalKey::from_user`] with `None`.
	#[error("Uploader user id is empty.")]
	Empty,
	/// Whitespace would let two spellings of one account split its budget.
	#[error("Uploader user id contains whitespace.")]
	ContainsWhitespace,
	/// The id is longer than [`USER_ID_MAX_BYTES`].
	#[error("Uploader user id is longer than {max} bytes.")]
	TooLong {
		/// Byte limit.
		max: usize,
	},
	/// The id collides with the shared anonymous key.
	#[error("User id `anonymous` is reserved for unauthenticated uploads.")]
	ReservedSentinel,
}

/// Upload budget owner: a signed-in user or the shared anonymous bucket.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalKey(String);
impl PrincipalKey {
	/// Key shared by every unauthenticated uploader.
	pub const ANONYMOUS: &'static str = "anonymous";

	/// Key for a signed-in uploader.
	pub fn new(user_id: impl AsRef<str>) -> Result<Self, PrincipalKeyError> {
		let user_id = user_id.as_ref();

		if user_id == Self::ANONYMOUS {
			return Err(PrincipalKeyError::ReservedSentinel);
		}

		check_user_id(user_id)?;

		Ok(Self(user_id.to_owned()))
	}

	/// Key for unauthenticated uploads.
	pub fn anonymous() -> Self {
		Self(Self::ANONYMOUS.to_owned())
	}

	/// Picks the key for a session: its user id when signed in, the anonymous bucket otherwise.
	pub fn from_user(user_id: Option<&str>) -> Result<Self, PrincipalKeyError> {
		user_id.map_or_else(|| Ok(Self::anonymous()), Self::new)
	}

	/// Returns true for the shared anonymous bucket.
	pub fn is_anonymous(&self) -> bool {
		self.0 == Self::ANONYMOUS
	}
}
impl AsRef<str> for PrincipalKey {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for PrincipalKey {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<PrincipalKey> for String {
	fn from(value: PrincipalKey) -> Self {
		value.0
	}
}
impl TryFrom<String> for PrincipalKey {
	type Error = PrincipalKeyError;

	// Stored keys may be the sentinel itself.
	fn try_from(value: String) -> Result<Self, Self::Error> {
		if value == Self::ANONYMOUS {
			return Ok(Self::anonymous());
		}

		check_user_id(&value)?;

		Ok(Self(value))
	}
}
impl Debug for PrincipalKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		if self.is_anonymous() { f.write_str("Anonymous") } else { write!(f, "User({})", self.0) }
	}
}
impl Display for PrincipalKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn check_user_id(user_id: &str) -> Result<(), PrincipalKeyError> {
	if user_id.is_empty() {
		return Err(PrincipalKeyError::Empty);
	}
	if user_id.chars().any(char::is_whitespace) {
		return Err(PrincipalKeyError::ContainsWhitespace);
	}
	if user_id.len() > USER_ID_MAX_BYTES {
		return Err(PrincipalKeyError::TooLong { max: USER_ID_MAX_BYTES });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn user_ids_are_checked() {
		assert_eq!(PrincipalKey::new(""), Err(PrincipalKeyError::Empty));
		assert_eq!(PrincipalKey::new("user 1"), Err(PrincipalKeyError::ContainsWhitespace));
		assert!(PrincipalKey::new(format!("u{}1", '\u{00A0}')).is_err());
		assert!(PrincipalKey::new("a".repeat(USER_ID_MAX_BYTES)).is_ok());
		// Multi-byte ids are limited by encoded length.
		assert_eq!(
			PrincipalKey::new("é".repeat(USER_ID_MAX_BYTES / 2 + 1)),
			Err(PrincipalKeyError::TooLong { max: USER_ID_MAX_BYTES })
		);

		let key = PrincipalKey::new("u1").expect("Plain user id should be a valid key.");

		assert_eq!(key.as_ref(), "u1");
		assert!(!key.is_anonymous());
		assert_eq!(format!("{key:?}"), "User(u1)");
	}

	#[test]
	fn signed_in_user_cannot_claim_the_anonymous_bucket() {
		assert_eq!(PrincipalKey::new("anonymous"), Err(PrincipalKeyError::ReservedSentinel));
		assert_eq!(
			PrincipalKey::from_user(Some("anonymous")),
			Err(PrincipalKeyError::ReservedSentinel)
		);
	}

	#[test]
	fn unauthenticated_callers_share_the_sentinel() {
		let first = PrincipalKey::from_user(None).expect("Anonymous mapping cannot fail.");
		let second = PrincipalKey::from_user(None).expect("Anonymous mapping cannot fail.");

		assert_eq!(first, second);
		assert!(first.is_anonymous());
		assert_eq!(first.as_ref(), PrincipalKey::ANONYMOUS);
		assert_eq!(format!("{first:?}"), "Anonymous");
	}

	#[test]
	fn serde_round_trip_keeps_the_sentinel_and_checks_user_ids() {
		let key: PrincipalKey =
			serde_json::from_str("\"u-42\"").expect("Key should deserialize successfully.");

		assert_eq!(key.as_ref(), "u-42");

		let anonymous: PrincipalKey =
			serde_json::from_str("\"anonymous\"").expect("Sentinel should deserialize.");

		assert!(anonymous.is_anonymous());
		assert!(serde_json::from_str::<PrincipalKey>("\"with space\"").is_err());
		assert!(serde_json::from_str::<PrincipalKey>("\"\"").is_err());
	}

	#[test]
	fn registry_lookups_accept_plain_strings() {
		let map: HashMap<PrincipalKey, u8> = HashMap::from_iter([(PrincipalKey::anonymous(), 7)]);

		assert_eq!(map.get("anonymous"), Some(&7));
	}
}
