//! Redacting string type for credentials.
//!
//! `SecretString` holds the admin password and issued session tokens. The
//! buffer is zeroed on drop and the value never shows up in `Debug`,
//! `Display` or serialized output.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroizing;

#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
	pub fn new(s: String) -> Self {
		Self(Zeroizing::new(s))
	}

	/// Exposes the secret string as a string slice.
	///
	/// Callers must not log or persist the returned value.
	pub fn expose_secret(&self) -> &str {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Compares against a candidate without returning early, on either a
	/// differing byte or a differing length. The shorter side is padded with
	/// zero bytes and the length mismatch is folded into the result.
	pub fn matches(&self, candidate: &str) -> bool {
		let secret = self.0.as_bytes();
		let candidate = candidate.as_bytes();
		let len = secret.len().max(candidate.len());

		let diff = (0..len).fold(u8::from(secret.len() != candidate.len()), |acc, i| {
			let a = secret.get(i).copied().unwrap_or(0);
			let b = candidate.get(i).copied().unwrap_or(0);
			acc | (a ^ b)
		});
		diff == 0
	}
}

impl fmt::Debug for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SecretString(***REDACTED***)")
	}
}

impl fmt::Display for SecretString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "***REDACTED***")
	}
}

impl From<String> for SecretString {
	fn from(s: String) -> Self {
		Self::new(s)
	}
}

impl From<&str> for SecretString {
	fn from(s: &str) -> Self {
		Self::new(s.to_string())
	}
}

impl PartialEq for SecretString {
	fn eq(&self, other: &Self) -> bool {
		self.matches(other.expose_secret())
	}
}

impl Eq for SecretString {}

impl Serialize for SecretString {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str("***REDACTED***")
	}
}

impl<'de> Deserialize<'de> for SecretString {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Ok(SecretString::new(s))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_secret_string_redacted() {
		let secret = SecretString::from("hunter22");
		assert_eq!(format!("{:?}", secret), "SecretString(***REDACTED***)");
		assert_eq!(format!("{}", secret), "***REDACTED***");
		assert_eq!(
			serde_json::to_string(&secret).unwrap(),
			"\"***REDACTED***\""
		);
	}

	#[test]
	fn test_matches() {
		let secret = SecretString::from("password");
		assert!(secret.matches("password"));
		assert!(!secret.matches("passwore"));
		assert!(!secret.matches("pass"));
		assert!(!secret.matches(""));
		// Zero padding alone must not make a longer candidate match
		assert!(!secret.matches("password\0"));
		assert!(!secret.matches("password\0\0\0"));
		assert!(SecretString::from("").matches(""));
	}

	#[test]
	fn test_deserialize_keeps_value() {
		let secret: SecretString = serde_json::from_str("\"s3cret\"").unwrap();
		assert_eq!(secret.expose_secret(), "s3cret");
	}
}
