// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret wrapper type for the rotor workspace.
//!
//! [`Secret<T>`] holds a sensitive value and refuses to reveal it through
//! `Debug` or `Display` — both print [`REDACTED`]. Access to the inner value
//! is always a deliberate call to [`Secret::expose`], which makes secret
//! usage easy to audit with grep.
//!
//! The inner value is zeroized when the wrapper is dropped.
//!
//! Serde support (default feature) serializes the *actual* value: credential
//! records must round-trip through the durable store intact. Redaction
//! protects logs, not persistence.

use zeroize::Zeroize;

/// Placeholder emitted by `Debug` and `Display` for any secret.
pub const REDACTED: &str = "[REDACTED]";

/// A wrapper that keeps its contents out of logs.
#[derive(Clone)]
pub struct Secret<T: Zeroize>(T);

/// The common case: a secret string (token, client secret, key material).
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	/// Wrap a sensitive value.
	pub fn new(value: T) -> Self {
		Self(value)
	}

	/// Deliberately reveal the inner value.
	pub fn expose(&self) -> &T {
		&self.0
	}
}

impl<T: Zeroize> Drop for Secret<T> {
	fn drop(&mut self) {
		self.0.zeroize();
	}
}

impl<T: Zeroize> std::fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize> std::fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(REDACTED)
	}
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
	fn eq(&self, other: &Self) -> bool {
		self.0 == other.0
	}
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for SecretString {
	fn from(value: &str) -> Self {
		Self::new(value.to_string())
	}
}

#[cfg(feature = "serde")]
impl<T: Zeroize + serde::Serialize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.0.serialize(serializer)
	}
}

#[cfg(feature = "serde")]
impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Secret::new)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_debug_is_redacted() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(format!("{secret:?}"), REDACTED);
	}

	#[test]
	fn test_display_is_redacted() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(format!("{secret}"), REDACTED);
	}

	#[test]
	fn test_expose_returns_inner() {
		let secret = SecretString::new("hunter2".to_string());
		assert_eq!(secret.expose(), "hunter2");
	}

	#[test]
	fn test_equality_compares_inner() {
		let a = SecretString::from("same");
		let b = SecretString::from("same");
		let c = SecretString::from("different");
		assert_eq!(a, b);
		assert_ne!(a, c);
	}

	#[test]
	fn test_serde_round_trip_preserves_value() {
		let secret = SecretString::from("rt_token_123");
		let json = serde_json::to_string(&secret).unwrap();
		assert_eq!(json, "\"rt_token_123\"");

		let back: SecretString = serde_json::from_str(&json).unwrap();
		assert_eq!(back.expose(), "rt_token_123");
	}

	#[test]
	fn test_format_in_struct_context_is_redacted() {
		#[derive(Debug)]
		#[allow(dead_code)]
		struct Creds {
			refresh: SecretString,
		}

		let creds = Creds {
			refresh: SecretString::from("rt_secret"),
		};
		let rendered = format!("{creds:?}");
		assert!(!rendered.contains("rt_secret"));
		assert!(rendered.contains(REDACTED));
	}
}
