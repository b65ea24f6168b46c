// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! RFC 7636 proof-key pair, S256 method only.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

/// Verifier and challenge for one authorization request.
///
/// The verifier stays server-side until token exchange; only the challenge
/// goes into the authorization URL.
#[derive(Debug, Clone)]
pub struct PkcePair {
	pub verifier: String,
	pub challenge: String,
}

impl PkcePair {
	/// Generate a fresh pair from 32 bytes of OS randomness.
	pub fn generate() -> Self {
		let mut bytes = [0u8; 32];
		getrandom::getrandom(&mut bytes).expect("OS random source unavailable");
		Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
	}

	/// Derive the S256 challenge for a known verifier.
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let digest = Sha256::digest(verifier.as_bytes());
		Self {
			challenge: URL_SAFE_NO_PAD.encode(digest),
			verifier,
		}
	}
}
