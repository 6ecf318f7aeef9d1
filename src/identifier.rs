// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 6-byte device identifier used in `CONNECT` and
//! `REGISTER_PRESS_BUTTON`.

use crate::error::{Error, Result};

/// A 6-byte identifier the host chooses before registration and echoes on
/// every subsequent connection.
///
/// Constructed from a 12-character lowercase hexadecimal string; invalid
/// characters are rejected before any transport I/O happens, per spec.md
/// §6.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DeviceId([u8; 6]);

impl DeviceId {
	/// Parses a 12-character lowercase hexadecimal string into a
	/// `DeviceId`.
	///
	/// # Errors
	///
	/// Returns [`Error::InvalidIdentifier`] if `hex` is not exactly 12
	/// hexadecimal characters.
	pub fn parse(hex: &str) -> Result<Self> {
		let mut bytes = [0u8; 6];
		hex::decode_to_slice(hex, &mut bytes).map_err(|source| Error::InvalidIdentifier {
			raw: hex.to_owned(),
			source,
		})?;
		Ok(Self(bytes))
	}

	/// The raw 6 bytes, in the order they're sent on the wire.
	#[must_use]
	pub const fn as_bytes(&self) -> &[u8; 6] {
		&self.0
	}
}

impl std::fmt::Debug for DeviceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "DeviceId({})", hex::encode(self.0))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_valid_identifier() {
		let id = DeviceId::parse("112233445566").unwrap();
		assert_eq!(id.as_bytes(), &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
	}

	#[test]
	fn rejects_wrong_length() {
		assert!(DeviceId::parse("1122334455").is_err());
		assert!(DeviceId::parse("11223344556677").is_err());
	}

	#[test]
	fn rejects_non_hex_characters() {
		assert!(DeviceId::parse("zz2233445566").is_err());
	}
}
