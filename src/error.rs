// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The error taxonomy: device-reported error codes, protocol-violation
//! errors synthesized by the engine, and the mapping from either to a
//! POSIX-ish numeric code for cross-process reporting.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// An error code as reported by the device in a `0xB3` reply.
///
/// `Success` is provided for completeness; the engine filters it out
/// before it would ever appear inside [`Error::Device`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ErrorCode {
	/// The request succeeded.
	Success = 0x0,
	/// An unspecified failure.
	GeneralError = 0x1,
	/// The device is not in a state where it can service this request.
	InvalidState = 0x2,
	/// The targeted parameter is read-only.
	ReadOnlyParam = 0x3,
	/// The device does not implement this command.
	CommandNotSupported = 0x4,
	/// The device rejected the request because the caller's identifier
	/// was not recognized.
	AuthorizationError = 0x7,
}

/// Every error Paperlink can raise, from device-reported failures through
/// to bugs in our own understanding of the wire format.
#[derive(Error, Debug)]
pub enum Error {
	/// The device rejected the request with a non-zero `0xB3` error code
	/// that doesn't carry a more specific meaning for this interaction.
	#[error("device reported error {code:?} for {interaction}")]
	Device {
		/// The interaction that was being executed.
		interaction: &'static str,
		/// The error code the device reported.
		code: ErrorCode,
	},

	/// The device did not recognize our identifier, or (GEN3) explicitly
	/// denied the connection for an identity reason.
	#[error("device refused to authorize this session for {interaction}")]
	Authorization {
		/// The interaction that was being executed.
		interaction: &'static str,
	},

	/// The device is not in a state that allows this request right now.
	/// Distinguished from [`Error::Device`] with `InvalidState` so that
	/// GEN3's inline connect-denial reason can be mapped without going
	/// through a synthetic `0xB3` reply.
	#[error("device is not in a state to service {interaction}")]
	InvalidState {
		/// The interaction that was being executed.
		interaction: &'static str,
	},

	/// The reply opcode did not match any shape this interaction's
	/// catalog entry expects. Indicates our catalog disagrees with the
	/// firmware; not recoverable within the current session.
	#[error("unexpected reply opcode {opcode:#04x} for {interaction}")]
	UnexpectedReply {
		/// The interaction that was being executed.
		interaction: &'static str,
		/// The opcode actually received.
		opcode: u8,
	},

	/// A reply's payload did not match the shape this interaction's
	/// catalog entry expects (wrong length, mismatched echoed field,
	/// malformed frame).
	#[error("unexpected data in reply to {interaction}: {detail}")]
	UnexpectedData {
		/// The interaction that was being executed.
		interaction: &'static str,
		/// What about the payload was wrong.
		detail: String,
	},

	/// A reply was required but the transport callback returned `None`
	/// (timeout).
	#[error("no reply received for {interaction} within the timeout")]
	MissingReply {
		/// The interaction that was being executed.
		interaction: &'static str,
	},

	/// The interaction has no catalog entry for the active protocol
	/// version and isn't marked as a no-op for that generation.
	#[error("{interaction} is not supported on this firmware generation")]
	Unsupported {
		/// The interaction that has no eligible catalog entry.
		interaction: &'static str,
	},

	/// The decoder could not make sense of the stroke-data byte stream.
	#[error("failed to parse stroke data: {0}")]
	StrokeParsing(String),

	/// The caller supplied a device identifier that wasn't exactly 12
	/// lowercase hexadecimal characters.
	#[error("invalid device identifier {raw:?}: {source}")]
	InvalidIdentifier {
		/// The string the caller supplied.
		raw: String,
		/// The underlying hex-decoding failure.
		#[source]
		source: hex::FromHexError,
	},

	/// The accumulated pen-data buffer's CRC-32 did not match the
	/// device-reported CRC, on a generation where this is fatal.
	#[error("pen data CRC mismatch: device reported {reported:#010x}, computed {computed:#010x}")]
	CrcMismatch {
		/// The CRC the device reported.
		reported: u32,
		/// The CRC Paperlink computed over the accumulated pen data.
		computed: u32,
	},
}

impl Error {
	/// A "POSIX-ish" numeric code for cross-process reporting, per
	/// spec.md §6's error propagation table.
	#[must_use]
	pub const fn posix_errno(&self) -> i32 {
		// Values mirror the host's libc errno numbers; callers on
		// platforms without a libc can still compare them structurally.
		match self {
			Self::InvalidState { .. } => 52,   // EBADE
			Self::Authorization { .. } => 13,  // EACCES
			Self::MissingReply { .. } => 62,   // ETIME
			Self::Device { .. }
			| Self::UnexpectedReply { .. }
			| Self::UnexpectedData { .. }
			| Self::Unsupported { .. }
			| Self::StrokeParsing(_)
			| Self::InvalidIdentifier { .. }
			| Self::CrcMismatch { .. } => 71, // EPROTO
		}
	}
}

/// Shorthand for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn posix_mapping() {
		assert_eq!(
			Error::InvalidState { interaction: "x" }.posix_errno(),
			52
		);
		assert_eq!(Error::Authorization { interaction: "x" }.posix_errno(), 13);
		assert_eq!(Error::MissingReply { interaction: "x" }.posix_errno(), 62);
		assert_eq!(
			Error::UnexpectedReply {
				interaction: "x",
				opcode: 0
			}
			.posix_errno(),
			71
		);
	}

	#[test]
	fn error_code_roundtrip() {
		assert_eq!(
			ErrorCode::try_from(0x7u8).unwrap(),
			ErrorCode::AuthorizationError
		);
		assert!(ErrorCode::try_from(0x55u8).is_err());
	}
}
