// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `CONNECT`: the very first exchange of a session, and the one
//! interaction whose success/denial framing genuinely differs across all
//! three firmware generations.

use crate::catalog::Interaction;
use crate::engine::{ProtocolEngine, Transport};
use crate::error::{Error, ErrorCode, Result};
use crate::identifier::DeviceId;
use crate::version::ProtocolVersion;

/// `CONNECT` succeeded: the device has accepted this session's
/// identifier and is ready for the rest of the paired-fetch sequence.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct ConnectReply;

impl<T: Transport> ProtocolEngine<T> {
	/// Opens a session with the device identified by `id`.
	///
	/// All three generations accept the same request shape (opcode
	/// `0xE6` plus the 6-byte identifier) but disagree about how a
	/// denial is reported:
	///
	/// - GEN1 answers with a `0xB3` reply; a `GeneralError` byte is
	///   remapped to [`Error::Authorization`] (this is the only error
	///   `CONNECT` can produce on GEN1), any other nonzero byte
	///   surfaces as [`Error::Device`].
	/// - GEN2 also answers with `0xB3`, but remaps the more specific
	///   `AuthorizationError` byte instead; any other nonzero byte
	///   surfaces as [`Error::Device`].
	/// - GEN3 drops the `0xB3` convention for this interaction entirely:
	///   `0x50` is bare success and `0x51` carries an inline reason byte,
	///   where `0x00`/`0x03` mean the device isn't ready to pair
	///   ([`Error::InvalidState`]) and `0x01`/`0x02` mean the identifier
	///   was rejected ([`Error::Authorization`]).
	///
	/// Because the reply opcode itself varies, this bypasses
	/// [`ProtocolEngine::execute_and_decode`]'s generic `0xB3`
	/// interpretation and inspects the reply directly.
	pub fn connect(&mut self, id: DeviceId) -> Result<ConnectReply> {
		let entry = self.resolve_wired(Interaction::Connect)?;
		let interaction = Interaction::Connect.name();
		let opcode = entry.request_opcode.expect("CONNECT always sends a request");

		let reply = self.send_and_read(interaction, opcode, id.as_bytes(), entry.timeout, entry.expected_reply_opcodes)?;

		match (self.version(), reply.opcode) {
			(ProtocolVersion::Gen3, 0x50) => Ok(ConnectReply),
			(ProtocolVersion::Gen3, 0x51) => match reply.payload.first().copied().unwrap_or(0) {
				0x00 | 0x03 => Err(Error::InvalidState { interaction }),
				_ => Err(Error::Authorization { interaction }),
			},
			(version, 0xb3) => {
				let raw_code = reply.payload.first().copied().unwrap_or(0);
				if raw_code == 0 {
					return Ok(ConnectReply);
				}
				let code = ErrorCode::try_from(raw_code).map_err(|_| Error::UnexpectedData {
					interaction,
					detail: format!("unknown device error code {raw_code:#04x}"),
				})?;
				let remapped_to_authorization = match version {
					ProtocolVersion::Gen1 | ProtocolVersion::Any => code == ErrorCode::GeneralError,
					_ => code == ErrorCode::AuthorizationError,
				};
				if remapped_to_authorization {
					Err(Error::Authorization { interaction })
				} else {
					Err(Error::Device { interaction, code })
				}
			}
			(_, opcode) => Err(Error::UnexpectedReply { interaction, opcode }),
		}
	}
}
