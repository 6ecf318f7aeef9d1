// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The protocol engine: resolves a logical interaction to its catalog
//! entry for the active firmware generation and executes it through the
//! transport.

use std::time::Duration;

use bytes::Bytes;

use crate::catalog::{self, CatalogEntry, Interaction, Resolution};
use crate::error::{Error, ErrorCode, Result};
use crate::frame::Frame;
use crate::version::ProtocolVersion;

/// The collaborator that actually talks to the smartpad.
///
/// A single method models spec.md §6's callback contract:
/// `callback(request_frame | null, wants_reply, timeout, user_data) ->
/// reply_frame | null`. Implementors own whatever state the C-style
/// `user_data` argument would have carried; Paperlink never needs it.
///
/// `exchange` must block for up to `timeout` when `wants_reply` is `true`
/// and return `None` to signal a timeout. When `request` is `None`, the
/// implementor must not send anything and should simply wait for the next
/// frame already in flight on the control channel (used for multi-reply
/// interactions).
pub trait Transport {
	/// Sends `request` (if any) and, if `wants_reply` is set, blocks for
	/// the next frame on the control channel, up to `timeout`.
	fn exchange(&mut self, request: Option<Bytes>, wants_reply: bool, timeout: Duration) -> Option<Frame>;
}

/// The engine's configurable knobs.
///
/// There is no file- or environment-variable-based configuration layer:
/// the crate has no process entry point of its own, so a caller
/// constructing a session already has everything it needs to fill this
/// in directly.
#[derive(Copy, Clone, Debug)]
pub struct EngineConfig {
	/// How long to wait for a reply to most interactions.
	pub reply_timeout: Duration,
	/// How long `REGISTER_WAIT_FOR_BUTTON` waits for the user to press
	/// the device's physical button.
	pub registration_timeout: Duration,
	/// Whether a GEN2 `WAIT_FOR_END_READ` CRC mismatch aborts the file
	/// transfer. GEN2 firmware is known to occasionally miscompute this
	/// checksum, so the default is to log and continue; the `strict-crc`
	/// feature flips that default. GEN1 always treats a mismatch as a
	/// warning and GEN3 always treats it as fatal, regardless of this
	/// flag — see [`crate::session::SessionOrchestrator::drain_files`].
	pub strict_gen2_crc: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			reply_timeout: Duration::from_secs(5),
			registration_timeout: Duration::from_secs(10),
			strict_gen2_crc: cfg!(feature = "strict-crc"),
		}
	}
}

/// Resolves interactions against the active firmware generation and runs
/// them through a [`Transport`].
///
/// The engine is synchronous: every method blocks until the transport
/// returns or a timeout elapses. It carries no state beyond the active
/// [`ProtocolVersion`] and its [`EngineConfig`] — every call is
/// independent, and nothing here is `Send`-unsafe to share across an
/// `await` point if the caller wraps it in their own async task, per
/// spec.md §5.
pub struct ProtocolEngine<T: Transport> {
	transport: T,
	version: ProtocolVersion,
	config: EngineConfig,
}

impl<T: Transport> ProtocolEngine<T> {
	/// Creates an engine with the default [`EngineConfig`], for a session
	/// that has not yet registered and so does not know which firmware
	/// generation it's talking to.
	///
	/// Interactions resolved before [`ProtocolEngine::set_version`] is
	/// called are resolved against [`ProtocolVersion::Any`].
	pub fn new(transport: T) -> Self {
		Self::with_config(transport, EngineConfig::default())
	}

	/// Creates an engine with a caller-supplied [`EngineConfig`].
	pub fn with_config(transport: T, config: EngineConfig) -> Self {
		Self {
			transport,
			version: ProtocolVersion::Any,
			config,
		}
	}

	/// The active configuration.
	#[must_use]
	pub const fn config(&self) -> EngineConfig {
		self.config
	}

	/// The firmware generation this engine is currently resolving
	/// interactions against.
	#[must_use]
	pub const fn version(&self) -> ProtocolVersion {
		self.version
	}

	/// Latches the firmware generation identified during registration
	/// (spec.md §4.4): `REGISTER_WAIT_FOR_BUTTON`'s reply opcode reveals
	/// which generation the device is.
	pub fn set_version(&mut self, version: ProtocolVersion) {
		log::debug!("latched protocol version {version}");
		self.version = version;
	}

	/// Resolves `interaction` against the active version, raising
	/// [`Error::Unsupported`] if no entry is eligible and the interaction
	/// isn't a documented no-op.
	pub(crate) fn resolve(&self, interaction: Interaction) -> Result<Resolution> {
		match catalog::resolve(interaction, self.version) {
			Resolution::Unsupported => Err(Error::Unsupported {
				interaction: interaction.name(),
			}),
			resolution => Ok(resolution),
		}
	}

	/// Resolves `interaction`, panicking if it turns out to be a
	/// documented no-op. For interactions whose catalog never carries a
	/// no-op row (everything except `GET_WIDTH`/`GET_HEIGHT`/
	/// `GET_POINT_SIZE`, which synthesize their own no-op replies inline).
	pub(crate) fn resolve_wired(&self, interaction: Interaction) -> Result<CatalogEntry> {
		match self.resolve(interaction)? {
			Resolution::Found(mut entry) => {
				entry.timeout = if matches!(interaction, Interaction::RegisterWaitForButton) {
					self.config.registration_timeout
				} else {
					self.config.reply_timeout
				};
				Ok(entry)
			}
			Resolution::NoOp => unreachable!("{} has no wired catalog entry", interaction.name()),
		}
	}

	/// The common execution path for an interaction whose reply, on
	/// success, is expected in a single frame: send the request (if any),
	/// wait for a reply, and either interpret a `0xB3` acknowledgement
	/// generically or hand the frame to `decode_reply` for a
	/// message-specific shape.
	///
	/// This is spec.md §4.2's "execute contract": an interaction that
	/// needs more than one frame (multi-reply messages) is built out of
	/// [`ProtocolEngine::send_and_read`] / [`ProtocolEngine::read_next_reply`]
	/// instead, directly in its module.
	pub(crate) fn execute_and_decode<F, Output>(
		&mut self, entry: CatalogEntry, payload: &[u8], decode_reply: F,
	) -> Result<Output>
	where
		F: FnOnce(&Frame) -> Result<Output>,
	{
		let interaction = entry.interaction.name();

		let request = entry
			.requires_request
			.then(|| Frame::encode_request(entry.request_opcode.expect("wired entry carries an opcode"), payload));

		log::debug!("{interaction}: sending request");
		let reply = self
			.transport
			.exchange(request, true, entry.timeout)
			.ok_or(Error::MissingReply { interaction })?;

		if reply.opcode == 0xb3 {
			match reply.payload.first().copied().unwrap_or(0) {
				0 => decode_reply(&reply),
				raw_code => {
					let code = ErrorCode::try_from(raw_code).map_err(|_| Error::UnexpectedData {
						interaction,
						detail: format!("unknown device error code {raw_code:#04x}"),
					})?;
					log::warn!("{interaction}: device reported {code:?}");
					Err(Error::Device { interaction, code })
				}
			}
		} else {
			check_expected_opcode(interaction, entry.expected_reply_opcodes, reply.opcode)?;
			decode_reply(&reply)
		}
	}

	/// Sends a request and reads exactly one reply, without the generic
	/// `0xB3` interpretation. `expected_reply_opcodes` is checked the same
	/// way [`ProtocolEngine::execute_and_decode`] checks it; pass `&[]`
	/// for interactions whose reply opcode is itself version-revealing
	/// and validated directly by the caller (e.g. `CONNECT`).
	pub(crate) fn send_and_read(
		&mut self, interaction: &'static str, opcode: u8, payload: &[u8], timeout: Duration, expected_reply_opcodes: &'static [u8],
	) -> Result<Frame> {
		let bytes = Frame::encode_request(opcode, payload);
		let reply = self
			.transport
			.exchange(Some(bytes), true, timeout)
			.ok_or(Error::MissingReply { interaction })?;
		check_expected_opcode(interaction, expected_reply_opcodes, reply.opcode)?;
		Ok(reply)
	}

	/// Sends a request without waiting for a reply (the reply, if any,
	/// arrives via a separate interaction — e.g. `REGISTER_PRESS_BUTTON`
	/// is answered by `REGISTER_WAIT_FOR_BUTTON`).
	pub(crate) fn send_without_reply(&mut self, opcode: u8, payload: &[u8], timeout: Duration) {
		let bytes = Frame::encode_request(opcode, payload);
		self.transport.exchange(Some(bytes), false, timeout);
	}

	/// Exposes the transport for inspection in tests (e.g. asserting which
	/// opcode a generation-gated interaction actually sent).
	#[cfg(test)]
	pub(crate) fn transport_for_test(&self) -> &T {
		&self.transport
	}

	/// Reads the next frame on the control channel without sending
	/// anything — the multi-reply continuation used by `GET_NAME`'s
	/// reassembly loop, `GET_FIRMWARE`'s second request/reply pair (which
	/// does send a request, just via [`ProtocolEngine::send_and_read`]
	/// again), and `WAIT_FOR_END_READ`'s second reply on GEN1. See
	/// [`ProtocolEngine::send_and_read`] for `expected_reply_opcodes`.
	pub(crate) fn read_next_reply(&mut self, interaction: &'static str, timeout: Duration, expected_reply_opcodes: &'static [u8]) -> Result<Frame> {
		let reply = self
			.transport
			.exchange(None, true, timeout)
			.ok_or(Error::MissingReply { interaction })?;
		check_expected_opcode(interaction, expected_reply_opcodes, reply.opcode)?;
		Ok(reply)
	}
}

/// Shared opcode-validation rule for both execution paths: an empty list
/// means "no centrally-enforced opcode", any other reply opcode is
/// accepted as-is (either because the interaction is ack-only and the
/// closure ignores the frame, or because the caller validates by hand).
fn check_expected_opcode(interaction: &'static str, expected_reply_opcodes: &'static [u8], opcode: u8) -> Result<()> {
	if expected_reply_opcodes.is_empty() || expected_reply_opcodes.contains(&opcode) {
		Ok(())
	} else {
		Err(Error::UnexpectedReply { interaction, opcode })
	}
}
