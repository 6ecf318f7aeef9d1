// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The pairing handshake: press the device's button, wait for
//! confirmation, and (GEN1 only) complete the registration explicitly.
//!
//! This is the one sequence where the firmware generation isn't known
//! in advance — it's *revealed* by which opcode `REGISTER_WAIT_FOR_BUTTON`
//! answers with. See spec.md §4.4.

use crate::catalog::Interaction;
use crate::engine::{ProtocolEngine, Transport};
use crate::error::Result;
use crate::identifier::DeviceId;
use crate::version::ProtocolVersion;

/// `REGISTER_PRESS_BUTTON` was sent. Neither generation replies to this
/// one directly; the button press itself is confirmed asynchronously by
/// [`ProtocolEngine::register_wait_for_button`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RegisterPressButtonReply;

/// The button was pressed and the device identified which firmware
/// generation it is.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RegisterWaitForButtonReply {
	/// The generation revealed by the reply opcode. Callers should feed
	/// this into [`ProtocolEngine::set_version`] before issuing any
	/// further interaction.
	pub version: ProtocolVersion,
}

/// `REGISTER_COMPLETE` succeeded (GEN1 only).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RegisterCompleteReply;

impl<T: Transport> ProtocolEngine<T> {
	/// Asks the device to start listening for its physical button to be
	/// pressed. The device's own generation isn't known yet, so this is
	/// sent with whatever opcode the `ProtocolVersion::Any`-eligible
	/// entry carries — GEN1 and GEN2 use different opcodes for this, and
	/// the engine doesn't yet know which one to expect a reply from, so
	/// neither catalog row waits for one.
	///
	/// GEN1's request carries a literal `0x01` flag byte; GEN2+ carries
	/// the 6-byte identifier the host is registering under (spec.md
	/// §4.2's `REGISTER_PRESS_BUTTON` row).
	pub fn register_press_button(&mut self, active_guess: ProtocolVersion, id: DeviceId) -> Result<RegisterPressButtonReply> {
		self.set_version(active_guess);
		let entry = self.resolve_wired(Interaction::RegisterPressButton)?;
		let opcode = entry.request_opcode.expect("REGISTER_PRESS_BUTTON always sends a request");
		debug_assert!(!entry.requires_reply);
		let payload: &[u8] = if active_guess == ProtocolVersion::Gen1 { &[0x01] } else { id.as_bytes() };
		self.send_without_reply(opcode, payload, entry.timeout);
		Ok(RegisterPressButtonReply)
	}

	/// Blocks until the device's button is physically pressed (up to the
	/// extended `BUTTON_TIMEOUT`), and identifies the firmware generation
	/// from which reply opcode comes back.
	///
	/// This does not send a request (`requires_request` is `false` for
	/// both catalog rows) — it's a second, delayed reply to the press
	/// request already sent.
	///
	/// `0xE4` is ambiguous on its own: GEN1 and GEN2 both use it. The
	/// guess [`ProtocolEngine::register_press_button`] latched (which
	/// opcode it used for the press itself) disambiguates it — a GEN1
	/// guess only ever accepts `0xE4`, while a GEN2-or-higher guess also
	/// recognizes `0x53` as a GEN3 upgrade.
	pub fn register_wait_for_button(&mut self) -> Result<RegisterWaitForButtonReply> {
		let interaction = Interaction::RegisterWaitForButton.name();
		let entry = self.resolve_wired(Interaction::RegisterWaitForButton)?;
		let guess = self.version();

		let reply = self.read_next_reply(interaction, entry.timeout, entry.expected_reply_opcodes)?;
		let version = match (guess, reply.opcode) {
			(ProtocolVersion::Gen1, 0xe4) => ProtocolVersion::Gen1,
			(_, 0xe4) if guess != ProtocolVersion::Gen1 => ProtocolVersion::Gen2,
			(_, 0x53) if guess != ProtocolVersion::Gen1 => ProtocolVersion::Gen3,
			(_, opcode) => {
				return Err(crate::error::Error::UnexpectedReply { interaction, opcode });
			}
		};

		log::info!("{interaction}: device identified itself as {version}");
		self.set_version(version);
		Ok(RegisterWaitForButtonReply { version })
	}

	/// Finishes registration (GEN1 only — GEN2's catalog entry is a
	/// documented no-op, since its handshake is already complete once
	/// [`ProtocolEngine::register_wait_for_button`] returns).
	pub fn register_complete(&mut self) -> Result<RegisterCompleteReply> {
		match self.resolve(Interaction::RegisterComplete)? {
			crate::catalog::Resolution::NoOp => Ok(RegisterCompleteReply),
			crate::catalog::Resolution::Found(entry) => self.execute_and_decode(entry, &[], |_frame| Ok(RegisterCompleteReply)),
		}
	}
}
