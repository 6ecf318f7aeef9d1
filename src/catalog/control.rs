// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Two interactions too small to earn their own message shape:
//! `SET_MODE` and the undocumented GEN1 warm-up command.

use crate::catalog::Interaction;
use crate::engine::{ProtocolEngine, Transport};
use crate::error::Result;
use crate::mode::Mode;

/// `SET_MODE` succeeded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SetModeReply;

/// `UNKNOWN_E3` succeeded. GEN1's warm-up sequence sends this before
/// `SET_TIME`; no generation documents what it actually does.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct UnknownE3Reply;

impl<T: Transport> ProtocolEngine<T> {
	/// Switches the tablet's reporting mode.
	pub fn set_mode(&mut self, mode: Mode) -> Result<SetModeReply> {
		let entry = self.resolve_wired(Interaction::SetMode)?;
		self.execute_and_decode(entry, &[mode.into()], |_frame| Ok(SetModeReply))
	}

	/// Sends the undocumented `0xE3 [0x00]` command GEN1 expects before
	/// `SET_TIME`. See spec.md §4.2 and §9's open question: no other
	/// generation's warm-up sequence includes it.
	pub fn unknown_e3(&mut self) -> Result<UnknownE3Reply> {
		let entry = self.resolve_wired(Interaction::UnknownE3)?;
		self.execute_and_decode(entry, &[0x00], |_frame| Ok(UnknownE3Reply))
	}
}
