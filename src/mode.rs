// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The reporting mode a smartpad can be placed into with `SET_MODE`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Mode {
	/// The tablet streams samples as they are drawn.
	Live = 0x00,
	/// The tablet stores strokes for later retrieval. This is the mode
	/// Paperlink's session orchestrator uses before draining drawings.
	Paper = 0x01,
	/// The tablet suspends reporting entirely.
	Idle = 0x02,
}
