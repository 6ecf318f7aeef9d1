// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware generation tags and the "minimum supported version" predicate
//! used to select catalog entries.

use derive_more::Display;

/// A firmware generation tag, named after the device families first seen
/// using each dialect of the protocol.
///
/// `ProtocolVersion` is totally ordered. A catalog entry tagged with some
/// version `G` is eligible for an active session whose version is `>= G`;
/// see [`crate::catalog`] for how this is used to resolve an interaction to
/// a concrete message.
#[derive(Copy, Clone, Eq, PartialEq, PartialOrd, Ord, Hash, Debug, Default, Display)]
pub enum ProtocolVersion {
	/// Eligible for every generation. Used for interactions whose wire
	/// shape hasn't changed since the first generation.
	#[default]
	#[display(fmt = "any")]
	Any,
	/// First smartpad generation.
	#[display(fmt = "gen1")]
	Gen1,
	/// Second smartpad generation.
	#[display(fmt = "gen2")]
	Gen2,
	/// Third smartpad generation.
	#[display(fmt = "gen3")]
	Gen3,
}

impl ProtocolVersion {
	/// Whether a catalog entry requiring at least `self` may be used by a
	/// session whose active generation is `active`.
	#[must_use]
	pub const fn is_eligible_for(self, active: Self) -> bool {
		(self as u8) <= (active as u8)
	}
}
