// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The message catalog: a versioned registry of control-plane
//! interactions.
//!
//! Each interaction may have several catalog entries, one per firmware
//! generation that implements it differently (or not at all). [`resolve`]
//! picks the entry with the highest `min_version` that is still `<=` the
//! session's active [`ProtocolVersion`] — see spec.md §4.2.
//!
//! The entries here only carry the metadata that's truly uniform across
//! an interaction's variants (opcode, timeout, whether a request/reply is
//! involved at all). The reply shapes genuinely differ per generation, so
//! decoding them is left to the per-interaction modules in this directory,
//! each of which calls [`resolve`] before touching the transport.

pub(crate) mod clock;
mod connect;
mod control;
mod device_info;
mod files;
mod registration;

use std::time::Duration;

use crate::version::ProtocolVersion;

pub use clock::{GetTimeReply, SetTimeReply};
pub use connect::ConnectReply;
pub use control::{SetModeReply, UnknownE3Reply};
pub use device_info::{
	FirmwareReply,
	GetBatteryReply,
	GetDimensionReply,
	GetNameReply,
	GetPointSizeReply,
	SetNameReply,
};
pub use files::{
	AvailableFilesCountReply,
	DeleteOldestFileReply,
	DownloadOldestFileReply,
	GetStrokesReply,
	SetFileTransferReportingTypeReply,
	WaitForEndReadReply,
};
pub use registration::{
	RegisterCompleteReply,
	RegisterPressButtonReply,
	RegisterWaitForButtonReply,
};

/// A logical interaction the engine can be asked to execute.
///
/// Not every interaction is available on every firmware generation; see
/// [`resolve`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[allow(missing_docs)]
pub enum Interaction {
	Connect,
	GetName,
	SetName,
	GetTime,
	SetTime,
	GetFirmware,
	GetBattery,
	GetWidth,
	GetHeight,
	GetPointSize,
	SetMode,
	GetStrokes,
	AvailableFilesCount,
	DownloadOldestFile,
	DeleteOldestFile,
	WaitForEndRead,
	RegisterPressButton,
	RegisterWaitForButton,
	RegisterComplete,
	SetFileTransferReportingType,
	UnknownE3,
}

impl Interaction {
	/// The interaction's name, used in error messages and log lines.
	#[must_use]
	pub const fn name(self) -> &'static str {
		match self {
			Self::Connect => "CONNECT",
			Self::GetName => "GET_NAME",
			Self::SetName => "SET_NAME",
			Self::GetTime => "GET_TIME",
			Self::SetTime => "SET_TIME",
			Self::GetFirmware => "GET_FIRMWARE",
			Self::GetBattery => "GET_BATTERY",
			Self::GetWidth => "GET_WIDTH",
			Self::GetHeight => "GET_HEIGHT",
			Self::GetPointSize => "GET_POINT_SIZE",
			Self::SetMode => "SET_MODE",
			Self::GetStrokes => "GET_STROKES",
			Self::AvailableFilesCount => "AVAILABLE_FILES_COUNT",
			Self::DownloadOldestFile => "DOWNLOAD_OLDEST_FILE",
			Self::DeleteOldestFile => "DELETE_OLDEST_FILE",
			Self::WaitForEndRead => "WAIT_FOR_END_READ",
			Self::RegisterPressButton => "REGISTER_PRESS_BUTTON",
			Self::RegisterWaitForButton => "REGISTER_WAIT_FOR_BUTTON",
			Self::RegisterComplete => "REGISTER_COMPLETE",
			Self::SetFileTransferReportingType => "SET_FILE_TRANSFER_REPORTING_TYPE",
			Self::UnknownE3 => "UNKNOWN_E3",
		}
	}
}

/// The declarative part of a catalog entry: everything about an
/// interaction's wire contract that doesn't depend on decoding a
/// particular reply shape.
#[derive(Copy, Clone, Debug)]
pub struct CatalogEntry {
	/// The interaction this entry implements.
	pub interaction: Interaction,
	/// The minimum protocol version this entry is eligible for.
	pub min_version: ProtocolVersion,
	/// `true` if this entry returns a result entirely synthesized by the
	/// host, without ever touching the transport (e.g. the Spark's
	/// hardcoded tablet dimensions).
	pub is_noop: bool,
	/// The opcode used for the request frame, if any.
	pub request_opcode: Option<u8>,
	/// Whether a request frame is actually sent to the device.
	pub requires_request: bool,
	/// Whether the caller must wait for at least one reply.
	pub requires_reply: bool,
	/// How long to wait for a reply before raising `MissingReply`.
	pub timeout: Duration,
	/// The reply opcode(s) a successful, data-bearing reply may carry
	/// (spec.md §3's catalog-entry field). Checked once by
	/// [`crate::engine::ProtocolEngine::execute_and_decode`]/
	/// [`crate::engine::ProtocolEngine::send_and_read`] rather than by each
	/// module. Empty means either the interaction never answers with
	/// anything but the generic `0xB3` acknowledgement, or (`CONNECT`,
	/// `REGISTER_WAIT_FOR_BUTTON`) its reply opcode is itself
	/// version-revealing and validated by hand in that module.
	pub expected_reply_opcodes: &'static [u8],
}

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const BUTTON_TIMEOUT: Duration = Duration::from_secs(10);

const fn entry(
	interaction: Interaction, min_version: ProtocolVersion, request_opcode: Option<u8>,
	requires_request: bool, requires_reply: bool, expected_reply_opcodes: &'static [u8],
) -> CatalogEntry {
	CatalogEntry {
		interaction,
		min_version,
		is_noop: false,
		request_opcode,
		requires_request,
		requires_reply,
		timeout: DEFAULT_TIMEOUT,
		expected_reply_opcodes,
	}
}

const fn noop(interaction: Interaction, min_version: ProtocolVersion) -> CatalogEntry {
	CatalogEntry {
		interaction,
		min_version,
		is_noop: true,
		request_opcode: None,
		requires_request: false,
		requires_reply: false,
		timeout: DEFAULT_TIMEOUT,
		expected_reply_opcodes: &[],
	}
}

/// The full catalog: one row per (interaction, firmware generation) pair
/// that behaves differently from the version below it.
static CATALOG: &[CatalogEntry] = &[
	entry(Interaction::Connect, ProtocolVersion::Any, Some(0xe6), true, true, &[]),
	entry(Interaction::GetName, ProtocolVersion::Any, Some(0xbb), true, true, &[0xbc]),
	entry(Interaction::GetName, ProtocolVersion::Gen3, Some(0xdb), true, true, &[0xbc]),
	entry(Interaction::SetName, ProtocolVersion::Any, Some(0xbb), true, true, &[]),
	entry(Interaction::SetName, ProtocolVersion::Gen3, Some(0xdb), true, true, &[]),
	entry(Interaction::GetTime, ProtocolVersion::Any, Some(0xb6), true, true, &[0xbd]),
	entry(Interaction::GetTime, ProtocolVersion::Gen3, Some(0xd6), true, true, &[0xbd]),
	entry(Interaction::SetTime, ProtocolVersion::Any, Some(0xb6), true, true, &[]),
	entry(Interaction::GetFirmware, ProtocolVersion::Any, Some(0xb7), true, true, &[0xb8]),
	entry(Interaction::GetBattery, ProtocolVersion::Any, Some(0xb9), true, true, &[0xba]),
	noop(Interaction::GetWidth, ProtocolVersion::Any),
	entry(Interaction::GetWidth, ProtocolVersion::Gen2, Some(0xea), true, true, &[0xeb]),
	noop(Interaction::GetHeight, ProtocolVersion::Any),
	entry(Interaction::GetHeight, ProtocolVersion::Gen2, Some(0xea), true, true, &[0xeb]),
	noop(Interaction::GetPointSize, ProtocolVersion::Any),
	entry(Interaction::GetPointSize, ProtocolVersion::Gen3, Some(0xea), true, true, &[0xeb]),
	entry(Interaction::SetMode, ProtocolVersion::Any, Some(0xb1), true, true, &[]),
	entry(Interaction::GetStrokes, ProtocolVersion::Gen1, Some(0xc5), true, true, &[0xc7, 0xcd]),
	entry(Interaction::GetStrokes, ProtocolVersion::Gen2, Some(0xcc), true, true, &[0xcf]),
	entry(Interaction::GetStrokes, ProtocolVersion::Gen3, Some(0xcc), true, true, &[0xcf]),
	entry(Interaction::AvailableFilesCount, ProtocolVersion::Any, Some(0xc1), true, true, &[0xc2]),
	entry(Interaction::AvailableFilesCount, ProtocolVersion::Gen2, Some(0xc1), true, true, &[0xc2]),
	entry(Interaction::DownloadOldestFile, ProtocolVersion::Any, Some(0xc3), true, true, &[0xc8]),
	entry(Interaction::WaitForEndRead, ProtocolVersion::Gen1, None, false, true, &[0xc8, 0xc9]),
	entry(Interaction::WaitForEndRead, ProtocolVersion::Gen2, None, false, true, &[0xc8]),
	entry(Interaction::DeleteOldestFile, ProtocolVersion::Gen1, Some(0xca), true, false, &[]),
	entry(Interaction::DeleteOldestFile, ProtocolVersion::Gen2, Some(0xca), true, true, &[]),
	entry(Interaction::RegisterComplete, ProtocolVersion::Gen1, Some(0xe5), true, true, &[]),
	noop(Interaction::RegisterComplete, ProtocolVersion::Gen2),
	entry(Interaction::RegisterPressButton, ProtocolVersion::Gen1, Some(0xe3), true, false, &[]),
	entry(Interaction::RegisterPressButton, ProtocolVersion::Gen2, Some(0xe7), true, false, &[]),
	CatalogEntry {
		timeout: BUTTON_TIMEOUT,
		..entry(Interaction::RegisterWaitForButton, ProtocolVersion::Gen1, None, false, true, &[])
	},
	CatalogEntry {
		timeout: BUTTON_TIMEOUT,
		..entry(Interaction::RegisterWaitForButton, ProtocolVersion::Gen2, None, false, true, &[])
	},
	entry(
		Interaction::SetFileTransferReportingType,
		ProtocolVersion::Any,
		Some(0xec),
		true,
		true,
		&[],
	),
	entry(Interaction::UnknownE3, ProtocolVersion::Any, Some(0xe3), true, true, &[]),
];

/// The outcome of resolving an interaction against an active protocol
/// version.
#[derive(Copy, Clone, Debug)]
pub enum Resolution {
	/// A real catalog entry is eligible; use it to build and interpret
	/// the wire exchange.
	Found(CatalogEntry),
	/// No entry is eligible, but the interaction is explicitly marked as
	/// a harmless no-op on this generation.
	NoOp,
	/// No entry is eligible and this isn't a documented no-op: the
	/// interaction is unsupported on this generation.
	Unsupported,
}

/// Resolves `interaction` to the best-matching catalog entry for
/// `active`, per spec.md §4.2: the entry with the highest `min_version`
/// that is still `<= active` wins.
#[must_use]
pub fn resolve(interaction: Interaction, active: ProtocolVersion) -> Resolution {
	let best = CATALOG
		.iter()
		.filter(|candidate| candidate.interaction == interaction)
		.filter(|candidate| candidate.min_version.is_eligible_for(active))
		.max_by_key(|candidate| candidate.min_version);

	match best {
		Some(entry) if entry.is_noop => Resolution::NoOp,
		Some(entry) => Resolution::Found(*entry),
		None => Resolution::Unsupported,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn connect_is_available_on_every_generation() {
		for version in [
			ProtocolVersion::Gen1,
			ProtocolVersion::Gen2,
			ProtocolVersion::Gen3,
		] {
			assert!(matches!(
				resolve(Interaction::Connect, version),
				Resolution::Found(_)
			));
		}
	}

	#[test]
	fn get_width_is_noop_on_gen1_and_wired_from_gen2() {
		assert!(matches!(
			resolve(Interaction::GetWidth, ProtocolVersion::Gen1),
			Resolution::NoOp
		));
		let Resolution::Found(entry) = resolve(Interaction::GetWidth, ProtocolVersion::Gen2) else {
			panic!("expected a wired entry on gen2");
		};
		assert_eq!(entry.request_opcode, Some(0xea));
	}

	#[test]
	fn unknown_e3_has_no_higher_generation_override() {
		// The catalog entry stays eligible on every generation - it's the
		// session orchestrator (spec.md §4.4) that only invokes it during
		// the GEN1 warm-up sequence.
		for version in [ProtocolVersion::Gen1, ProtocolVersion::Gen2, ProtocolVersion::Gen3] {
			assert!(matches!(
				resolve(Interaction::UnknownE3, version),
				Resolution::Found(_)
			));
		}
	}

	#[test]
	fn version_resolution_is_monotone() {
		// Invariant 5: raising the active version never removes an
		// interaction that was already eligible, and only ever swaps in a
		// newer entry.
		let versions = [
			ProtocolVersion::Any,
			ProtocolVersion::Gen1,
			ProtocolVersion::Gen2,
			ProtocolVersion::Gen3,
		];
		for interaction in [
			Interaction::Connect,
			Interaction::GetWidth,
			Interaction::GetStrokes,
			Interaction::RegisterComplete,
		] {
			let mut last_min_version = None;
			for version in versions {
				if let Resolution::Found(entry) = resolve(interaction, version) {
					if let Some(previous) = last_min_version {
						assert!(entry.min_version >= previous);
					}
					last_min_version = Some(entry.min_version);
				}
			}
		}
	}
}
