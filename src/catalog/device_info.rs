// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static device metadata: name, firmware version, battery level, and
//! the tablet's physical dimensions.

use crate::catalog::{Interaction, Resolution};
use crate::engine::{ProtocolEngine, Transport};
use crate::error::{Error, Result};
use crate::version::ProtocolVersion;

/// GEN1's hardcoded Spark dimensions, reported without ever touching the
/// transport. Per spec.md §4.2.
const SPARK_WIDTH: u32 = 21000;
const SPARK_HEIGHT: u32 = 14800;
/// GEN1/2's hardcoded point size, reported the same way.
const SPARK_POINT_SIZE: u32 = 10;

/// The device's user-assigned name, as UTF-8 text.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GetNameReply {
	/// The device's name.
	pub name: String,
}

/// `SET_NAME` succeeded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SetNameReply;

/// The device's firmware version, as reported by `GET_FIRMWARE`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FirmwareReply {
	/// The firmware version string, e.g. `"1516-2644"`.
	pub version: String,
}

/// The device's battery level.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GetBatteryReply {
	/// Battery charge, 0-100.
	pub percent: u8,
	/// Whether the device is currently charging.
	pub is_charging: bool,
}

/// A single physical dimension (width or height), in the device's own
/// reporting units.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GetDimensionReply {
	/// The dimension, as reported by the device (or hardcoded on GEN1).
	pub value: u32,
}

/// The point size the device's digitizer reports coordinates in,
/// micrometers.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GetPointSizeReply {
	/// The point size.
	pub point_size: u32,
}

impl<T: Transport> ProtocolEngine<T> {
	/// Reads the device's user-assigned name.
	///
	/// GEN1/2 may split the name across several frames; there is no
	/// length prefix to announce how many, so the engine keeps reading
	/// continuation frames (without re-sending the request) until one's
	/// last payload byte is `0x0A`, then strips that terminator. GEN3
	/// always answers in a single frame with no terminator.
	pub fn get_name(&mut self) -> Result<GetNameReply> {
		let entry = self.resolve_wired(Interaction::GetName)?;
		let interaction = Interaction::GetName.name();
		let opcode = entry.request_opcode.expect("GET_NAME always sends a request");

		let first = self.send_and_read(interaction, opcode, &[], entry.timeout, entry.expected_reply_opcodes)?;

		if self.version() == ProtocolVersion::Gen3 {
			let name = std::str::from_utf8(&first.payload).map_err(|_| Error::UnexpectedData {
				interaction,
				detail: "device name was not valid UTF-8".to_owned(),
			})?;
			return Ok(GetNameReply { name: name.to_owned() });
		}

		let mut bytes = Vec::from(first.payload.as_ref());
		while bytes.last().copied() != Some(0x0a) {
			let next = self.read_next_reply(interaction, entry.timeout, entry.expected_reply_opcodes)?;
			bytes.extend_from_slice(&next.payload);
		}
		bytes.pop(); // strip the terminating 0x0A

		let name = String::from_utf8(bytes).map_err(|_| Error::UnexpectedData {
			interaction,
			detail: "device name was not valid UTF-8".to_owned(),
		})?;
		Ok(GetNameReply { name })
	}

	/// Sets the device's user-assigned name.
	///
	/// GEN1/2 expect the request payload to carry a trailing `0x0A`;
	/// GEN3 sends the bytes as-is.
	pub fn set_name(&mut self, name: &str) -> Result<SetNameReply> {
		let entry = self.resolve_wired(Interaction::SetName)?;
		let mut payload = name.as_bytes().to_vec();
		if self.version() != ProtocolVersion::Gen3 {
			payload.push(0x0a);
		}
		self.execute_and_decode(entry, &payload, |_frame| Ok(SetNameReply))
	}

	/// Reads the device's firmware version string.
	///
	/// Two requests with selectors `0` and `1` are issued in sequence
	/// (the reply's first byte is always unused); the results are joined
	/// as `"<hi>-<lo>"`. GEN1/2 render each remaining byte as unpadded
	/// hexadecimal text; GEN3 treats them as raw ASCII characters.
	pub fn get_firmware(&mut self) -> Result<FirmwareReply> {
		let entry = self.resolve_wired(Interaction::GetFirmware)?;
		let interaction = Interaction::GetFirmware.name();
		let opcode = entry.request_opcode.expect("GET_FIRMWARE always sends a request");

		let hi = self.read_firmware_part(interaction, opcode, 0, entry.timeout, entry.expected_reply_opcodes)?;
		let lo = self.read_firmware_part(interaction, opcode, 1, entry.timeout, entry.expected_reply_opcodes)?;
		Ok(FirmwareReply { version: format!("{hi}-{lo}") })
	}

	fn read_firmware_part(
		&mut self, interaction: &'static str, opcode: u8, selector: u8, timeout: std::time::Duration, expected_reply_opcodes: &'static [u8],
	) -> Result<String> {
		let reply = self.send_and_read(interaction, opcode, &[selector], timeout, expected_reply_opcodes)?;
		let body = reply.payload.get(1..).unwrap_or_default();
		if self.version() == ProtocolVersion::Gen3 {
			body.iter().map(|&byte| char::from_u32(u32::from(byte)).ok_or_else(|| Error::UnexpectedData {
				interaction,
				detail: format!("firmware byte {byte:#04x} is not a valid ASCII character"),
			})).collect()
		} else {
			Ok(body.iter().map(|byte| format!("{byte:x}")).collect())
		}
	}

	/// Reads the device's battery level.
	pub fn get_battery(&mut self) -> Result<GetBatteryReply> {
		let entry = self.resolve_wired(Interaction::GetBattery)?;
		self.execute_and_decode(entry, &[], |frame| {
			let interaction = Interaction::GetBattery.name();
			let &[percent, charging, ..] = frame.payload.as_ref() else {
				return Err(Error::UnexpectedData {
					interaction,
					detail: format!("expected at least 2 payload bytes, got {}", frame.payload.len()),
				});
			};
			Ok(GetBatteryReply {
				percent,
				is_charging: charging != 0,
			})
		})
	}

	/// Reads the tablet's physical width.
	///
	/// GEN1 never asks the device: the original hardware predates the
	/// capability, so this reports the Spark's known dimensions without
	/// touching the transport (spec.md §4.2's documented no-op).
	pub fn get_width(&mut self) -> Result<GetDimensionReply> {
		self.get_wired_or_noop_dimension(Interaction::GetWidth, 0x0003u16, SPARK_WIDTH)
	}

	/// Reads the tablet's physical height. See
	/// [`ProtocolEngine::get_width`] for the GEN1 no-op behavior.
	pub fn get_height(&mut self) -> Result<GetDimensionReply> {
		self.get_wired_or_noop_dimension(Interaction::GetHeight, 0x0004u16, SPARK_HEIGHT)
	}

	fn get_wired_or_noop_dimension(&mut self, interaction: Interaction, selector: u16, noop_value: u32) -> Result<GetDimensionReply> {
		match self.resolve(interaction)? {
			Resolution::NoOp => Ok(GetDimensionReply { value: noop_value }),
			Resolution::Found(entry) => self.execute_and_decode(entry, &selector.to_le_bytes(), move |frame| {
				let name = interaction.name();
				let bytes: [u8; 6] = frame.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
					interaction: name,
					detail: format!("expected a 6-byte dimension reply, got {} bytes", frame.payload.len()),
				})?;
				let echoed_selector = u16::from_le_bytes([bytes[0], bytes[1]]);
				if echoed_selector != selector {
					return Err(Error::UnexpectedData {
						interaction: name,
						detail: format!("device echoed selector {echoed_selector:#06x}, expected {selector:#06x}"),
					});
				}
				Ok(GetDimensionReply {
					value: u32::from_le_bytes(bytes[2..6].try_into().expect("slice is 4 bytes")),
				})
			}),
		}
	}

	/// Reads the digitizer's point size, in micrometers.
	///
	/// GEN1/2 report a hardcoded value without touching the transport.
	/// GEN3's raw reply is off by one relative to the tablet's actual
	/// physical point size — the firmware's own doc comments call this
	/// out as unexplained — so the corrected value is returned here
	/// rather than leaking the quirk to callers (Open Question, recorded
	/// in DESIGN.md).
	pub fn get_point_size(&mut self) -> Result<GetPointSizeReply> {
		match self.resolve(Interaction::GetPointSize)? {
			Resolution::NoOp => Ok(GetPointSizeReply {
				point_size: SPARK_POINT_SIZE,
			}),
			Resolution::Found(entry) => {
				debug_assert_eq!(self.version(), ProtocolVersion::Gen3);
				let selector = 0x0014u16;
				self.execute_and_decode(entry, &selector.to_le_bytes(), move |frame| {
					let interaction = Interaction::GetPointSize.name();
					let bytes: [u8; 6] = frame.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
						interaction,
						detail: format!("expected a 6-byte point-size reply, got {} bytes", frame.payload.len()),
					})?;
					let echoed_selector = u16::from_le_bytes([bytes[0], bytes[1]]);
					if echoed_selector != selector {
						return Err(Error::UnexpectedData {
							interaction,
							detail: format!("device echoed selector {echoed_selector:#06x}, expected {selector:#06x}"),
						});
					}
					let raw = u32::from_le_bytes(bytes[2..6].try_into().expect("slice is 4 bytes"));
					Ok(GetPointSizeReply {
						point_size: raw.saturating_sub(1),
					})
				})
			}
		}
	}
}
