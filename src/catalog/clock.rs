// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `GET_TIME` / `SET_TIME`: the device's onboard clock.
//!
//! GEN1/2 encode the clock as six packed-BCD digits, `YYMMDDhhmmss` in
//! UTC; GEN3 switched to a plain little-endian Unix timestamp (plus two
//! unused millisecond bytes). Both shapes are six bytes on the wire, so
//! the opcode alone doesn't tell us which one applies — the active
//! [`ProtocolVersion`] does.

use crate::catalog::Interaction;
use crate::engine::{ProtocolEngine, Transport};
use crate::error::{Error, Result};
use crate::version::ProtocolVersion;

/// The device's onboard clock, seconds since the Unix epoch.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GetTimeReply {
	/// Seconds since the Unix epoch, as reported by the device.
	pub unix_timestamp: u32,
}

/// `SET_TIME` succeeded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SetTimeReply;

/// Days since the Unix epoch for a civil (proleptic Gregorian) date.
/// Howard Hinnant's `days_from_civil`, used here instead of pulling in a
/// calendar crate for six bytes of decoding.
fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
	let y = if month <= 2 { year - 1 } else { year };
	let era = if y >= 0 { y } else { y - 399 } / 400;
	let yoe = y - era * 400;
	let mp = (i64::from(month) + 9) % 12;
	let doy = (153 * mp + 2) / 5 + i64::from(day) - 1;
	let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
	era * 146_097 + doe - 719_468
}

/// The inverse of [`days_from_civil`].
fn civil_from_days(z: i64) -> (i64, u32, u32) {
	let z = z + 719_468;
	let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
	let doe = z - era * 146_097;
	let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
	let y = yoe + era * 400;
	let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
	let mp = (5 * doy + 2) / 153;
	let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
	let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
	let y = if month <= 2 { y + 1 } else { y };
	(y, month, day)
}

fn bcd_digit_pair(byte: u8, interaction: &'static str, field: &'static str) -> Result<u32> {
	let hi = byte >> 4;
	let lo = byte & 0x0f;
	if hi > 9 || lo > 9 {
		return Err(Error::UnexpectedData {
			interaction,
			detail: format!("{field} byte {byte:#04x} is not valid packed BCD"),
		});
	}
	Ok(u32::from(hi) * 10 + u32::from(lo))
}

/// Decodes GEN1/2's packed-BCD `YYMMDDhhmmss`, assumed UTC, into a Unix
/// timestamp. Two-digit years are offset from 2000, matching the
/// firmware's own epoch assumption (these devices did not exist before
/// 2000).
pub(in crate::catalog) fn decode_bcd_timestamp(bytes: &[u8; 6], interaction: &'static str) -> Result<u32> {
	let yy = bcd_digit_pair(bytes[0], interaction, "year")?;
	let mm = bcd_digit_pair(bytes[1], interaction, "month")?;
	let dd = bcd_digit_pair(bytes[2], interaction, "day")?;
	let hh = bcd_digit_pair(bytes[3], interaction, "hour")?;
	let mi = bcd_digit_pair(bytes[4], interaction, "minute")?;
	let ss = bcd_digit_pair(bytes[5], interaction, "second")?;

	let days = days_from_civil(2000 + i64::from(yy), mm, dd);
	let seconds = days * 86_400 + i64::from(hh) * 3600 + i64::from(mi) * 60 + i64::from(ss);
	u32::try_from(seconds).map_err(|_| Error::UnexpectedData {
		interaction,
		detail: format!("BCD timestamp {seconds} is out of u32 range"),
	})
}

/// Encodes a Unix timestamp as GEN1/2's packed-BCD `YYMMDDhhmmss`.
fn encode_bcd_timestamp(unix_timestamp: u32) -> [u8; 6] {
	let total_seconds = i64::from(unix_timestamp);
	let days = total_seconds.div_euclid(86_400);
	let time_of_day = total_seconds.rem_euclid(86_400);
	let (year, month, day) = civil_from_days(days);
	let hh = time_of_day / 3600;
	let mi = (time_of_day % 3600) / 60;
	let ss = time_of_day % 60;

	let to_bcd = |value: i64| ((value / 10) as u8) << 4 | (value % 10) as u8;
	[
		to_bcd(year - 2000),
		to_bcd(i64::from(month)),
		to_bcd(day as i64),
		to_bcd(hh),
		to_bcd(mi),
		to_bcd(ss),
	]
}

impl<T: Transport> ProtocolEngine<T> {
	/// Reads the device's onboard clock.
	pub fn get_time(&mut self) -> Result<GetTimeReply> {
		let entry = self.resolve_wired(Interaction::GetTime)?;
		let version = self.version();
		self.execute_and_decode(entry, &[], |frame| {
			let interaction = Interaction::GetTime.name();
			let bytes: [u8; 6] = frame.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
				interaction,
				detail: format!("expected a 6-byte clock reply, got {} bytes", frame.payload.len()),
			})?;

			let unix_timestamp = if version == ProtocolVersion::Gen3 {
				// bytes[4..6] are unused milliseconds.
				u32::from_le_bytes(bytes[0..4].try_into().expect("slice is 4 bytes"))
			} else {
				decode_bcd_timestamp(&bytes, interaction)?
			};
			Ok(GetTimeReply { unix_timestamp })
		})
	}

	/// Sets the device's onboard clock to `unix_timestamp`.
	///
	/// Used during the paired-fetch sequence (spec.md §4.4) to keep
	/// stroke timestamps anchored to the host's clock. GEN3 reuses
	/// `GET_TIME`'s opcode for the request but its own little-endian
	/// encoding; GEN1/2 fall back to packed BCD.
	pub fn set_time(&mut self, unix_timestamp: u32) -> Result<SetTimeReply> {
		let entry = self.resolve_wired(Interaction::SetTime)?;
		let payload: Vec<u8> = if self.version() == ProtocolVersion::Gen3 {
			let mut bytes = unix_timestamp.to_le_bytes().to_vec();
			bytes.extend_from_slice(&[0, 0]); // unused milliseconds
			bytes
		} else {
			encode_bcd_timestamp(unix_timestamp).to_vec()
		};
		self.execute_and_decode(entry, &payload, |_frame| Ok(SetTimeReply))
	}
}
