// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CRC-32 of the accumulated pen-data buffer, and the firmware's peculiar
//! encoding of the CRC it reports back to us.

/// The CRC-32 (IEEE 802.3) of `data`, as compared against the device's
/// reported checksum in `WAIT_FOR_END_READ`.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
	crc32fast::hash(data)
}

/// Decodes the firmware's CRC bytes: reverse the 4 bytes, then read the
/// result as a big-endian (i.e. hex-string) number.
///
/// See spec.md §4.2's `WAIT_FOR_END_READ` row: both the GEN1 two-reply
/// shape and the GEN2+ single-reply shape carry their 4 CRC bytes this
/// way.
#[must_use]
pub fn decode_reported_crc(bytes: &[u8; 4]) -> u32 {
	let mut reversed = *bytes;
	reversed.reverse();
	u32::from_be_bytes(reversed)
}
