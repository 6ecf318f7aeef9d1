// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Packet classification and the shared delta/point decoding routine.
//!
//! Every packet's first byte is a bitmask that governs its total length:
//! `1 + popcount(header_byte)`. The decoder never trusts an explicit
//! length field — classification peeks inside that fixed-size window to
//! tell the handful of packet kinds apart.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
	/// The GEN3 stroke header's flag byte. Bits 5..0 (the pen type) are
	/// read separately since they're a value, not a flag.
	///
	/// `is_new_layer` and the pen type are threaded through the decoder
	/// state per spec.md §3 but, per §6's output contract, never surface
	/// on a decoded `Stroke` — only logged for diagnostics.
	#[derive(Copy, Clone, Eq, PartialEq, Debug)]
	struct StrokeHeaderFlags: u8 {
		const PEN_ID_FOLLOWS = 0b1000_0000;
		const NEW_LAYER = 0b0100_0000;
	}
}

/// A single classified packet, with its total on-wire size already
/// resolved.
pub(super) enum Packet<'a> {
	/// Ends the current file.
	Eof,
	/// Closes the current stroke without starting a new one.
	EndOfStroke,
	/// Opens a new stroke. `pen_id_follows` (GEN3 only) means the very
	/// next packet is a 9-byte pen-id extension.
	StrokeHeader { pen_id_follows: bool },
	/// The firmware could not record `count` points.
	LostPoint { count: u16 },
	/// A delta/absolute sample, optionally prefixed by the two `0xFF`
	/// bytes that distinguish a *Point* packet from a plain *Delta*.
	/// `fields` is the remaining per-axis payload, ready for
	/// [`decode_fields`].
	Sample { header: u8, fields: &'a [u8] },
	/// Not a recognized shape; consumed and discarded.
	Unknown,
}

/// How one axis's field is encoded, from a 2-bit mask group.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum AxisMask {
	Omitted,
	SignedDelta,
	AbsoluteLe16,
}

fn axis_mask(bits: u8) -> Result<AxisMask> {
	match bits {
		0b00 => Ok(AxisMask::Omitted),
		0b10 => Ok(AxisMask::SignedDelta),
		0b11 => Ok(AxisMask::AbsoluteLe16),
		// 0b01 is reserved and has never been observed on the wire.
		_ => Err(Error::StrokeParsing("reserved axis mask 0b01 encountered".to_owned())),
	}
}

/// Per-axis reconstruction state: `last_point` is the most recently
/// reconstructed absolute value, `last_delta` is the running delta
/// register the firmware's compression scheme keeps accumulating onto.
/// See spec.md §4.3/§4.4: an axis's new point is always `last_point +
/// last_delta` of the state *after* this packet's field is folded in, so
/// an omitted axis still advances by whatever delta was last observed —
/// the device is extrapolating constant velocity, not holding position.
#[derive(Copy, Clone, Default, Debug)]
struct AxisState {
	last_point: i32,
	last_delta: i32,
}

impl AxisState {
	/// Folds one packet's field for this axis into the state and returns
	/// the new reconstructed point.
	fn apply(&mut self, bits: u8, fields: &mut &[u8]) -> Result<i32> {
		match axis_mask(bits)? {
			AxisMask::Omitted => {}
			AxisMask::SignedDelta => {
				let &[byte, ref rest @ ..] = *fields else {
					return Err(Error::StrokeParsing("truncated 8-bit delta field".to_owned()));
				};
				*fields = rest;
				let delta = byte as i8;
				if delta == 0 {
					// The firmware is never expected to emit a literal zero
					// delta; it would have marked the axis omitted instead.
					// Treat this as corrupted input.
					return Err(Error::StrokeParsing("zero-value 8-bit delta is not a valid encoding".to_owned()));
				}
				self.last_delta += i32::from(delta);
			}
			AxisMask::AbsoluteLe16 => {
				let &[lo, hi, ref rest @ ..] = *fields else {
					return Err(Error::StrokeParsing("truncated 16-bit absolute field".to_owned()));
				};
				*fields = rest;
				self.last_point = i32::from(u16::from_le_bytes([lo, hi]));
				self.last_delta = 0;
			}
		}
		self.last_point += self.last_delta;
		Ok(self.last_point)
	}

	/// Resets the delta register at a stroke boundary, per spec.md §3:
	/// `last_delta` is reset to 0 at every stroke header, but `last_point`
	/// carries over — the next stroke's baseline is wherever the pen
	/// last was, not the origin.
	fn reset_delta(&mut self) {
		self.last_delta = 0;
	}
}

/// The running per-axis reconstruction state threaded through one file's
/// sample packets.
#[derive(Copy, Clone, Default, Debug)]
pub(super) struct Accumulator {
	x: AxisState,
	y: AxisState,
	p: AxisState,
}

impl Accumulator {
	/// Decodes one sample packet's fields against `header`'s upper six
	/// bits (x = bits 2-3, y = bits 4-5, p = bits 6-7; read in that
	/// order), updating `self` in place and returning the reconstructed
	/// `(x, y, p)` point.
	pub(super) fn update(&mut self, header: u8, fields: &[u8]) -> Result<(i32, i32, i32)> {
		let mut rest = fields;
		let x = self.x.apply((header >> 2) & 0b11, &mut rest)?;
		let y = self.y.apply((header >> 4) & 0b11, &mut rest)?;
		let p = self.p.apply((header >> 6) & 0b11, &mut rest)?;
		Ok((x, y, p))
	}

	/// Resets every axis's delta register; called on a stroke header.
	pub(super) fn reset_deltas(&mut self) {
		self.x.reset_delta();
		self.y.reset_delta();
		self.p.reset_delta();
	}
}

/// Classifies the packet at the start of `buf`, returning it together
/// with its total size. `buf` must be non-empty.
pub(super) fn classify(buf: &[u8]) -> Result<(Packet<'_>, usize)> {
	let header = buf[0];
	let size = 1 + header.count_ones() as usize;
	if buf.len() < size {
		return Err(Error::StrokeParsing(format!(
			"packet header {header:#04x} declares {size} bytes but only {} remain",
			buf.len()
		)));
	}
	let body = &buf[1..size];

	// EOF: header 0xFF with all eight trailing bytes 0xFF.
	if header == 0xff && body.iter().all(|&b| b == 0xff) {
		return Ok((Packet::Eof, size));
	}

	// End-of-stroke: the literal 7-byte FC FF FF FF FF FF FF sequence.
	if header == 0xfc && body.iter().all(|&b| b == 0xff) {
		return Ok((Packet::EndOfStroke, size));
	}

	let low_bits_set = header & 0b11 != 0;

	// Stroke header, GEN3 shape: 0xFF header, body starts with 0xFA.
	if header == 0xff && body.first() == Some(&0xfa) {
		let flag_byte = body.get(1).copied().unwrap_or(0);
		let flags = StrokeHeaderFlags::from_bits_truncate(flag_byte);
		let pen_type = flag_byte & 0b0011_1111;
		log::trace!(
			"stroke header: pen_type={pen_type}, new_layer={}",
			flags.contains(StrokeHeaderFlags::NEW_LAYER)
		);
		return Ok((
			Packet::StrokeHeader {
				pen_id_follows: flags.contains(StrokeHeaderFlags::PEN_ID_FOLLOWS),
			},
			size,
		));
	}

	// Stroke header, GEN2 shape: body starts with FF EE EE.
	if low_bits_set && body.starts_with(&[0xff, 0xee, 0xee]) {
		return Ok((Packet::StrokeHeader { pen_id_follows: false }, size));
	}

	// Lost point: body starts with FF DD DD, then a 16-bit LE count.
	if low_bits_set && body.starts_with(&[0xff, 0xdd, 0xdd]) {
		let count_bytes = body.get(3..5).ok_or_else(|| Error::StrokeParsing("truncated lost-point count".to_owned()))?;
		let count = u16::from_le_bytes(count_bytes.try_into().expect("slice is 2 bytes"));
		return Ok((Packet::LostPoint { count }, size));
	}

	// Point: a Delta packet prefixed by two 0xFF bytes, which the
	// caller skips before decoding the shared field routine.
	if low_bits_set && body.starts_with(&[0xff, 0xff]) {
		return Ok((Packet::Sample { header, fields: &body[2..] }, size));
	}

	// Delta: low two bits clear, fields decoded straight from the body.
	if !low_bits_set {
		return Ok((Packet::Sample { header, fields: body }, size));
	}

	Ok((Packet::Unknown, size))
}

/// The 9-byte GEN3 pen-id extension that follows a stroke header whose
/// "pen id follows" flag was set: header `0xFF` plus an 8-byte LE id.
pub(super) fn parse_pen_id_extension(buf: &[u8]) -> Result<(u64, usize)> {
	if buf.len() < 9 || buf[0] != 0xff {
		return Err(Error::StrokeParsing("expected a 9-byte pen-id extension".to_owned()));
	}
	let id = u64::from_le_bytes(buf[1..9].try_into().expect("slice is 8 bytes"));
	Ok((id, 9))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn gen3_stroke_header_sets_pen_id_follows_from_bit_seven() {
		let buf = [0xff, 0xfa, 0b1000_0000, 0, 0, 0, 0, 0, 0];
		let (packet, size) = classify(&buf).unwrap();
		assert_eq!(size, 9);
		assert!(matches!(packet, Packet::StrokeHeader { pen_id_follows: true }));
	}

	#[test]
	fn gen3_stroke_header_without_pen_id_flag() {
		let buf = [0xff, 0xfa, 0b0100_0000, 0, 0, 0, 0, 0, 0];
		let (packet, _) = classify(&buf).unwrap();
		assert!(matches!(packet, Packet::StrokeHeader { pen_id_follows: false }));
	}

	#[test]
	fn reserved_axis_mask_is_rejected() {
		assert!(axis_mask(0b01).is_err());
	}

	#[test]
	fn zero_delta_is_rejected_as_malformed() {
		let mut axis = AxisState::default();
		let mut fields: &[u8] = &[0x00];
		assert!(axis.apply(0b10, &mut fields).is_err());
	}
}
