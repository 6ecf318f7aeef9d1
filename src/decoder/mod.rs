// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The stroke-file decoder: turns the pen-data buffer accumulated during
//! `DOWNLOAD_OLDEST_FILE` into structured drawings.
//!
//! A buffer may hold more than one stroke file back to back; each file
//! starts with its own magic header and ends with an EOF packet. Parsing
//! one file is reentrant and touches no state beyond what's threaded
//! through the loop below, so the outer function simply restarts on
//! whatever bytes are left after each file.

mod header;
mod packet;

use packet::{Accumulator, Packet};

use crate::error::Result;

/// One reconstructed `(x, y, pressure)` sample. Absolute device units —
/// deltas are already resolved by the time a `Point` exists.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Point {
	/// Horizontal position, sub-millimetre device units.
	pub x: i32,
	/// Vertical position, sub-millimetre device units.
	pub y: i32,
	/// Pen pressure.
	pub p: u16,
}

/// An ordered sequence of points drawn without lifting the pen (or, for
/// the firmware's purposes, without an explicit stroke boundary).
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Stroke {
	/// The stroke's points, in recording order.
	pub points: Vec<Point>,
}

/// One on-device recording: a file header plus zero or more strokes,
/// terminated by an EOF packet.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StrokeFile {
	/// Creation time, if this generation's file header carries one.
	/// GEN1/2's bare header has none; the session orchestrator backfills
	/// this from `GET_STROKES`'s reply instead.
	pub timestamp: Option<u32>,
	/// How many bytes of the input buffer this file consumed, so the
	/// caller can slice to the next one.
	pub bytesize: usize,
	/// The file's strokes, in recording order.
	pub strokes: Vec<Stroke>,
}

/// Decodes every stroke file found in `buf`.
///
/// Firmware-level corruption is per-file (spec.md §7): a file that fails
/// to parse is dropped along with everything after it in the buffer —
/// restarting mid-stream without a header to anchor on would only
/// desynchronize further — but every file successfully decoded before
/// the failure is still returned.
#[must_use]
pub fn decode_stroke_data(buf: &[u8]) -> Vec<StrokeFile> {
	let mut files = Vec::new();
	let mut offset = 0;
	while offset < buf.len() {
		match decode_one_file(&buf[offset..]) {
			Ok((file, consumed)) => {
				offset += consumed;
				files.push(file);
			}
			Err(err) => {
				log::warn!(
					"stroke data: {err}, dropping {} trailing byte(s)",
					buf.len() - offset
				);
				break;
			}
		}
	}
	files
}

/// Decodes a single stroke file starting at the beginning of `buf`,
/// returning it together with the number of bytes it consumed.
fn decode_one_file(buf: &[u8]) -> Result<(StrokeFile, usize)> {
	let file_header = header::parse(buf)?;
	let mut offset = file_header.header_len;

	let mut strokes = Vec::new();
	let mut points: Vec<Point> = Vec::new();
	// `last_point` persists across stroke boundaries within one file (the
	// pen's position doesn't reset just because a stroke ended); only
	// `last_delta` is reset at each stroke header, per spec.md §3.
	let mut acc = Accumulator::default();
	let mut expect_pen_id_extension = false;

	while offset < buf.len() {
		let remaining = &buf[offset..];

		if expect_pen_id_extension {
			let (_pen_id, size) = packet::parse_pen_id_extension(remaining)?;
			expect_pen_id_extension = false;
			offset += size;
			continue;
		}

		if offset > file_header.header_len && header::looks_like_file_header(remaining) {
			log::warn!("stroke data: unexpected file header at offset {offset}, stopping this file");
			break;
		}

		let (packet, size) = packet::classify(remaining)?;
		match packet {
			Packet::Eof => {
				close_stroke(&mut strokes, &mut points);
				offset += size;
				break;
			}
			Packet::EndOfStroke => {
				close_stroke(&mut strokes, &mut points);
			}
			Packet::StrokeHeader { pen_id_follows } => {
				close_stroke(&mut strokes, &mut points);
				acc.reset_deltas();
				expect_pen_id_extension = pen_id_follows;
			}
			Packet::LostPoint { count } => {
				log::debug!("stroke data: firmware reports {count} lost point(s)");
			}
			Packet::Sample { header, fields } => {
				let (x, y, p) = acc.update(header, fields)?;
				points.push(Point {
					x,
					y,
					p: p.clamp(0, i32::from(u16::MAX)) as u16,
				});
			}
			Packet::Unknown => {}
		}
		offset += size;
	}

	Ok((
		StrokeFile {
			timestamp: file_header.timestamp,
			bytesize: offset,
			strokes,
		},
		offset,
	))
}

/// Appends the in-progress stroke to `strokes` if it's non-empty, per
/// spec.md §4.3's stroke-boundary rule. A stream that runs out of bytes
/// mid-stroke (no closing EOF or end-of-stroke packet) simply drops
/// whatever points hadn't been closed yet.
fn close_stroke(strokes: &mut Vec<Stroke>, points: &mut Vec<Point>) {
	if !points.is_empty() {
		strokes.push(Stroke {
			points: std::mem::take(points),
		});
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn gen3_header(stroke_count: u32) -> Vec<u8> {
		let mut buf = vec![0x67, 0x82, 0x69, 0x65];
		buf.extend_from_slice(&1_565_793_000u32.to_le_bytes());
		buf.extend_from_slice(&[0, 0]);
		buf.extend_from_slice(&stroke_count.to_le_bytes());
		buf.extend_from_slice(&[0, 0]);
		buf
	}

	fn eof() -> Vec<u8> {
		vec![0xff; 9]
	}

	#[test]
	fn decodes_a_single_absolute_point_and_stops_at_eof() {
		let mut buf = gen3_header(1);
		// Point packet: 0xff header (two 0xff marker bytes + absolute x,y,p)
		buf.push(0b1111_1111);
		buf.extend_from_slice(&[0xff, 0xff]);
		buf.extend_from_slice(&10i16.to_le_bytes());
		buf.extend_from_slice(&20i16.to_le_bytes());
		buf.extend_from_slice(&500u16.to_le_bytes());
		buf.extend_from_slice(&eof());

		let files = decode_stroke_data(&buf);
		assert_eq!(files.len(), 1);
		let file = &files[0];
		assert_eq!(file.timestamp, Some(1_565_793_000));
		assert_eq!(file.strokes.len(), 1);
		assert_eq!(file.strokes[0].points, vec![Point { x: 10, y: 20, p: 500 }]);
		assert_eq!(file.bytesize, buf.len());
	}

	#[test]
	fn cumulative_deltas_use_the_weighted_double_accumulator() {
		let mut buf = gen3_header(1);
		// Absolute point first.
		buf.push(0b1111_1111);
		buf.extend_from_slice(&[0xff, 0xff]);
		buf.extend_from_slice(&0i16.to_le_bytes());
		buf.extend_from_slice(&0i16.to_le_bytes());
		buf.extend_from_slice(&0u16.to_le_bytes());
		// Delta: x += 5, y and p omitted. Mask bits: x=10, y=00, p=00 -> header bits 2-3 = 10.
		buf.push(0b0000_1000);
		buf.push(5i8 as u8);
		// Another delta: x += 5 again.
		buf.push(0b0000_1000);
		buf.push(5i8 as u8);
		buf.extend_from_slice(&eof());

		let files = decode_stroke_data(&buf);
		let points = &files[0].strokes[0].points;
		// last_delta accumulates 5, then 10; each point is last_point +
		// last_delta, and last_point is updated to that sum every step:
		// 0, then 0+5=5, then 5+10=15.
		assert_eq!(points, &[
			Point { x: 0, y: 0, p: 0 },
			Point { x: 5, y: 0, p: 0 },
			Point { x: 15, y: 0, p: 0 },
		]);
	}

	#[test]
	fn new_stroke_header_closes_the_previous_stroke_without_resetting_position() {
		let mut buf = gen3_header(2);
		// First stroke: one absolute point.
		buf.push(0b1111_1111);
		buf.extend_from_slice(&[0xff, 0xff]);
		buf.extend_from_slice(&100i16.to_le_bytes());
		buf.extend_from_slice(&200i16.to_le_bytes());
		buf.extend_from_slice(&1u16.to_le_bytes());
		// Stroke header (GEN3): 0xff, body 0xfa, flags byte (no pen id), 4-byte epoch, 2 unused.
		buf.push(0xff);
		buf.push(0xfa);
		buf.push(0x00);
		buf.extend_from_slice(&0u32.to_le_bytes());
		buf.extend_from_slice(&[0, 0]);
		// Second stroke: a bare delta with no preceding absolute sample in
		// this stroke — baseline carries over from the closed stroke.
		buf.push(0b0000_1000);
		buf.push(1i8 as u8);
		buf.extend_from_slice(&eof());

		let files = decode_stroke_data(&buf);
		let file = &files[0];
		assert_eq!(file.strokes.len(), 2);
		assert_eq!(file.strokes[0].points, vec![Point { x: 100, y: 200, p: 1 }]);
		assert_eq!(file.strokes[1].points, vec![Point { x: 101, y: 200, p: 1 }]);
	}

	#[test]
	fn gen1_gen2_header_has_no_timestamp() {
		let mut buf = vec![0x62, 0x38, 0x62, 0x74];
		buf.extend_from_slice(&eof());
		let files = decode_stroke_data(&buf);
		assert_eq!(files.len(), 1);
		assert_eq!(files[0].timestamp, None);
		assert!(files[0].strokes.is_empty());
	}

	#[test]
	fn two_concatenated_files_both_decode() {
		let mut buf = gen3_header(0);
		buf.extend_from_slice(&eof());
		let second_start = buf.len();
		buf.extend_from_slice(&gen3_header(0));
		buf.extend_from_slice(&eof());

		let files = decode_stroke_data(&buf);
		assert_eq!(files.len(), 2);
		assert_eq!(files[0].bytesize, second_start);
		assert_eq!(files[1].bytesize, buf.len() - second_start);
	}

	#[test]
	fn stroke_parsing_error_drops_remaining_bytes_but_keeps_earlier_files() {
		let mut buf = gen3_header(0);
		buf.extend_from_slice(&eof());
		// A second file that starts with garbage instead of a valid magic.
		buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

		let files = decode_stroke_data(&buf);
		assert_eq!(files.len(), 1);
	}

	#[test]
	fn reserved_axis_mask_is_a_stroke_parsing_error() {
		let mut buf = gen3_header(1);
		// x mask = 0b01, reserved.
		buf.push(0b0000_0100);
		buf.push(0x00);
		buf.extend_from_slice(&eof());

		// The whole buffer is dropped: no valid files recovered.
		assert!(decode_stroke_data(&buf).is_empty());
	}
}
