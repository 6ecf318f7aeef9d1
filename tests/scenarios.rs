// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end reproductions of spec.md §8's worked scenarios, driving the
//! public API the way a real caller would: build an engine over a small
//! scripted [`Transport`], run an interaction or the decoder, and check
//! the result.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use paperlink::{decode_stroke_data, DeviceId, Error, Frame, Point, ProtocolEngine, ProtocolVersion, Transport};

/// A transport that answers from a fixed queue of replies, recording every
/// request it was asked to send.
struct ScriptedTransport {
	replies: VecDeque<Option<Frame>>,
	sent: Vec<Option<Bytes>>,
}

impl ScriptedTransport {
	fn new(replies: impl IntoIterator<Item = Frame>) -> Self {
		Self {
			replies: replies.into_iter().map(Some).collect(),
			sent: Vec::new(),
		}
	}
}

impl Transport for ScriptedTransport {
	fn exchange(&mut self, request: Option<Bytes>, wants_reply: bool, _timeout: Duration) -> Option<Frame> {
		self.sent.push(request);
		if !wants_reply {
			return None;
		}
		self.replies.pop_front().flatten()
	}
}

fn engine_at(version: ProtocolVersion, replies: impl IntoIterator<Item = Frame>) -> ProtocolEngine<ScriptedTransport> {
	let mut engine = ProtocolEngine::new(ScriptedTransport::new(replies));
	engine.set_version(version);
	engine
}

fn device_id() -> DeviceId {
	DeviceId::parse("112233445566").unwrap()
}

/// Routes the engine's `log` calls to the test harness's captured output so
/// a failing scenario's diagnostics show up in `cargo test` output.
fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Scenario 1: connect GEN1 with the correct id.
#[test]
fn connect_gen1_with_correct_id_succeeds() {
	init_logging();
	let mut engine = engine_at(ProtocolVersion::Gen1, [Frame {
		opcode: 0xb3,
		length: 1,
		payload: Bytes::from_static(&[0x00]),
	}]);
	engine.connect(device_id()).expect("connect should succeed");
}

/// Scenario 2: connect GEN1 with the wrong id is surfaced as Authorization.
#[test]
fn connect_gen1_with_wrong_id_is_authorization_error() {
	init_logging();
	let mut engine = engine_at(ProtocolVersion::Gen1, [Frame {
		opcode: 0xb3,
		length: 1,
		payload: Bytes::from_static(&[0x01]), // GeneralError
	}]);
	assert!(matches!(engine.connect(device_id()), Err(Error::Authorization { .. })));
}

/// Scenario 3: GEN3 connect denial reports `Authorization`.
#[test]
fn connect_gen3_denied_is_authorization_error() {
	init_logging();
	let mut engine = engine_at(ProtocolVersion::Gen3, [Frame {
		opcode: 0x51,
		length: 7,
		payload: Bytes::from_static(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x02]),
	}]);
	assert!(matches!(engine.connect(device_id()), Err(Error::Authorization { .. })));
}

/// Scenario 4: GEN1's packed-BCD clock reply decodes to the expected
/// Unix timestamp.
#[test]
fn get_time_gen1_decodes_bcd_clock() {
	init_logging();
	let mut engine = engine_at(ProtocolVersion::Gen1, [Frame {
		opcode: 0xbd,
		length: 6,
		payload: Bytes::from_static(&[0x19, 0x08, 0x14, 0x14, 0x30, 0x00]),
	}]);
	let reply = engine.get_time().expect("get_time should succeed");
	assert_eq!(reply.unix_timestamp, 1_565_793_000);
}

fn gen3_file_header(epoch: u32, stroke_count: u32) -> Vec<u8> {
	let mut buf = vec![0x67, 0x82, 0x69, 0x65];
	buf.extend_from_slice(&epoch.to_le_bytes());
	buf.extend_from_slice(&[0, 0]);
	buf.extend_from_slice(&stroke_count.to_le_bytes());
	buf.extend_from_slice(&[0, 0]);
	buf
}

fn eof_packet() -> Vec<u8> {
	vec![0xff; 9]
}

fn absolute_point_packet(x: i16, y: i16, p: u16) -> Vec<u8> {
	let mut buf = vec![0b1111_1111, 0xff, 0xff];
	buf.extend_from_slice(&x.to_le_bytes());
	buf.extend_from_slice(&y.to_le_bytes());
	buf.extend_from_slice(&p.to_le_bytes());
	buf
}

fn delta_x_packet(dx: i8) -> Vec<u8> {
	vec![0b0000_1000, dx as u8]
}

fn stroke_header_packet() -> Vec<u8> {
	let mut buf = vec![0xff, 0xfa, 0x00];
	buf.extend_from_slice(&0u32.to_le_bytes());
	buf.extend_from_slice(&[0, 0]);
	buf
}

/// Scenario 5: a single-stroke GEN3 capture decodes to one file, one
/// stroke, with more than 50 points and a monotone cumulative-delta
/// reconstruction.
#[test]
fn parses_a_single_stroke_file_with_many_points() {
	init_logging();
	let mut buf = gen3_file_header(1_565_793_000, 1);
	buf.extend(absolute_point_packet(0, 0, 100));
	for _ in 0..60 {
		buf.extend(delta_x_packet(1));
	}
	buf.extend(eof_packet());

	let files = decode_stroke_data(&buf);
	assert_eq!(files.len(), 1);
	let file = &files[0];
	assert_eq!(file.timestamp, Some(1_565_793_000));
	assert_eq!(file.strokes.len(), 1);
	let points = &file.strokes[0].points;
	assert!(points.len() > 50, "expected more than 50 points, got {}", points.len());
	assert_eq!(points[0], Point { x: 0, y: 0, p: 100 });
	// Every delta packet adds +1 to the running `last_delta` register, and
	// each point is `last_point + last_delta` of the state after that
	// fold-in — a constant unit delta therefore produces triangular-number
	// growth (P_k = k*(k+1)/2 after the absolute origin), not a flat +1
	// per step.
	for (k, point) in points.iter().enumerate().skip(1) {
		let k = k as i32;
		assert_eq!(point.x, k * (k + 1) / 2, "point {k} should follow triangular-number growth");
		assert_eq!(point.y, 0);
		assert_eq!(point.p, 100);
	}
	assert!(points.windows(2).all(|w| w[1].x > w[0].x), "x should be strictly increasing");
}

/// Scenario 6: a five-stroke GEN3 capture decodes to five strokes, the
/// majority of the points landing in the final one.
#[test]
fn parses_a_five_stroke_file() {
	init_logging();
	let mut buf = gen3_file_header(1_565_793_101, 5);
	for stroke_index in 0..5 {
		if stroke_index > 0 {
			buf.extend(stroke_header_packet());
		}
		buf.extend(absolute_point_packet(0, 0, 1));
		let point_count = if stroke_index == 4 { 40 } else { 2 };
		for _ in 0..point_count {
			buf.extend(delta_x_packet(1));
		}
	}
	buf.extend(eof_packet());

	let files = decode_stroke_data(&buf);
	assert_eq!(files.len(), 1);
	let file = &files[0];
	assert_eq!(file.strokes.len(), 5);
	let last_len = file.strokes[4].points.len();
	let total: usize = file.strokes.iter().map(|s| s.points.len()).sum();
	assert!(last_len * 2 > total, "fifth stroke should hold the majority of the points");
}

/// Invariant 3 (spec.md §8): `bytesize` always equals the bytes actually
/// consumed, and feeding the remainder back in is well-defined.
#[test]
fn bytesize_matches_consumed_bytes_across_concatenated_files() {
	init_logging();
	let mut first = gen3_file_header(0, 0);
	first.extend(eof_packet());
	let first_len = first.len();

	let mut buf = first.clone();
	buf.extend(gen3_file_header(0, 0));
	buf.extend(eof_packet());

	let files = decode_stroke_data(&buf);
	assert_eq!(files.len(), 2);
	assert_eq!(files[0].bytesize, first_len);

	let remainder = &buf[files[0].bytesize..];
	let second_pass = decode_stroke_data(remainder);
	assert_eq!(second_pass.len(), 1);
}
