// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The control-plane frame: `[opcode(1) | length(1) | payload(length)]`.
//!
//! Framing above this (where a notification's bytes begin and end) is the
//! transport's responsibility; Paperlink only ever sees whole frames.

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};

/// A single control-plane frame.
///
/// Invariant: `length as usize == payload.len()`. [`Frame::decode`]
/// enforces this on received bytes; [`Frame::encode_request`] always
/// produces a frame that upholds it.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Frame {
	/// The opcode identifying this frame's message.
	pub opcode: u8,
	/// The payload's length in bytes. Always equal to `payload.len()`.
	pub length: u8,
	/// The frame's payload.
	pub payload: Bytes,
}

impl Frame {
	/// Encodes a request frame for `opcode` carrying `payload`.
	///
	/// # Panics
	///
	/// Panics if `payload` is longer than 255 bytes — no catalog entry
	/// defined in `catalog` ever constructs one this large.
	#[must_use]
	pub fn encode_request(opcode: u8, payload: &[u8]) -> Bytes {
		assert!(payload.len() <= u8::MAX as usize, "request payload too long");

		let mut buf = BytesMut::with_capacity(2 + payload.len());
		buf.extend_from_slice(&[opcode, payload.len() as u8]);
		buf.extend_from_slice(payload);
		buf.freeze()
	}

	/// Parses a received buffer as a single frame.
	///
	/// # Errors
	///
	/// Returns [`Error::UnexpectedData`] if the buffer is shorter than its
	/// own header demands, or if the declared length disagrees with the
	/// number of payload bytes actually present.
	pub fn decode(bytes: &[u8]) -> Result<Self> {
		let [opcode, length, payload @ ..] = bytes else {
			return Err(Error::UnexpectedData {
				interaction: "<frame>",
				detail: format!("frame shorter than the 2-byte header: {} bytes", bytes.len()),
			});
		};

		if payload.len() != *length as usize {
			return Err(Error::UnexpectedData {
				interaction: "<frame>",
				detail: format!(
					"length field says {length} bytes but {} were given",
					payload.len()
				),
			});
		}

		Ok(Self {
			opcode: *opcode,
			length: *length,
			payload: Bytes::copy_from_slice(payload),
		})
	}
}
