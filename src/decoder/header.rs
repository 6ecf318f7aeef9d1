// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! File-header recognition: the two magic prefixes a stroke file can
//! begin with.

use crate::error::{Error, Result};

const GEN3_MAGIC: [u8; 4] = [0x67, 0x82, 0x69, 0x65];
const GEN1_GEN2_MAGIC: [u8; 4] = [0x62, 0x38, 0x62, 0x74];

/// A parsed file header: how many bytes it occupied, and the embedded
/// timestamp if the magic carries one.
pub(super) struct FileHeader {
	pub(super) header_len: usize,
	pub(super) timestamp: Option<u32>,
}

/// Recognizes the file header at the start of `buf`.
///
/// GEN3's header is 16 bytes: magic, a 4-byte LE epoch, 2 unused bytes,
/// a 4-byte LE stroke count (informational only — the decoder counts
/// strokes itself as it parses), and 2 more unused bytes. GEN1/2's
/// header is the bare 4-byte magic with no embedded timestamp.
pub(super) fn parse(buf: &[u8]) -> Result<FileHeader> {
	if buf.starts_with(&GEN3_MAGIC) {
		if buf.len() < 16 {
			return Err(Error::StrokeParsing(format!(
				"GEN3 file header needs 16 bytes, only {} available",
				buf.len()
			)));
		}
		let epoch = u32::from_le_bytes(buf[4..8].try_into().expect("slice is 4 bytes"));
		return Ok(FileHeader {
			header_len: 16,
			timestamp: Some(epoch),
		});
	}

	if buf.starts_with(&GEN1_GEN2_MAGIC) {
		return Ok(FileHeader {
			header_len: 4,
			timestamp: None,
		});
	}

	Err(Error::StrokeParsing(format!(
		"expected a file header magic, found {:02x?}",
		&buf[..buf.len().min(4)]
	)))
}

/// Whether `buf` begins with either generation's file-header magic.
///
/// Used by the packet loop to recognize an unexpected file header
/// appearing mid-stream (spec.md §4.3: logged and fatal for the current
/// file, no recovery attempted).
pub(super) fn looks_like_file_header(buf: &[u8]) -> bool {
	buf.starts_with(&GEN3_MAGIC) || buf.starts_with(&GEN1_GEN2_MAGIC)
}
