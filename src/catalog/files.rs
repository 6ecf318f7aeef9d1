// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The file-transfer loop: how many strokes files are waiting, pulling
//! one down, confirming the CRC, and telling the device to drop it.

use crate::catalog::clock::decode_bcd_timestamp;
use crate::catalog::Interaction;
use crate::crc;
use crate::engine::{ProtocolEngine, Transport};
use crate::error::{Error, Result};
use crate::version::ProtocolVersion;

/// How many stroke files the device is holding for us.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AvailableFilesCountReply {
	/// The number of files available to download.
	pub count: u16,
}

/// How many strokes the oldest pending file contains, plus the
/// timestamp the device associates with it. GEN1/2's stroke-file format
/// carries no embedded timestamp of its own (spec.md §4.3's file
/// header); the session orchestrator backfills a decoded file's
/// timestamp from here when the decoder didn't find one inline.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GetStrokesReply {
	/// The stroke count the device reported.
	pub stroke_count: u32,
	/// Seconds since the Unix epoch, if the reply carried one. GEN1's
	/// occasionally-missing `0xC7` preamble also drops the ability to
	/// tell whether a count was reported at all — see
	/// [`ProtocolEngine::get_strokes`].
	pub timestamp: Option<u32>,
}

/// `DOWNLOAD_OLDEST_FILE` was acknowledged; pen-data notifications for
/// that file follow on the transport's separate data channel.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DownloadOldestFileReply;

/// The device-reported CRC-32 over the just-downloaded file's pen data,
/// decoded per [`crc::decode_reported_crc`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct WaitForEndReadReply {
	/// The CRC the device reported, already byte-reversed.
	pub reported_crc: u32,
}

/// `DELETE_OLDEST_FILE` was accepted. On GEN1 the device never
/// acknowledges this; this is returned as soon as the request is sent.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct DeleteOldestFileReply;

/// `SET_FILE_TRANSFER_REPORTING_TYPE` succeeded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct SetFileTransferReportingTypeReply;

impl<T: Transport> ProtocolEngine<T> {
	/// Reads how many stroke files are waiting to be downloaded.
	///
	/// GEN1 reports this big-endian; GEN2+ little-endian.
	pub fn available_files_count(&mut self) -> Result<AvailableFilesCountReply> {
		let entry = self.resolve_wired(Interaction::AvailableFilesCount)?;
		let version = self.version();
		self.execute_and_decode(entry, &[], |frame| {
			let interaction = Interaction::AvailableFilesCount.name();
			let bytes: [u8; 2] = frame.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
				interaction,
				detail: format!("expected a 2-byte count, got {} bytes", frame.payload.len()),
			})?;
			let count = if version == ProtocolVersion::Gen1 {
				u16::from_be_bytes(bytes)
			} else {
				u16::from_le_bytes(bytes)
			};
			Ok(AvailableFilesCountReply { count })
		})
	}

	/// Reads how many strokes the oldest pending file contains, and the
	/// timestamp the device associates with it.
	///
	/// GEN1 answers in two replies: a `0xC7` preamble carrying a
	/// big-endian count, followed (without a second request) by a
	/// `0xCD` reply carrying a packed-BCD timestamp. Firmware
	/// occasionally skips the preamble; when that happens the first
	/// reply already is the `0xCD` one and the count is unknown. GEN2+
	/// answer in one `0xCF` reply: a little-endian count followed by
	/// either a packed-BCD timestamp (GEN2) or a little-endian epoch
	/// (GEN3).
	pub fn get_strokes(&mut self) -> Result<GetStrokesReply> {
		let entry = self.resolve_wired(Interaction::GetStrokes)?;
		let interaction = Interaction::GetStrokes.name();
		let opcode = entry.request_opcode.expect("GET_STROKES always sends a request");

		let first = self.send_and_read(interaction, opcode, &[], entry.timeout, entry.expected_reply_opcodes)?;

		if self.version() == ProtocolVersion::Gen1 {
			return self.get_strokes_gen1(interaction, first, entry.timeout);
		}

		let payload = first.payload.as_ref();
		if payload.len() < 4 {
			return Err(Error::UnexpectedData {
				interaction,
				detail: format!("expected at least a 4-byte count, got {} bytes", payload.len()),
			});
		}
		let stroke_count = u32::from_le_bytes(payload[0..4].try_into().expect("slice is 4 bytes"));
		let rest: [u8; 6] = payload[4..].try_into().map_err(|_| Error::UnexpectedData {
			interaction,
			detail: format!("expected a 6-byte timestamp tail, got {} bytes", payload.len() - 4),
		})?;
		let timestamp = if self.version() == ProtocolVersion::Gen3 {
			u32::from_le_bytes(rest[0..4].try_into().expect("slice is 4 bytes"))
		} else {
			decode_bcd_timestamp(&rest, interaction)?
		};
		Ok(GetStrokesReply {
			stroke_count,
			timestamp: Some(timestamp),
		})
	}

	fn get_strokes_gen1(&mut self, interaction: &'static str, first: crate::frame::Frame, timeout: std::time::Duration) -> Result<GetStrokesReply> {
		let (stroke_count, timestamp_frame) = if first.opcode == 0xc7 {
			let bytes: [u8; 4] = first.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
				interaction,
				detail: format!("expected a 4-byte count, got {} bytes", first.payload.len()),
			})?;
			let count = u32::from_be_bytes(bytes);
			log::debug!("{interaction}: 0xC7 preamble reported {count} strokes");
			(Some(count), self.read_next_reply(interaction, timeout, &[0xcd])?)
		} else {
			log::debug!("{interaction}: device skipped the 0xC7 preamble");
			(None, first)
		};

		let bytes: [u8; 6] = timestamp_frame.payload.as_ref().try_into().map_err(|_| Error::UnexpectedData {
			interaction,
			detail: format!("expected a 6-byte BCD timestamp, got {} bytes", timestamp_frame.payload.len()),
		})?;
		let timestamp = decode_bcd_timestamp(&bytes, interaction)?;

		Ok(GetStrokesReply {
			stroke_count: stroke_count.unwrap_or(0),
			timestamp: Some(timestamp),
		})
	}

	/// Tells the device to begin streaming the oldest pending file's pen
	/// data over the notification channel.
	///
	/// A successful reply is `0xC8` carrying a leading `0xBE` marker byte;
	/// the opcode itself is checked by `execute_and_decode` against the
	/// catalog entry, but the marker is specific to this interaction and
	/// checked here.
	pub fn download_oldest_file(&mut self) -> Result<DownloadOldestFileReply> {
		let entry = self.resolve_wired(Interaction::DownloadOldestFile)?;
		self.execute_and_decode(entry, &[], |frame| {
			let interaction = Interaction::DownloadOldestFile.name();
			if frame.payload.first() != Some(&0xbe) {
				return Err(Error::UnexpectedData {
					interaction,
					detail: format!("expected a leading 0xBE marker byte, got {:?}", frame.payload.first()),
				});
			}
			Ok(DownloadOldestFileReply)
		})
	}

	/// Waits for the device to confirm the file just streamed is
	/// complete and report its CRC.
	///
	/// Neither generation's catalog entry sends a request
	/// (`requires_request` is `false` for both rows) — this is purely a
	/// reply to something `DOWNLOAD_OLDEST_FILE` already triggered. The
	/// first reply is always `0xC8` carrying a leading `0xED` marker byte
	/// before the 4 CRC bytes; GEN1 follows it with a second `0xC9` reply
	/// whose payload is the 4 CRC bytes with no marker, and that second
	/// reply is the one whose CRC actually matters there.
	pub fn wait_for_end_read(&mut self) -> Result<WaitForEndReadReply> {
		let entry = self.resolve_wired(Interaction::WaitForEndRead)?;
		let interaction = Interaction::WaitForEndRead.name();

		let first = self.read_next_reply(interaction, entry.timeout, &[0xc8])?;
		let crc_frame = if self.version() == ProtocolVersion::Gen1 {
			self.read_next_reply(interaction, entry.timeout, &[0xc9])?
		} else {
			first
		};

		let payload = crc_frame.payload.as_ref();
		let tail = payload.len().checked_sub(4).ok_or_else(|| Error::UnexpectedData {
			interaction,
			detail: format!("expected at least 4 CRC bytes, got {} bytes", payload.len()),
		})?;
		let bytes: [u8; 4] = payload[tail..].try_into().expect("slice is 4 bytes");
		Ok(WaitForEndReadReply {
			reported_crc: crc::decode_reported_crc(&bytes),
		})
	}

	/// Tells the device it can drop the oldest pending file.
	///
	/// GEN1's catalog entry has `requires_reply: false` — the device
	/// never acknowledges this one, so the request is fired without
	/// waiting.
	pub fn delete_oldest_file(&mut self) -> Result<DeleteOldestFileReply> {
		let entry = self.resolve_wired(Interaction::DeleteOldestFile)?;
		let opcode = entry.request_opcode.expect("DELETE_OLDEST_FILE always sends a request");

		if entry.requires_reply {
			self.execute_and_decode(entry, &[], |_frame| Ok(DeleteOldestFileReply))
		} else {
			self.send_without_reply(opcode, &[], entry.timeout);
			Ok(DeleteOldestFileReply)
		}
	}

	/// Selects how the device reports file-transfer progress.
	pub fn set_file_transfer_reporting_type(&mut self, reporting_type: u8) -> Result<SetFileTransferReportingTypeReply> {
		let entry = self.resolve_wired(Interaction::SetFileTransferReportingType)?;
		self.execute_and_decode(entry, &[reporting_type], |_frame| Ok(SetFileTransferReportingTypeReply))
	}
}

#[cfg(test)]
mod tests {
	use bytes::Bytes;

	use super::*;
	use crate::engine::test_support::ScriptedTransport;
	use crate::frame::Frame;

	fn engine_at(version: ProtocolVersion, replies: impl IntoIterator<Item = Frame>) -> ProtocolEngine<ScriptedTransport> {
		let mut engine = ProtocolEngine::new(ScriptedTransport::new(replies));
		engine.set_version(version);
		engine
	}

	#[test]
	fn available_files_count_decodes_le_u16_on_gen2() {
		let mut engine = engine_at(ProtocolVersion::Gen2, [Frame {
			opcode: 0xc2,
			length: 2,
			payload: Bytes::from_static(&[3, 0]),
		}]);
		assert_eq!(engine.available_files_count().unwrap().count, 3);
	}

	#[test]
	fn available_files_count_decodes_be_u16_on_gen1() {
		let mut engine = engine_at(ProtocolVersion::Gen1, [Frame {
			opcode: 0xc2,
			length: 2,
			payload: Bytes::from_static(&[0, 3]),
		}]);
		assert_eq!(engine.available_files_count().unwrap().count, 3);
	}

	#[test]
	fn get_strokes_gen1_reads_count_then_bcd_timestamp() {
		let mut engine = engine_at(ProtocolVersion::Gen1, [
			Frame {
				opcode: 0xc7,
				length: 4,
				payload: Bytes::from_static(&[0x00, 0x00, 0x00, 0x05]),
			},
			Frame {
				opcode: 0xcd,
				length: 6,
				payload: Bytes::from_static(&[0x19, 0x08, 0x14, 0x14, 0x30, 0x00]),
			},
		]);
		let reply = engine.get_strokes().unwrap();
		assert_eq!(reply.stroke_count, 5);
		assert_eq!(reply.timestamp, Some(1_565_793_000));
	}

	#[test]
	fn get_strokes_gen1_tolerates_missing_preamble() {
		let mut engine = engine_at(ProtocolVersion::Gen1, [Frame {
			opcode: 0xcd,
			length: 6,
			payload: Bytes::from_static(&[0x19, 0x08, 0x14, 0x14, 0x30, 0x00]),
		}]);
		let reply = engine.get_strokes().unwrap();
		assert_eq!(reply.stroke_count, 0);
		assert_eq!(reply.timestamp, Some(1_565_793_000));
	}

	#[test]
	fn get_strokes_gen3_reads_le_count_and_le_epoch_in_one_reply() {
		let mut engine = engine_at(ProtocolVersion::Gen3, [Frame {
			opcode: 0xcf,
			length: 10,
			payload: Bytes::from_static(&[0x05, 0x00, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12, 0x00, 0x00]),
		}]);
		let reply = engine.get_strokes().unwrap();
		assert_eq!(reply.stroke_count, 5);
		assert_eq!(reply.timestamp, Some(0x1234_5678));
	}

	#[test]
	fn wait_for_end_read_gen1_reads_two_frames_and_trusts_the_second() {
		let mut engine = engine_at(ProtocolVersion::Gen1, [
			Frame {
				opcode: 0xc8,
				length: 5,
				payload: Bytes::from_static(&[0xed, 0xaa, 0xaa, 0xaa, 0xaa]),
			},
			Frame {
				opcode: 0xc9,
				length: 4,
				payload: Bytes::from_static(&[0x78, 0x56, 0x34, 0x12]),
			},
		]);
		assert_eq!(engine.wait_for_end_read().unwrap().reported_crc, 0x1234_5678);
	}

	#[test]
	fn wait_for_end_read_gen2_strips_the_0xed_marker_from_the_c8_reply() {
		let mut engine = engine_at(ProtocolVersion::Gen2, [Frame {
			opcode: 0xc8,
			length: 5,
			payload: Bytes::from_static(&[0xed, 0x78, 0x56, 0x34, 0x12]),
		}]);
		assert_eq!(engine.wait_for_end_read().unwrap().reported_crc, 0x1234_5678);
	}

	#[test]
	fn delete_oldest_file_gen1_does_not_wait_for_a_reply() {
		let mut engine = engine_at(ProtocolVersion::Gen1, []);
		assert_eq!(engine.delete_oldest_file().unwrap(), DeleteOldestFileReply);
		assert_eq!(engine.transport_for_test().sent.len(), 1);
	}

	#[test]
	fn delete_oldest_file_gen2_waits_for_an_ack() {
		let mut engine = engine_at(ProtocolVersion::Gen2, [Frame {
			opcode: 0xb3,
			length: 1,
			payload: Bytes::from_static(&[0x00]),
		}]);
		assert_eq!(engine.delete_oldest_file().unwrap(), DeleteOldestFileReply);
	}
}
