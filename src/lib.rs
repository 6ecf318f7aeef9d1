// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Paperlink
//!
//! Paperlink is the wire protocol engine for a family of Bluetooth LE
//! "smartpad" digital paper tablets. It implements the control-plane
//! message exchange (connect, clock sync, device metadata, file
//! transfer) across three overlapping firmware generations, and the
//! data-plane decoder that turns a downloaded stroke file into
//! structured `(x, y, pressure)` samples.
//!
//! Paperlink is deliberately not a complete tablet daemon: it does not
//! open a GATT connection, does not publish drawings to other
//! processes, and does not persist anything to disk. Those concerns
//! belong to the caller; Paperlink consumes the transport as a
//! [`Transport`](engine::Transport) trait object and hands back typed
//! messages and decoded drawings.

#![warn(missing_docs)]
#![warn(clippy::use_self)]
#![allow(clippy::module_name_repetitions)]

mod identifier;
mod version;
mod mode;
mod frame;
mod error;
mod crc;
pub mod catalog;
pub mod engine;
pub mod decoder;
pub mod session;

pub use crate::catalog::Interaction;
pub use crate::decoder::{decode_stroke_data, Point, Stroke, StrokeFile};
pub use crate::engine::{ProtocolEngine, Transport};
pub use crate::error::{Error, ErrorCode, Result};
pub use crate::frame::Frame;
pub use crate::identifier::DeviceId;
pub use crate::mode::Mode;
pub use crate::session::{EngineConfig, SessionOrchestrator};
pub use crate::version::ProtocolVersion;
