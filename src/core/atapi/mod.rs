// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ATAPI packet processor
//!
//! Entered through the ATA PACKET command: the core requests the 12-byte
//! command packet from the host, decodes the SCSI-MMC opcode and serves it
//! against the mounted disc image. Every failure funnels through one
//! error-send routine that stores the sense triple for the next REQUEST
//! SENSE and writes the sense key into the error register's high nibble.
//!
//! Data responses go out through [`write_packet`], which fragments to the
//! host's byte-count limit (carried in the cylinder registers) and raises
//! the final IRQ/END on the last fragment.

use std::path::Path;
use std::time::Duration;

use crate::core::disc::Toc;
use crate::core::error::CueError;
use crate::core::link::{try_for, AtaStatus, BusStatus, IdeLink, TaskFile};

pub(crate) mod cd_audio;
mod commands;
#[cfg(test)]
mod tests;

pub use cd_audio::CdAudio;

/// Deadline for the host to deliver packet and parameter bytes
const PACKET_TIMEOUT: Duration = Duration::from_secs(2);

/// SCSI sense keys used by the processor
pub const SENSE_KEY_NOT_READY: u8 = 0x02;
pub const SENSE_KEY_MEDIUM_ERROR: u8 = 0x03;
pub const SENSE_KEY_ILLEGAL_REQUEST: u8 = 0x05;

/// One SCSI sense triple (key, additional sense code, qualifier)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sense {
    pub key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl Sense {
    /// No sense: everything fine
    pub const NONE: Sense = Sense {
        key: 0,
        asc: 0,
        ascq: 0,
    };

    /// Medium not present
    pub const NO_MEDIUM: Sense = Sense {
        key: SENSE_KEY_NOT_READY,
        asc: 0x3A,
        ascq: 0,
    };

    /// Unit not ready (host handshake timeout, retryable)
    pub const NOT_READY: Sense = Sense {
        key: SENSE_KEY_NOT_READY,
        asc: 0x04,
        ascq: 0,
    };

    fn illegal(asc: u8) -> Sense {
        Sense {
            key: SENSE_KEY_ILLEGAL_REQUEST,
            asc,
            ascq: 0,
        }
    }

    fn medium_error(asc: u8) -> Sense {
        Sense {
            key: SENSE_KEY_MEDIUM_ERROR,
            asc,
            ascq: 0,
        }
    }
}

/// State of one ATAPI CD-ROM unit
///
/// Owns the mounted disc's table of contents, the pending sense triple and
/// the CD-DA playback machine. One per CD slot.
pub struct AtapiDrive {
    pub(crate) toc: Toc,
    sense: Sense,
    pub(crate) audio: CdAudio,
}

impl Default for AtapiDrive {
    fn default() -> Self {
        Self::new()
    }
}

impl AtapiDrive {
    /// Drive with no disc mounted
    pub fn new() -> Self {
        Self {
            toc: Toc::empty(),
            sense: Sense::NONE,
            audio: CdAudio::new(),
        }
    }

    /// Mount a disc image (CUE or ISO); replaces any current disc
    pub fn insert(&mut self, path: &Path) -> Result<(), CueError> {
        self.audio.stop();
        self.toc = Toc::parse(path)?;
        self.sense = Sense::NONE;
        Ok(())
    }

    /// Eject the current disc; the TOC goes invalid immediately
    pub fn eject(&mut self) {
        self.audio.stop();
        self.toc.invalidate();
        self.sense = Sense::NO_MEDIUM;
    }

    /// Mounted disc's table of contents
    pub fn toc(&self) -> &Toc {
        &self.toc
    }

    /// Stream pending CD-DA sectors; called once per firmware poll
    pub fn tick_audio<L: IdeLink>(&mut self, link: &mut L) {
        self.audio.tick(link, &mut self.toc);
    }
}

/// Serve one PACKET command: fetch the 12-byte packet, dispatch
pub(crate) fn process_packet<L: IdeLink>(link: &mut L, drive: &mut AtapiDrive, tf: TaskFile) {
    // Ask the host for the command packet
    link.write_status(AtaStatus::PKT | AtaStatus::REQ);
    if try_for(PACKET_TIMEOUT, || {
        link.read_bus_status().contains(BusStatus::DATA_FULL)
    })
    .is_err()
    {
        log::warn!("atapi: packet delivery timed out");
        send_error(link, drive, tf, Sense::NOT_READY);
        return;
    }

    let mut packet = [0u8; 12];
    link.begin_transfer();
    link.stream_read(&mut packet);
    link.end_transfer();

    commands::dispatch(link, drive, tf, &packet);
}

/// Store the sense triple and report the failure to the host
///
/// The sense key rides in the error register's high nibble with ABRT set
/// below it; details stay queued for the next REQUEST SENSE.
fn send_error<L: IdeLink>(link: &mut L, drive: &mut AtapiDrive, mut tf: TaskFile, sense: Sense) {
    log::debug!(
        "atapi: error key {:#x} asc {:#02x}/{:#02x}",
        sense.key,
        sense.asc,
        sense.ascq
    );
    drive.sense = sense;
    tf.error = (sense.key << 4) | 0x04;
    link.write_task_file(&tf);
    link.write_status(AtaStatus::ERR | AtaStatus::END | AtaStatus::IRQ);
}

/// Successful completion without a data phase
fn send_ok<L: IdeLink>(link: &mut L, mut tf: TaskFile) {
    tf.error = 0;
    link.write_task_file(&tf);
    link.write_status(AtaStatus::RDY | AtaStatus::END | AtaStatus::IRQ);
}

/// Send a data-in response, fragmented to the host's byte-count limit
///
/// Each fragment writes its length into the cylinder registers, streams
/// the bytes and raises IRQ; the final fragment adds END. A zero limit
/// means the host accepts the whole response in one burst. Fragments
/// after the first wait for the host to drain the previous one; a stalled
/// host times out into Not-Ready sense.
fn write_packet<L: IdeLink>(
    link: &mut L,
    drive: &mut AtapiDrive,
    mut tf: TaskFile,
    data: &[u8],
) {
    if data.is_empty() {
        send_ok(link, tf);
        return;
    }
    let limit = match tf.byte_count() {
        0 => data.len(),
        n => n,
    };

    let mut offset = 0;
    while offset < data.len() {
        let chunk = limit.min(data.len() - offset);

        if offset > 0 {
            if try_for(PACKET_TIMEOUT, || {
                link.read_bus_status().contains(BusStatus::DATA_EMPTY)
            })
            .is_err()
            {
                log::warn!("atapi: response drain timed out");
                send_error(link, drive, tf, Sense::NOT_READY);
                return;
            }
        }

        link.begin_transfer();
        link.stream_write(&data[offset..offset + chunk]);
        link.end_transfer();
        offset += chunk;

        tf.error = 0;
        tf.set_byte_count(chunk);
        link.write_task_file(&tf);

        let mut status = AtaStatus::RDY | AtaStatus::IRQ;
        if offset >= data.len() {
            status |= AtaStatus::END;
        } else {
            status |= AtaStatus::PKT | AtaStatus::REQ;
        }
        link.write_status(status);
    }
}
