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

//! Byte-serial link to the FPGA-side IDE register file
//!
//! The emulated ATA bus lives in FPGA logic; the firmware reaches it over a
//! byte-serial link. This module defines the transport seam ([`IdeLink`]),
//! the task-file register image exchanged per transaction, the ATA status
//! bits written back to the guest, and the bounded busy-wait helper used
//! around data-phase handshakes.
//!
//! # Task File Layout
//!
//! One bus transaction delivers an 8-byte task-file image following the
//! legacy ATA register ordering (byte 0 mirrors the data-port slot and is
//! unused):
//!
//! | Byte | Register                   |
//! |------|----------------------------|
//! | 0    | (data port slot, unused)   |
//! | 1    | Error / Features           |
//! | 2    | Sector Count               |
//! | 3    | Sector Number / LBA 7:0    |
//! | 4    | Cylinder Low / LBA 15:8    |
//! | 5    | Cylinder High / LBA 23:16  |
//! | 6    | Drive/Head / LBA 27:24     |
//! | 7    | Status / Command           |

use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::core::error::LinkError;

mod scripted;

pub use scripted::ScriptedLink;

bitflags! {
    /// ATA status register bits as understood by the FPGA core
    ///
    /// `IRQ` toggles the *guest's* emulated interrupt line; it is a status
    /// write on the link, never a host interrupt.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AtaStatus: u8 {
        /// Transaction finished (core releases BSY/DRQ)
        const END = 0x80;
        /// ATAPI packet protocol phase
        const PKT = 0x20;
        /// Raise the emulated interrupt line
        const IRQ = 0x10;
        /// Device ready
        const RDY = 0x08;
        /// Data request (PIO burst expected)
        const REQ = 0x04;
        /// Command failed; error register is valid
        const ERR = 0x01;
    }
}

bitflags! {
    /// Bus status flags polled from the link once per firmware loop
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusStatus: u8 {
        /// Command pending on the primary bus
        const CMD0 = 0x01;
        /// Command pending on the secondary bus
        const CMD1 = 0x02;
        /// Host has filled the data buffer (write/packet phase may proceed)
        const DATA_FULL = 0x04;
        /// Host has drained the data buffer (next read burst may be pushed)
        const DATA_EMPTY = 0x08;
    }
}

/// Decoded ATA task-file register image
///
/// The wire representation is a fixed 8-byte vector per transaction; this
/// struct holds the seven live registers by name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFile {
    /// Error (read) / Features (write)
    pub error: u8,
    /// Sector count
    pub sector_count: u8,
    /// Sector number / LBA 7:0
    pub sector_number: u8,
    /// Cylinder low / LBA 15:8
    pub cylinder_low: u8,
    /// Cylinder high / LBA 23:16
    pub cylinder_high: u8,
    /// Drive/head select / LBA 27:24
    pub drive_head: u8,
    /// Status (read) / Command (write)
    pub command: u8,
}

impl TaskFile {
    /// Decode the 8-byte wire image delivered by the link
    pub fn from_wire(raw: &[u8; 8]) -> Self {
        Self {
            error: raw[1],
            sector_count: raw[2],
            sector_number: raw[3],
            cylinder_low: raw[4],
            cylinder_high: raw[5],
            drive_head: raw[6],
            command: raw[7],
        }
    }

    /// Drive select bit (0 or 1) from the drive/head register
    pub fn drive(&self) -> usize {
        ((self.drive_head >> 4) & 1) as usize
    }

    /// True when the task file requests LBA addressing (drive/head bit 6)
    pub fn is_lba(&self) -> bool {
        self.drive_head & 0x40 != 0
    }

    /// 28-bit LBA from the address registers (LBA mode only)
    pub fn lba(&self) -> u32 {
        ((self.drive_head as u32 & 0x0F) << 24)
            | ((self.cylinder_high as u32) << 16)
            | ((self.cylinder_low as u32) << 8)
            | self.sector_number as u32
    }

    /// Store a 28-bit LBA back into the address registers (LBA mode)
    pub fn set_lba(&mut self, lba: u32) {
        self.sector_number = lba as u8;
        self.cylinder_low = (lba >> 8) as u8;
        self.cylinder_high = (lba >> 16) as u8;
        self.drive_head = (self.drive_head & 0xF0) | ((lba >> 24) & 0x0F) as u8;
    }

    /// ATAPI byte-count limit carried in the cylinder registers
    ///
    /// The host loads the maximum per-DRQ transfer length here before
    /// issuing PACKET. Zero means the host set no limit.
    pub fn byte_count(&self) -> usize {
        ((self.cylinder_high as usize) << 8) | self.cylinder_low as usize
    }

    /// Store a per-fragment byte count into the cylinder registers
    pub fn set_byte_count(&mut self, count: usize) {
        self.cylinder_low = count as u8;
        self.cylinder_high = (count >> 8) as u8;
    }

    /// Load the fixed ATAPI signature (cylinder 0xEB14)
    ///
    /// Written back when an IDENTIFY/unit-kind mismatch tells the guest to
    /// retry with the packet-device flavor of the command.
    pub fn set_atapi_signature(&mut self) {
        self.sector_count = 0x01;
        self.sector_number = 0x01;
        self.cylinder_low = 0x14;
        self.cylinder_high = 0xEB;
    }
}

/// Transport seam between the controller core and the FPGA link
///
/// Implemented by the real SPI/byte-link driver elsewhere in the firmware;
/// [`ScriptedLink`] provides an in-memory double for tests and the CLI
/// smoke harness. One `read_task_file` / response cycle is one guest bus
/// transaction.
pub trait IdeLink {
    /// Read the 8-byte task-file image for the pending command
    fn read_task_file(&mut self) -> [u8; 8];

    /// Write the result registers back (status written separately)
    fn write_task_file(&mut self, tf: &TaskFile);

    /// Write the status register, toggling the guest IRQ line via `IRQ`
    fn write_status(&mut self, status: AtaStatus);

    /// Poll command-pending / data-buffer flags
    fn read_bus_status(&mut self) -> BusStatus;

    /// Push one PIO burst to the guest
    fn stream_write(&mut self, buf: &[u8]);

    /// Pull one PIO burst from the guest
    fn stream_read(&mut self, buf: &mut [u8]);

    /// Enable the bus for a PIO burst (scoped around stream calls)
    fn begin_transfer(&mut self);

    /// Release the bus after a PIO burst
    fn end_transfer(&mut self);

    /// True when the CD-DA FIFO can take one more raw sector
    fn cdda_has_space(&self) -> bool;

    /// Stream one 2352-byte raw audio sector into the CD-DA sink
    fn cdda_write(&mut self, sector: &[u8]);
}

/// Poll `cond` until it returns true or `timeout` elapses
///
/// This is the only cancellation mechanism in the subsystem: data-phase
/// handshakes busy-wait with a millisecond deadline instead of blocking
/// indefinitely.
pub fn try_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> Result<(), LinkError> {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(LinkError::Timeout(timeout.as_millis() as u64));
        }
        std::hint::spin_loop();
    }
}
