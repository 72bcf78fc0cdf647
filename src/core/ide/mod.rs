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

//! ATA task-file command engine
//!
//! One [`IdeController`] owns four unit slots (two emulated buses with two
//! drives each) and serves one bus transaction per [`IdeController::poll`]:
//! read the 8-byte task file, decode the command byte, dispatch. Multi
//! sector transfers iterate to completion synchronously within that single
//! call; this blocks the rest of the firmware loop for the transfer's
//! duration, a deliberate simplicity/latency tradeoff. CD-DA streaming is
//! ticked unconditionally every poll regardless of command activity.
//!
//! # Command Set
//!
//! | Opcode    | Command                      |
//! |-----------|------------------------------|
//! | 0x00      | NOP                          |
//! | 0x08      | DEVICE RESET                 |
//! | 0x10-0x1F | RECALIBRATE                  |
//! | 0x20      | READ SECTORS                 |
//! | 0x30      | WRITE SECTORS                |
//! | 0x40      | READ VERIFY                  |
//! | 0x90      | EXECUTE DEVICE DIAGNOSTIC    |
//! | 0x91      | INITIALIZE DEVICE PARAMETERS |
//! | 0xA0      | PACKET                       |
//! | 0xA1      | IDENTIFY PACKET DEVICE       |
//! | 0xC4      | READ MULTIPLE                |
//! | 0xC5      | WRITE MULTIPLE               |
//! | 0xC6      | SET MULTIPLE MODE            |
//! | 0xEC      | IDENTIFY DEVICE              |
//!
//! Unknown opcodes raise Aborted Command (ERR + END + IRQ) and are never
//! retried internally; retry policy belongs to the guest driver.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Duration;

use crate::core::atapi::{self, AtapiDrive};
use crate::core::error::{ControllerError, Result};
use crate::core::link::{try_for, AtaStatus, BusStatus, IdeLink, TaskFile};
use crate::core::storage::{SectorCard, CARD_SECTOR_SIZE};

pub mod geometry;
pub mod identify;
pub mod rdb;
#[cfg(test)]
mod tests;

pub use geometry::{Geometry, GeometryConvention};

/// Number of unit slots (two buses x two drives)
pub const UNIT_SLOTS: usize = 4;

/// Largest block accepted by SET MULTIPLE MODE
pub const MAX_MULTIPLE: u8 = 16;

/// ABRT bit of the ATA error register
const ERR_ABRT: u8 = 0x04;

/// Deadline for host data-phase handshakes
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Backing-store variant of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Image file on the filesystem; `synth_rdb` reserves a fabricated
    /// cylinder answered by the RDB synthesizer
    FileBacked { synth_rdb: bool },
    /// The whole raw card
    CardWhole,
    /// One partition of the raw card
    CardPartition { index: u8 },
    /// ATAPI CD-ROM unit
    CdRom,
}

/// One drive slot of the controller
pub struct Unit {
    /// Backing-store variant
    pub kind: UnitKind,
    /// CHS geometry computed when the unit was opened
    pub geometry: Geometry,
    /// Current READ/WRITE MULTIPLE block size (0 = disabled)
    pub sectors_per_block: u8,
    /// Signed LBA offset; negative when headroom is reserved for a
    /// synthesized RDB
    pub lba_offset: i64,
    /// First card sector of the partition (card-partition units)
    part_start: u32,
    /// Backing image (file-backed units)
    file: Option<File>,
    /// Image size in bytes
    size_bytes: u64,
    /// ATAPI drive state (CD-ROM units)
    pub(crate) cd: Option<AtapiDrive>,
}

impl Unit {
    /// ATAPI drive state, present on CD-ROM units
    pub fn cd(&self) -> Option<&AtapiDrive> {
        self.cd.as_ref()
    }

    /// Backing image size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Open a file-backed hard-disk unit
    ///
    /// Geometry is computed once from the file size; with `synth_rdb` the
    /// unit reserves one fabricated cylinder in front of the image and
    /// reports it through the RDB synthesizer.
    pub fn file_backed(
        path: &Path,
        synth_rdb: bool,
        convention: GeometryConvention,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|_| ControllerError::ImageNotFound(path.display().to_string()))?;
        let size_bytes = file.metadata()?.len();

        let (geometry, lba_offset) = if synth_rdb {
            geometry::compute_synth_rdb_geometry(size_bytes)
        } else {
            (geometry::compute_geometry(size_bytes, convention), 0)
        };

        log::info!(
            "unit: file {} ({} bytes) C/H/S {}/{}/{} offset {}",
            path.display(),
            size_bytes,
            geometry.cylinders,
            geometry.heads,
            geometry.sectors,
            lba_offset
        );

        Ok(Self {
            kind: UnitKind::FileBacked { synth_rdb },
            geometry,
            sectors_per_block: 0,
            lba_offset,
            part_start: 0,
            file: Some(file),
            size_bytes,
            cd: None,
        })
    }

    /// Expose the whole raw card as one unit
    pub fn card_whole(card_sectors: u32, convention: GeometryConvention) -> Self {
        let size_bytes = card_sectors as u64 * CARD_SECTOR_SIZE as u64;
        Self {
            kind: UnitKind::CardWhole,
            geometry: geometry::compute_geometry(size_bytes, convention),
            sectors_per_block: 0,
            lba_offset: 0,
            part_start: 0,
            file: None,
            size_bytes,
            cd: None,
        }
    }

    /// Expose one card partition as a unit
    ///
    /// Geometry derives from the partition-table entry (start/length in
    /// card sectors) rather than the whole card.
    pub fn card_partition(
        index: u8,
        start: u32,
        sectors: u32,
        convention: GeometryConvention,
    ) -> Self {
        let size_bytes = sectors as u64 * CARD_SECTOR_SIZE as u64;
        Self {
            kind: UnitKind::CardPartition { index },
            geometry: geometry::compute_geometry(size_bytes, convention),
            sectors_per_block: 0,
            lba_offset: 0,
            part_start: start,
            file: None,
            size_bytes,
            cd: None,
        }
    }

    /// Create an empty CD-ROM unit (no disc mounted)
    pub fn cdrom() -> Self {
        Self {
            kind: UnitKind::CdRom,
            geometry: Geometry::default(),
            sectors_per_block: 0,
            lba_offset: 0,
            part_start: 0,
            file: None,
            size_bytes: 0,
            cd: Some(AtapiDrive::new()),
        }
    }

    /// Total addressable sectors of the unit
    pub fn total_sectors(&self) -> u32 {
        self.geometry.total_sectors()
    }

    /// Decode the task-file address registers into an LBA
    ///
    /// CHS mode converts through the unit geometry; out-of-range CHS
    /// fields return `None`.
    fn task_lba(&self, tf: &TaskFile) -> Option<u32> {
        if tf.is_lba() {
            return Some(tf.lba());
        }
        let cylinder = ((tf.cylinder_high as u32) << 8) | tf.cylinder_low as u32;
        let head = (tf.drive_head & 0x0F) as u32;
        let sector = tf.sector_number as u32;
        if sector == 0
            || sector > self.geometry.sectors as u32
            || head >= self.geometry.heads as u32
        {
            return None;
        }
        Some(self.chs2lba(cylinder, head, sector))
    }

    /// CHS to LBA under the unit geometry
    fn chs2lba(&self, cylinder: u32, head: u32, sector: u32) -> u32 {
        (cylinder * self.geometry.heads as u32 + head) * self.geometry.sectors as u32 + sector - 1
    }

    /// Store `lba` back into the task-file address registers
    ///
    /// Uses the same addressing mode the command arrived with; this is the
    /// advance written after each transfer block.
    fn set_task_position(&self, tf: &mut TaskFile, lba: u32) {
        if tf.is_lba() {
            tf.set_lba(lba);
            return;
        }
        let per_cylinder = self.geometry.heads as u32 * self.geometry.sectors as u32;
        let cylinder = lba / per_cylinder;
        let rem = lba % per_cylinder;
        let head = rem / self.geometry.sectors as u32;
        let sector = rem % self.geometry.sectors as u32 + 1;
        tf.sector_number = sector as u8;
        tf.cylinder_low = cylinder as u8;
        tf.cylinder_high = (cylinder >> 8) as u8;
        tf.drive_head = (tf.drive_head & 0xF0) | head as u8;
    }

    /// Read one 512-byte sector from the unit's backing store
    fn read_sector(
        &mut self,
        lba: u32,
        card: &mut Option<Box<dyn SectorCard>>,
        buf: &mut [u8; CARD_SECTOR_SIZE],
    ) -> std::io::Result<()> {
        match self.kind {
            UnitKind::FileBacked { .. } => {
                let eff = lba as i64 + self.lba_offset;
                if eff < 0 {
                    // Access into the reserved cylinder: synthesize the
                    // fabricated boot blocks instead of touching the file
                    rdb::fake_block(&self.geometry, lba, buf);
                    return Ok(());
                }
                let offset = eff as u64 * CARD_SECTOR_SIZE as u64;
                if offset + CARD_SECTOR_SIZE as u64 > self.size_bytes {
                    return Err(out_of_range(lba));
                }
                let file = self.file.as_mut().ok_or_else(|| out_of_range(lba))?;
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(buf)?;
                Ok(())
            }
            UnitKind::CardWhole => card_ref(card)?.read_sectors(lba, buf),
            UnitKind::CardPartition { .. } => {
                card_ref(card)?.read_sectors(self.part_start + lba, buf)
            }
            UnitKind::CdRom => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "sector I/O on a packet device",
            )),
        }
    }

    /// Write one 512-byte sector to the unit's backing store
    fn write_sector(
        &mut self,
        lba: u32,
        card: &mut Option<Box<dyn SectorCard>>,
        buf: &[u8; CARD_SECTOR_SIZE],
    ) -> std::io::Result<()> {
        match self.kind {
            UnitKind::FileBacked { .. } => {
                let eff = lba as i64 + self.lba_offset;
                if eff < 0 {
                    // The fabricated boot blocks are read-only; writes are
                    // acknowledged and discarded
                    log::warn!("discarding write into synthesized RDB area, lba {}", lba);
                    return Ok(());
                }
                let offset = eff as u64 * CARD_SECTOR_SIZE as u64;
                if offset + CARD_SECTOR_SIZE as u64 > self.size_bytes {
                    return Err(out_of_range(lba));
                }
                let file = self.file.as_mut().ok_or_else(|| out_of_range(lba))?;
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(buf)?;
                Ok(())
            }
            UnitKind::CardWhole => card_ref(card)?.write_sectors(lba, buf),
            UnitKind::CardPartition { .. } => {
                card_ref(card)?.write_sectors(self.part_start + lba, buf)
            }
            UnitKind::CdRom => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "sector I/O on a packet device",
            )),
        }
    }
}

fn out_of_range(lba: u32) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("lba {} out of range", lba),
    )
}

fn card_ref<'a>(
    card: &'a mut Option<Box<dyn SectorCard>>,
) -> std::io::Result<&'a mut Box<dyn SectorCard>> {
    card.as_mut().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no card attached")
    })
}

/// Virtual IDE/ATAPI storage controller
///
/// Owns the four unit slots and the link to the FPGA-side register file.
/// No global state: multiple independent controllers can coexist (and do,
/// under test).
pub struct IdeController<L: IdeLink> {
    link: L,
    units: [Option<Unit>; UNIT_SLOTS],
    card: Option<Box<dyn SectorCard>>,
}

impl<L: IdeLink> IdeController<L> {
    /// Create a controller with empty slots
    pub fn new(link: L) -> Self {
        Self {
            link,
            units: [None, None, None, None],
            card: None,
        }
    }

    /// Attach a unit to a slot (0-3)
    pub fn attach(&mut self, slot: usize, unit: Unit) -> Result<()> {
        if slot >= UNIT_SLOTS {
            return Err(ControllerError::InvalidSlot(slot));
        }
        self.units[slot] = Some(unit);
        Ok(())
    }

    /// Attach the raw sector card used by card-backed units
    pub fn set_card(&mut self, card: Box<dyn SectorCard>) {
        self.card = Some(card);
    }

    /// Size of the attached card, if any
    pub fn card_sectors(&self) -> Option<u32> {
        self.card.as_ref().map(|c| c.sector_count())
    }

    /// Access a unit slot
    pub fn unit(&self, slot: usize) -> Option<&Unit> {
        self.units.get(slot).and_then(|u| u.as_ref())
    }

    /// Mutable access to a unit slot
    pub fn unit_mut(&mut self, slot: usize) -> Option<&mut Unit> {
        self.units.get_mut(slot).and_then(|u| u.as_mut())
    }

    /// Mount a disc image into a CD-ROM slot
    pub fn insert_disc(&mut self, slot: usize, path: &Path) -> Result<()> {
        let unit = self
            .unit_mut(slot)
            .ok_or(ControllerError::NoUnit(slot))?;
        let cd = unit.cd.as_mut().ok_or(ControllerError::NoUnit(slot))?;
        cd.insert(path)?;
        Ok(())
    }

    /// Eject the disc from a CD-ROM slot
    pub fn eject_disc(&mut self, slot: usize) -> Result<()> {
        let unit = self
            .unit_mut(slot)
            .ok_or(ControllerError::NoUnit(slot))?;
        let cd = unit.cd.as_mut().ok_or(ControllerError::NoUnit(slot))?;
        cd.eject();
        Ok(())
    }

    /// Consume the controller and return the link (test inspection)
    pub fn into_link(self) -> L {
        self.link
    }

    /// Borrow the link (test inspection / harness feeding)
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Serve at most one bus transaction, then tick CD-DA streaming
    ///
    /// Called once per main firmware loop iteration.
    pub fn poll(&mut self) {
        let bus_status = self.link.read_bus_status();
        if bus_status.contains(BusStatus::CMD0) {
            self.handle_bus(0);
        } else if bus_status.contains(BusStatus::CMD1) {
            self.handle_bus(1);
        }
        self.tick_audio();
    }

    /// Decode and dispatch the pending command on `bus`
    fn handle_bus(&mut self, bus: usize) {
        let raw = self.link.read_task_file();
        let tf = TaskFile::from_wire(&raw);
        let slot = bus * 2 + tf.drive();
        log::debug!("ide: bus {} unit {} command 0x{:02X}", bus, slot, tf.command);

        if self.units[slot].is_none() {
            log::warn!("ide: command for empty slot {}", slot);
            self.abort(tf);
            return;
        }

        match tf.command {
            0x00 => self.cmd_nop(tf),
            0x08 => self.cmd_device_reset(slot, tf),
            0x10..=0x1F => self.cmd_recalibrate(slot, tf),
            0x20 => self.cmd_read(slot, tf, false, false),
            0x30 => self.cmd_write(slot, tf, false),
            0x40 => self.cmd_read(slot, tf, false, true),
            0x90 => self.cmd_diagnostic(tf),
            0x91 => self.cmd_init_params(slot, tf),
            0xA0 => self.cmd_packet(slot, tf),
            0xA1 => self.cmd_identify(slot, tf, true),
            0xC4 => self.cmd_read(slot, tf, true, false),
            0xC5 => self.cmd_write(slot, tf, true),
            0xC6 => self.cmd_set_multiple(slot, tf),
            0xEC => self.cmd_identify(slot, tf, false),
            other => {
                log::warn!("ide: unknown command 0x{:02X}", other);
                self.abort(tf);
            }
        }
    }

    /// Aborted Command: ABRT in the error register, ERR + END + IRQ
    fn abort(&mut self, tf: TaskFile) {
        abort_on(&mut self.link, tf);
    }

    /// Successful no-data completion
    fn complete(&mut self, mut tf: TaskFile) {
        tf.error = 0;
        self.link.write_task_file(&tf);
        self.link
            .write_status(AtaStatus::RDY | AtaStatus::END | AtaStatus::IRQ);
    }

    /// Command 0x00: NOP
    fn cmd_nop(&mut self, tf: TaskFile) {
        self.complete(tf);
    }

    /// Command 0x08: DEVICE RESET
    ///
    /// Clears multiple mode and loads the ATAPI signature for packet
    /// devices so the guest can re-detect the unit type.
    fn cmd_device_reset(&mut self, slot: usize, mut tf: TaskFile) {
        let Some(unit) = self.units[slot].as_mut() else {
            return;
        };
        unit.sectors_per_block = 0;
        tf.error = 0x01; // diagnostic code: device 0 passed
        if unit.kind == UnitKind::CdRom {
            tf.set_atapi_signature();
        } else {
            tf.sector_count = 0x01;
            tf.sector_number = 0x01;
            tf.cylinder_low = 0;
            tf.cylinder_high = 0;
        }
        self.link.write_task_file(&tf);
        self.link.write_status(AtaStatus::END | AtaStatus::IRQ);
    }

    /// Commands 0x10-0x1F: RECALIBRATE
    fn cmd_recalibrate(&mut self, _slot: usize, mut tf: TaskFile) {
        tf.sector_number = 1;
        tf.cylinder_low = 0;
        tf.cylinder_high = 0;
        self.complete(tf);
    }

    /// Command 0x90: EXECUTE DEVICE DIAGNOSTIC
    fn cmd_diagnostic(&mut self, mut tf: TaskFile) {
        tf.error = 0x01; // device 0 passed
        self.link.write_task_file(&tf);
        self.link.write_status(AtaStatus::END | AtaStatus::IRQ);
    }

    /// Command 0x91: INITIALIZE DEVICE PARAMETERS
    ///
    /// The guest programs a translation geometry: heads from the
    /// drive/head register, sectors per track from the sector count.
    fn cmd_init_params(&mut self, slot: usize, tf: TaskFile) {
        let Some(unit) = self.units[slot].as_mut() else {
            return;
        };
        let heads = (tf.drive_head & 0x0F) + 1;
        let sectors = tf.sector_count;
        if sectors == 0 {
            self.abort(tf);
            return;
        }
        let per_cylinder = heads as u64 * sectors as u64;
        let cylinders = (unit.size_bytes / CARD_SECTOR_SIZE as u64 / per_cylinder).min(0xFFFF);
        unit.geometry = Geometry {
            cylinders: cylinders as u16,
            heads,
            sectors,
        };
        log::debug!(
            "ide: unit {} translated geometry {}/{}/{}",
            slot,
            cylinders,
            heads,
            sectors
        );
        self.complete(tf);
    }

    /// Command 0xC6: SET MULTIPLE MODE
    fn cmd_set_multiple(&mut self, slot: usize, tf: TaskFile) {
        let count = tf.sector_count;
        if count > MAX_MULTIPLE || (count != 0 && !count.is_power_of_two()) {
            self.abort(tf);
            return;
        }
        let Some(unit) = self.units[slot].as_mut() else {
            return;
        };
        unit.sectors_per_block = count;
        log::debug!("ide: unit {} multiple mode {}", slot, count);
        self.complete(tf);
    }

    /// Commands 0xEC / 0xA1: IDENTIFY (PACKET) DEVICE
    ///
    /// A command/unit-type mismatch aborts with the ATAPI signature loaded
    /// so the guest retries with the matching flavor.
    fn cmd_identify(&mut self, slot: usize, mut tf: TaskFile, packet: bool) {
        let Some(unit) = self.units[slot].as_ref() else {
            return;
        };
        let is_cd = unit.kind == UnitKind::CdRom;
        if packet != is_cd {
            if is_cd {
                tf.set_atapi_signature();
            }
            self.abort(tf);
            return;
        }

        let image = if packet {
            identify::identify_packet_device(slot)
        } else {
            identify::identify_device(&unit.geometry, slot, unit.sectors_per_block)
        };

        self.link.begin_transfer();
        self.link.stream_write(&image);
        self.link.end_transfer();
        self.complete(tf);
    }

    /// Commands 0x20 / 0xC4 / 0x40: READ SECTORS / MULTIPLE / VERIFY
    ///
    /// Iterates in blocks capped by the multiple-mode setting; after each
    /// block the address registers are advanced to the position following
    /// it before the per-block IRQ, which is what legacy ATA hosts expect.
    fn cmd_read(&mut self, slot: usize, mut tf: TaskFile, multiple: bool, verify: bool) {
        let Self { link, units, card } = self;
        let Some(unit) = units[slot].as_mut() else {
            return;
        };

        if multiple && unit.sectors_per_block == 0 {
            abort_on(link, tf);
            return;
        }
        let per_block = if multiple {
            unit.sectors_per_block as usize
        } else {
            1
        };
        let Some(mut lba) = unit.task_lba(&tf) else {
            abort_on(link, tf);
            return;
        };
        let mut remaining = sector_count(tf.sector_count);
        let mut first = true;

        while remaining > 0 {
            let block = per_block.min(remaining);

            // The link buffers one burst; wait for the host to drain the
            // previous one before pushing the next
            if !first && !verify {
                if try_for(HANDSHAKE_TIMEOUT, || {
                    link.read_bus_status().contains(BusStatus::DATA_EMPTY)
                })
                .is_err()
                {
                    log::warn!("ide: read drain handshake timed out");
                    abort_on(link, tf);
                    return;
                }
            }
            first = false;

            link.begin_transfer();
            for i in 0..block {
                let mut sector = [0u8; CARD_SECTOR_SIZE];
                if let Err(e) = unit.read_sector(lba + i as u32, card, &mut sector) {
                    log::error!("ide: read failed at lba {}: {}", lba + i as u32, e);
                    link.end_transfer();
                    abort_on(link, tf);
                    return;
                }
                if !verify {
                    link.stream_write(&sector);
                }
            }
            link.end_transfer();

            lba += block as u32;
            remaining -= block;
            unit.set_task_position(&mut tf, lba);
            tf.sector_count = remaining as u8;
            tf.error = 0;
            link.write_task_file(&tf);

            let mut status = AtaStatus::RDY | AtaStatus::IRQ;
            if remaining == 0 {
                status |= AtaStatus::END;
            }
            link.write_status(status);
        }
    }

    /// Commands 0x30 / 0xC5: WRITE SECTORS / MULTIPLE
    fn cmd_write(&mut self, slot: usize, mut tf: TaskFile, multiple: bool) {
        let Self { link, units, card } = self;
        let Some(unit) = units[slot].as_mut() else {
            return;
        };

        if multiple && unit.sectors_per_block == 0 {
            abort_on(link, tf);
            return;
        }
        let per_block = if multiple {
            unit.sectors_per_block as usize
        } else {
            1
        };
        let Some(mut lba) = unit.task_lba(&tf) else {
            abort_on(link, tf);
            return;
        };
        let mut remaining = sector_count(tf.sector_count);

        while remaining > 0 {
            let block = per_block.min(remaining);

            // Request the data phase and wait for the host to fill the
            // buffer; the bounded wait is the only cancellation point
            link.write_status(AtaStatus::RDY | AtaStatus::REQ);
            if try_for(HANDSHAKE_TIMEOUT, || {
                link.read_bus_status().contains(BusStatus::DATA_FULL)
            })
            .is_err()
            {
                log::warn!("ide: write data handshake timed out");
                abort_on(link, tf);
                return;
            }

            link.begin_transfer();
            for i in 0..block {
                let mut sector = [0u8; CARD_SECTOR_SIZE];
                link.stream_read(&mut sector);
                if let Err(e) = unit.write_sector(lba + i as u32, card, &sector) {
                    log::error!("ide: write failed at lba {}: {}", lba + i as u32, e);
                    link.end_transfer();
                    abort_on(link, tf);
                    return;
                }
            }
            link.end_transfer();

            lba += block as u32;
            remaining -= block;
            unit.set_task_position(&mut tf, lba);
            tf.sector_count = remaining as u8;
            tf.error = 0;
            link.write_task_file(&tf);

            let mut status = AtaStatus::RDY | AtaStatus::IRQ;
            if remaining == 0 {
                status |= AtaStatus::END;
            }
            link.write_status(status);
        }
    }

    /// Command 0xA0: PACKET
    fn cmd_packet(&mut self, slot: usize, tf: TaskFile) {
        let Self { link, units, .. } = self;
        let Some(unit) = units[slot].as_mut() else {
            return;
        };
        let Some(cd) = unit.cd.as_mut() else {
            abort_on(link, tf);
            return;
        };
        atapi::process_packet(link, cd, tf);
    }

    /// Unconditional per-poll CD-DA streaming tick for every CD unit
    fn tick_audio(&mut self) {
        let Self { link, units, .. } = self;
        for unit in units.iter_mut().flatten() {
            if let Some(cd) = unit.cd.as_mut() {
                cd.tick_audio(link);
            }
        }
    }
}

/// Aborted Command on a bare link handle
fn abort_on<L: IdeLink>(link: &mut L, mut tf: TaskFile) {
    tf.error = ERR_ABRT;
    link.write_task_file(&tf);
    link.write_status(AtaStatus::ERR | AtaStatus::END | AtaStatus::IRQ);
}

/// ATA sector-count semantics: zero means 256
fn sector_count(reg: u8) -> usize {
    if reg == 0 {
        256
    } else {
        reg as usize
    }
}
