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

//! Raw sector card abstraction
//!
//! Card-backed units read and write raw 512-byte sectors directly; the real
//! SD block driver lives elsewhere in the firmware. The trait is
//! intentionally narrow: sector-addressed, 512-byte blocks, no partial
//! access.

use std::io;

/// Sector size of the raw card in bytes
pub const CARD_SECTOR_SIZE: usize = 512;

/// Raw sector device consumed by card-backed units
pub trait SectorCard {
    /// Total sector count of the card
    fn sector_count(&self) -> u32;

    /// Read `buf.len() / 512` sectors starting at `lba`
    fn read_sectors(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()>;

    /// Write `buf.len() / 512` sectors starting at `lba`
    fn write_sectors(&mut self, lba: u32, buf: &[u8]) -> io::Result<()>;
}

/// In-memory card used by tests and the CLI smoke harness
#[derive(Debug)]
pub struct MemCard {
    data: Vec<u8>,
}

impl MemCard {
    /// Create a zero-filled card with the given sector count
    pub fn new(sectors: u32) -> Self {
        Self {
            data: vec![0; sectors as usize * CARD_SECTOR_SIZE],
        }
    }

    /// Create a card over an existing byte image (truncated to whole sectors)
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        data.truncate(data.len() / CARD_SECTOR_SIZE * CARD_SECTOR_SIZE);
        Self { data }
    }

    fn range(&self, lba: u32, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = lba as usize * CARD_SECTOR_SIZE;
        let end = start + len;
        if len % CARD_SECTOR_SIZE != 0 || end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("card access out of range: lba {} len {}", lba, len),
            ));
        }
        Ok(start..end)
    }
}

impl SectorCard for MemCard {
    fn sector_count(&self) -> u32 {
        (self.data.len() / CARD_SECTOR_SIZE) as u32
    }

    fn read_sectors(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(lba, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sectors(&mut self, lba: u32, buf: &[u8]) -> io::Result<()> {
        let range = self.range(lba, buf.len())?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }
}
