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

//! IDENTIFY DEVICE / IDENTIFY PACKET DEVICE response images
//!
//! 256 little-endian words; ASCII identification strings are stored
//! byte-swapped within each word per the ATA string convention.

use super::geometry::Geometry;
use super::MAX_MULTIPLE;

/// Length of the identify image in bytes
pub const IDENTIFY_SIZE: usize = 512;

/// Build the 512-byte IDENTIFY DEVICE image for a disk unit
pub fn identify_device(geometry: &Geometry, slot: usize, sectors_per_block: u8) -> [u8; IDENTIFY_SIZE] {
    let mut w = [0u16; 256];

    w[0] = 0x0040; // fixed device
    w[1] = geometry.cylinders;
    w[3] = geometry.heads as u16;
    w[6] = geometry.sectors as u16;

    put_string(&mut w[10..20], &serial(slot));
    put_string(&mut w[23..27], "1.0 ");
    put_string(&mut w[27..47], "VIDE VIRTUAL HARDDISK");

    w[47] = 0x8000 | MAX_MULTIPLE as u16; // READ/WRITE MULTIPLE capability
    w[49] = 1 << 9; // LBA supported
    w[53] = 0x0001; // words 54-58 valid
    w[54] = geometry.cylinders;
    w[55] = geometry.heads as u16;
    w[56] = geometry.sectors as u16;

    let total = geometry.total_sectors();
    w[57] = total as u16;
    w[58] = (total >> 16) as u16;
    if sectors_per_block > 0 {
        w[59] = 0x0100 | sectors_per_block as u16;
    }
    w[60] = total as u16;
    w[61] = (total >> 16) as u16;

    to_bytes(&w)
}

/// Build the 512-byte IDENTIFY PACKET DEVICE image for a CD unit
pub fn identify_packet_device(slot: usize) -> [u8; IDENTIFY_SIZE] {
    let mut w = [0u16; 256];

    // ATAPI, CD-ROM device type, removable, 12-byte packets
    w[0] = 0x8580;

    put_string(&mut w[10..20], &serial(slot));
    put_string(&mut w[23..27], "1.0 ");
    put_string(&mut w[27..47], "VIDE VIRTUAL CD-ROM");

    w[49] = 1 << 9; // LBA supported

    to_bytes(&w)
}

fn serial(slot: usize) -> String {
    format!("VIDE{:04}", slot)
}

/// Store an ASCII string into identify words, byte-swapped and
/// space-padded to the field width
fn put_string(field: &mut [u16], text: &str) {
    let bytes = text.as_bytes();
    for (i, word) in field.iter_mut().enumerate() {
        let hi = *bytes.get(i * 2).unwrap_or(&b' ');
        let lo = *bytes.get(i * 2 + 1).unwrap_or(&b' ');
        *word = ((hi as u16) << 8) | lo as u16;
    }
}

fn to_bytes(words: &[u16; 256]) -> [u8; IDENTIFY_SIZE] {
    let mut out = [0u8; IDENTIFY_SIZE];
    for (i, word) in words.iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&word.to_le_bytes());
    }
    out
}
