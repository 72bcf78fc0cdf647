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

//! Fabricated Amiga RigidDiskBlock / PartitionBlock pair
//!
//! Plain file images carry no partition table, so units configured with
//! the synth-RDB flag reserve one fabricated cylinder in front of the
//! image and answer reads into it with a minimal RDSK block (block 0) and
//! one PART block (block 1). The additive 32-bit checksum is computed over
//! big-endian words with the checksum field zeroed, and the negated sum is
//! stored, so the guest's disk-validation logic sums the block to zero.

use super::geometry::Geometry;

/// Bytes per fabricated block
pub const BLOCK_SIZE: usize = 512;

const RDSK_ID: &[u8; 4] = b"RDSK";
const PART_ID: &[u8; 4] = b"PART";

/// Longwords covered by the checksum (SummedLongs)
const SUMMED_LONGS: u32 = 64;

/// Fabricate one block of the synthesized RDB area
///
/// Block 0 is the RigidDiskBlock, block 1 the PartitionBlock; any other
/// block in the reserved cylinder reads as zeros.
pub fn fake_block(geometry: &Geometry, block: u32, out: &mut [u8; BLOCK_SIZE]) {
    out.fill(0);
    match block {
        0 => fill_rdsk(geometry, out),
        1 => fill_part(geometry, out),
        _ => return,
    }
    fill_checksum(out);
}

fn fill_rdsk(geometry: &Geometry, out: &mut [u8; BLOCK_SIZE]) {
    out[0..4].copy_from_slice(RDSK_ID);
    put32(out, 0x04, SUMMED_LONGS);
    put32(out, 0x0C, 7); // host id
    put32(out, 0x10, BLOCK_SIZE as u32);
    put32(out, 0x14, 0x12); // flags: no disk id, no LUNs beyond this one
    put32(out, 0x18, 0xFFFF_FFFF); // bad block list: none
    put32(out, 0x1C, 1); // partition list at block 1
    put32(out, 0x20, 0xFFFF_FFFF); // filesys header list: none
    put32(out, 0x24, 0xFFFF_FFFF); // drive init: none
    for i in 0..6 {
        put32(out, 0x28 + i * 4, 0xFFFF_FFFF);
    }
    put32(out, 0x40, geometry.cylinders as u32);
    put32(out, 0x44, geometry.sectors as u32);
    put32(out, 0x48, geometry.heads as u32);
    put32(out, 0x4C, 1); // interleave
    put32(out, 0x50, geometry.cylinders as u32); // park cylinder
    put32(out, 0x60, geometry.cylinders as u32 + 1); // write precomp
    put32(out, 0x64, geometry.cylinders as u32 + 1); // reduced write
    put32(out, 0x68, 3); // step rate
    put32(out, 0x80, 0); // rdb area low block
    put32(out, 0x84, 1); // rdb area high block
    put32(out, 0x88, 1); // low cylinder (block 0 of the image)
    put32(out, 0x8C, geometry.cylinders as u32 - 1); // high cylinder
    put32(out, 0x90, geometry.heads as u32 * geometry.sectors as u32); // blocks per cylinder
    put32(out, 0x98, 1); // highest rdsk block
    out[0xA0..0xA8].copy_from_slice(b"VIDE    "); // disk vendor
    out[0xA8..0xB8].copy_from_slice(b"VIRTUAL HARDDISK"); // disk product
    out[0xB8..0xBC].copy_from_slice(b"1.0 "); // disk revision
}

fn fill_part(geometry: &Geometry, out: &mut [u8; BLOCK_SIZE]) {
    out[0..4].copy_from_slice(PART_ID);
    put32(out, 0x04, SUMMED_LONGS);
    put32(out, 0x0C, 7); // host id
    put32(out, 0x10, 0xFFFF_FFFF); // next partition: none
    put32(out, 0x14, 1); // flags: bootable
    // BCPL drive name: length byte + characters
    out[0x24] = 4;
    out[0x25..0x29].copy_from_slice(b"VDH0");

    // DosEnvVec
    put32(out, 0x80, 16); // table size
    put32(out, 0x84, BLOCK_SIZE as u32 / 4); // longwords per block
    put32(out, 0x88, 0); // sector origin
    put32(out, 0x8C, geometry.heads as u32); // surfaces
    put32(out, 0x90, 1); // sectors per block
    put32(out, 0x94, geometry.sectors as u32); // blocks per track
    put32(out, 0x98, 2); // reserved blocks
    put32(out, 0x9C, 0); // prealloc
    put32(out, 0xA0, 0); // interleave
    put32(out, 0xA4, 1); // low cylinder
    put32(out, 0xA8, geometry.cylinders as u32 - 1); // high cylinder
    put32(out, 0xAC, 30); // buffers
    put32(out, 0xB0, 0); // buffer memory type
    put32(out, 0xB4, 0x00FF_FFFF); // max transfer
    put32(out, 0xB8, 0x7FFF_FFFE); // address mask
    put32(out, 0xBC, 0); // boot priority
    put32(out, 0xC0, 0x444F_5303); // dostype DOS\3
}

/// Additive checksum over the summed longwords
///
/// The sum of all big-endian words with the stored checksum included must
/// come out to zero; this round-trips against real disk-validation logic
/// on the guest OS, so the byte-order handling must stay exactly as-is.
fn fill_checksum(out: &mut [u8; BLOCK_SIZE]) {
    put32(out, 0x08, 0);
    let mut sum: u32 = 0;
    for i in 0..SUMMED_LONGS as usize {
        sum = sum.wrapping_add(get32(out, i * 4));
    }
    put32(out, 0x08, sum.wrapping_neg());
}

#[inline]
fn put32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

#[inline]
pub(super) fn get32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}
