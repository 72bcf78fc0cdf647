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

//! CHS geometry synthesis
//!
//! Guests address virtual disks through cylinder/head/sector geometry that
//! has to be fabricated from a raw byte size. Two host conventions exist:
//! Amiga-style setups probe large sectors-per-track values, PC BIOSes
//! expect the classic small ones. Derivation is deterministic: the first
//! candidate that fits the cylinder limit wins.

/// Geometry convention of the guest platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryConvention {
    /// Amiga-style candidates: 63, 127 or 255 sectors per track
    Amiga,
    /// PC-style candidates: 17 or 63 sectors per track
    Pc,
}

/// Synthesized cylinder/head/sector geometry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u16,
    pub heads: u8,
    pub sectors: u8,
}

impl Geometry {
    /// Total addressable sectors (cylinders x heads x sectors)
    pub fn total_sectors(&self) -> u32 {
        self.cylinders as u32 * self.heads as u32 * self.sectors as u32
    }
}

/// Sectors per track used by the synthesized-RDB factorization
pub const SYNTH_RDB_SECTORS: u32 = 32;

/// Derive CHS geometry from a raw byte size
///
/// Probes the convention's sectors-per-track candidates against head
/// counts 1..=16 and takes the first combination whose cylinder count
/// fits in 16 bits. Falls back to clamping the cylinder count when
/// nothing fits (drives past the addressable limit expose as much as
/// the geometry can reach).
pub fn compute_geometry(total_bytes: u64, convention: GeometryConvention) -> Geometry {
    let total = (total_bytes / 512) as u32;
    let candidates: &[u32] = match convention {
        GeometryConvention::Amiga => &[63, 127, 255],
        GeometryConvention::Pc => &[17, 63],
    };

    for &spt in candidates {
        for heads in 1..=16u32 {
            let cylinders = total / (spt * heads);
            if cylinders <= 0xFFFF {
                return Geometry {
                    cylinders: cylinders as u16,
                    heads: heads as u8,
                    sectors: spt as u8,
                };
            }
        }
    }

    // Largest geometry the convention can express
    let spt = *candidates.last().unwrap_or(&63);
    Geometry {
        cylinders: 0xFFFF,
        heads: 16,
        sectors: spt as u8,
    }
}

/// Derive geometry for a file-backed unit with a synthesized RDB
///
/// Searches head counts 1..=16 for an exact factorization of the file's
/// sector count at 32 sectors per track, then reserves one fabricated
/// cylinder in front of the image for the RigidDiskBlock pair. Returns
/// the geometry and the (negative) LBA offset hiding the fabricated
/// cylinder; falls back to the shared heuristic (no reserved cylinder)
/// when no factorization exists.
pub fn compute_synth_rdb_geometry(total_bytes: u64) -> (Geometry, i64) {
    let total = (total_bytes / 512) as u32;

    for heads in 1..=16u32 {
        let track = SYNTH_RDB_SECTORS * heads;
        if total % track == 0 {
            let cylinders = total / track + 1;
            if cylinders <= 0xFFFF {
                let geometry = Geometry {
                    cylinders: cylinders as u16,
                    heads: heads as u8,
                    sectors: SYNTH_RDB_SECTORS as u8,
                };
                // The fabricated cylinder sits in front of the image
                return (geometry, -(track as i64));
            }
        }
    }

    log::debug!(
        "synth-RDB factorization failed for {} sectors, using heuristic geometry",
        total
    );
    (compute_geometry(total_bytes, GeometryConvention::Amiga), 0)
}
