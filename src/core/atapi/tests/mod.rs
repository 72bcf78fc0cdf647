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

use tempfile::TempDir;

use super::*;
use crate::core::link::ScriptedLink;

mod reads;

/// Mixed-mode fixture: one raw data track and two audio tracks
///
/// The backing file holds 210 raw sectors, each filled with its own frame
/// index, so any read identifies exactly which frame it came from.
const FIXTURE_CUE: &str = r#"
FILE "disc.bin" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 01 00:00:20
  TRACK 03 AUDIO
    INDEX 01 00:00:40
"#;

const FIXTURE_FRAMES: usize = 210;

fn mounted_drive() -> (TempDir, AtapiDrive) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("disc.cue"), FIXTURE_CUE).unwrap();

    let mut bin = Vec::with_capacity(FIXTURE_FRAMES * 2352);
    for frame in 0..FIXTURE_FRAMES {
        bin.extend(std::iter::repeat(frame as u8).take(2352));
    }
    std::fs::write(dir.path().join("disc.bin"), bin).unwrap();

    let mut drive = AtapiDrive::new();
    drive.insert(&dir.path().join("disc.cue")).unwrap();
    assert!(drive.toc.valid);
    (dir, drive)
}

/// Run one packet command through the full PACKET entry path
fn run_packet(link: &mut ScriptedLink, drive: &mut AtapiDrive, pkt: [u8; 12]) {
    run_packet_with_limit(link, drive, pkt, 0)
}

/// Same, with a host byte-count limit loaded in the cylinder registers
fn run_packet_with_limit(
    link: &mut ScriptedLink,
    drive: &mut AtapiDrive,
    pkt: [u8; 12],
    byte_limit: usize,
) {
    let mut tf = TaskFile {
        command: 0xA0,
        ..TaskFile::default()
    };
    tf.set_byte_count(byte_limit);
    link.push_host_data(pkt.to_vec());
    process_packet(link, drive, tf);
}

fn pkt(bytes: &[u8]) -> [u8; 12] {
    let mut p = [0u8; 12];
    p[..bytes.len()].copy_from_slice(bytes);
    p
}

/// READ(10) packet for a logical LBA span
fn read10_pkt(lba: u32, count: u16) -> [u8; 12] {
    let mut p = [0u8; 12];
    p[0] = 0x28;
    p[2..6].copy_from_slice(&lba.to_be_bytes());
    p[7..9].copy_from_slice(&count.to_be_bytes());
    p
}

fn last_error(link: &ScriptedLink) -> u8 {
    link.last_task_file().unwrap().error
}
