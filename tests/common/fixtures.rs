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

//! Test fixtures for common controller scenarios

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use vide::core::ide::{GeometryConvention, IdeController, Unit};
use vide::core::link::{ScriptedLink, TaskFile};

/// Write a disk image where every 512-byte sector is filled with its own
/// index, so reads identify exactly which sector they hit
#[allow(dead_code)]
pub fn patterned_disk_image(dir: &Path, sectors: usize) -> PathBuf {
    let mut data = Vec::with_capacity(sectors * 512);
    for sector in 0..sectors {
        data.extend(std::iter::repeat(sector as u8).take(512));
    }
    let path = dir.join("disk.img");
    std::fs::write(&path, data).expect("Failed to write disk image");
    path
}

/// Write a mixed-mode CUE/BIN pair: one raw data track at 00:00:00 and
/// one audio track at 00:00:20, 210 frames total, each frame filled with
/// its own index
#[allow(dead_code)]
pub fn mixed_mode_cue(dir: &Path) -> PathBuf {
    let cue = "\
FILE \"disc.bin\" BINARY
  TRACK 01 MODE1/2352
    INDEX 01 00:00:00
  TRACK 02 AUDIO
    INDEX 01 00:00:20
";
    std::fs::write(dir.join("disc.cue"), cue).expect("Failed to write cue");

    let mut bin = Vec::with_capacity(210 * 2352);
    for frame in 0..210usize {
        bin.extend(std::iter::repeat(frame as u8).take(2352));
    }
    std::fs::write(dir.join("disc.bin"), bin).expect("Failed to write bin");
    dir.join("disc.cue")
}

/// Controller with a patterned disk at slot 0 and a mixed-mode CD with
/// disc mounted at slot 2
#[allow(dead_code)]
pub fn full_controller(sectors: usize) -> (TempDir, IdeController<ScriptedLink>) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let image = patterned_disk_image(dir.path(), sectors);
    let cue = mixed_mode_cue(dir.path());

    let mut controller = IdeController::new(ScriptedLink::new());
    let unit = Unit::file_backed(&image, false, GeometryConvention::Amiga)
        .expect("Failed to mount disk image");
    controller.attach(0, unit).expect("Failed to attach disk");
    controller.attach(2, Unit::cdrom()).expect("Failed to attach CD");
    controller.insert_disc(2, &cue).expect("Failed to insert disc");
    (dir, controller)
}

/// LBA-mode task file for the drive-0 unit of either bus
#[allow(dead_code)]
pub fn lba_task_file(command: u8, lba: u32, count: u8) -> TaskFile {
    let mut tf = TaskFile {
        command,
        sector_count: count,
        drive_head: 0x40,
        ..TaskFile::default()
    };
    tf.set_lba(lba);
    tf
}

/// Queue a packet command plus its 12-byte packet on the second bus,
/// then serve it
#[allow(dead_code)]
pub fn run_cd_packet(controller: &mut IdeController<ScriptedLink>, packet: [u8; 12]) {
    let tf = TaskFile {
        command: 0xA0,
        ..TaskFile::default()
    };
    let link = controller.link_mut();
    link.push_command(1, tf);
    link.push_host_data(packet.to_vec());
    controller.poll();
}

/// Build a 12-byte packet from a prefix
#[allow(dead_code)]
pub fn packet(bytes: &[u8]) -> [u8; 12] {
    let mut p = [0u8; 12];
    p[..bytes.len()].copy_from_slice(bytes);
    p
}
