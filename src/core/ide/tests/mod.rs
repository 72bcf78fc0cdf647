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

use std::path::PathBuf;

use tempfile::TempDir;

use super::*;
use crate::core::link::ScriptedLink;

mod commands;

/// Controller with one file-backed disk in slot 0
fn disk_controller(
    bytes: usize,
    synth_rdb: bool,
) -> (TempDir, PathBuf, IdeController<ScriptedLink>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("disk.img");
    let image: Vec<u8> = (0..bytes).map(|i| (i / CARD_SECTOR_SIZE) as u8).collect();
    std::fs::write(&path, image).unwrap();

    let mut controller = IdeController::new(ScriptedLink::new());
    let unit = Unit::file_backed(&path, synth_rdb, GeometryConvention::Amiga).unwrap();
    controller.attach(0, unit).unwrap();
    (dir, path, controller)
}

/// Task file addressing `lba` on drive 0 in LBA mode
fn lba_tf(command: u8, lba: u32, count: u8) -> TaskFile {
    let mut tf = TaskFile {
        command,
        sector_count: count,
        drive_head: 0x40,
        ..TaskFile::default()
    };
    tf.set_lba(lba);
    tf
}

/// Task file addressing C/H/S on drive 0
fn chs_tf(command: u8, cylinder: u16, head: u8, sector: u8, count: u8) -> TaskFile {
    TaskFile {
        command,
        sector_count: count,
        sector_number: sector,
        cylinder_low: cylinder as u8,
        cylinder_high: (cylinder >> 8) as u8,
        drive_head: head & 0x0F,
        ..TaskFile::default()
    }
}
