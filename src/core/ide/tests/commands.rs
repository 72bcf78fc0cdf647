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

//! Non-data command dispatch: identify, set multiple, reset, aborts

use super::*;
use crate::core::link::AtaStatus;

#[test]
fn test_unknown_command_aborts() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    c.link_mut().push_command(0, lba_tf(0xF7, 0, 1));
    c.poll();

    let link = c.into_link();
    assert_eq!(
        link.last_status(),
        Some(AtaStatus::ERR | AtaStatus::END | AtaStatus::IRQ)
    );
    assert_eq!(link.last_task_file().unwrap().error, 0x04);
}

#[test]
fn test_command_for_empty_slot_aborts() {
    let mut c = IdeController::new(ScriptedLink::new());
    // Drive-select bit picks slot 1, which holds nothing
    let mut tf = lba_tf(0xEC, 0, 0);
    tf.drive_head |= 0x10;
    c.link_mut().push_command(0, tf);
    c.poll();

    let link = c.into_link();
    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
}

#[test]
fn test_diagnostic_reports_pass() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    c.link_mut().push_command(0, lba_tf(0x90, 0, 0));
    c.poll();

    let link = c.into_link();
    assert_eq!(link.last_task_file().unwrap().error, 0x01);
    assert_eq!(link.last_status(), Some(AtaStatus::END | AtaStatus::IRQ));
}

#[test]
fn test_identify_device_geometry_words() {
    let (_dir, _path, mut c) = disk_controller(512 * 63 * 16 * 4, false);
    let geometry = c.unit(0).unwrap().geometry;
    c.link_mut().push_command(0, lba_tf(0xEC, 0, 0));
    c.poll();

    let link = c.into_link();
    let data = link.drained();
    assert_eq!(data.len(), identify::IDENTIFY_SIZE);

    let word = |i: usize| u16::from_le_bytes([data[i * 2], data[i * 2 + 1]]);
    assert_eq!(word(1), geometry.cylinders);
    assert_eq!(word(3), geometry.heads as u16);
    assert_eq!(word(6), geometry.sectors as u16);

    // Words 60-61 must equal the C*H*S product exactly
    let total = (word(60) as u32) | ((word(61) as u32) << 16);
    assert_eq!(total, geometry.total_sectors());

    assert!(link.last_status().unwrap().contains(AtaStatus::END));
    assert!(link.transfers_balanced());
}

#[test]
fn test_identify_on_cd_slot_aborts_with_signature() {
    let mut c = IdeController::new(ScriptedLink::new());
    c.attach(0, Unit::cdrom()).unwrap();
    c.link_mut().push_command(0, lba_tf(0xEC, 0, 0));
    c.poll();

    let link = c.into_link();
    let tf = link.last_task_file().unwrap();
    assert_eq!(tf.cylinder_low, 0x14);
    assert_eq!(tf.cylinder_high, 0xEB);
    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
}

#[test]
fn test_identify_packet_on_disk_slot_aborts() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    c.link_mut().push_command(0, lba_tf(0xA1, 0, 0));
    c.poll();

    let link = c.into_link();
    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    // No signature on a plain disk
    assert_ne!(link.last_task_file().unwrap().cylinder_high, 0xEB);
}

#[test]
fn test_identify_packet_device_type() {
    let mut c = IdeController::new(ScriptedLink::new());
    c.attach(0, Unit::cdrom()).unwrap();
    c.link_mut().push_command(0, lba_tf(0xA1, 0, 0));
    c.poll();

    let link = c.into_link();
    let data = link.drained();
    let word0 = u16::from_le_bytes([data[0], data[1]]);
    assert_eq!(word0, 0x8580);
}

#[test]
fn test_set_multiple_accepts_powers_of_two() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    for count in [1u8, 2, 4, 8, 16] {
        c.link_mut().push_command(0, lba_tf(0xC6, 0, count));
        c.poll();
        assert_eq!(c.unit(0).unwrap().sectors_per_block, count);
        assert!(!c
            .link_mut()
            .last_status()
            .unwrap()
            .contains(AtaStatus::ERR));
    }
}

#[test]
fn test_set_multiple_rejects_bad_counts() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    for count in [3u8, 5, 17, 32, 255] {
        c.link_mut().push_command(0, lba_tf(0xC6, 0, count));
        c.poll();
        assert_eq!(c.unit(0).unwrap().sectors_per_block, 0);
        assert!(c
            .link_mut()
            .last_status()
            .unwrap()
            .contains(AtaStatus::ERR));
    }
}

#[test]
fn test_device_reset_clears_multiple_and_signs_cd() {
    let mut c = IdeController::new(ScriptedLink::new());
    c.attach(0, Unit::cdrom()).unwrap();
    c.link_mut().push_command(0, lba_tf(0x08, 0, 0));
    c.poll();

    let link = c.into_link();
    let tf = link.last_task_file().unwrap();
    assert_eq!(tf.cylinder_low, 0x14);
    assert_eq!(tf.cylinder_high, 0xEB);
    assert_eq!(tf.error, 0x01);
}

#[test]
fn test_init_device_parameters_translates_geometry() {
    let (_dir, _path, mut c) = disk_controller(512 * 63 * 16 * 8, false);
    // 8 heads (register holds heads-1), 32 sectors per track
    let mut tf = chs_tf(0x91, 0, 0, 0, 32);
    tf.drive_head = 0x07;
    c.link_mut().push_command(0, tf);
    c.poll();

    let g = c.unit(0).unwrap().geometry;
    assert_eq!(g.heads, 8);
    assert_eq!(g.sectors, 32);
    assert_eq!(g.cylinders as u32, 63 * 16 * 8 / (8 * 32));
}

#[test]
fn test_recalibrate_rewinds_position() {
    let (_dir, _path, mut c) = disk_controller(512 * 64, false);
    c.link_mut().push_command(0, chs_tf(0x10, 5, 2, 9, 0));
    c.poll();

    let link = c.into_link();
    let tf = link.last_task_file().unwrap();
    assert_eq!(tf.cylinder_low, 0);
    assert_eq!(tf.cylinder_high, 0);
    assert_eq!(tf.sector_number, 1);
    assert!(link.last_status().unwrap().contains(AtaStatus::END));
}
