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

//! Data-path commands: READ(10/12), READ CD, READ TOC, capacity, subchannel

use super::*;
use crate::core::link::AtaStatus;

#[test]
fn test_read10_extracts_user_data() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, read10_pkt(5, 3));

    let data = link.drained();
    assert_eq!(data.len(), 3 * 2048);
    // Each fixture frame is filled with its own index
    assert!(data[..2048].iter().all(|&b| b == 5));
    assert!(data[2048..4096].iter().all(|&b| b == 6));
    assert!(data[4096..].iter().all(|&b| b == 7));
}

#[test]
fn test_read12_matches_read10() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, read10_pkt(7, 2));
    let via10 = link.drained();
    link.written.clear();

    let mut p = [0u8; 12];
    p[0] = 0xA8;
    p[2..6].copy_from_slice(&7u32.to_be_bytes());
    p[6..10].copy_from_slice(&2u32.to_be_bytes());
    run_packet(&mut link, &mut drive, p);

    assert_eq!(link.drained(), via10);
}

#[test]
fn read10_across_data_audio_boundary_completes() {
    // The fixture's data track runs through logical 20 where audio
    // begins; a span straddling that edge transfers every requested
    // sector instead of failing mid-command
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, read10_pkt(18, 4));

    assert!(!link.last_status().unwrap().contains(AtaStatus::ERR));
    let data = link.drained();
    assert_eq!(data.len(), 4 * 2048);
    assert!(data[..2048].iter().all(|&b| b == 18));
    assert!(data[3 * 2048..].iter().all(|&b| b == 21));
}

#[test]
fn test_read10_past_disc_end_is_illegal() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, read10_pkt(100_000, 1));

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.key, 0x05);
    assert_eq!(drive.sense.asc, 0x21);
}

#[test]
fn test_read12_wire_count_checked_before_buffering() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xA8;
    p[6..10].copy_from_slice(&0x00FF_FFFFu32.to_be_bytes());
    run_packet(&mut link, &mut drive, p);

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.key, 0x05);
    assert_eq!(drive.sense.asc, 0x21);
    assert!(link.written.is_empty());
}

#[test]
fn test_read_cd_wire_count_checked_before_buffering() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xBE;
    p[6..9].copy_from_slice(&[0xFF, 0xFF, 0xFF]); // 24-bit count
    p[9] = 0xF8;
    run_packet(&mut link, &mut drive, p);

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.asc, 0x21);
    assert!(link.written.is_empty());
}

#[test]
fn test_read_capacity() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, pkt(&[0x25]));

    let data = link.drained();
    assert_eq!(data.len(), 8);
    let last = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    let block = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    // 210 frames in the file minus the lead-in bias, minus one for
    // last-LBA semantics
    assert_eq!(last, 59);
    assert_eq!(block, 2048);
}

#[test]
fn test_read_toc_binary_format0() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, pkt(&[0x43, 0, 0, 0, 0, 0, 1, 0x03, 0xFF]));

    let data = link.drained();
    // Header + three tracks + lead-out
    assert_eq!(data.len(), 4 + 4 * 8);
    assert_eq!(data[2], 1); // first track
    assert_eq!(data[3], 3); // last track

    let entry = |i: usize| &data[4 + i * 8..4 + (i + 1) * 8];
    assert_eq!(entry(0)[1], 0x14); // data control nibble
    assert_eq!(entry(0)[2], 1);
    assert_eq!(u32::from_be_bytes(entry(0)[4..8].try_into().unwrap()), 0);
    assert_eq!(entry(1)[1], 0x10); // audio
    assert_eq!(u32::from_be_bytes(entry(1)[4..8].try_into().unwrap()), 20);
    assert_eq!(u32::from_be_bytes(entry(2)[4..8].try_into().unwrap()), 40);
    assert_eq!(entry(3)[2], 0xAA); // lead-out
    assert_eq!(u32::from_be_bytes(entry(3)[4..8].try_into().unwrap()), 60);
}

#[test]
fn test_read_toc_msf_format0() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(
        &mut link,
        &mut drive,
        pkt(&[0x43, 0x02, 0, 0, 0, 0, 1, 0x03, 0xFF]),
    );

    let data = link.drained();
    // Track 1 sits at absolute 00:02:00
    assert_eq!(&data[4 + 4..4 + 8], &[0, 0, 2, 0]);
    // Track 2 at logical 20 = absolute 00:02:20
    assert_eq!(&data[12 + 4..12 + 8], &[0, 0, 2, 20]);
}

#[test]
fn test_read_toc_session_format1() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, pkt(&[0x43, 0, 1, 0, 0, 0, 0, 0x00, 0x0C]));

    let data = link.drained();
    assert_eq!(data.len(), 12);
    assert_eq!(data[2], 1);
    assert_eq!(data[3], 1);
    assert_eq!(data[6], 1); // first track of the session
}

#[test]
fn test_read_toc_bad_format_is_illegal() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(&mut link, &mut drive, pkt(&[0x43, 0, 5, 0, 0, 0, 0, 0x00, 0xFF]));

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.asc, 0x24);
}

#[test]
fn test_read_cd_requires_user_data_bit() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xBE;
    p[8] = 1; // one sector
    p[9] = 0x00; // no fields at all
    run_packet(&mut link, &mut drive, p);

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.asc, 0x24);
}

#[test]
fn test_read_cd_rejects_partial_field_combos() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xBE;
    p[8] = 1;
    p[9] = 0x90; // sync + user without header/EDC
    run_packet(&mut link, &mut drive, p);

    assert!(link.last_status().unwrap().contains(AtaStatus::ERR));
    assert_eq!(drive.sense.asc, 0x24);
}

#[test]
fn test_read_cd_full_raw_from_raw_track() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xBE;
    p[5] = 3; // lba 3
    p[8] = 2; // two sectors
    p[9] = 0xF8; // sync + header + user + EDC/ECC
    run_packet(&mut link, &mut drive, p);

    let data = link.drained();
    assert_eq!(data.len(), 2 * 2352);
    assert!(data[..2352].iter().all(|&b| b == 3));
    assert!(data[2352..].iter().all(|&b| b == 4));
}

#[test]
fn test_read_cd_user_only() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xBE;
    p[5] = 9;
    p[8] = 1;
    p[9] = 0x10; // user data only
    run_packet(&mut link, &mut drive, p);

    let data = link.drained();
    assert_eq!(data.len(), 2048);
    assert!(data.iter().all(|&b| b == 9));
}

#[test]
fn test_read_cd_msf_span() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    let mut p = [0u8; 12];
    p[0] = 0xB9;
    // Absolute 00:02:10 .. 00:02:12 = logical 10..12
    p[3..6].copy_from_slice(&[0, 2, 10]);
    p[6..9].copy_from_slice(&[0, 2, 12]);
    p[9] = 0x10;
    run_packet(&mut link, &mut drive, p);

    let data = link.drained();
    assert_eq!(data.len(), 2 * 2048);
    assert!(data[..2048].iter().all(|&b| b == 10));
    assert!(data[2048..].iter().all(|&b| b == 11));
}

#[test]
fn test_subchannel_position_follows_playback() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    link.cdda_space = 5;

    // Play the second audio span and let five sectors stream
    let mut p = [0u8; 12];
    p[0] = 0x45;
    p[2..6].copy_from_slice(&20u32.to_be_bytes());
    p[7..9].copy_from_slice(&20u16.to_be_bytes());
    run_packet(&mut link, &mut drive, p);
    for _ in 0..5 {
        drive.tick_audio(&mut link);
    }

    run_packet(
        &mut link,
        &mut drive,
        pkt(&[0x42, 0, 0x40, 0x01, 0, 0, 0, 0x00, 0x10]),
    );
    let data = link.drained();
    assert_eq!(data.len(), 16);
    assert_eq!(data[1], 0x11); // audio status: playing
    let absolute = u32::from_be_bytes(data[8..12].try_into().unwrap());
    assert_eq!(absolute, 25);
}

#[test]
fn test_subchannel_mcn_stub() {
    let (_dir, mut drive) = mounted_drive();
    let mut link = ScriptedLink::new();
    run_packet(
        &mut link,
        &mut drive,
        pkt(&[0x42, 0, 0x40, 0x02, 0, 0, 0, 0x00, 0x20]),
    );

    let data = link.drained();
    assert_eq!(data.len(), 24);
    assert_eq!(data[1], 0x15); // no audio status to report
    assert_eq!(data[4], 0x02);
    // MCN valid bit clear, digits zeroed
    assert!(data[5..].iter().all(|&b| b == 0));
}
