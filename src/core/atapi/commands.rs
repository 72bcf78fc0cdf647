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

//! SCSI-MMC command handlers
//!
//! Addressing note: hosts use logical LBAs starting at 0; track start/end
//! fields carry the CD lead-in bias from the CUE arithmetic, and the first
//! track's byte offset absorbs it, so file offsets computed from logical
//! LBAs are exact. Absolute MSF values on the wire always include the
//! 150-frame lead-in.

use crate::core::disc::{lba_to_msf, msf_to_lba, Toc, Track, TrackType, LEADIN_FRAMES};
use crate::core::link::{try_for, AtaStatus, BusStatus, IdeLink, TaskFile};

use super::{send_error, send_ok, write_packet, AtapiDrive, Sense, PACKET_TIMEOUT};

/// Extracted user data per sector
const USER_SECTOR: usize = 2048;

/// Raw sector size
const RAW_SECTOR: usize = 2352;

type CmdData = Result<Vec<u8>, Sense>;

/// Decode and serve one 12-byte command packet
pub(super) fn dispatch<L: IdeLink>(
    link: &mut L,
    drive: &mut AtapiDrive,
    tf: TaskFile,
    pkt: &[u8; 12],
) {
    let op = pkt[0];
    log::debug!("atapi: opcode {:#04X}", op);

    // Without a mounted disc only the discovery/parameter commands run;
    // everything touching the medium reports Not-Ready first
    if !drive.toc.valid && !allowed_without_disc(op) {
        drive.audio.stop();
        send_error(link, drive, tf, Sense::NO_MEDIUM);
        return;
    }

    match op {
        0x00 => send_ok(link, tf), // TEST UNIT READY
        0x03 => {
            let data = request_sense(drive, pkt);
            write_packet(link, drive, tf, &data);
        }
        0x12 => respond(link, drive, tf, inquiry(pkt)),
        0x15 | 0x55 => mode_select(link, drive, tf, pkt),
        0x1A => respond(link, drive, tf, mode_sense(drive, pkt, false)),
        0x5A => respond(link, drive, tf, mode_sense(drive, pkt, true)),
        0x1B => {
            let result = start_stop_unit(drive, pkt);
            finish(link, drive, tf, result)
        }
        0x25 => respond(link, drive, tf, read_capacity(drive)),
        0x28 => {
            let lba = be32(&pkt[2..6]);
            let count = be16(&pkt[7..9]);
            let result = read_user(drive, lba, count);
            respond(link, drive, tf, result)
        }
        0xA8 => {
            let lba = be32(&pkt[2..6]);
            let count = be32(&pkt[6..10]);
            let result = read_user(drive, lba, count);
            respond(link, drive, tf, result)
        }
        0x42 => respond(link, drive, tf, read_subchannel(drive, pkt)),
        0x43 => respond(link, drive, tf, read_toc(drive, pkt)),
        0x45 => {
            let result = play_audio10(drive, pkt);
            finish(link, drive, tf, result)
        }
        0x47 => {
            let result = play_audio_msf(drive, pkt);
            finish(link, drive, tf, result)
        }
        0x48 => {
            let result = play_track_index(drive, pkt);
            finish(link, drive, tf, result)
        }
        0x4B => {
            let resume = pkt[8] & 0x01 != 0;
            let result = drive.audio.pause_resume(resume);
            finish(link, drive, tf, result)
        }
        0x4E => {
            drive.audio.stop();
            send_ok(link, tf);
        }
        0xB9 => finish_read_cd_msf(link, drive, tf, pkt),
        0xBE => finish_read_cd(link, drive, tf, pkt),
        other => {
            log::warn!("atapi: unsupported opcode {:#04X}", other);
            send_error(link, drive, tf, Sense::illegal(0x20));
        }
    }
}

/// Commands allowed to run with no disc mounted
fn allowed_without_disc(op: u8) -> bool {
    matches!(op, 0x03 | 0x12 | 0x15 | 0x55 | 0x1A | 0x5A | 0x1B)
}

fn respond<L: IdeLink>(link: &mut L, drive: &mut AtapiDrive, tf: TaskFile, result: CmdData) {
    match result {
        Ok(data) => write_packet(link, drive, tf, &data),
        Err(sense) => send_error(link, drive, tf, sense),
    }
}

fn finish<L: IdeLink>(
    link: &mut L,
    drive: &mut AtapiDrive,
    tf: TaskFile,
    result: Result<(), Sense>,
) {
    match result {
        Ok(()) => send_ok(link, tf),
        Err(sense) => send_error(link, drive, tf, sense),
    }
}

fn be16(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 8) | bytes[1] as u32
}

fn be32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32) << 24) | ((bytes[1] as u32) << 16) | ((bytes[2] as u32) << 8) | bytes[3] as u32
}

fn put_be32(buf: &mut [u8], value: u32) {
    buf[..4].copy_from_slice(&value.to_be_bytes());
}

/// Absolute-MSF wire value to a logical LBA
fn msf_to_logical(m: u8, s: u8, f: u8) -> u32 {
    msf_to_lba(m, s, f).saturating_sub(LEADIN_FRAMES)
}

/// REQUEST SENSE: 18-byte fixed descriptor, then the triple is cleared
fn request_sense(drive: &mut AtapiDrive, pkt: &[u8; 12]) -> Vec<u8> {
    let alloc = pkt[4] as usize;
    let mut data = vec![0u8; 18];
    data[0] = 0x70; // current error, fixed format
    data[2] = drive.sense.key;
    data[7] = 10; // additional length
    data[12] = drive.sense.asc;
    data[13] = drive.sense.ascq;
    drive.sense = Sense::NONE;
    data.truncate(alloc.min(18));
    data
}

/// INQUIRY: standard 36-byte CD-ROM descriptor
fn inquiry(pkt: &[u8; 12]) -> CmdData {
    let alloc = pkt[4] as usize;
    let mut data = vec![0u8; 36];
    data[0] = 0x05; // CD-ROM device
    data[1] = 0x80; // removable
    data[2] = 0x00;
    data[3] = 0x21; // ATAPI-2, response format 1
    data[4] = 31; // additional length
    data[8..16].copy_from_slice(b"VIDE    ");
    data[16..32].copy_from_slice(b"VIRTUAL CD-ROM  ");
    data[32..36].copy_from_slice(b"1.0 ");
    data.truncate(alloc.min(36));
    Ok(data)
}

/// Mode page body (code + length prefix included)
fn mode_page(page: u8) -> Option<Vec<u8>> {
    match page {
        // Read error recovery
        0x01 => Some(vec![0x01, 0x06, 0, 0, 0, 0, 0, 0]),
        // CD audio control: one output port per channel, full volume
        0x0E => Some(vec![
            0x0E, 0x0E, 0x04, 0, 0, 0, 0, 0, 0x01, 0xFF, 0x02, 0xFF, 0, 0, 0, 0,
        ]),
        // Capabilities and mechanical status
        0x2A => {
            let mut page = vec![0u8; 20];
            page[0] = 0x2A;
            page[1] = 18;
            page[4] = 0x01; // audio play
            page[6] = 0x29; // tray loader, eject, lock
            page[8..10].copy_from_slice(&706u16.to_be_bytes()); // max speed, kB/s
            page[10..12].copy_from_slice(&256u16.to_be_bytes()); // volume levels
            page[14..16].copy_from_slice(&706u16.to_be_bytes()); // current speed
            Some(page)
        }
        _ => None,
    }
}

/// MODE SENSE(6)/(10): header plus the requested page(s)
fn mode_sense(drive: &AtapiDrive, pkt: &[u8; 12], ten: bool) -> CmdData {
    let page = pkt[2] & 0x3F;
    let alloc = if ten { be16(&pkt[7..9]) } else { pkt[4] as u32 } as usize;

    let mut body = Vec::new();
    if page == 0x3F {
        for p in [0x01u8, 0x0E, 0x2A] {
            body.extend(mode_page(p).unwrap_or_default());
        }
    } else {
        match mode_page(page) {
            Some(p) => body.extend(p),
            None => return Err(Sense::illegal(0x24)),
        }
    }

    let medium = if drive.toc.valid { 0x01 } else { 0x70 };
    let mut data = Vec::with_capacity(body.len() + 8);
    if ten {
        let total = body.len() as u16 + 6;
        data.extend_from_slice(&total.to_be_bytes());
        data.extend_from_slice(&[medium, 0, 0, 0, 0, 0]);
    } else {
        data.push(body.len() as u8 + 3);
        data.extend_from_slice(&[medium, 0, 0]);
    }
    data.extend(body);
    data.truncate(alloc.min(data.len()));
    Ok(data)
}

/// MODE SELECT(6)/(10): accept and discard the parameter list
///
/// No page the host can set changes behavior here, but the data-out phase
/// still has to be drained for the transaction to complete.
fn mode_select<L: IdeLink>(link: &mut L, drive: &mut AtapiDrive, tf: TaskFile, pkt: &[u8; 12]) {
    let len = if pkt[0] == 0x55 {
        be16(&pkt[7..9]) as usize
    } else {
        pkt[4] as usize
    };
    if len == 0 {
        send_ok(link, tf);
        return;
    }

    link.write_status(AtaStatus::PKT | AtaStatus::REQ);
    if try_for(PACKET_TIMEOUT, || {
        link.read_bus_status().contains(BusStatus::DATA_FULL)
    })
    .is_err()
    {
        send_error(link, drive, tf, Sense::NOT_READY);
        return;
    }
    let mut scratch = vec![0u8; len];
    link.begin_transfer();
    link.stream_read(&mut scratch);
    link.end_transfer();
    send_ok(link, tf);
}

/// START STOP UNIT: stop ends playback; eject invalidates the TOC
fn start_stop_unit(drive: &mut AtapiDrive, pkt: &[u8; 12]) -> Result<(), Sense> {
    let start = pkt[4] & 0x01 != 0;
    let eject = pkt[4] & 0x02 != 0;
    drive.audio.stop();
    if eject && !start {
        drive.toc.invalidate();
    }
    Ok(())
}

/// READ CAPACITY: last logical LBA + 2048-byte block length
fn read_capacity(drive: &AtapiDrive) -> CmdData {
    let bias = drive.toc.lead_in_bias();
    let last = (drive.toc.end - bias).saturating_sub(1);
    let mut data = vec![0u8; 8];
    put_be32(&mut data[0..4], last);
    put_be32(&mut data[4..8], USER_SECTOR as u32);
    Ok(data)
}

/// Validate a whole read span against the track table
///
/// The count comes straight off the wire (16, 24 or 32 bits wide) and
/// must be checked before any response buffer is sized from it. Rejects
/// exactly the spans the per-sector track lookup would reject.
fn check_span(toc: &Toc, lba: u32, count: u32) -> Result<(), Sense> {
    if count > 0 && lba as u64 + count as u64 > toc.end as u64 {
        return Err(Sense::illegal(0x21));
    }
    Ok(())
}

/// Track for a logical LBA, rejecting the out-of-range sentinel
fn track_at(toc: &Toc, lba: u32) -> Result<Track, Sense> {
    let index = toc.track_for_lba(lba);
    match toc.track(index) {
        Some(track) => Ok(*track),
        None => Err(Sense::illegal(0x21)), // LBA out of range
    }
}

/// READ(10)/(12): extract 2048 user bytes per sector
///
/// Cooked 2048-byte sources read straight through; raw 2352-byte sectors
/// skip the 16-byte sync/header (24 for Mode-2/XA); 2336-byte Mode-2
/// sources skip the 8-byte subheader. Sector shaping follows the stored
/// size of whichever track the LBA lands in, so a transfer running off a
/// data track into a neighboring audio track completes with the audio
/// sectors shaped the same way rather than failing mid-command.
fn read_user(drive: &mut AtapiDrive, lba: u32, count: u32) -> CmdData {
    check_span(&drive.toc, lba, count)?;
    let mut data = Vec::with_capacity(count as usize * USER_SECTOR);
    for i in 0..count {
        let cur = lba + i;
        let track = track_at(&drive.toc, cur)?;
        let offset = drive.toc.byte_offset(&track, cur);

        let (skip, span) = match track.sector_size {
            2048 => (0usize, 2048usize),
            2336 => (8, 2336),
            _ => {
                if track.track_type == TrackType::DataMode2 {
                    (24, RAW_SECTOR)
                } else {
                    (16, RAW_SECTOR)
                }
            }
        };

        let mut raw = [0u8; RAW_SECTOR];
        drive
            .toc
            .read_raw(offset, &mut raw[..span])
            .map_err(|_| Sense::medium_error(0x11))?;
        data.extend_from_slice(&raw[skip..skip + USER_SECTOR]);
    }
    Ok(data)
}

/// Raw 2352-byte reads for READ CD
///
/// Cooked sources are re-expanded with the user data at its raw position;
/// the sync/header and EDC/ECC generators are deliberate no-ops, so such
/// sectors are not bit-exact raw images.
fn read_raw_sectors(drive: &mut AtapiDrive, lba: u32, count: u32) -> CmdData {
    check_span(&drive.toc, lba, count)?;
    let mut data = Vec::with_capacity(count as usize * RAW_SECTOR);
    for i in 0..count {
        let cur = lba + i;
        let track = track_at(&drive.toc, cur)?;
        let offset = drive.toc.byte_offset(&track, cur);

        let mut sector = [0u8; RAW_SECTOR];
        match track.sector_size {
            2352 => drive
                .toc
                .read_raw(offset, &mut sector)
                .map_err(|_| Sense::medium_error(0x11))?,
            2336 => {
                drive
                    .toc
                    .read_raw(offset, &mut sector[16..])
                    .map_err(|_| Sense::medium_error(0x11))?;
                synthesize_header(&mut sector, cur);
            }
            _ => {
                drive
                    .toc
                    .read_raw(offset, &mut sector[16..16 + USER_SECTOR])
                    .map_err(|_| Sense::medium_error(0x11))?;
                synthesize_header(&mut sector, cur);
                synthesize_edc_ecc(&mut sector);
            }
        }
        data.extend_from_slice(&sector);
    }
    Ok(data)
}

/// Sync/header generator for re-expanded raw sectors (intentional no-op)
fn synthesize_header(_sector: &mut [u8; RAW_SECTOR], _lba: u32) {}

/// EDC/ECC generator for re-expanded raw sectors (intentional no-op)
fn synthesize_edc_ecc(_sector: &mut [u8; RAW_SECTOR]) {}

/// READ CD field validation and dispatch
///
/// The user-data bit must be set; sync, header and EDC/ECC bits are
/// all-or-nothing. All set means full raw sectors, none means plain user
/// data; any other combination is rejected.
fn finish_read_cd<L: IdeLink>(link: &mut L, drive: &mut AtapiDrive, tf: TaskFile, pkt: &[u8; 12]) {
    let lba = be32(&pkt[2..6]);
    let count = ((pkt[6] as u32) << 16) | ((pkt[7] as u32) << 8) | pkt[8] as u32;
    let flags = pkt[9];
    let result = read_cd_common(drive, lba, count, flags);
    respond(link, drive, tf, result)
}

/// READ CD MSF: absolute MSF range converted to a logical span
fn finish_read_cd_msf<L: IdeLink>(
    link: &mut L,
    drive: &mut AtapiDrive,
    tf: TaskFile,
    pkt: &[u8; 12],
) {
    let start = msf_to_logical(pkt[3], pkt[4], pkt[5]);
    let end = msf_to_logical(pkt[6], pkt[7], pkt[8]);
    if end < start {
        send_error(link, drive, tf, Sense::illegal(0x24));
        return;
    }
    let flags = pkt[9];
    let result = read_cd_common(drive, start, end - start, flags);
    respond(link, drive, tf, result)
}

fn read_cd_common(drive: &mut AtapiDrive, lba: u32, count: u32, flags: u8) -> CmdData {
    let user = flags & 0x10 != 0;
    let extras = flags & 0xE8; // sync + header bits + EDC/ECC
    if !user || (extras != 0 && extras != 0xE8) {
        return Err(Sense::illegal(0x24));
    }
    if extras == 0xE8 {
        read_raw_sectors(drive, lba, count)
    } else {
        read_user(drive, lba, count)
    }
}

/// Control/ADR byte of a track descriptor
fn control_byte(track: &Track) -> u8 {
    if track.track_type.is_data() {
        0x14
    } else {
        0x10
    }
}

/// Track address in the requested encoding
fn put_address(buf: &mut [u8], logical: u32, msf: bool) {
    if msf {
        let (m, s, f) = lba_to_msf(logical + LEADIN_FRAMES);
        buf[0] = 0;
        buf[1] = m;
        buf[2] = s;
        buf[3] = f;
    } else {
        put_be32(buf, logical);
    }
}

/// READ TOC formats 0 (track descriptors + lead-out) and 1 (session)
fn read_toc(drive: &AtapiDrive, pkt: &[u8; 12]) -> CmdData {
    let msf = pkt[1] & 0x02 != 0;
    let mut format = pkt[2] & 0x0F;
    if format == 0 {
        // Old-style format selector in the control byte
        format = pkt[9] >> 6;
    }
    let start_track = pkt[6];
    let alloc = be16(&pkt[7..9]) as usize;
    let toc = &drive.toc;
    let bias = toc.lead_in_bias();

    let mut data = match format {
        0 => {
            let first = start_track.max(1) as usize;
            if first > toc.last && start_track != 0xAA {
                return Err(Sense::illegal(0x24));
            }
            let mut out = vec![0u8; 4];
            out[2] = 1;
            out[3] = toc.last as u8;

            if start_track != 0xAA {
                for index in (first - 1)..toc.last {
                    let track = toc.track(index).ok_or(Sense::illegal(0x24))?;
                    let mut desc = [0u8; 8];
                    desc[1] = control_byte(track);
                    desc[2] = track.number;
                    put_address(&mut desc[4..8], track.start - bias, msf);
                    out.extend_from_slice(&desc);
                }
            }

            // Lead-out descriptor, track number 0xAA
            let mut desc = [0u8; 8];
            desc[1] = 0x14;
            desc[2] = 0xAA;
            put_address(&mut desc[4..8], toc.end - bias, msf);
            out.extend_from_slice(&desc);

            let len = (out.len() - 2) as u16;
            out[0..2].copy_from_slice(&len.to_be_bytes());
            out
        }
        1 => {
            // Single-session summary: first track of the only session
            let track = toc.track(0).ok_or(Sense::illegal(0x24))?;
            let mut out = vec![0u8; 12];
            out[1] = 10;
            out[2] = 1; // first session
            out[3] = 1; // last session
            out[5] = control_byte(track);
            out[6] = track.number;
            put_address(&mut out[8..12], track.start - bias, msf);
            out
        }
        _ => return Err(Sense::illegal(0x24)),
    };

    data.truncate(alloc.min(data.len()));
    Ok(data)
}

/// READ SUBCHANNEL: sub-function 1 reports the play position; 2 (MCN) and
/// 3 (ISRC) are fixed-size zeroed responses
fn read_subchannel(drive: &AtapiDrive, pkt: &[u8; 12]) -> CmdData {
    let msf = pkt[1] & 0x02 != 0;
    let want_data = pkt[2] & 0x40 != 0;
    let sub_fn = pkt[3];
    let alloc = be16(&pkt[7..9]) as usize;
    let toc = &drive.toc;
    let bias = toc.lead_in_bias();

    let mut data = vec![0u8; 4];
    data[1] = drive.audio.status_byte();

    if want_data {
        match sub_fn {
            1 => {
                let cur = drive.audio.position();
                let index = toc.track_for_lba(cur).min(toc.last.saturating_sub(1));
                let track = toc.track(index).ok_or(Sense::NO_MEDIUM)?;

                let mut body = [0u8; 12];
                body[0] = 0x01;
                body[1] = control_byte(track);
                body[2] = track.number;
                body[3] = 1; // index
                if msf {
                    let (m, s, f) = lba_to_msf(cur + LEADIN_FRAMES);
                    body[5] = m;
                    body[6] = s;
                    body[7] = f;
                } else {
                    put_be32(&mut body[4..8], cur);
                }
                let track_start = track.start - bias;
                let relative = cur.saturating_sub(track_start);
                if msf {
                    let (m, s, f) = lba_to_msf(relative);
                    body[9] = m;
                    body[10] = s;
                    body[11] = f;
                } else {
                    put_be32(&mut body[8..12], relative);
                }
                data.extend_from_slice(&body);
            }
            2 | 3 => {
                // MCN / ISRC: nothing encoded, valid bit clear
                let mut body = [0u8; 20];
                body[0] = sub_fn;
                data.extend_from_slice(&body);
            }
            _ => return Err(Sense::illegal(0x24)),
        }
        let len = (data.len() - 4) as u16;
        data[2..4].copy_from_slice(&len.to_be_bytes());
    }

    data.truncate(alloc.min(data.len()));
    Ok(data)
}

/// PLAY AUDIO(10): logical start LBA + 16-bit length
fn play_audio10(drive: &mut AtapiDrive, pkt: &[u8; 12]) -> Result<(), Sense> {
    let start = be32(&pkt[2..6]);
    let length = be16(&pkt[7..9]);
    if length == 0 {
        return Ok(());
    }
    let AtapiDrive { toc, audio, .. } = drive;
    audio.play(toc, start, start + length)
}

/// PLAY AUDIO MSF: absolute MSF range
fn play_audio_msf(drive: &mut AtapiDrive, pkt: &[u8; 12]) -> Result<(), Sense> {
    let start = msf_to_logical(pkt[3], pkt[4], pkt[5]);
    let end = msf_to_logical(pkt[6], pkt[7], pkt[8]);
    if end <= start {
        return Err(Sense::illegal(0x24));
    }
    let AtapiDrive { toc, audio, .. } = drive;
    audio.play(toc, start, end)
}

/// PLAY AUDIO TRACK/INDEX: whole-track range by track numbers
fn play_track_index(drive: &mut AtapiDrive, pkt: &[u8; 12]) -> Result<(), Sense> {
    let first = pkt[4] as usize;
    let last = (pkt[7] as usize).min(drive.toc.last);
    if first == 0 || first > drive.toc.last || last < first {
        return Err(Sense::illegal(0x24));
    }
    let bias = drive.toc.lead_in_bias();
    let start = drive.toc.track(first - 1).ok_or(Sense::illegal(0x24))?.start - bias;
    let end = drive.toc.track(last - 1).ok_or(Sense::illegal(0x24))?.end - bias;
    let AtapiDrive { toc, audio, .. } = drive;
    audio.play(toc, start, end)
}
