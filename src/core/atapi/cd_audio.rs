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

//! CD-DA playback state machine
//!
//! The only state that evolves across poll cycles independent of host
//! commands. Once playing, every firmware tick checks the link's CD-DA
//! FIFO; when it has space, one raw 2352-byte sector is read at the
//! current position and streamed to the audio sink. Reaching the end LBA
//! transitions to `Complete` without further streaming.
//!
//! Pause, Resume and Stop never move the position: Resume continues from
//! exactly where Pause left off.

use crate::core::disc::Toc;
use crate::core::link::IdeLink;

use super::Sense;

/// SCSI audio-status byte reported via READ SUBCHANNEL
mod audio_status {
    pub const PLAYING: u8 = 0x11;
    pub const PAUSED: u8 = 0x12;
    pub const COMPLETE: u8 = 0x13;
    pub const ERROR: u8 = 0x14;
    pub const NO_STATUS: u8 = 0x15;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayState {
    /// Idle; no play operation pending or remembered
    NoStat,
    Playing,
    Paused,
    /// Last play ran to its end LBA
    Complete,
    /// Last play aborted on a read failure
    Error,
}

/// Playback position and state for one drive
#[derive(Debug)]
pub struct CdAudio {
    state: PlayState,
    current_lba: u32,
    end_lba: u32,
}

impl Default for CdAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl CdAudio {
    pub fn new() -> Self {
        Self {
            state: PlayState::NoStat,
            current_lba: 0,
            end_lba: 0,
        }
    }

    /// Audio-status byte for READ SUBCHANNEL responses
    pub fn status_byte(&self) -> u8 {
        match self.state {
            PlayState::Playing => audio_status::PLAYING,
            PlayState::Paused => audio_status::PAUSED,
            PlayState::Complete => audio_status::COMPLETE,
            PlayState::Error => audio_status::ERROR,
            PlayState::NoStat => audio_status::NO_STATUS,
        }
    }

    /// Current playback position (logical LBA)
    pub fn position(&self) -> u32 {
        self.current_lba
    }

    /// True while sectors are being streamed
    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Start playback of a logical LBA range
    ///
    /// The range must lie inside the disc and the starting track must be
    /// an audio track. Track attribution adds the lead-in bias so the
    /// check lands on the track the host actually named.
    pub fn play(&mut self, toc: &Toc, start: u32, end: u32) -> Result<(), Sense> {
        let bias = toc.lead_in_bias();
        let disc_end = toc.end - bias;
        if start >= end || end > disc_end {
            return Err(Sense::illegal(0x21)); // LBA out of range
        }

        let index = toc.track_for_lba(start + bias);
        let track = toc.track(index).ok_or_else(|| Sense::illegal(0x21))?;
        if track.track_type.is_data() {
            return Err(Sense::illegal(0x64)); // illegal mode for this track
        }

        log::debug!("cdda: play {} .. {}", start, end);
        self.current_lba = start;
        self.end_lba = end;
        self.state = PlayState::Playing;
        Ok(())
    }

    /// Pause or resume playback (PAUSE/RESUME command)
    pub fn pause_resume(&mut self, resume: bool) -> Result<(), Sense> {
        match (self.state, resume) {
            (PlayState::Playing, false) => {
                self.state = PlayState::Paused;
                Ok(())
            }
            (PlayState::Paused, true) => {
                self.state = PlayState::Playing;
                Ok(())
            }
            // Pausing while paused / resuming while playing are no-ops
            (PlayState::Playing, true) | (PlayState::Paused, false) => Ok(()),
            _ => Err(Sense::illegal(0x2C)), // command sequence error
        }
    }

    /// Stop playback and forget the completion state
    pub fn stop(&mut self) {
        self.state = PlayState::NoStat;
    }

    /// Stream one sector if playing and the FIFO has room
    ///
    /// Called unconditionally once per firmware poll.
    pub fn tick<L: IdeLink>(&mut self, link: &mut L, toc: &mut Toc) {
        if self.state != PlayState::Playing || !link.cdda_has_space() {
            return;
        }
        if self.current_lba >= self.end_lba {
            self.state = PlayState::Complete;
            return;
        }

        let index = toc.track_for_lba(self.current_lba);
        let Some(track) = toc.track(index).copied() else {
            self.state = PlayState::Error;
            return;
        };
        let offset = toc.byte_offset(&track, self.current_lba);

        let mut sector = [0u8; 2352];
        if let Err(e) = toc.read_raw(offset, &mut sector) {
            log::error!("cdda: read failed at lba {}: {}", self.current_lba, e);
            self.state = PlayState::Error;
            return;
        }
        link.cdda_write(&sector);
        self.current_lba += 1;

        if self.current_lba >= self.end_lba {
            self.state = PlayState::Complete;
        }
    }
}
