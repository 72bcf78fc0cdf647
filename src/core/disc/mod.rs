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

//! Disc image model: validated track table plus backing file
//!
//! A mounted CD image is represented by a [`Toc`]: an ordered list of
//! [`Track`]s with type, sector size, start/end LBA and byte offset into
//! the backing file, plus a validity flag. A `Toc` is created by a
//! successful parse ([`Toc::parse`]), invalidated on eject or error, and
//! read-only in between.
//!
//! Track `start`/`end` fields carry the 150-frame (2 second) lead-in bias
//! from the CUE arithmetic; byte offsets are computed so that a host
//! logical LBA maps to `track.offset + (lba - track.start) * sector_size`.
//! The first track's offset absorbs the bias, which is what keeps that
//! formula exact across the whole image for uniform sector sizes.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::core::error::CueError;

mod cue;
#[cfg(test)]
mod tests;

/// Maximum number of tracks in a table of contents
pub const MAX_TRACKS: usize = 100;

/// Frames (sectors) per second on a CD
pub const FRAMES_PER_SECOND: u32 = 75;

/// The 2-second lead-in offset in frames
pub const LEADIN_FRAMES: u32 = 150;

/// CD-ROM track type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// CD-DA audio, raw 2352-byte sectors
    Audio,
    /// Mode 1 data (2048 or 2352-byte sectors)
    DataMode1,
    /// Mode 2 / XA data (2336 or 2352-byte sectors)
    DataMode2,
}

impl TrackType {
    /// True for data tracks of either mode
    pub fn is_data(&self) -> bool {
        !matches!(self, TrackType::Audio)
    }
}

/// One entry of the track table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Track {
    /// Track number (1-99)
    pub number: u8,
    /// Track type
    pub track_type: TrackType,
    /// Stored sector size in bytes (2048, 2336 or 2352)
    pub sector_size: u32,
    /// First LBA of the track (lead-in biased)
    pub start: u32,
    /// LBA one past the last sector (lead-in biased)
    pub end: u32,
    /// Byte offset of the track in the backing file
    pub offset: u64,
}

/// Table of contents of a mounted disc image
///
/// Owns the backing file handle; dropped (and flagged invalid) on eject.
#[derive(Debug)]
pub struct Toc {
    tracks: Vec<Track>,
    /// Track count of the validated table
    pub last: usize,
    /// Overall last LBA (one past the final track)
    pub end: u32,
    /// True only between a successful parse and the next eject/error
    pub valid: bool,
    file: Option<File>,
}

impl Toc {
    /// Create an empty, invalid table (no disc mounted)
    pub fn empty() -> Self {
        Self {
            tracks: Vec::new(),
            last: 0,
            end: 0,
            valid: false,
            file: None,
        }
    }

    /// Parse a disc image into a validated table of contents
    ///
    /// `.cue` files go through the CUE grammar; a `.iso`/`.ISO` extension
    /// bypasses CUE syntax and yields one synthetic Mode 1 track with
    /// 2048-byte sectors spanning the file.
    ///
    /// Logical addressing is exact when every track stores the same
    /// sector size. [`Toc::track_for_lba`] compares logical LBAs against
    /// lead-in-biased track ends, so the first [`LEADIN_FRAMES`] logical
    /// frames of each later track resolve through the preceding track's
    /// shape and offset; with a uniform size the byte arithmetic still
    /// lands on the right file position, with mixed sizes those frames
    /// read at the earlier track's sector granularity.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.cue` or `.iso` file
    ///
    /// # Returns
    ///
    /// - `Ok(Toc)` with `valid == true` on success
    /// - `Err(CueError)` on any parse or I/O failure
    pub fn parse(path: &Path) -> Result<Self, CueError> {
        let is_iso = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("iso"))
            .unwrap_or(false);

        let toc = if is_iso {
            Self::parse_iso(path)?
        } else {
            cue::parse(path)?
        };

        log::info!(
            "mounted {}: {} track(s), {} frames",
            path.display(),
            toc.last,
            toc.end
        );
        Ok(toc)
    }

    /// Synthesize a single-track table from a raw ISO image
    fn parse_iso(path: &Path) -> Result<Self, CueError> {
        let file = File::open(path)
            .map_err(|_| CueError::NotFound(path.display().to_string()))?;
        let size = file.metadata().map_err(CueError::Bin)?.len();
        let sectors = (size / 2048) as u32;

        let track = Track {
            number: 1,
            track_type: TrackType::DataMode1,
            sector_size: 2048,
            start: 0,
            end: sectors,
            offset: 0,
        };

        Ok(Self {
            tracks: vec![track],
            last: 1,
            end: sectors,
            valid: true,
            file: Some(file),
        })
    }

    /// Drop the backing file and mark the table invalid (eject)
    pub fn invalidate(&mut self) {
        self.tracks.clear();
        self.last = 0;
        self.end = 0;
        self.valid = false;
        self.file = None;
        log::info!("disc ejected, TOC invalidated");
    }

    /// The validated track slice
    pub fn tracks(&self) -> &[Track] {
        &self.tracks[..self.last]
    }

    /// Track by zero-based index
    pub fn track(&self, index: usize) -> Option<&Track> {
        if index < self.last {
            self.tracks.get(index)
        } else {
            None
        }
    }

    /// Index of the first track whose `end` exceeds `lba`
    ///
    /// Linear scan over the validated tracks; returns `last` as an
    /// out-of-range sentinel. Callers must treat the sentinel as "last
    /// track" and bounds-check before indexing.
    pub fn track_for_lba(&self, lba: u32) -> usize {
        for (i, track) in self.tracks[..self.last].iter().enumerate() {
            if track.end > lba {
                return i;
            }
        }
        self.last
    }

    /// Lead-in bias of the logical address space
    ///
    /// CUE arithmetic stores biased track starts; the synthetic ISO track
    /// starts at 0 and carries no bias. Hosts address with standard
    /// logical LBAs, so TOC-reporting paths subtract this.
    pub fn lead_in_bias(&self) -> u32 {
        match self.track(0) {
            Some(t) if t.start >= LEADIN_FRAMES => LEADIN_FRAMES,
            _ => 0,
        }
    }

    /// Byte offset in the backing file for `lba` within `track`
    ///
    /// Signed intermediate: for the first track `lba < start` by the
    /// lead-in bias, which the track's offset term cancels out.
    pub fn byte_offset(&self, track: &Track, lba: u32) -> u64 {
        let delta = lba as i64 - track.start as i64;
        (track.offset as i64 + delta * track.sector_size as i64).max(0) as u64
    }

    /// Read raw bytes at a file offset, zero-filling past end of file
    ///
    /// Audio run-out regularly lands a few frames past the image end when
    /// the file size is not a whole number of sectors; those bytes read as
    /// silence instead of an error.
    pub fn read_raw(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        let file = self.file.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no backing image")
        })?;
        file.seek(SeekFrom::Start(offset))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        buf[filled..].fill(0);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn tracks_mut(&mut self) -> &mut Vec<Track> {
        &mut self.tracks
    }
}

/// Convert an absolute frame count to (minute, second, frame)
#[inline]
pub fn lba_to_msf(lba: u32) -> (u8, u8, u8) {
    let minute = (lba / (60 * FRAMES_PER_SECOND)) as u8;
    let second = ((lba / FRAMES_PER_SECOND) % 60) as u8;
    let frame = (lba % FRAMES_PER_SECOND) as u8;
    (minute, second, frame)
}

/// Convert (minute, second, frame) to an absolute frame count
#[inline]
pub fn msf_to_lba(minute: u8, second: u8, frame: u8) -> u32 {
    (minute as u32 * 60 + second as u32) * FRAMES_PER_SECOND + frame as u32
}
