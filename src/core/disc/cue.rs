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

//! CUE sheet tokenizer and grammar state machine
//!
//! Recognized directives: `FILE`, `TRACK`, `AUDIO`, `MODE1/2048`,
//! `MODE1/2352`, `MODE2/2352`, `MODE2/2336`, `PREGAP`, `INDEX`; time
//! fields are `MM:SS:FF`. Exactly one `FILE` directive is supported and
//! track numbers must increase by exactly one starting at 1.

use std::fs::File;
use std::path::Path;

use crate::core::error::CueError;

use super::{Toc, Track, TrackType, LEADIN_FRAMES, MAX_TRACKS};

/// One token pulled from the CUE text
///
/// `Literal` marks a quoted word; `Eot` is end of text. Whitespace,
/// newlines and `;` comments never reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    Word(&'a str),
    Literal(&'a str),
    Eot,
}

impl<'a> Token<'a> {
    fn text(&self) -> Option<&'a str> {
        match self {
            Token::Word(w) | Token::Literal(w) => Some(w),
            Token::Eot => None,
        }
    }
}

/// Word-at-a-time CUE tokenizer
pub(super) struct Tokenizer<'a> {
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub(super) fn new(text: &'a str) -> Self {
        Self { rest: text }
    }

    /// Next logical word, skipping whitespace and `;` comments
    pub(super) fn next_word(&mut self) -> Result<Token<'a>, CueError> {
        loop {
            self.rest = self.rest.trim_start();
            if let Some(stripped) = self.rest.strip_prefix(';') {
                // Comment runs to end of line
                match stripped.find('\n') {
                    Some(nl) => self.rest = &stripped[nl + 1..],
                    None => self.rest = "",
                }
                continue;
            }
            break;
        }

        if self.rest.is_empty() {
            return Ok(Token::Eot);
        }

        if let Some(stripped) = self.rest.strip_prefix('"') {
            let close = stripped
                .find('"')
                .ok_or_else(|| CueError::Invalid("unterminated quoted string".into()))?;
            let word = &stripped[..close];
            self.rest = &stripped[close + 1..];
            return Ok(Token::Literal(word));
        }

        let end = self
            .rest
            .find(|c: char| c.is_whitespace())
            .unwrap_or(self.rest.len());
        let word = &self.rest[..end];
        self.rest = &self.rest[end..];
        Ok(Token::Word(word))
    }
}

/// Grammar state: which directive's arguments are being consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    File,
    Track,
    Pregap,
    Index,
}

/// Parse a CUE sheet and open its backing image
pub(super) fn parse(cue_path: &Path) -> Result<Toc, CueError> {
    let text = std::fs::read_to_string(cue_path)
        .map_err(|_| CueError::NotFound(cue_path.display().to_string()))?;
    parse_text(&text, cue_path)
}

/// Parse CUE text, resolving the `FILE` directive relative to `cue_path`
pub(super) fn parse_text(text: &str, cue_path: &Path) -> Result<Toc, CueError> {
    let mut tok = Tokenizer::new(text);

    let mut tracks: Vec<Track> = Vec::new();
    let mut file: Option<File> = None;
    let mut file_size: u64 = 0;
    // Accumulated PREGAP time, applied to every subsequent INDEX
    let mut pregap: u32 = 0;
    // Raw INDEX 1 LBA of the previous track (offset delta base)
    let mut prev_index1_lba: u32 = 0;
    let mut state = State::None;

    loop {
        let token = tok.next_word()?;
        let word = match token {
            Token::Eot => break,
            _ => token.text().unwrap_or(""),
        };

        match word {
            "FILE" => {
                state = State::File;
                if file.is_some() {
                    return Err(CueError::Unsupported(
                        "only one FILE directive is supported".into(),
                    ));
                }

                let name = tok
                    .next_word()?
                    .text()
                    .ok_or_else(|| CueError::Invalid("FILE without a filename".into()))?
                    .to_owned();
                let kind = tok
                    .next_word()?
                    .text()
                    .unwrap_or("")
                    .to_owned();
                if !kind.eq_ignore_ascii_case("BINARY") {
                    return Err(CueError::Unsupported(format!(
                        "FILE type '{}' (only BINARY is supported)",
                        kind
                    )));
                }

                let bin_path = match cue_path.parent() {
                    Some(dir) => dir.join(&name),
                    None => Path::new(&name).to_path_buf(),
                };
                let handle = File::open(&bin_path)
                    .map_err(|_| CueError::NotFound(bin_path.display().to_string()))?;
                file_size = handle.metadata().map_err(CueError::Bin)?.len();
                file = Some(handle);
                log::debug!("cue: FILE {} ({} bytes)", bin_path.display(), file_size);
            }

            "TRACK" => {
                state = State::Track;
                if file.is_none() {
                    return Err(CueError::Invalid("TRACK before FILE".into()));
                }
                if tracks.len() >= MAX_TRACKS {
                    return Err(CueError::Invalid("more than 100 tracks".into()));
                }

                let number: u8 = tok
                    .next_word()?
                    .text()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| CueError::Invalid("bad TRACK number".into()))?;
                if number as usize != tracks.len() + 1 {
                    return Err(CueError::Invalid(format!(
                        "track numbers must increase by 1: got {}, expected {}",
                        number,
                        tracks.len() + 1
                    )));
                }

                let mode = tok
                    .next_word()?
                    .text()
                    .ok_or_else(|| CueError::Invalid("TRACK without a mode".into()))?;
                let (track_type, sector_size) = match mode {
                    "AUDIO" => (TrackType::Audio, 2352),
                    "MODE1/2048" => (TrackType::DataMode1, 2048),
                    "MODE1/2352" => (TrackType::DataMode1, 2352),
                    "MODE2/2352" => (TrackType::DataMode2, 2352),
                    "MODE2/2336" => (TrackType::DataMode2, 2336),
                    other => {
                        return Err(CueError::Unsupported(format!("track mode '{}'", other)))
                    }
                };

                tracks.push(Track {
                    number,
                    track_type,
                    sector_size,
                    start: 0,
                    end: 0,
                    offset: 0,
                });
                log::debug!("cue: TRACK {:02} {:?} ({})", number, track_type, sector_size);
            }

            "PREGAP" => {
                if !matches!(state, State::Track | State::Pregap | State::Index) {
                    return Err(CueError::Invalid("PREGAP outside a TRACK block".into()));
                }
                state = State::Pregap;
                let time = tok
                    .next_word()?
                    .text()
                    .ok_or_else(|| CueError::Invalid("PREGAP without a time".into()))?;
                pregap += parse_msf(time)?;
            }

            "INDEX" => {
                if !matches!(state, State::Track | State::Pregap | State::Index) {
                    return Err(CueError::Invalid("INDEX before TRACK".into()));
                }
                state = State::Index;
                let current = tracks.len();

                let index: u8 = tok
                    .next_word()?
                    .text()
                    .and_then(|w| w.parse().ok())
                    .ok_or_else(|| CueError::Invalid("bad INDEX number".into()))?;
                let time = tok
                    .next_word()?
                    .text()
                    .ok_or_else(|| CueError::Invalid("INDEX without a time".into()))?;
                let lba = parse_msf(time)?;

                match index {
                    0 => {
                        // Gap start closes the previous track if still open
                        if current >= 2 && tracks[current - 2].end == 0 {
                            tracks[current - 2].end = lba + LEADIN_FRAMES + pregap;
                        }
                    }
                    1 => {
                        let start = lba + LEADIN_FRAMES + pregap;
                        if current >= 2 && tracks[current - 2].end == 0 {
                            // No INDEX 0 seen: the new track starts where
                            // the previous one ends
                            tracks[current - 2].end = start;
                        }

                        let offset = if current == 1 {
                            // First track: the offset term absorbs the
                            // lead-in bias so lba->byte stays exact
                            (lba + LEADIN_FRAMES) as u64 * tracks[0].sector_size as u64
                        } else {
                            if lba < prev_index1_lba {
                                return Err(CueError::Invalid(
                                    "INDEX 01 times must increase".into(),
                                ));
                            }
                            let prev = &tracks[current - 2];
                            prev.offset
                                + (lba - prev_index1_lba) as u64 * prev.sector_size as u64
                        };

                        let track = &mut tracks[current - 1];
                        track.start = start;
                        track.offset = offset;
                        prev_index1_lba = lba;
                    }
                    // Higher indices carry no layout information
                    _ => {}
                }
            }

            // Directives that carry no layout information for this core
            // (REM, TITLE, PERFORMER, FLAGS ...); their arguments fall
            // through the word loop as unrecognized words.
            _ => {}
        }
    }

    finalize(tracks, file, file_size)
}

/// Close the last track, validate the table and produce the `Toc`
fn finalize(mut tracks: Vec<Track>, file: Option<File>, file_size: u64) -> Result<Toc, CueError> {
    let file = file.ok_or_else(|| CueError::Invalid("no FILE directive".into()))?;
    if tracks.is_empty() {
        return Err(CueError::Invalid("no tracks".into()));
    }

    if let Some(t) = tracks.iter().find(|t| t.start == 0) {
        return Err(CueError::Invalid(format!(
            "track {:02} has no INDEX 01",
            t.number
        )));
    }
    let last_idx = tracks.len() - 1;

    // The file size closes the final track
    if tracks[last_idx].end == 0 {
        let t = &tracks[last_idx];
        let remaining = file_size.saturating_sub(t.offset) / t.sector_size as u64;
        tracks[last_idx].end = t.start + remaining as u32;
    }

    let last = tracks.len();
    let end = tracks[last - 1].end;
    Ok(Toc {
        tracks,
        last,
        end,
        valid: true,
        file: Some(file),
    })
}

/// Parse an `MM:SS:FF` time field into a frame count
pub(super) fn parse_msf(text: &str) -> Result<u32, CueError> {
    let mut parts = text.split(':');
    let mut field = |name: &str| -> Result<u32, CueError> {
        parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| CueError::Invalid(format!("bad {} in time '{}'", name, text)))
    };
    let minute = field("minute")?;
    let second = field("second")?;
    let frame = field("frame")?;
    if second >= 60 || frame >= 75 {
        return Err(CueError::Invalid(format!("time out of range '{}'", text)));
    }
    Ok((minute * 60 + second) * 75 + frame)
}
