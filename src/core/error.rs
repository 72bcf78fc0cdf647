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

/// Controller error types
use thiserror::Error;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Main error type for the storage controller
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("no unit configured in slot {0}")]
    NoUnit(usize),

    #[error("unit slot out of range: {0} (valid range: 0-3)")]
    InvalidSlot(usize),

    #[error("image file not found: {0}")]
    ImageNotFound(String),

    #[error("CUE sheet error: {0}")]
    Cue(#[from] CueError),

    #[error("link error: {0}")]
    Link(#[from] LinkError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// CUE sheet / disc image parse errors
///
/// A malformed CUE file always degrades to one of these variants,
/// never to a panic. The TOC stays invalid on any parse error.
#[derive(Error, Debug)]
pub enum CueError {
    #[error("CUE sheet not found: {0}")]
    NotFound(String),

    #[error("invalid CUE sheet: {0}")]
    Invalid(String),

    #[error("unsupported CUE feature: {0}")]
    Unsupported(String),

    #[error("backing image error: {0}")]
    Bin(#[from] std::io::Error),
}

/// Byte-link transport errors
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("bus handshake timed out after {0} ms")]
    Timeout(u64),
}

/// Drive-slot configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(String),

    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate unit slot: {0}")]
    DuplicateSlot(usize),

    #[error("unit slot out of range: {0} (valid range: 0-3)")]
    SlotOutOfRange(usize),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
