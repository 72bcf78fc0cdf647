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

//! Disc image model and CUE parser tests

use std::path::PathBuf;

use tempfile::TempDir;


/// Write a CUE sheet plus zero-filled BIN image into a fresh temp dir
pub(super) fn write_image(cue_text: &str, bin_size: usize) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("game.bin"), vec![0u8; bin_size]).unwrap();
    let cue_path = dir.path().join("game.cue");
    std::fs::write(&cue_path, cue_text).unwrap();
    (dir, cue_path)
}
