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

//! Core controller components
//!
//! This module contains all emulated-controller components:
//! - IDE task-file command engine (disk and CD-ROM units)
//! - ATAPI packet processor (SCSI-MMC command set)
//! - CD-DA playback engine
//! - Disc image layer (CUE/BIN and ISO table of contents)
//! - Raw sector-card access
//! - Drive-slot configuration

pub mod atapi;
pub mod config;
pub mod disc;
pub mod error;
pub mod ide;
pub mod link;
pub mod storage;

// Re-export commonly used types
pub use atapi::AtapiDrive;
pub use config::Config;
pub use disc::Toc;
pub use error::{ControllerError, Result};
pub use ide::{Geometry, IdeController, Unit, UnitKind};
pub use link::{IdeLink, TaskFile};
pub use storage::{MemCard, SectorCard};
