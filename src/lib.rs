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

//! Virtual IDE/ATAPI storage controller core library
//!
//! This library emulates an IDE controller with up to four drive units
//! (file-backed disks, raw-card disks and CD-ROM drives), driven through
//! a task-file register link by guest firmware.
//!
//! # Example
//!
//! ```
//! use vide::core::ide::{IdeController, Unit};
//! use vide::core::link::ScriptedLink;
//!
//! let mut controller = IdeController::new(ScriptedLink::new());
//! controller.attach(2, Unit::cdrom()).unwrap();
//!
//! // Serve one bus transaction per firmware loop iteration
//! controller.poll();
//! ```

pub mod core;
