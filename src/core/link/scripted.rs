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

//! In-memory scripted link
//!
//! Stands in for the FPGA byte-link: queued task files are delivered one
//! per poll, host-to-device data phases are fed from queued buffers, and
//! everything the core writes back is captured for inspection. Used by the
//! test suites and by the CLI smoke harness.

use std::collections::VecDeque;

use super::{AtaStatus, BusStatus, IdeLink, TaskFile};

/// Scripted in-memory implementation of [`IdeLink`]
#[derive(Debug, Default)]
pub struct ScriptedLink {
    /// Pending (bus, task-file) commands, delivered one per poll
    commands: VecDeque<(u8, [u8; 8])>,
    /// Bus index of the transaction currently being served
    active_bus: u8,
    /// Queued host-to-device data bursts (packet bodies, write data)
    host_data: VecDeque<Vec<u8>>,
    /// Captured device-to-host PIO bursts
    pub written: Vec<Vec<u8>>,
    /// Captured task-file writebacks
    pub task_files: Vec<TaskFile>,
    /// Captured status-register writes
    pub statuses: Vec<AtaStatus>,
    /// Captured CD-DA sectors
    pub cdda: Vec<Vec<u8>>,
    /// Remaining CD-DA FIFO capacity in sectors
    pub cdda_space: usize,
    /// When set, DATA_EMPTY stays deasserted (host never drains a burst)
    pub drain_stalled: bool,
    /// Depth of nested begin/end transfer scopes (bus-enable tracking)
    transfer_depth: u32,
}

impl ScriptedLink {
    /// Create an idle link with no queued commands
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command task file on the given bus (0 or 1)
    pub fn push_command(&mut self, bus: u8, tf: TaskFile) {
        let raw = [
            0,
            tf.error,
            tf.sector_count,
            tf.sector_number,
            tf.cylinder_low,
            tf.cylinder_high,
            tf.drive_head,
            tf.command,
        ];
        self.commands.push_back((bus & 1, raw));
    }

    /// Queue a host-to-device data burst for the next `stream_read`
    pub fn push_host_data(&mut self, data: Vec<u8>) {
        self.host_data.push_back(data);
    }

    /// Last task file written back by the core
    pub fn last_task_file(&self) -> Option<&TaskFile> {
        self.task_files.last()
    }

    /// Last status byte written by the core
    pub fn last_status(&self) -> Option<AtaStatus> {
        self.statuses.last().copied()
    }

    /// All device-to-host bytes concatenated in write order
    pub fn drained(&self) -> Vec<u8> {
        self.written.iter().flatten().copied().collect()
    }

    /// True when every begin_transfer was matched by an end_transfer
    pub fn transfers_balanced(&self) -> bool {
        self.transfer_depth == 0
    }
}

impl IdeLink for ScriptedLink {
    fn read_task_file(&mut self) -> [u8; 8] {
        match self.commands.pop_front() {
            Some((bus, raw)) => {
                self.active_bus = bus;
                raw
            }
            None => [0; 8],
        }
    }

    fn write_task_file(&mut self, tf: &TaskFile) {
        self.task_files.push(*tf);
    }

    fn write_status(&mut self, status: AtaStatus) {
        log::trace!("link: status {:02X}", status.bits());
        self.statuses.push(status);
    }

    fn read_bus_status(&mut self) -> BusStatus {
        let mut bs = if self.drain_stalled {
            BusStatus::empty()
        } else {
            BusStatus::DATA_EMPTY
        };
        if let Some((bus, _)) = self.commands.front() {
            bs |= if *bus == 0 {
                BusStatus::CMD0
            } else {
                BusStatus::CMD1
            };
        }
        if !self.host_data.is_empty() {
            bs |= BusStatus::DATA_FULL;
        }
        bs
    }

    fn stream_write(&mut self, buf: &[u8]) {
        self.written.push(buf.to_vec());
    }

    fn stream_read(&mut self, buf: &mut [u8]) {
        match self.host_data.pop_front() {
            Some(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                buf[n..].fill(0);
            }
            None => buf.fill(0),
        }
    }

    fn begin_transfer(&mut self) {
        self.transfer_depth += 1;
    }

    fn end_transfer(&mut self) {
        self.transfer_depth = self.transfer_depth.saturating_sub(1);
    }

    fn cdda_has_space(&self) -> bool {
        self.cdda_space > 0
    }

    fn cdda_write(&mut self, sector: &[u8]) {
        self.cdda.push(sector.to_vec());
        self.cdda_space = self.cdda_space.saturating_sub(1);
    }
}
