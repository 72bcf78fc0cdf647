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

use std::path::PathBuf;

use clap::Parser;
use log::{error, info};
use vide::core::config::Config;
use vide::core::error::Result;
use vide::core::ide::{GeometryConvention, IdeController, Unit, UNIT_SLOTS};
use vide::core::link::{ScriptedLink, TaskFile};

/// Virtual IDE/ATAPI storage controller
#[derive(Parser)]
#[command(name = "vide")]
#[command(about = "Virtual IDE controller smoke harness", long_about = None)]
struct Args {
    /// Path to a disk image mounted at slot 0
    image: Option<PathBuf>,

    /// Drive-slot configuration file (overrides the image argument)
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Path to a CD image (.cue or .iso) mounted at slot 2
    #[arg(short = 'c', long)]
    cdrom: Option<PathBuf>,

    /// Synthesize an RDB for the slot-0 image
    #[arg(long)]
    synth_rdb: bool,

    /// Use PC geometry instead of Amiga geometry
    #[arg(long)]
    pc: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger with default level INFO
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    info!("vide v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut controller = IdeController::new(ScriptedLink::new());

    if let Some(path) = &args.config {
        info!("Loading configuration from: {}", path.display());
        let config = Config::load(path)?;
        config.apply(&mut controller)?;
    } else {
        let convention = if args.pc {
            GeometryConvention::Pc
        } else {
            GeometryConvention::Amiga
        };
        if let Some(image) = &args.image {
            info!("Mounting disk image: {}", image.display());
            let unit = Unit::file_backed(image, args.synth_rdb, convention)?;
            controller.attach(0, unit)?;
        }
        if let Some(cdrom) = &args.cdrom {
            info!("Mounting CD image: {}", cdrom.display());
            controller.attach(2, Unit::cdrom())?;
            controller.insert_disc(2, cdrom)?;
        }
    }

    let mut exercised = 0;
    for slot in 0..UNIT_SLOTS {
        let Some(unit) = controller.unit(slot) else {
            continue;
        };
        let packet_device = unit.cd().is_some();
        report_unit(slot, unit);
        exercise_identify(&mut controller, slot, packet_device);
        exercised += 1;
    }

    if exercised == 0 {
        error!("No units configured; pass an image path or --config");
    } else {
        info!("Exercised {} unit(s) successfully", exercised);
    }

    Ok(())
}

fn report_unit(slot: usize, unit: &Unit) {
    if let Some(cd) = unit.cd() {
        let toc = cd.toc();
        if toc.valid {
            info!("Slot {}: CD-ROM, {} track(s)", slot, toc.tracks().len());
            for track in toc.tracks() {
                info!(
                    "  track {:2}: {:?} frames {}..{}",
                    track.number, track.track_type, track.start, track.end
                );
            }
        } else {
            info!("Slot {}: CD-ROM, no disc", slot);
        }
    } else {
        let g = unit.geometry;
        info!(
            "Slot {}: disk, C/H/S {}/{}/{} ({} bytes)",
            slot, g.cylinders, g.heads, g.sectors, unit.size_bytes()
        );
    }
}

/// Drive one IDENTIFY command through the register link and report the
/// model string the guest would see
fn exercise_identify(
    controller: &mut IdeController<ScriptedLink>,
    slot: usize,
    packet_device: bool,
) {
    let bus = (slot / 2) as u8;
    let mut tf = TaskFile {
        command: if packet_device { 0xA1 } else { 0xEC },
        ..TaskFile::default()
    };
    tf.drive_head = ((slot as u8) & 1) << 4;

    controller.link_mut().push_command(bus, tf);
    controller.poll();

    let link = controller.link_mut();
    let data = link.drained();
    if data.len() != 512 {
        error!("Slot {}: IDENTIFY returned {} bytes", slot, data.len());
        return;
    }
    // Model name lives in words 27-46, big-endian within each word
    let model: String = data[54..94]
        .chunks_exact(2)
        .flat_map(|pair| [pair[1] as char, pair[0] as char])
        .collect();
    info!("Slot {}: IDENTIFY model \"{}\"", slot, model.trim());
    link.written.clear();
}
