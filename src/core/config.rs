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

//! Drive-slot configuration
//!
//! TOML file describing which unit occupies which of the four slots:
//!
//! ```toml
//! convention = "amiga"
//!
//! [[unit]]
//! slot = 0
//! kind = "file"
//! image = "hd.img"
//! synth-rdb = true
//!
//! [[unit]]
//! slot = 2
//! kind = "cdrom"
//! image = "game.cue"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::error::{ConfigError, Result};
use crate::core::ide::{GeometryConvention, IdeController, Unit, UNIT_SLOTS};
use crate::core::link::IdeLink;

/// Geometry convention selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Convention {
    #[default]
    Amiga,
    Pc,
}

impl From<Convention> for GeometryConvention {
    fn from(value: Convention) -> Self {
        match value {
            Convention::Amiga => GeometryConvention::Amiga,
            Convention::Pc => GeometryConvention::Pc,
        }
    }
}

/// One configured unit slot
#[derive(Debug, Clone, Deserialize)]
pub struct UnitConfig {
    /// Slot index (0-3; bus = slot / 2, drive select = slot % 2)
    pub slot: usize,
    #[serde(flatten)]
    pub kind: UnitKindConfig,
}

/// Unit variant plus its variant-specific settings
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UnitKindConfig {
    /// Image file on the filesystem
    File {
        image: PathBuf,
        #[serde(default, rename = "synth-rdb")]
        synth_rdb: bool,
    },
    /// The whole raw card
    Card,
    /// One partition of the raw card
    CardPartition { index: u8, start: u32, sectors: u32 },
    /// CD-ROM unit, optionally with a disc mounted at startup
    Cdrom {
        #[serde(default)]
        image: Option<PathBuf>,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Geometry convention for disk units
    #[serde(default)]
    pub convention: Convention,
    /// Configured unit slots
    #[serde(default, rename = "unit")]
    pub units: Vec<UnitConfig>,
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::NotFound(path.display().to_string()))?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check slot indices for range and uniqueness
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let mut seen = [false; UNIT_SLOTS];
        for unit in &self.units {
            if unit.slot >= UNIT_SLOTS {
                return Err(ConfigError::SlotOutOfRange(unit.slot));
            }
            if seen[unit.slot] {
                return Err(ConfigError::DuplicateSlot(unit.slot));
            }
            seen[unit.slot] = true;
        }
        Ok(())
    }

    /// Build and attach the configured units to a controller
    ///
    /// Card-backed slots require the raw card to be attached first.
    pub fn apply<L: IdeLink>(&self, controller: &mut IdeController<L>) -> Result<()> {
        let convention: GeometryConvention = self.convention.into();
        for entry in &self.units {
            match &entry.kind {
                UnitKindConfig::File { image, synth_rdb } => {
                    let unit = Unit::file_backed(image, *synth_rdb, convention)?;
                    controller.attach(entry.slot, unit)?;
                }
                UnitKindConfig::Card => {
                    let sectors = controller.card_sectors().unwrap_or(0);
                    controller.attach(entry.slot, Unit::card_whole(sectors, convention))?;
                }
                UnitKindConfig::CardPartition {
                    index,
                    start,
                    sectors,
                } => {
                    let unit = Unit::card_partition(*index, *start, *sectors, convention);
                    controller.attach(entry.slot, unit)?;
                }
                UnitKindConfig::Cdrom { image } => {
                    controller.attach(entry.slot, Unit::cdrom())?;
                    if let Some(disc) = image {
                        controller.insert_disc(entry.slot, disc)?;
                    }
                }
            }
            log::info!("configured slot {}: {:?}", entry.slot, entry.kind);
        }
        Ok(())
    }
}
