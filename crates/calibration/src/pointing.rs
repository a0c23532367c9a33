//! Pointing update.
//!
//! Replaces the reference pixel, plate scale and roll in the header with
//! values from a pointing table (the equivalent of the master pointing
//! series). Pixels are not touched.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StageName, TableError};
use crate::types::{CalibratedImage, PipelineInput, Pointed};

const STAGE: StageName = StageName::Pointing;

/// Pointing of one channel during a table interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelPointing {
    /// Zero-based x pixel of the disk centre.
    pub x0: f64,
    /// Zero-based y pixel of the disk centre.
    pub y0: f64,
    /// Plate scale in arcsec per pixel.
    pub imscale: f64,
    /// Instrument roll relative to the spacecraft, degrees.
    pub instrot: f64,
}

/// One validity interval `[start, end)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointingEntry {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub channels: BTreeMap<u16, ChannelPointing>,
}

/// Pointing table, usually loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointingTable {
    pub entries: Vec<PointingEntry>,
}

impl PointingTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> std::result::Result<Self, TableError> {
        let table: Self = serde_json::from_str(json)?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> std::result::Result<Self, TableError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> std::result::Result<(), TableError> {
        for entry in &self.entries {
            if entry.start >= entry.end {
                return Err(TableError::Invalid(format!(
                    "pointing entry starting {} does not end after it starts",
                    entry.start
                )));
            }
            if let Some((wl, _)) = entry
                .channels
                .iter()
                .find(|(_, p)| !(p.imscale > 0.0) || !p.x0.is_finite() || !p.y0.is_finite())
            {
                return Err(TableError::Invalid(format!(
                    "pointing for {} A at {} is not usable",
                    wl, entry.start
                )));
            }
        }
        Ok(())
    }

    /// Pointing for `wavelength` at `time`, first matching entry wins.
    pub fn lookup(&self, time: &DateTime<Utc>, wavelength: u16) -> Option<&ChannelPointing> {
        self.entries
            .iter()
            .filter(|e| e.start <= *time && *time < e.end)
            .find_map(|e| e.channels.get(&wavelength))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Update the pointing keywords from `table`.
///
/// When no table entry covers the observation the header pointing is kept
/// and `PNTSRC = 'header'` records that.
pub fn update_pointing<S: PipelineInput>(
    image: &CalibratedImage<S>,
    table: &PointingTable,
) -> Result<CalibratedImage<Pointed>> {
    image.check_grid(STAGE)?;
    let time = image.observation_time(STAGE)?;
    let wavelength = image.require_wavelength(STAGE)?;
    for field in ["CRPIX1", "CRPIX2", "CDELT1", "CDELT2", "CROTA2"] {
        image.require_f64(STAGE, field)?;
    }

    let mut header = image.header().clone();
    match table.lookup(&time, wavelength) {
        Some(pointing) => {
            let sat_rot = header.get_f64("SAT_ROT").unwrap_or(0.0);
            let crota2 = pointing.instrot + sat_rot;
            header.set("CRPIX1", pointing.x0 + 1.0);
            header.set("CRPIX2", pointing.y0 + 1.0);
            header.set("CDELT1", pointing.imscale);
            header.set("CDELT2", pointing.imscale);
            header.set("CROTA2", crota2);
            set_rotation_matrix(&mut header, crota2);
            header.set_with_comment("PNTSRC", "table", "source of pointing keywords");
            header.add_history(&format!("pointing updated for {} A at {}", wavelength, time));
            info!(wavelength, %time, "updated pointing from table");
            debug!(
                crpix1 = pointing.x0 + 1.0,
                crpix2 = pointing.y0 + 1.0,
                cdelt = pointing.imscale,
                crota2,
                "pointing keywords"
            );
        }
        None => {
            header.set_with_comment("PNTSRC", "header", "source of pointing keywords");
            debug!(wavelength, %time, "no pointing table entry, keeping header pointing");
        }
    }

    Ok(CalibratedImage::from_parts(image.grid().clone(), header))
}

/// Write the `PCi_j` matrix for a roll of `crota2` degrees.
pub(crate) fn set_rotation_matrix(header: &mut fits_parser::Header, crota2: f64) {
    let (sin, cos) = crota2.to_radians().sin_cos();
    header.set("PC1_1", cos);
    header.set("PC1_2", -sin);
    header.set("PC2_1", sin);
    header.set("PC2_2", cos);
}
