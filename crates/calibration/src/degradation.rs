//! Instrument degradation correction.
//!
//! The sensitivity of each channel decays over the mission. The table
//! models it per channel as a sequence of calibration epochs; within an
//! epoch the relative sensitivity is a cubic polynomial in days since the
//! epoch started, scaled by the epoch's effective area relative to the
//! first epoch.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CalibrationError, CalibrationErrorKind, Result, StageName, TableError};
use crate::registration::REGISTERED_LEVEL;
use crate::types::{CalibratedImage, DegradationCorrected, PixelGrid, Registered};

const STAGE: StageName = StageName::Degradation;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One calibration epoch `[start, end)` of a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationEpoch {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Effective area during the epoch, any consistent unit.
    pub eff_area: f64,
    /// Cubic coefficients `c0 + c1 d + c2 d^2 + c3 d^3`, `d` in days.
    pub coefficients: [f64; 4],
}

impl DegradationEpoch {
    fn polynomial(&self, time: &DateTime<Utc>) -> f64 {
        let days = (*time - self.start).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
        let [c0, c1, c2, c3] = self.coefficients;
        c0 + days * (c1 + days * (c2 + days * c3))
    }
}

/// Per-channel degradation epochs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationTable {
    pub channels: BTreeMap<u16, Vec<DegradationEpoch>>,
}

/// Nominal linear sensitivity loss per day for each channel.
const NOMINAL_DECAY: [(u16, f64); 10] = [
    (94, -1.0e-5),
    (131, -2.5e-5),
    (171, -3.0e-5),
    (193, -2.0e-5),
    (211, -3.5e-5),
    (304, -5.0e-5),
    (335, -4.5e-5),
    (1600, -1.5e-5),
    (1700, -1.0e-5),
    (4500, 0.0),
];

impl Default for DegradationTable {
    fn default() -> Self {
        Self::nominal()
    }
}

impl DegradationTable {
    /// Built-in nominal table: a single epoch per channel starting at
    /// first light.
    pub fn nominal() -> Self {
        let start = Utc.with_ymd_and_hms(2010, 3, 24, 0, 0, 0).single();
        let end = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).single();
        let (Some(start), Some(end)) = (start, end) else {
            return Self {
                channels: BTreeMap::new(),
            };
        };
        let channels = NOMINAL_DECAY
            .iter()
            .map(|(wl, decay)| {
                (
                    *wl,
                    vec![DegradationEpoch {
                        start,
                        end,
                        eff_area: 1.0,
                        coefficients: [1.0, *decay, 0.0, 0.0],
                    }],
                )
            })
            .collect();
        Self { channels }
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
        for (wl, epochs) in &self.channels {
            let Some(first) = epochs.first() else {
                return Err(TableError::Invalid(format!("no epochs for {} A", wl)));
            };
            if !(first.eff_area > 0.0) {
                return Err(TableError::Invalid(format!(
                    "first epoch of {} A has non-positive effective area",
                    wl
                )));
            }
            if epochs.iter().any(|e| e.start >= e.end) {
                return Err(TableError::Invalid(format!(
                    "epoch of {} A does not end after it starts",
                    wl
                )));
            }
        }
        Ok(())
    }

    /// Degradation factor for `wavelength` at `time`.
    pub fn factor(&self, wavelength: u16, time: &DateTime<Utc>) -> Result<f64> {
        let epochs = self.channels.get(&wavelength).ok_or_else(|| {
            CalibrationError::new(
                STAGE,
                CalibrationErrorKind::Table(format!("no degradation data for {} A", wavelength)),
            )
        })?;
        let first = epochs.first().ok_or_else(|| {
            CalibrationError::new(
                STAGE,
                CalibrationErrorKind::Table(format!("no epochs for {} A", wavelength)),
            )
        })?;
        let epoch = epochs
            .iter()
            .find(|e| e.start <= *time && *time < e.end)
            .ok_or_else(|| {
                CalibrationError::new(
                    STAGE,
                    CalibrationErrorKind::Table(format!(
                        "no degradation epoch for {} A covers {}",
                        wavelength, time
                    )),
                )
            })?;

        Ok(epoch.polynomial(time) * epoch.eff_area / first.eff_area)
    }
}

/// Divide out the channel degradation at the observation time.
pub fn correct_degradation(
    image: &CalibratedImage<Registered>,
    table: &DegradationTable,
) -> Result<CalibratedImage<DegradationCorrected>> {
    image.check_grid(STAGE)?;
    let level = image.require_f64(STAGE, "LVL_NUM")?;
    if level < REGISTERED_LEVEL {
        return Err(CalibrationError::new(
            STAGE,
            CalibrationErrorKind::NotReady(format!("LVL_NUM is {}, expected >= 1.5", level)),
        ));
    }
    let time = image.observation_time(STAGE)?;
    let wavelength = image.require_wavelength(STAGE)?;

    let factor = table.factor(wavelength, &time)?;
    if !(factor > 0.0) || !factor.is_finite() {
        return Err(CalibrationError::new(
            STAGE,
            CalibrationErrorKind::Table(format!(
                "degradation factor {} for {} A at {} is not positive",
                factor, wavelength, time
            )),
        ));
    }

    let scale = (1.0 / factor) as f32;
    let grid: PixelGrid = image.grid().map(|v| v * scale);

    let mut header = image.header().clone();
    header.set_with_comment("DEGRADFN", factor, "degradation factor divided out");
    header.add_history(&format!("degradation corrected, factor {:.6}", factor));

    debug!(wavelength, factor, "degradation factor");
    info!(wavelength, "corrected instrument degradation");

    Ok(CalibratedImage::from_parts(grid, header))
}
