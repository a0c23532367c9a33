//! Exposure normalization.

use tracing::{debug, info};

use crate::error::{CalibrationError, Result, StageName};
use crate::types::{CalibratedImage, DegradationCorrected, Normalized};

const STAGE: StageName = StageName::Exposure;

/// Divide by the exposure time so pixels are in DN/s.
pub fn normalize_exposure(
    image: &CalibratedImage<DegradationCorrected>,
) -> Result<CalibratedImage<Normalized>> {
    image.check_grid(STAGE)?;
    let exptime = image.require_f64(STAGE, "EXPTIME")?;
    if exptime <= 0.0 {
        return Err(CalibrationError::invalid(
            STAGE,
            "EXPTIME",
            format!("{} s is not a positive exposure", exptime),
        ));
    }

    let scale = (1.0 / exptime) as f32;
    let grid = image.grid().map(|v| v * scale);

    let mut header = image.header().clone();
    header.set_with_comment("EXPTIME", 1.0, "exposure normalized [s]");
    header.set("BUNIT", "DN/s");
    header.add_history(&format!("normalized by exposure time {} s", exptime));

    debug!(exptime, "exposure time");
    info!("normalized exposure");

    Ok(CalibratedImage::from_parts(grid, header))
}
