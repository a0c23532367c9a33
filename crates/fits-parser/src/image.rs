//! Image arrays.

use crate::header::Header;

/// A decoded 2-D image with its header.
///
/// Pixels are physical values (`BZERO + BSCALE * raw`) in row-major order
/// as stored: `data[y * width + x]` with `x` along NAXIS1. Blank pixels
/// are NaN. The header holds descriptive cards only; see
/// [`is_structural`](crate::header::is_structural).
#[derive(Debug, Clone, PartialEq)]
pub struct FitsImage {
    pub header: Header,
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FitsImage {
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

/// Physical value that integer pixels equal to `BLANK` (or `ZBLANK` in a
/// tile-compressed HDU) are scaled to, if the header declares one.
pub(crate) fn blank_value(raw_header: &Header) -> Option<f32> {
    let blank = raw_header
        .get_i64("BLANK")
        .or_else(|| raw_header.get_i64("ZBLANK"))?;
    let bscale = raw_header.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = raw_header.get_f64("BZERO").unwrap_or(0.0);
    Some((bzero + bscale * blank as f64) as f32)
}

/// Replace scaled blank pixels with NaN.
pub(crate) fn mask_blank(data: &mut [f32], blank: f32) -> usize {
    let mut count = 0;
    for value in data.iter_mut().filter(|v| **v == blank) {
        *value = f32::NAN;
        count += 1;
    }
    count
}
