//! Interpolation methods for image resampling.
//!
//! Coordinates are in pixel units of the source grid with `(0, 0)` at the
//! centre of the first stored pixel. Samples outside the grid return
//! `None`; the caller decides what fills them.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PixelGrid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interpolation method '{0}'")]
pub struct UnknownInterpolation(pub String);

/// Interpolation method used by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Nearest neighbor (preserves exact values).
    Nearest,
    /// Bilinear interpolation.
    #[default]
    Bilinear,
    /// Bicubic (Catmull-Rom) interpolation.
    Cubic,
}

impl FromStr for InterpolationMethod {
    type Err = UnknownInterpolation;

    /// Case-insensitive; `bicubic` is accepted for cubic.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" | "linear" => Ok(Self::Bilinear),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(UnknownInterpolation(other.to_string())),
        }
    }
}

impl InterpolationMethod {
    /// Sample `grid` at fractional pixel coordinates.
    pub fn sample(&self, grid: &PixelGrid, x: f64, y: f64) -> Option<f32> {
        match self {
            Self::Nearest => nearest_interpolate(grid, x, y),
            Self::Bilinear => bilinear_interpolate(grid, x, y),
            Self::Cubic => cubic_interpolate(grid, x, y),
        }
    }
}

impl std::fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nearest => write!(f, "nearest"),
            Self::Bilinear => write!(f, "bilinear"),
            Self::Cubic => write!(f, "cubic"),
        }
    }
}

#[inline]
fn in_bounds(grid: &PixelGrid, x: f64, y: f64) -> bool {
    x >= -0.5 && y >= -0.5 && x < grid.width as f64 - 0.5 && y < grid.height as f64 - 0.5
}

/// Nearest neighbor interpolation.
pub fn nearest_interpolate(grid: &PixelGrid, x: f64, y: f64) -> Option<f32> {
    if !in_bounds(grid, x, y) {
        return None;
    }
    let col = (x.round().max(0.0) as usize).min(grid.width - 1);
    let row = (y.round().max(0.0) as usize).min(grid.height - 1);
    Some(grid.data[row * grid.width + col])
}

/// Bilinear interpolation between the four nearest pixels.
///
/// Edge pixels are clamped so the outer half-pixel border still samples.
pub fn bilinear_interpolate(grid: &PixelGrid, x: f64, y: f64) -> Option<f32> {
    if !in_bounds(grid, x, y) {
        return None;
    }
    let x = x.clamp(0.0, (grid.width - 1) as f64);
    let y = y.clamp(0.0, (grid.height - 1) as f64);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(grid.width - 1);
    let y1 = (y0 + 1).min(grid.height - 1);

    let xf = (x - x0 as f64) as f32;
    let yf = (y - y0 as f64) as f32;

    let w = grid.width;
    let v00 = grid.data[y0 * w + x0];
    let v10 = grid.data[y0 * w + x1];
    let v01 = grid.data[y1 * w + x0];
    let v11 = grid.data[y1 * w + x1];

    // Any NaN corner poisons the sample.
    if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
        return Some(f32::NAN);
    }

    let top = v00 * (1.0 - xf) + v10 * xf;
    let bottom = v01 * (1.0 - xf) + v11 * xf;
    Some(top * (1.0 - yf) + bottom * yf)
}

/// Bicubic interpolation over the surrounding 4x4 pixels.
pub fn cubic_interpolate(grid: &PixelGrid, x: f64, y: f64) -> Option<f32> {
    if !in_bounds(grid, x, y) {
        return None;
    }
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;

    let xf = (x - xi as f64) as f32;
    let yf = (y - yi as f64) as f32;

    let mut values = [[0.0f32; 4]; 4];
    for (j, row) in values.iter_mut().enumerate() {
        for (i, value) in row.iter_mut().enumerate() {
            let px = (xi + i as i64 - 1).clamp(0, grid.width as i64 - 1) as usize;
            let py = (yi + j as i64 - 1).clamp(0, grid.height as i64 - 1) as usize;
            *value = grid.data[py * grid.width + px];

            // NaN neighbours fall back to bilinear
            if value.is_nan() {
                return bilinear_interpolate(grid, x, y);
            }
        }
    }

    let mut row_values = [0.0f32; 4];
    for (out, row) in row_values.iter_mut().zip(values.iter()) {
        *out = cubic_1d(row[0], row[1], row[2], row[3], xf);
    }

    Some(cubic_1d(
        row_values[0],
        row_values[1],
        row_values[2],
        row_values[3],
        yf,
    ))
}

/// 1D cubic interpolation using Catmull-Rom spline.
fn cubic_1d(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}
