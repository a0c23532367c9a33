//! Point-spread-function deconvolution.
//!
//! Richardson-Lucy deconvolution with a Gaussian PSF core. The PSF is
//! separable, so every convolution is a row pass followed by a column
//! pass. Work is dispatched through a [`ComputeBackend`] chosen once per
//! call.

use tracing::{debug, info, instrument, warn};

use crate::config::DEFAULT_PSF_ITERATIONS;
use crate::error::{CalibrationError, CalibrationErrorKind, Result, StageName};
use crate::types::{CalibratedImage, Deconvolved, PixelGrid, RawImage};

const STAGE: StageName = StageName::Deconvolution;

/// Nominal Gaussian PSF widths (sigma, pixels) per AIA channel.
const NOMINAL_SIGMA: [(u16, f64); 10] = [
    (94, 0.66),
    (131, 0.68),
    (171, 0.62),
    (193, 0.65),
    (211, 0.66),
    (304, 0.70),
    (335, 0.70),
    (1600, 0.85),
    (1700, 0.85),
    (4500, 0.85),
];

/// PSF model for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PsfModel {
    pub wavelength: u16,
    /// Gaussian core width in pixels.
    pub sigma: f64,
    pub iterations: usize,
}

impl PsfModel {
    /// Nominal PSF for an AIA channel.
    pub fn nominal(wavelength: u16) -> Option<Self> {
        NOMINAL_SIGMA
            .iter()
            .find(|(wl, _)| *wl == wavelength)
            .map(|(_, sigma)| Self {
                wavelength,
                sigma: *sigma,
                iterations: DEFAULT_PSF_ITERATIONS,
            })
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Normalized 1-D kernel covering +-3 sigma.
    pub fn kernel(&self) -> Vec<f32> {
        let radius = (3.0 * self.sigma).ceil().max(1.0) as i64;
        let mut kernel: Vec<f64> = (-radius..=radius)
            .map(|i| (-(i * i) as f64 / (2.0 * self.sigma * self.sigma)).exp())
            .collect();
        let sum: f64 = kernel.iter().sum();
        kernel.iter_mut().for_each(|k| *k /= sum);
        kernel.into_iter().map(|k| k as f32).collect()
    }
}

/// How deconvolution work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBackend {
    /// Data-parallel across rows on the rayon pool.
    Accelerated,
    /// Sequential on the calling thread.
    Standard,
}

impl ComputeBackend {
    /// Whether the accelerated backend can run here.
    pub fn accelerated_available() -> bool {
        #[cfg(feature = "accelerated")]
        {
            rayon::current_num_threads() > 1
        }
        #[cfg(not(feature = "accelerated"))]
        {
            false
        }
    }

    /// Choose a backend. Requesting acceleration where it is unavailable
    /// falls back to [`ComputeBackend::Standard`] with a warning.
    pub fn select(use_accelerated: bool) -> Self {
        if !use_accelerated {
            return Self::Standard;
        }
        if Self::accelerated_available() {
            Self::Accelerated
        } else {
            warn!("accelerated deconvolution unavailable, falling back to standard backend");
            Self::Standard
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Accelerated => "accelerated",
            Self::Standard => "standard",
        }
    }

    /// Run `f(row_index, row)` over every row of `out`.
    fn for_each_row<F>(&self, out: &mut [f32], width: usize, f: F)
    where
        F: Fn(usize, &mut [f32]) + Send + Sync,
    {
        match self {
            #[cfg(feature = "accelerated")]
            Self::Accelerated => {
                use rayon::prelude::*;
                out.par_chunks_mut(width)
                    .enumerate()
                    .for_each(|(y, row)| f(y, row));
            }
            _ => out
                .chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| f(y, row)),
        }
    }

    /// Separable convolution with edge clamping.
    fn convolve(&self, data: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
        let radius = (kernel.len() / 2) as i64;
        let max_x = width as i64 - 1;
        let max_y = height as i64 - 1;

        let mut rows = vec![0.0f32; data.len()];
        self.for_each_row(&mut rows, width, |y, row| {
            let src = &data[y * width..(y + 1) * width];
            for (x, out) in row.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let sx = (x as i64 + k as i64 - radius).clamp(0, max_x) as usize;
                        w * src[sx]
                    })
                    .sum();
            }
        });

        let mut out = vec![0.0f32; data.len()];
        self.for_each_row(&mut out, width, |y, row| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, w)| {
                        let sy = (y as i64 + k as i64 - radius).clamp(0, max_y) as usize;
                        w * rows[sy * width + x]
                    })
                    .sum();
            }
        });
        out
    }

    /// Elementwise `f(a, b)` into a new buffer.
    fn zip_map<F>(&self, a: &[f32], b: &[f32], width: usize, f: F) -> Vec<f32>
    where
        F: Fn(f32, f32) -> f32 + Send + Sync,
    {
        let mut out = vec![0.0f32; a.len()];
        self.for_each_row(&mut out, width, |y, row| {
            let offset = y * width;
            for (x, value) in row.iter_mut().enumerate() {
                *value = f(a[offset + x], b[offset + x]);
            }
        });
        out
    }
}

/// Richardson-Lucy iterations on a non-negative image.
fn richardson_lucy(
    observed: &[f32],
    width: usize,
    height: usize,
    kernel: &[f32],
    iterations: usize,
    backend: ComputeBackend,
) -> Vec<f32> {
    let mut estimate = observed.to_vec();
    for _ in 0..iterations {
        let blurred = backend.convolve(&estimate, width, height, kernel);
        let ratio = backend.zip_map(observed, &blurred, width, |o, b| {
            if b > 0.0 {
                o / b
            } else {
                0.0
            }
        });
        // The Gaussian PSF is symmetric, so the adjoint is the same kernel.
        let correction = backend.convolve(&ratio, width, height, kernel);
        estimate = backend.zip_map(&estimate, &correction, width, |e, c| e * c);
    }
    estimate
}

/// Deconvolve a raw image with `psf`.
///
/// Negative and blank pixels are treated as zero during the iterations;
/// blank pixels stay NaN in the output.
#[instrument(skip(raw, psf), fields(wavelength = psf.wavelength, iterations = psf.iterations))]
pub fn deconvolve(
    raw: &RawImage,
    psf: &PsfModel,
    use_accelerated: bool,
) -> Result<CalibratedImage<Deconvolved>> {
    let image = raw.to_unprocessed();
    image.check_grid(STAGE)?;
    let wavelength = image.require_wavelength(STAGE)?;
    if wavelength != psf.wavelength {
        return Err(CalibrationError::invalid(
            STAGE,
            "WAVELNTH",
            format!("image is {} A but PSF is for {} A", wavelength, psf.wavelength),
        ));
    }
    if psf.iterations == 0 || !(psf.sigma > 0.0) {
        return Err(CalibrationError::new(
            STAGE,
            CalibrationErrorKind::InvalidData(format!(
                "PSF needs sigma > 0 and at least one iteration (sigma = {}, iterations = {})",
                psf.sigma, psf.iterations
            )),
        ));
    }

    let backend = ComputeBackend::select(use_accelerated);
    let grid = image.grid();
    let observed: Vec<f32> = grid
        .data
        .iter()
        .map(|v| if v.is_finite() && *v > 0.0 { *v } else { 0.0 })
        .collect();

    let restored = richardson_lucy(
        &observed,
        grid.width,
        grid.height,
        &psf.kernel(),
        psf.iterations,
        backend,
    );
    let data = restored
        .into_iter()
        .zip(grid.data.iter())
        .map(|(r, original)| if original.is_nan() { f32::NAN } else { r })
        .collect();

    let mut header = image.header().clone();
    header.set_with_comment("PSFITER", psf.iterations as i64, "PSF deconvolution iterations");
    header.add_history(&format!(
        "PSF deconvolved: Richardson-Lucy, {} iterations, sigma {:.2} px, {} backend",
        psf.iterations,
        psf.sigma,
        backend.name()
    ));

    debug!(backend = backend.name(), "deconvolution finished");
    info!(wavelength, "applied PSF deconvolution");

    Ok(CalibratedImage::from_parts(
        PixelGrid {
            data,
            width: grid.width,
            height: grid.height,
        },
        header,
    ))
}
