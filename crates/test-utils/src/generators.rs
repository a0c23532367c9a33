//! Test data generators for creating synthetic solar images.
//!
//! These generators create predictable, verifiable pixel patterns that
//! can be used across the test suite.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Parameters of a synthetic solar disk.
#[derive(Debug, Clone, Copy)]
pub struct DiskSpec {
    /// Zero-based x of the disk centre in pixels.
    pub center_x: f64,
    /// Zero-based y of the disk centre in pixels.
    pub center_y: f64,
    /// Disk radius in pixels.
    pub radius: f64,
    /// Intensity at disk centre.
    pub peak: f32,
    /// Linear limb-darkening coefficient.
    pub limb_darkening: f32,
    /// Off-disk background level.
    pub background: f32,
}

impl DiskSpec {
    /// A centred disk filling 80% of a `size`-pixel frame.
    pub fn centered(size: usize) -> Self {
        let center = (size as f64 - 1.0) / 2.0;
        Self {
            center_x: center,
            center_y: center,
            radius: size as f64 * 0.4,
            peak: 1000.0,
            limb_darkening: 0.6,
            background: 5.0,
        }
    }
}

/// Creates a limb-darkened solar disk on a faint background.
///
/// On the disk the intensity follows `peak * (1 - u * (1 - mu))` with
/// `mu = sqrt(1 - (r / R)^2)`; off the disk it is `background`.
pub fn create_solar_disk(width: usize, height: usize, spec: DiskSpec) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let dx = col as f64 - spec.center_x;
            let dy = row as f64 - spec.center_y;
            let r = (dx * dx + dy * dy).sqrt() / spec.radius;
            let value = if r <= 1.0 {
                let mu = (1.0 - r * r).sqrt() as f32;
                spec.peak * (1.0 - spec.limb_darkening * (1.0 - mu))
            } else {
                spec.background
            };
            data.push(value);
        }
    }
    data
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Creates a grid with NaN values at specific positions.
///
/// # Arguments
///
/// * `width` - Number of columns
/// * `height` - Number of rows
/// * `nan_positions` - Vec of (col, row) positions to set as NaN
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = create_test_grid(width, height);
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}

/// Centroid of pixels brighter than `threshold`, as zero-based (x, y).
pub fn bright_centroid(data: &[f32], width: usize, threshold: f32) -> Option<(f64, f64)> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for (i, v) in data.iter().enumerate() {
        if *v > threshold {
            sum_x += (i % width) as f64;
            sum_y += (i / width) as f64;
            count += 1;
        }
    }
    (count > 0).then(|| (sum_x / count as f64, sum_y / count as f64))
}
