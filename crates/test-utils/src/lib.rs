//! Helpers shared by the integration tests of the solar disk crates.
//!
//! - [`fixtures::AiaFixture`] builds synthetic AIA level-1 observations
//!   (header, pixels, cache file name) and writes them as FITS
//! - [`generators`] draws limb-darkened disks and other test arrays
//! - [`paths`] finds optional real observations and makes scratch dirs
//!
//! Tests that need a real full-disk file use [`require_test_file!`] and
//! are skipped, not failed, on machines without it:
//!
//! ```ignore
//! let path = test_utils::require_test_file!("aia_lev1_171a_2015_03_11t00_00_09_35z_image_lev1.fits");
//! let image = fits_parser::read_fits(&path).unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Path to a real observation, or return early from the test with a
/// `SKIPPED` note when [`find_test_file`] cannot locate it.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Download test data or set TEST_DATA_DIR.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Assert two numbers differ by at most `epsilon`, compared as `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
