//! FITS reading and writing for solar images.
//!
//! Pixel I/O and tile decompression go through cfitsio (via the `fitsio`
//! crate, built from source). On top of it this crate keeps its own
//! [`Header`] model so keyword lookups, edits and `HISTORY` records are
//! plain Rust values:
//!
//! - [`read_fits`] returns the first 2-D image in a file, compressed or
//!   not, with BSCALE/BZERO applied and blank pixels as NaN
//! - [`write_fits`] writes a single 32-bit float primary HDU
//!
//! # Example
//!
//! ```no_run
//! let image = fits_parser::read_fits("aia_lev1_171a_2015_03_11t00_00_09_35z_image_lev1.fits")?;
//! println!("{}x{} {:?}", image.width, image.height, image.header.get_f64("CDELT1"));
//! # Ok::<(), fits_parser::FitsError>(())
//! ```

pub mod error;
pub mod header;
pub mod image;
mod io;

pub use error::{FitsError, FitsResult};
pub use header::{is_structural, Card, Header, HeaderValue};
pub use image::FitsImage;
pub use io::{read_fits, write_fits};
