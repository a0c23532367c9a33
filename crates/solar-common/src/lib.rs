//! Common types shared across the solar disk acquisition crates.
//!
//! - [`MetadataKey`]: the (time, wavelength, resolution) identity of one acquisition
//! - AIA channel vocabulary
//! - Carrington rotation numbers and their representative times

pub mod carrington;
pub mod channel;
pub mod error;
pub mod key;
pub mod time;

pub use channel::{is_aia_channel, Instrument, AIA_WAVELENGTHS, DEFAULT_RESOLUTION};
pub use error::{SolarError, SolarResult};
pub use key::MetadataKey;
pub use carrington::{
    carrington_longitude, carrington_rotation_number, carrington_rotation_time,
    synoptic_rotation,
};
pub use time::{parse_time, TimeRange};
