//! End-to-end reading and writing of FITS files.

use fits_parser::{read_fits, write_fits, FitsError, FitsImage, Header};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;

fn sample_image() -> FitsImage {
    let mut header = Header::new();
    header.set("TELESCOP", "SDO/AIA");
    header.set("WAVELNTH", 171i64);
    header.set("RSUN_OBS", 975.5);
    header.set("T_OBS", "2015-03-11T00:00:09.35Z");
    header.add_history("registered");
    let width = 4;
    let height = 3;
    FitsImage {
        header,
        width,
        height,
        data: (0..width * height).map(|i| i as f32 * 0.5).collect(),
    }
}

#[test]
fn test_write_then_read_preserves_pixels_and_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.fits");
    let image = sample_image();

    write_fits(&path, &image).unwrap();
    let back = read_fits(&path).unwrap();

    assert_eq!((back.width, back.height), (4, 3));
    assert_eq!(back.data, image.data);
    assert_eq!(back.get(3, 2), Some(5.5));
    assert_eq!(back.header.get_str("TELESCOP"), Some("SDO/AIA"));
    assert_eq!(back.header.get_i64("WAVELNTH"), Some(171));
    assert_eq!(back.header.get_f64("RSUN_OBS"), Some(975.5));
    assert_eq!(back.header.history().collect::<Vec<_>>(), vec!["registered"]);
}

#[test]
fn test_structural_cards_are_not_exposed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.fits");
    let mut image = sample_image();
    // Stale layout cards from an upstream file must not reach cfitsio.
    image.header.set("BITPIX", 16i64);
    image.header.set("NAXIS1", 4096i64);

    write_fits(&path, &image).unwrap();
    let back = read_fits(&path).unwrap();

    assert_eq!((back.width, back.height), (4, 3));
    for keyword in ["SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND"] {
        assert!(!back.header.contains(keyword), "{keyword} leaked");
    }
}

#[test]
fn test_nan_pixels_survive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nan.fits");
    let mut image = sample_image();
    image.data[5] = f32::NAN;

    write_fits(&path, &image).unwrap();
    let back = read_fits(&path).unwrap();
    assert!(back.data[5].is_nan());
    assert_eq!(back.data[6], 3.0);
}

#[test]
fn test_long_string_survives() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("long.fits");
    let mut image = sample_image();
    let note = format!(
        "{}done",
        "deconvolved with the instrument point spread function, ".repeat(3)
    );
    image.header.set("COMMENTS", note.as_str());

    write_fits(&path, &image).unwrap();
    let back = read_fits(&path).unwrap();
    assert_eq!(back.header.get_str("COMMENTS"), Some(note.as_str()));
}

#[test]
fn test_integer_blank_pixels_become_nan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("level1.fits");
    {
        let description = ImageDescription {
            data_type: ImageType::Short,
            dimensions: &[2, 2],
        };
        let mut fptr = FitsFile::create(&path)
            .with_custom_primary(&description)
            .open()
            .unwrap();
        let hdu = fptr.primary_hdu().unwrap();
        hdu.write_key(&mut fptr, "BLANK", -32768i64).unwrap();
        hdu.write_image(&mut fptr, &[10i16, -32768, 12, 13]).unwrap();
    }

    let image = read_fits(&path).unwrap();
    assert_eq!(image.data[0], 10.0);
    assert!(image.data[1].is_nan());
    assert_eq!(image.data[3], 13.0);
    assert!(!image.header.contains("BLANK"));
}

#[test]
fn test_shape_mismatch_is_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.fits");
    let mut image = sample_image();
    image.data.pop();

    let result = write_fits(&path, &image);
    assert!(matches!(
        result,
        Err(FitsError::ShapeMismatch {
            width: 4,
            height: 3,
            len: 11
        })
    ));
    assert!(!path.exists());
}

#[test]
fn test_non_fits_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proxy.fits");
    std::fs::write(&path, b"<html>proxy error</html>").unwrap();
    assert!(read_fits(&path).is_err());
}

#[test]
fn test_truncated_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.fits");
    write_fits(&path, &sample_image()).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..2880 + 8]).unwrap();
    assert!(read_fits(&path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_fits(dir.path().join("absent.fits")).is_err());
}
