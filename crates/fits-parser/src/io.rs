//! Reading and writing through cfitsio.

use std::ffi::{c_char, c_int, CStr, CString};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use fitsio::hdu::HduInfo;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use tracing::{debug, trace};

use crate::error::{FitsError, FitsResult};
use crate::header::{Header, CARD_SIZE};
use crate::image::{blank_value, mask_blank, FitsImage};

// cfitsio keeps global state (open-file table, decompression buffers) that
// is not safe to share across threads.
static CFITSIO: Mutex<()> = Mutex::new(());

/// Read the first 2-D image in a FITS file.
///
/// Level-1 AIA files carry an empty primary HDU followed by a
/// tile-compressed image; cfitsio presents the compressed table as a plain
/// image, so the first HDU with two axes wins either way.
pub fn read_fits(path: impl AsRef<Path>) -> FitsResult<FitsImage> {
    let path = path.as_ref();
    let _guard = CFITSIO.lock().unwrap_or_else(PoisonError::into_inner);

    let mut fptr = FitsFile::open(path)?;
    let mut index = 0;
    while let Ok(hdu) = fptr.hdu(index) {
        let (height, width, integer) = match &hdu.info {
            HduInfo::ImageInfo { shape, image_type } if shape.len() == 2 => (
                shape[0],
                shape[1],
                !matches!(image_type, ImageType::Float | ImageType::Double),
            ),
            _ => {
                index += 1;
                continue;
            }
        };

        debug!(path = %path.display(), index, width, height, "reading image HDU");
        let mut data: Vec<f32> = hdu.read_image(&mut fptr)?;
        if data.len() != width * height {
            return Err(FitsError::ShapeMismatch {
                width,
                height,
                len: data.len(),
            });
        }

        let mut header = Header::from_records(read_records(&mut fptr)?)?;
        if integer {
            if let Some(blank) = blank_value(&header) {
                let masked = mask_blank(&mut data, blank);
                trace!(masked, "masked blank pixels");
            }
        }
        header.strip_structure();

        return Ok(FitsImage {
            header,
            width,
            height,
            data,
        });
    }

    Err(FitsError::NoImage)
}

/// Write `image` as a single 32-bit float primary HDU, replacing any
/// existing file.
///
/// Structural cards in the header are skipped; cfitsio writes its own.
pub fn write_fits(path: impl AsRef<Path>, image: &FitsImage) -> FitsResult<()> {
    let path = path.as_ref();
    if image.data.len() != image.width * image.height {
        return Err(FitsError::ShapeMismatch {
            width: image.width,
            height: image.height,
            len: image.data.len(),
        });
    }

    let _guard = CFITSIO.lock().unwrap_or_else(PoisonError::into_inner);
    let description = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &[image.height, image.width],
    };
    let mut fptr = FitsFile::create(path)
        .with_custom_primary(&description)
        .overwrite()
        .open()?;
    let hdu = fptr.primary_hdu()?;
    hdu.write_image(&mut fptr, &image.data)?;

    let mut header = image.header.clone();
    header.strip_structure();
    let records = header.records();
    for record in &records {
        write_record(&mut fptr, record)?;
    }
    debug!(path = %path.display(), records = records.len(), "wrote FITS image");
    Ok(())
}

fn read_records(fptr: &mut FitsFile) -> FitsResult<Vec<String>> {
    let mut status: c_int = 0;
    let mut count: c_int = 0;
    let mut more: c_int = 0;
    // SAFETY: fptr is open and its current HDU is the one just read.
    unsafe {
        fitsio::sys::ffghsp(fptr.as_raw(), &mut count, &mut more, &mut status);
    }
    if status != 0 {
        return Err(FitsError::Status {
            call: "ffghsp",
            status,
        });
    }

    let mut records = Vec::with_capacity(count.max(0) as usize);
    for n in 1..=count {
        let mut buf: [c_char; CARD_SIZE + 1] = [0; CARD_SIZE + 1];
        // SAFETY: buf holds a full card plus the terminating NUL.
        let text = unsafe {
            fitsio::sys::ffgrec(fptr.as_raw(), n, buf.as_mut_ptr(), &mut status);
            CStr::from_ptr(buf.as_ptr())
        };
        if status != 0 {
            return Err(FitsError::Status {
                call: "ffgrec",
                status,
            });
        }
        records.push(text.to_string_lossy().into_owned());
    }
    Ok(records)
}

fn write_record(fptr: &mut FitsFile, record: &str) -> FitsResult<()> {
    let card = CString::new(record).map_err(|_| FitsError::MalformedCard {
        index: 0,
        message: "embedded NUL".to_string(),
    })?;
    let mut status: c_int = 0;
    // SAFETY: card is NUL-terminated and outlives the call.
    unsafe {
        fitsio::sys::ffprec(fptr.as_raw(), card.as_ptr(), &mut status);
    }
    if status != 0 {
        return Err(FitsError::Status {
            call: "ffprec",
            status,
        });
    }
    Ok(())
}
