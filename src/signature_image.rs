use crate::{options::SigningOptions, Error};
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

/// Prefix of a browser canvas export, for any image MIME subtype.
static DATA_URL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^data:image/\w+;base64,").expect("valid data URL pattern"));

/// Where the approver's mark came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureSource {
    /// Canvas export as a `data:image/...;base64,` URL. Already transparent.
    Drawn(String),
    /// Raw PNG or JPEG bytes of a photographed signature.
    Uploaded(Vec<u8>),
}

impl SignatureSource {
    /// Produce the PNG that gets stamped into the document.
    pub fn prepare(&self, options: &SigningOptions) -> Result<Vec<u8>, Error> {
        match self {
            SignatureSource::Drawn(data_url) => {
                if data_url.is_empty() {
                    return Err(Error::InvalidInput(
                        "Signature data is required for drawn signatures.".to_owned(),
                    ));
                }
                let image_data = decode_data_url(data_url)?;
                prepare_signature_with_options(&image_data, false, options)
            }
            SignatureSource::Uploaded(image_data) => {
                if image_data.is_empty() {
                    return Err(Error::InvalidInput(
                        "Signature image is required for uploaded signatures.".to_owned(),
                    ));
                }
                prepare_signature_with_options(image_data, true, options)
            }
        }
    }
}

/// Strip the `data:image/<type>;base64,` prefix and decode the rest.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, Error> {
    let prefix = DATA_URL_PREFIX.find(data_url).ok_or_else(|| {
        Error::InvalidInput("Expected a `data:image/<type>;base64,` URL.".to_owned())
    })?;
    Ok(base64::decode(&data_url[prefix.end()..])?)
}

/// Make every near-white pixel fully transparent.
///
/// This is a per-pixel threshold, not a segmentation: white areas inside the
/// signature are erased as well, and very light stroke edges may disappear.
pub fn suppress_background(image_data: &[u8], threshold: u8) -> Result<Vec<u8>, Error> {
    let mut pixels = load_image(image_data)?.to_rgba8();
    let mut cleared = 0usize;
    for pixel in pixels.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r > threshold && g > threshold && b > threshold {
            pixel.0[3] = 0;
            cleared += 1;
        }
    }
    log::debug!(
        "Cleared {} of {} pixels above {}.",
        cleared,
        pixels.width() as usize * pixels.height() as usize,
        threshold
    );
    encode_png(&DynamicImage::ImageRgba8(pixels))
}

/// Downsize so the width is at most `max_width`, keeping the aspect ratio.
/// Smaller images are never enlarged.
pub fn fit_for_embedding(image_data: &[u8], max_width: u32) -> Result<Vec<u8>, Error> {
    if max_width == 0 {
        return Err(Error::InvalidInput(
            "`max_width` must be greater than 0.".to_owned(),
        ));
    }
    let image = load_image(image_data)?;
    let (width, height) = image.dimensions();
    if width <= max_width {
        return encode_png(&image);
    }
    let new_height = ((height as f64 * max_width as f64 / width as f64).round() as u32).max(1);
    log::debug!(
        "Resizing signature from {}x{} to {}x{}.",
        width,
        height,
        max_width,
        new_height
    );
    encode_png(&image.resize_exact(max_width, new_height, FilterType::Lanczos3))
}

/// Single entry point of the signing flow: optional background suppression
/// followed by the size limit, with default options.
pub fn prepare_signature(image_data: &[u8], suppress: bool) -> Result<Vec<u8>, Error> {
    prepare_signature_with_options(image_data, suppress, &SigningOptions::default())
}

pub(crate) fn prepare_signature_with_options(
    image_data: &[u8],
    suppress: bool,
    options: &SigningOptions,
) -> Result<Vec<u8>, Error> {
    options.validate()?;
    if suppress {
        let transparent = suppress_background(image_data, options.background_threshold)?;
        fit_for_embedding(&transparent, options.max_width)
    } else {
        fit_for_embedding(image_data, options.max_width)
    }
}

// Truncated input surfaces as an I/O error from `image`, so decode failures
// are classified here rather than by error variant.
fn load_image(image_data: &[u8]) -> Result<DynamicImage, Error> {
    image::load_from_memory(image_data).map_err(|err| Error::ImageDecode(err.to_string()))
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, Error> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| Error::ImageEncode(err.to_string()))?;
    Ok(bytes)
}
