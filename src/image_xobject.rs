// This code is inspired by https://github.com/fschutt/printpdf/blob/2bebdc65d06dafbe926ed4b43fedd10f966c59d3/src/xobject.rs

use crate::Error;
use lopdf::ObjectId;
use png::{ColorType, Transformations};
use std::io::Read;

#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Width of the image (original width, not scaled width)
    pub width: u32,
    /// Height of the image (original height, not scaled height)
    pub height: u32,
    /// Color space, only `Grayscale` and `Rgb` remain after splitting off alpha.
    pub color_space: ColorType,
    /// Always 8: decoding expands palettes and strips 16 bit samples.
    pub bits_per_component: u8,
    /// Should the image be interpolated when scaled?
    pub interpolate: bool,
    /// The actual data from the image
    pub image_data: Vec<u8>,
    /// Image used as a soft mask. (transparency)
    pub s_mask: Option<ObjectId>,
}

impl ImageXObject {
    /// Returns 1 or 2 images. The first is the color images.
    /// The second is (if present) the mask/alpha channel of the image.
    pub fn try_from<R: Read>(
        mut image_decoder: png::Decoder<R>,
    ) -> Result<(Self, Option<Self>), Error> {
        image_decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let mut image_reader = image_decoder.read_info()?;
        // Allocate the output buffer.
        let mut buf = vec![0; image_reader.output_buffer_size()];
        // Only the first frame of an APNG is used.
        let info = image_reader.next_frame(&mut buf)?;
        let image_data = &buf[..info.buffer_size()];

        let (color_space, image_color_data, alpha_data) = match info.color_type {
            ColorType::Rgba => (
                ColorType::Rgb,
                Self::split_channels(image_data, 4, 3),
                Some(Self::split_channels_alpha(image_data, 4)),
            ),
            ColorType::GrayscaleAlpha => (
                ColorType::Grayscale,
                Self::split_channels(image_data, 2, 1),
                Some(Self::split_channels_alpha(image_data, 2)),
            ),
            ColorType::Rgb | ColorType::Grayscale => (info.color_type, image_data.to_vec(), None),
            ColorType::Indexed => {
                return Err(Error::ImageDecode(
                    "Indexed PNG was not expanded to RGB.".to_owned(),
                ))
            }
        };

        Ok((
            Self {
                width: info.width,
                height: info.height,
                color_space,
                bits_per_component: 8,
                image_data: image_color_data,
                interpolate: false,
                s_mask: None, // This should be filled in later
            },
            alpha_data.map(|alpha_data| Self {
                width: info.width,
                height: info.height,
                color_space: ColorType::Grayscale,
                bits_per_component: 8,
                image_data: alpha_data,
                interpolate: false,
                s_mask: None,
            }),
        ))
    }

    /// Width over height of the source image.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    // Keeps the first `keep` samples of every `channels` sized pixel.
    fn split_channels(data: &[u8], channels: usize, keep: usize) -> Vec<u8> {
        let mut output = Vec::with_capacity(data.len() / channels * keep);
        for pixel in data.chunks_exact(channels) {
            output.extend_from_slice(&pixel[..keep]);
        }
        output
    }

    // Alpha is always the last sample of a pixel.
    fn split_channels_alpha(data: &[u8], channels: usize) -> Vec<u8> {
        data.chunks_exact(channels)
            .map(|pixel| pixel[channels - 1])
            .collect()
    }
}

// Inspired and derived from: https://github.com/fschutt/printpdf/blob/2bebdc65d06dafbe926ed4b43fedd10f966c59d3/src/xobject.rs#L245
impl From<ImageXObject> for lopdf::Stream {
    fn from(image: ImageXObject) -> Self {
        use lopdf::Object::*;

        let cs: &'static str = match image.color_space {
            ColorType::Grayscale | ColorType::GrayscaleAlpha => "DeviceGray",
            _ => "DeviceRGB",
        };

        let mut dict = lopdf::Dictionary::from_iter(vec![
            ("Type", Name("XObject".as_bytes().to_vec())),
            ("Subtype", Name("Image".as_bytes().to_vec())),
            ("Width", Integer(image.width as i64)),
            ("Height", Integer(image.height as i64)),
            ("Interpolate", image.interpolate.into()),
            ("BitsPerComponent", Integer(image.bits_per_component as i64)),
            ("ColorSpace", Name(cs.as_bytes().to_vec())),
        ]);
        if let Some(s_mask) = image.s_mask {
            dict.set("SMask", Reference(s_mask));
        }

        lopdf::Stream::new(dict, image.image_data)
    }
}
