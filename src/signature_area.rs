use crate::{rectangle::Rectangle, Error};
use serde::{Deserialize, Serialize};

/// A box on a page where the signature must be drawn.
///
/// Coordinates are in the pixel space of the page preview: origin in the
/// top-left corner, Y growing downwards. `page` is 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureArea {
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SignatureArea {
    /// Load the area list as it is stored alongside a sign request.
    pub fn list_from_json(json: &str) -> Result<Vec<SignatureArea>, Error> {
        let areas: Vec<SignatureArea> = serde_json::from_str(json)?;
        for area in &areas {
            area.validate()?;
        }
        Ok(areas)
    }

    /// Checks the box itself. The page range is checked against the document.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.x.is_finite() && self.x >= 0.0 && self.y.is_finite() && self.y >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "Signature area origin must be non-negative, got ({}, {}).",
                self.x, self.y
            )));
        }
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(Error::InvalidInput(format!(
                "Signature area size must be positive, got {}x{}.",
                self.width, self.height
            )));
        }
        Ok(())
    }

    /// Where an image with `aspect_ratio` (width / height) lands on a page of
    /// `page_height` points.
    ///
    /// The image is fitted into the box keeping its aspect ratio and anchored
    /// to the top-left corner of the box. `scale` converts preview pixels to
    /// points and is applied to the area before fitting.
    pub fn placement(&self, aspect_ratio: f64, page_height: f64, scale: f64) -> Rectangle {
        let x = self.x * scale;
        let y = self.y * scale;
        let width = self.width * scale;
        let height = self.height * scale;

        let mut draw_width = width;
        let mut draw_height = width / aspect_ratio;
        if draw_height > height {
            draw_height = height;
            draw_width = height * aspect_ratio;
        }

        // Flip from top-left origin to the PDF's bottom-left origin.
        let pdf_y = page_height - y - draw_height;
        Rectangle::from_origin_and_size(x, pdf_y, draw_width, draw_height)
    }
}
