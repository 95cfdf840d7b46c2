use crate::Error;
use serde::Deserialize;

pub const DEFAULT_BACKGROUND_THRESHOLD: u8 = 240;
pub const DEFAULT_MAX_WIDTH: u32 = 300;

/// Tunables for preparing and placing a signature.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SigningOptions {
    /// Pixels with R, G and B all strictly above this value become transparent.
    pub background_threshold: u8,
    /// Prepared signatures are downsized to at most this width.
    pub max_width: u32,
    /// Width in pixels of the preview the areas were drawn on.
    /// `None` means areas are already in PDF points (1:1).
    pub preview_width: Option<f64>,
}

impl Default for SigningOptions {
    fn default() -> Self {
        SigningOptions {
            background_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            max_width: DEFAULT_MAX_WIDTH,
            preview_width: None,
        }
    }
}

impl SigningOptions {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let options: SigningOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_width == 0 {
            return Err(Error::InvalidInput(
                "`maxWidth` must be greater than 0.".to_owned(),
            ));
        }
        if let Some(preview_width) = self.preview_width {
            if !preview_width.is_finite() || preview_width <= 0.0 {
                return Err(Error::InvalidInput(format!(
                    "`previewWidth` must be a positive number, got `{}`.",
                    preview_width
                )));
            }
        }
        Ok(())
    }

    /// Factor that converts preview pixels into points for a page of `page_width`.
    pub(crate) fn scale_for(&self, page_width: f64) -> f64 {
        match self.preview_width {
            Some(preview_width) => page_width / preview_width,
            None => 1.0,
        }
    }
}
