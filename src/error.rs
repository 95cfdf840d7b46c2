use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Malformed caller input: data URL, area values, options.
    InvalidInput(String),
    /// Signature image bytes could not be decoded.
    ImageDecode(String),
    /// Prepared signature could not be encoded as PNG.
    ImageEncode(String),
    /// A `SignatureArea` references a page the document does not have.
    PageIndex { page: u32, page_count: usize },
    /// Source PDF could not be parsed, or its page tree is broken.
    PdfDecode(lopdf::Error),
    /// Error while editing or writing an already loaded document.
    LoPdfError(lopdf::Error),
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::ImageDecode(msg) => write!(f, "Could not decode signature image: {}", msg),
            Error::ImageEncode(msg) => write!(f, "Could not encode signature image: {}", msg),
            Error::PageIndex { page, page_count } => write!(
                f,
                "Page `{}` is out of range, document has {} page(s).",
                page, page_count
            ),
            Error::PdfDecode(err) => write!(f, "Could not read PDF document: {}", err),
            Error::LoPdfError(err) => write!(f, "PDF error: {}", err),
            Error::Other(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::PdfDecode(err) | Error::LoPdfError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Self::LoPdfError(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Self::Other(err.to_owned())
    }
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        Error::ImageDecode(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::InvalidInput(format!("Data URL payload is not valid base64: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::LoPdfError(lopdf::Error::from(err))
    }
}
