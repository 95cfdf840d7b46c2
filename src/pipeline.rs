use crate::{Error, PDFSigningDocument, SignatureArea, SignatureSource, SigningOptions};

/// Both buffers the request glue persists after a successful signing.
#[derive(Debug, Clone)]
pub struct SignedDocument {
    /// The prepared signature as stamped into the document.
    pub signature_png: Vec<u8>,
    pub pdf: Vec<u8>,
}

/// Prepare the approver's signature and stamp it into every area of `pdf_bytes`.
///
/// Nothing is returned unless every step succeeds, so a failed attempt leaves
/// the caller free to keep the request pending and retry.
pub fn sign_document(
    pdf_bytes: &[u8],
    source: &SignatureSource,
    areas: &[SignatureArea],
    options: &SigningOptions,
) -> Result<SignedDocument, Error> {
    let signature_png = source.prepare(options)?;
    let mut pdf_signing_document = PDFSigningDocument::read_from(pdf_bytes)?;
    pdf_signing_document.embed_signature(&signature_png, areas, options)?;
    let pdf = pdf_signing_document.into_bytes()?;
    log::info!(
        "Signed document with {} area(s), {} bytes.",
        areas.len(),
        pdf.len()
    );
    Ok(SignedDocument { signature_png, pdf })
}
