mod error;
mod image_insert_to_page;
mod image_xobject;
mod options;
mod pdf_object;
mod pipeline;
mod rectangle;
mod signature_area;
mod signature_image;

use image_insert_to_page::InsertImageToPage;
use lopdf::{Document, ObjectId};
use sha2::{Digest, Sha256};
use std::{
    collections::{BTreeMap, HashMap},
    io::{Read, Write},
};

pub use error::Error;
pub use lopdf;
pub use options::{SigningOptions, DEFAULT_BACKGROUND_THRESHOLD, DEFAULT_MAX_WIDTH};
pub use pdf_object::PageBox;
pub use pipeline::{sign_document, SignedDocument};
pub use rectangle::Rectangle;
pub use signature_area::SignatureArea;
pub use signature_image::{
    decode_data_url, fit_for_embedding, prepare_signature, suppress_background, SignatureSource,
};

/// A signature image that is already part of the document.
#[derive(Debug, Clone)]
struct EmbeddedImage {
    object_id: ObjectId,
    name: String,
    aspect_ratio: f64,
}

/// The whole PDF document, ready to receive signature images.
#[derive(Debug, Clone)]
pub struct PDFSigningDocument {
    raw_document: Document,
    /// Link between the hash of a signature PNG and the image object holding it.
    /// This is used to reduce the amount of copies of the images in the pdf file.
    image_signature_object_id: HashMap<Vec<u8>, EmbeddedImage>,
}

impl PDFSigningDocument {
    pub fn new(raw_document: Document) -> Self {
        PDFSigningDocument {
            raw_document,
            image_signature_object_id: HashMap::new(),
        }
    }

    pub fn read_from<R: Read>(reader: R) -> Result<Self, Error> {
        let raw_document = Document::load_from(reader).map_err(Error::PdfDecode)?;
        Ok(Self::new(raw_document))
    }

    pub fn finished(self) -> Document {
        self.raw_document
    }

    pub fn get_document_ref(&self) -> &Document {
        &self.raw_document
    }

    pub fn page_count(&self) -> usize {
        self.raw_document.get_pages().len()
    }

    /// Size of the 1-indexed `page` in PDF points.
    pub fn page_dimensions(&self, page: u32) -> Result<PageBox, Error> {
        let page_id = self.page_id(page)?;
        pdf_object::page_box(&self.raw_document, page_id)
    }

    /// Draw `signature_png` into every area.
    ///
    /// The image is stored in the document once and referenced by every
    /// placement. Either all areas are drawn or, on error, the document is
    /// left as it was.
    pub fn embed_signature(
        &mut self,
        signature_png: &[u8],
        areas: &[SignatureArea],
        options: &SigningOptions,
    ) -> Result<(), Error> {
        options.validate()?;
        // Resolve everything up front so a bad area fails before any change.
        let pages = self.raw_document.get_pages();
        let mut targets = Vec::with_capacity(areas.len());
        for area in areas {
            area.validate()?;
            let page_id = pages.get(&area.page).copied().ok_or(Error::PageIndex {
                page: area.page,
                page_count: pages.len(),
            })?;
            targets.push((area, page_id));
        }

        let mut pdf_signing_document = self.clone();
        let image = pdf_signing_document.embedded_image(signature_png)?;
        if areas.is_empty() {
            log::warn!("No signature areas given, the document is left unchanged.");
            return Ok(());
        }

        // Keyed by page number so pages are written in order, areas keep input order.
        let mut placements: BTreeMap<u32, (ObjectId, Vec<Rectangle>)> = BTreeMap::new();
        let mut page_boxes: HashMap<ObjectId, PageBox> = HashMap::new();
        for (area, page_id) in targets {
            let page_box = match page_boxes.get(&page_id) {
                Some(page_box) => *page_box,
                None => {
                    let page_box =
                        pdf_object::page_box(&pdf_signing_document.raw_document, page_id)?;
                    page_boxes.insert(page_id, page_box);
                    page_box
                }
            };
            let scale = options.scale_for(page_box.width);
            let local = area.placement(image.aspect_ratio, page_box.height, scale);
            // Shift into the page's own coordinate system when MediaBox does not start at 0,0.
            let rect = Rectangle {
                x1: local.x1 + page_box.x,
                y1: local.y1 + page_box.y,
                x2: local.x2 + page_box.x,
                y2: local.y2 + page_box.y,
            };
            log::debug!(
                "Placing signature on page {} at ({:.2}, {:.2}) size {:.2}x{:.2}.",
                area.page,
                rect.x1,
                rect.y1,
                rect.width(),
                rect.height()
            );
            placements
                .entry(area.page)
                .or_insert_with(|| (page_id, Vec::new()))
                .1
                .push(rect);
        }

        for (page_id, rects) in placements.values() {
            pdf_signing_document.raw_document.add_image_to_page_only(
                image.object_id,
                &image.name,
                *page_id,
                rects,
            )?;
        }
        log::info!(
            "Embedded signature image objId: `({},{})` into {} area(s) on {} page(s).",
            image.object_id.0,
            image.object_id.1,
            areas.len(),
            placements.len()
        );

        *self = pdf_signing_document;
        Ok(())
    }

    /// Serialize the document.
    pub fn write_document<W: Write>(&mut self, writer: &mut W) -> Result<(), Error> {
        self.raw_document.save_to(writer)?;
        Ok(())
    }

    pub fn into_bytes(mut self) -> Result<Vec<u8>, Error> {
        let mut pdf_file_data: Vec<u8> = Vec::new();
        self.write_document(&mut pdf_file_data)?;
        Ok(pdf_file_data)
    }

    fn page_id(&self, page: u32) -> Result<ObjectId, Error> {
        let pages = self.raw_document.get_pages();
        pages.get(&page).copied().ok_or(Error::PageIndex {
            page,
            page_count: pages.len(),
        })
    }

    fn embedded_image(&mut self, signature_png: &[u8]) -> Result<EmbeddedImage, Error> {
        let image_hash = Sha256::digest(signature_png).to_vec();
        if let Some(image) = self.image_signature_object_id.get(&image_hash) {
            // Image was already added so we can reuse it.
            return Ok(image.clone());
        }
        // Image was not added already so we need to add it in full
        let (object_id, aspect_ratio) = self.raw_document.add_image(signature_png)?;
        let image = EmbeddedImage {
            object_id,
            name: format!("SignatureStamp{}", object_id.0),
            aspect_ratio,
        };
        self.image_signature_object_id.insert(image_hash, image.clone());
        Ok(image)
    }
}

/// Draw `signature_png` into every area of `pdf_bytes` and return the new PDF.
pub fn embed_signature(
    pdf_bytes: &[u8],
    signature_png: &[u8],
    areas: &[SignatureArea],
) -> Result<Vec<u8>, Error> {
    embed_signature_with_options(pdf_bytes, signature_png, areas, &SigningOptions::default())
}

pub fn embed_signature_with_options(
    pdf_bytes: &[u8],
    signature_png: &[u8],
    areas: &[SignatureArea],
    options: &SigningOptions,
) -> Result<Vec<u8>, Error> {
    let mut pdf_signing_document = PDFSigningDocument::read_from(pdf_bytes)?;
    pdf_signing_document.embed_signature(signature_png, areas, options)?;
    pdf_signing_document.into_bytes()
}

pub fn page_count(pdf_bytes: &[u8]) -> Result<usize, Error> {
    Ok(PDFSigningDocument::read_from(pdf_bytes)?.page_count())
}

pub fn page_dimensions(pdf_bytes: &[u8], page: u32) -> Result<PageBox, Error> {
    PDFSigningDocument::read_from(pdf_bytes)?.page_dimensions(page)
}


#[cfg(test)]
mod tests {
    use super::test_support::{create_test_pdf, solid_png};
    use super::*;
    use lopdf::Object;
    use pretty_assertions::assert_eq;

    fn area(page: u32, x: f64, y: f64, width: f64, height: f64) -> SignatureArea {
        SignatureArea {
            page,
            x,
            y,
            width,
            height,
        }
    }

    fn number(obj: &Object) -> f64 {
        match *obj {
            Object::Integer(value) => value as f64,
            Object::Real(value) => value as f64,
            _ => panic!("not a number: {:?}", obj),
        }
    }

    /// `cm` operands of every placement on `page`, in drawing order.
    fn placements(pdf: &[u8], page: u32) -> Vec<Vec<f64>> {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = doc.get_pages()[&page];
        let content = doc.get_and_decode_page_content(page_id).unwrap();
        content
            .operations
            .iter()
            .filter(|op| op.operator == "cm")
            .map(|op| op.operands.iter().map(number).collect())
            .collect()
    }

    fn image_objects(pdf: &[u8]) -> usize {
        let doc = Document::load_mem(pdf).unwrap();
        doc.objects
            .values()
            .filter(|obj| match obj.as_stream() {
                Ok(stream) => stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|subtype| subtype.as_name())
                    .map(|name| name == b"Image")
                    .unwrap_or(false),
                Err(_) => false,
            })
            .count()
    }

    #[test]
    fn letter_page_placement() {
        let pdf = create_test_pdf(1, 612, 792);
        let signature = solid_png(200, 100, [0, 0, 0, 255]);
        let result =
            embed_signature(&pdf, &signature, &[area(1, 50.0, 50.0, 100.0, 40.0)]).unwrap();

        assert!(result.starts_with(b"%PDF-"));
        assert_eq!(
            placements(&result, 1),
            vec![vec![80.0, 0.0, 0.0, 40.0, 50.0, 702.0]]
        );
    }

    #[test]
    fn out_of_range_page_fails() {
        let pdf = create_test_pdf(3, 612, 792);
        let signature = solid_png(10, 10, [0, 0, 0, 255]);
        let err =
            embed_signature(&pdf, &signature, &[area(5, 0.0, 0.0, 10.0, 10.0)]).unwrap_err();
        assert!(matches!(
            err,
            Error::PageIndex {
                page: 5,
                page_count: 3
            }
        ));
        let err =
            embed_signature(&pdf, &signature, &[area(0, 0.0, 0.0, 10.0, 10.0)]).unwrap_err();
        assert!(matches!(err, Error::PageIndex { page: 0, .. }));
    }

    #[test]
    fn many_areas_on_one_page_share_one_image() {
        let pdf = create_test_pdf(1, 612, 792);
        let signature = solid_png(100, 50, [0, 0, 0, 255]);
        let areas = [
            area(1, 10.0, 10.0, 100.0, 50.0),
            area(1, 200.0, 300.0, 50.0, 50.0),
            area(1, 400.0, 600.0, 60.0, 30.0),
        ];
        let result = embed_signature(&pdf, &signature, &areas).unwrap();

        assert_eq!(
            placements(&result, 1),
            vec![
                vec![100.0, 0.0, 0.0, 50.0, 10.0, 732.0],
                vec![50.0, 0.0, 0.0, 25.0, 200.0, 467.0],
                vec![60.0, 0.0, 0.0, 30.0, 400.0, 162.0],
            ]
        );
        // One color image plus its soft mask, no matter how many areas.
        assert_eq!(image_objects(&result), 2);
    }

    #[test]
    fn areas_across_pages() {
        let pdf = create_test_pdf(3, 612, 792);
        let signature = solid_png(100, 100, [0, 0, 0, 255]);
        let areas = [area(3, 0.0, 0.0, 20.0, 20.0), area(1, 0.0, 0.0, 40.0, 40.0)];
        let result = embed_signature(&pdf, &signature, &areas).unwrap();

        assert_eq!(
            placements(&result, 1),
            vec![vec![40.0, 0.0, 0.0, 40.0, 0.0, 752.0]]
        );
        assert!(placements(&result, 2).is_empty());
        assert_eq!(
            placements(&result, 3),
            vec![vec![20.0, 0.0, 0.0, 20.0, 0.0, 772.0]]
        );
        assert_eq!(image_objects(&result), 2);
    }

    #[test]
    fn existing_page_text_survives() {
        let pdf = create_test_pdf(1, 612, 792);
        let signature = solid_png(10, 10, [0, 0, 0, 255]);
        let result =
            embed_signature(&pdf, &signature, &[area(1, 0.0, 0.0, 10.0, 10.0)]).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let page_id = doc.get_pages()[&1];
        let operators: Vec<String> = doc
            .get_and_decode_page_content(page_id)
            .unwrap()
            .operations
            .into_iter()
            .map(|op| op.operator)
            .collect();
        assert!(operators.contains(&"Tj".to_owned()));
        assert_eq!(operators.first().map(String::as_str), Some("q"));
        assert_eq!(operators.last().map(String::as_str), Some("Q"));
    }

    #[test]
    fn corrupt_inputs_fail() {
        let pdf = create_test_pdf(1, 612, 792);
        let signature = solid_png(10, 10, [0, 0, 0, 255]);
        let areas = [area(1, 0.0, 0.0, 10.0, 10.0)];

        let err = embed_signature(b"definitely not a pdf", &signature, &areas).unwrap_err();
        assert!(matches!(err, Error::PdfDecode(_)));
        let err = embed_signature(&pdf, b"not an image", &areas).unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
    }

    #[test]
    fn malformed_media_box_is_a_pdf_decode_error() {
        let mut doc = Document::load_mem(&create_test_pdf(1, 612, 792)).unwrap();
        let page_id = doc.get_pages()[&1];
        doc.get_dictionary_mut(page_id).unwrap().set(
            "MediaBox",
            vec![0.into(), 0.into(), Object::Name(b"Bogus".to_vec()), 792.into()],
        );
        let mut pdf = Vec::new();
        doc.save_to(&mut pdf).unwrap();
        let signature = solid_png(10, 10, [0, 0, 0, 255]);

        let err =
            embed_signature(&pdf, &signature, &[area(1, 0.0, 0.0, 10.0, 10.0)]).unwrap_err();
        assert!(matches!(err, Error::PdfDecode(_)), "{:?}", err);
        let err = page_dimensions(&pdf, 1).unwrap_err();
        assert!(matches!(err, Error::PdfDecode(_)), "{:?}", err);
    }

    #[test]
    fn embedded_image_is_compressed() {
        let pdf = create_test_pdf(1, 612, 792);
        let signature = solid_png(300, 100, [0, 0, 0, 255]);
        let result =
            embed_signature(&pdf, &signature, &[area(1, 0.0, 0.0, 30.0, 10.0)]).unwrap();

        let doc = Document::load_mem(&result).unwrap();
        let images: Vec<&lopdf::Stream> = doc
            .objects
            .values()
            .filter_map(|obj| obj.as_stream().ok())
            .filter(|stream| {
                stream
                    .dict
                    .get(b"Subtype")
                    .and_then(|subtype| subtype.as_name())
                    .map(|name| name == b"Image")
                    .unwrap_or(false)
            })
            .collect();
        assert_eq!(images.len(), 2);
        for image in images {
            assert_eq!(
                image.dict.get(b"Filter").unwrap().as_name().unwrap(),
                b"FlateDecode"
            );
            // 300x100 raw RGB would be 90000 bytes.
            assert!(image.content.len() < 10_000);
        }
    }

    #[test]
    fn failed_embed_leaves_document_untouched() {
        let pdf = create_test_pdf(1, 612, 792);
        let mut document = PDFSigningDocument::read_from(&*pdf).unwrap();
        let objects_before = document.get_document_ref().objects.len();

        let err = document
            .embed_signature(
                b"not an image",
                &[area(1, 0.0, 0.0, 10.0, 10.0)],
                &SigningOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ImageDecode(_)));
        assert_eq!(document.get_document_ref().objects.len(), objects_before);
    }

    #[test]
    fn same_signature_is_embedded_once_across_calls() {
        let pdf = create_test_pdf(2, 612, 792);
        let signature = solid_png(10, 10, [0, 0, 0, 255]);
        let mut document = PDFSigningDocument::read_from(&*pdf).unwrap();
        let options = SigningOptions::default();
        document
            .embed_signature(&signature, &[area(1, 0.0, 0.0, 10.0, 10.0)], &options)
            .unwrap();
        document
            .embed_signature(&signature, &[area(2, 0.0, 0.0, 10.0, 10.0)], &options)
            .unwrap();

        assert_eq!(image_objects(&document.into_bytes().unwrap()), 2);
    }

    #[test]
    fn preview_width_rescales_areas() {
        let pdf = create_test_pdf(1, 1000, 1000);
        let signature = solid_png(100, 50, [0, 0, 0, 255]);
        let options = SigningOptions {
            preview_width: Some(500.0),
            ..SigningOptions::default()
        };
        let result = embed_signature_with_options(
            &pdf,
            &signature,
            &[area(1, 10.0, 20.0, 100.0, 50.0)],
            &options,
        )
        .unwrap();

        assert_eq!(
            placements(&result, 1),
            vec![vec![200.0, 0.0, 0.0, 100.0, 20.0, 860.0]]
        );
    }

    #[test]
    fn page_queries() {
        let pdf = create_test_pdf(3, 595, 842);
        assert_eq!(page_count(&pdf).unwrap(), 3);
        assert_eq!(
            page_dimensions(&pdf, 2).unwrap(),
            PageBox {
                x: 0.0,
                y: 0.0,
                width: 595.0,
                height: 842.0,
            }
        );
        assert!(matches!(
            page_dimensions(&pdf, 4).unwrap_err(),
            Error::PageIndex { page: 4, .. }
        ));
    }
}
