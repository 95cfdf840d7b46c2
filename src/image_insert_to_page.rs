use crate::{image_xobject::ImageXObject, pdf_object, rectangle::Rectangle, Error};
use lopdf::{
    content::{Content, Operation},
    Document, Object, ObjectId, Stream,
};
use std::io::Read;

pub trait InsertImageToPage {
    fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId;

    fn add_xobject(
        &mut self,
        page_id: ObjectId,
        xobject_name: &str,
        xobject_id: ObjectId,
    ) -> Result<(), Error>;

    /// Draw `operations` on top of the existing page content.
    fn add_to_page_content(
        &mut self,
        page_id: ObjectId,
        content: Content<Vec<Operation>>,
    ) -> Result<(), Error>;

    /// Add image to pdf as XObject.
    /// The image will not be visible.
    /// Return the ObjectId of the image and its aspect ratio.
    fn add_image<R: Read>(&mut self, image_reader: R) -> Result<(ObjectId, f64), Error> {
        // Load image
        let image_decoder = png::Decoder::new(image_reader);
        let (mut image_xobject, mask_xobject) = ImageXObject::try_from(image_decoder)?;
        let aspect_ratio = image_xobject.aspect_ratio();
        // Add object to object list
        if let Some(mask_xobject) = mask_xobject {
            let mut mask_stream = Stream::from(mask_xobject);
            mask_stream.compress()?;
            let mask_xobject_id = self.add_object(mask_stream);
            image_xobject.s_mask = Some(mask_xobject_id);
        }
        let mut image_stream = Stream::from(image_xobject);
        image_stream.compress()?;
        let image_xobject_id = self.add_object(image_stream);

        Ok((image_xobject_id, aspect_ratio))
    }

    /// Draw an already added image on a page, once per rectangle.
    fn add_image_to_page_only(
        &mut self,
        image_xobject_id: ObjectId,
        image_name: &str,
        page_id: ObjectId,
        rects: &[Rectangle],
    ) -> Result<(), Error> {
        // Add object to xobject list on page.
        // Because of the unique name this item will not be inserted more then once.
        self.add_xobject(page_id, image_name, image_xobject_id)?;
        // Add xobject to layer (make visible)
        self.add_image_to_page_stream(image_name, page_id, rects)
    }

    /// Add image to page stream.
    /// The image must already be added to the object list of the page!
    /// Please use `add_image_to_page_only` instead.
    fn add_image_to_page_stream(
        &mut self,
        xobject_name: &str,
        page_id: ObjectId,
        rects: &[Rectangle],
    ) -> Result<(), Error> {
        use lopdf::Object::*;
        let mut content = Content {
            operations: Vec::<Operation>::with_capacity(rects.len() * 4),
        };
        for rect in rects {
            // The following lines use commands: see p643 (Table A.1) for more info
            // `q` = Save graphics state
            content.operations.push(Operation::new("q", vec![]));
            // `cm` = Concatenate matrix to current transformation matrix
            content.operations.push(Operation::new(
                "cm",
                vec![
                    Real(rect.width() as f32),
                    0i32.into(),
                    0i32.into(),
                    Real(rect.height() as f32),
                    Real(rect.x1 as f32),
                    Real(rect.y1 as f32),
                ],
            ));
            // `Do` = Invoke named XObject
            content.operations.push(Operation::new(
                "Do",
                vec![Name(xobject_name.as_bytes().to_vec())],
            ));
            // `Q` = Restore graphics state
            content.operations.push(Operation::new("Q", vec![]));
        }

        self.add_to_page_content(page_id, content)
    }
}

impl InsertImageToPage for Document {
    fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        Document::add_object(self, object)
    }

    fn add_xobject(
        &mut self,
        page_id: ObjectId,
        xobject_name: &str,
        xobject_id: ObjectId,
    ) -> Result<(), Error> {
        pdf_object::register_xobject(self, page_id, xobject_name, xobject_id)
    }

    fn add_to_page_content(
        &mut self,
        page_id: ObjectId,
        content: Content<Vec<Operation>>,
    ) -> Result<(), Error> {
        // Existing streams are kept as they are and wrapped in `q`/`Q`, so
        // whatever matrix they leave behind does not leak into our placement.
        let mut contents = pdf_object::page_content_refs(self, page_id)?;
        let save_id = Document::add_object(
            self,
            Stream::new(lopdf::Dictionary::new(), b"q\n".to_vec()),
        );
        let mut data = b"\nQ\n".to_vec();
        data.extend(content.encode()?);
        let draw_id = Document::add_object(self, Stream::new(lopdf::Dictionary::new(), data));

        contents.insert(0, Object::Reference(save_id));
        contents.push(Object::Reference(draw_id));
        self.get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Array(contents));
        Ok(())
    }
}
