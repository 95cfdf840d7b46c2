use crate::Error;
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Guards against `Parent` cycles in broken page trees.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// US Letter, used when a page tree carries no `MediaBox` at all.
const FALLBACK_MEDIA_BOX: PageBox = PageBox {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

pub(super) trait PdfObjectDeref {
    fn deref<'a>(&'a self, doc: &'a Document) -> Result<&'a Object, Error>;

    fn get_object_id(&self) -> Option<ObjectId>;

    fn as_number(&self, doc: &Document) -> Result<f64, Error>;
}

impl PdfObjectDeref for Object {
    fn deref<'a>(&'a self, doc: &'a Document) -> Result<&'a Object, Error> {
        match *self {
            Object::Reference(oid) => doc
                .objects
                .get(&oid)
                .ok_or(Error::PdfDecode(lopdf::Error::ObjectNotFound)),
            _ => Ok(self),
        }
    }

    fn get_object_id(&self) -> Option<ObjectId> {
        match *self {
            Object::Reference(ref id) => Some(*id),
            _ => None,
        }
    }

    fn as_number(&self, doc: &Document) -> Result<f64, Error> {
        match *self.deref(doc)? {
            Object::Integer(value) => Ok(value as f64),
            Object::Real(value) => Ok(value as f64),
            _ => Err(Error::PdfDecode(lopdf::Error::Type)),
        }
    }
}

/// Visible area of a page in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    /// Lower-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, Error> {
    let mut node_id = page_id;
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).map_err(Error::PdfDecode)?;
        if let Ok(value) = node.get(key) {
            return Ok(Some(value.deref(doc)?));
        }
        match node.get(b"Parent").ok().and_then(|parent| parent.get_object_id()) {
            Some(parent_id) => node_id = parent_id,
            None => return Ok(None),
        }
    }
    log::warn!(
        "Page tree above ({}, {}) is too deep or cyclic.",
        page_id.0,
        page_id.1
    );
    Err(Error::PdfDecode(lopdf::Error::ReferenceLimit))
}

/// The page's `MediaBox`, normalized so width and height are positive.
pub(crate) fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox, Error> {
    let media_box = match inherited_attribute(doc, page_id, b"MediaBox")? {
        Some(media_box) => media_box.as_array().map_err(Error::PdfDecode)?,
        None => {
            log::warn!(
                "Page ({}, {}) has no `MediaBox`, assuming US Letter.",
                page_id.0,
                page_id.1
            );
            return Ok(FALLBACK_MEDIA_BOX);
        }
    };
    if media_box.len() < 4 {
        return Err(Error::PdfDecode(lopdf::Error::Syntax(format!(
            "`MediaBox` needs 4 numbers, found {}.",
            media_box.len()
        ))));
    }
    let x1 = media_box[0].as_number(doc)?;
    let y1 = media_box[1].as_number(doc)?;
    let x2 = media_box[2].as_number(doc)?;
    let y2 = media_box[3].as_number(doc)?;
    Ok(PageBox {
        x: x1.min(x2),
        y: y1.min(y2),
        width: (x2 - x1).abs(),
        height: (y2 - y1).abs(),
    })
}

/// Add `xobject_id` under `name` to the page's `/Resources /XObject` dictionary.
///
/// The resources the page uses (its own or inherited) are copied onto the
/// page itself first, so dictionaries shared with other pages stay untouched.
pub(crate) fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    xobject_id: ObjectId,
) -> Result<(), Error> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources")? {
        Some(resources) => resources.as_dict().map_err(Error::PdfDecode)?.clone(),
        None => Dictionary::new(),
    };
    let mut xobjects = match resources.get(b"XObject") {
        Ok(xobjects) => xobjects
            .deref(doc)?
            .as_dict()
            .map_err(Error::PdfDecode)?
            .clone(),
        Err(_) => Dictionary::new(),
    };
    xobjects.set(name, Object::Reference(xobject_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Content stream references of a page, in drawing order.
pub(crate) fn page_content_refs(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, Error> {
    let page = doc.get_dictionary(page_id).map_err(Error::PdfDecode)?;
    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };
    Ok(match contents {
        Object::Array(list) => list.clone(),
        Object::Reference(id) => match doc.get_object(*id).map_err(Error::PdfDecode)? {
            // Non-standard, but seen in the wild.
            Object::Array(list) => list.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    })
}
