//! Preview redaction.
//!
//! Every page keeps its upper half readable. The lower half is painted over
//! with an opaque fill, then hand-drawn-looking marker bands, then an
//! optional faint diagonal watermark. The original content stream is wrapped
//! in `q`/`Q` so the overlay always draws in default page space.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rand::Rng;
use thiserror::Error;

const EXT_GSTATE_STROKE: &str = "GSPreview";
const EXT_GSTATE_MARK: &str = "GSPreviewMark";
const WATERMARK_FONT: &str = "FPreview";
const WATERMARK_OPACITY: f32 = 0.25;
/// Bound on Parent hops while resolving inherited page attributes.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("unreadable pdf: {0}")]
    Parse(String),
    #[error("page {0} has no usable MediaBox")]
    MissingMediaBox(u32),
    #[error("malformed pdf: {0}")]
    Malformed(String),
    #[error("failed to encode preview: {0}")]
    Encode(String),
}

#[derive(Debug, Clone)]
pub struct RedactionPolicy {
    pub passes: u32,
    pub stroke_opacity: f32,
    /// Horizontal margin on each side, as a fraction of the page width.
    pub margin_ratio: f32,
    /// Maximum random offset applied to band end-points, in points.
    pub wobble: f32,
    pub watermark: Option<String>,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            passes: 6,
            stroke_opacity: 0.85,
            margin_ratio: 0.05,
            wobble: 5.0,
            watermark: Some("PREVIEW".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PageBox {
    llx: f32,
    lly: f32,
    urx: f32,
    ury: f32,
}

impl PageBox {
    fn width(&self) -> f32 {
        self.urx - self.llx
    }

    fn half_height(&self) -> f32 {
        (self.ury - self.lly) / 2.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewRedactor {
    policy: RedactionPolicy,
}

impl PreviewRedactor {
    pub fn new(policy: RedactionPolicy) -> Self {
        Self { policy }
    }

    pub fn redact(&self, pdf: &[u8]) -> Result<Vec<u8>, PreviewError> {
        self.redact_with_rng(pdf, &mut rand::thread_rng())
    }

    pub fn redact_with_rng<R: Rng>(
        &self,
        pdf: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, PreviewError> {
        let mut doc = Document::load_mem(pdf).map_err(|e| PreviewError::Parse(e.to_string()))?;

        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        if pages.is_empty() {
            return Err(PreviewError::Malformed("document has no pages".to_string()));
        }

        for (number, page_id) in pages {
            let page_box = media_box(&doc, page_id).ok_or(PreviewError::MissingMediaBox(number))?;
            let resources = self.page_resources(&doc, page_id);
            let existing = existing_contents(&doc, page_id)?;

            let mut operations = vec![Operation::new("Q", vec![])];
            operations.extend(self.overlay(page_box, rng));
            // Leading newline keeps the `Q` apart from the last operator of
            // the previous stream.
            let mut overlay = b"\n".to_vec();
            overlay.extend(
                Content { operations }
                    .encode()
                    .map_err(|e| PreviewError::Encode(e.to_string()))?,
            );

            let prefix_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            let overlay_id = doc.add_object(Stream::new(dictionary! {}, overlay));

            let mut contents = Vec::with_capacity(existing.len() + 2);
            contents.push(Object::Reference(prefix_id));
            contents.extend(existing);
            contents.push(Object::Reference(overlay_id));

            let page = doc
                .get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .map_err(|e| PreviewError::Malformed(format!("page {}: {}", number, e)))?;
            page.set("Contents", Object::Array(contents));
            page.set("Resources", Object::Dictionary(resources));
        }

        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|e| PreviewError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// The page's effective resources, copied inline with the overlay's
    /// graphics states and font added.
    fn page_resources(&self, doc: &Document, page_id: ObjectId) -> Dictionary {
        let mut resources = inherited(doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default();

        let mut ext_gstates = sub_dictionary(doc, &resources, b"ExtGState");
        ext_gstates.set(EXT_GSTATE_STROKE, ext_gstate(self.policy.stroke_opacity));
        ext_gstates.set(EXT_GSTATE_MARK, ext_gstate(WATERMARK_OPACITY));
        resources.set("ExtGState", Object::Dictionary(ext_gstates));

        if self.policy.watermark.is_some() {
            let mut fonts = sub_dictionary(doc, &resources, b"Font");
            fonts.set(
                WATERMARK_FONT,
                dictionary! {
                    "Type" => Object::Name(b"Font".to_vec()),
                    "Subtype" => Object::Name(b"Type1".to_vec()),
                    "BaseFont" => Object::Name(b"Helvetica-Bold".to_vec()),
                },
            );
            resources.set("Font", Object::Dictionary(fonts));
        }

        resources
    }

    fn overlay<R: Rng>(&self, page: PageBox, rng: &mut R) -> Vec<Operation> {
        let width = page.width();
        let half = page.half_height();
        let mut ops = Vec::new();

        // Opaque base so nothing underneath survives at any stroke opacity.
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("g", vec![real(1.0)]));
        ops.push(Operation::new(
            "re",
            vec![real(page.llx), real(page.lly), real(width), real(half)],
        ));
        ops.push(Operation::new("f", vec![]));

        ops.push(Operation::new(
            "re",
            vec![real(page.llx), real(page.lly), real(width), real(half)],
        ));
        ops.push(Operation::new("W", vec![]));
        ops.push(Operation::new("n", vec![]));

        let passes = self.policy.passes.max(1);
        let spacing = half / passes as f32;
        let wobble = self.policy.wobble.min(spacing * 0.25).max(0.0);
        let margin = width * self.policy.margin_ratio;
        let top = page.lly + half;

        ops.push(Operation::new("gs", vec![name(EXT_GSTATE_STROKE)]));
        ops.push(Operation::new(
            "RG",
            vec![real(0.08), real(0.08), real(0.08)],
        ));
        ops.push(Operation::new("J", vec![Object::Integer(1)]));

        for pass in 0..passes {
            let y = top - spacing * (pass as f32 + 0.5);
            let thickness = spacing * rng.gen_range(1.2..1.5);
            let x0 = page.llx + margin + jitter(rng, wobble);
            let y0 = y + jitter(rng, wobble);
            let x1 = page.urx - margin + jitter(rng, wobble);
            let y1 = y + jitter(rng, wobble);

            ops.push(Operation::new("w", vec![real(thickness)]));
            ops.push(Operation::new("m", vec![real(x0), real(y0)]));
            ops.push(Operation::new("l", vec![real(x1), real(y1)]));
            ops.push(Operation::new("S", vec![]));
        }

        if let Some(text) = &self.policy.watermark {
            let angle = 30f32.to_radians();
            let (sin, cos) = angle.sin_cos();
            let size = (width * 0.12).max(12.0);
            ops.push(Operation::new("gs", vec![name(EXT_GSTATE_MARK)]));
            ops.push(Operation::new("g", vec![real(0.5)]));
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec![name(WATERMARK_FONT), real(size)]));
            ops.push(Operation::new(
                "Tm",
                vec![
                    real(cos),
                    real(sin),
                    real(-sin),
                    real(cos),
                    real(page.llx + width * 0.2),
                    real(page.lly + half * 0.25),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ));
            ops.push(Operation::new("ET", vec![]));
        }

        ops.push(Operation::new("Q", vec![]));
        ops
    }
}

fn jitter<R: Rng>(rng: &mut R, amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        0.0
    } else {
        rng.gen_range(-amplitude..amplitude)
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn ext_gstate(opacity: f32) -> Dictionary {
    dictionary! {
        "Type" => Object::Name(b"ExtGState".to_vec()),
        "CA" => real(opacity),
        "ca" => real(opacity),
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute, following Parent links for inheritable keys.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_object(parent).ok()?.as_dict().ok()?;
    }
    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let values = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let coords: Vec<f32> = values
        .iter()
        .map(|v| number(resolve(doc, v)))
        .collect::<Option<_>>()?;

    let page_box = PageBox {
        llx: coords[0].min(coords[2]),
        lly: coords[1].min(coords[3]),
        urx: coords[0].max(coords[2]),
        ury: coords[1].max(coords[3]),
    };
    (page_box.width() > 0.0 && page_box.half_height() > 0.0).then_some(page_box)
}

fn sub_dictionary(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .map(|obj| resolve(doc, obj))
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// The page's content stream references, in drawing order.
fn existing_contents(doc: &Document, page_id: ObjectId) -> Result<Vec<Object>, PreviewError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PreviewError::Malformed(e.to_string()))?;

    let contents = match page.get(b"Contents") {
        Ok(contents) => contents,
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Array(items) => Ok(items.clone()),
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => Ok(items.clone()),
            Ok(Object::Stream(_)) => Ok(vec![Object::Reference(*id)]),
            Ok(_) => Err(PreviewError::Malformed("unexpected Contents object".to_string())),
            Err(e) => Err(PreviewError::Malformed(e.to_string())),
        },
        _ => Err(PreviewError::Malformed("unexpected Contents object".to_string())),
    }
}
