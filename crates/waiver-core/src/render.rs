//! Encode a [`Layout`] as a PDF using lopdf

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::WaiverError;
use crate::layout::metrics::{win_ansi_byte, REPLACEMENT_BYTE};
use crate::layout::{Layout, Placement};
use crate::signature::{RasterImage, SignatureImage};

const FONT_RESOURCE: &str = "F1";
const IMAGE_RESOURCE: &str = "Im1";

/// Write `layout` as a PDF. Image placements are filled with `image`; a
/// layout with image placements but no image simply leaves the box empty.
pub fn render(layout: &Layout, image: Option<&SignatureImage>) -> Result<Vec<u8>, WaiverError> {
    let geometry = layout.geometry;
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let image_id = match image {
        Some(image) => Some(add_image(&mut doc, image.raster())?),
        None => None,
    };

    let mut kids = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let mut operations = Vec::new();
        let mut uses_image = false;

        for placement in &page.placements {
            match placement {
                Placement::Text {
                    x,
                    y,
                    font_size,
                    text,
                } => {
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new(
                        "Tf",
                        vec![FONT_RESOURCE.into(), real(*font_size)],
                    ));
                    operations.push(Operation::new(
                        "Td",
                        vec![real(*x), real(geometry.height - y)],
                    ));
                    operations.push(Operation::new(
                        "Tj",
                        vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
                    ));
                    operations.push(Operation::new("ET", vec![]));
                }
                Placement::Image {
                    x,
                    y,
                    width,
                    height,
                } => {
                    if image_id.is_none() {
                        continue;
                    }
                    uses_image = true;
                    // image space is the unit square; scale it onto the box,
                    // whose bottom edge sits at H - y - height in PDF space
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new(
                        "cm",
                        vec![
                            real(*width),
                            0.into(),
                            0.into(),
                            real(*height),
                            real(*x),
                            real(geometry.height - y - height),
                        ],
                    ));
                    operations.push(Operation::new(
                        "Do",
                        vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())],
                    ));
                    operations.push(Operation::new("Q", vec![]));
                }
            }
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| WaiverError::RenderError(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let mut resources = dictionary! {
            "Font" => dictionary! { FONT_RESOURCE => font_id },
        };
        if let (true, Some(image_id)) = (uses_image, image_id) {
            resources.set("XObject", dictionary! { IMAGE_RESOURCE => image_id });
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), real(geometry.width), real(geometry.height)],
            "Contents" => content_id,
            "Resources" => resources,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| WaiverError::RenderError(e.to_string()))?;
    Ok(output)
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

/// Add the raster as a Flate-compressed RGB image, with its alpha channel as
/// a soft mask so the transparent pad background stays transparent.
fn add_image(doc: &mut Document, raster: &RasterImage) -> Result<ObjectId, WaiverError> {
    let mut dict = image_dict(raster.width, raster.height, "DeviceRGB");

    if let Some(alpha) = &raster.alpha {
        let mask = Stream::new(
            image_dict(raster.width, raster.height, "DeviceGray"),
            deflate(alpha)?,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    Ok(doc.add_object(Stream::new(dict, deflate(&raster.rgb)?)))
}

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, WaiverError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| WaiverError::RenderError(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| WaiverError::RenderError(e.to_string()))
}

/// Map text onto WinAnsiEncoding, the byte encoding the standard Helvetica
/// font is declared with. Unmappable characters become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| win_ansi_byte(c).unwrap_or(REPLACEMENT_BYTE))
        .collect()
}
