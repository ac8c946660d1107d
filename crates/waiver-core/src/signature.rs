//! Freehand signature capture payload
//!
//! The signature pad hands over a PNG (usually as a `data:` URL). We decode it
//! once, up front, so that a bad image is rejected when it is captured rather
//! than halfway through rendering the waiver.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use crate::error::WaiverError;

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Decoded 8-bit raster, split into colour and alpha planes the way a PDF
/// image XObject and its soft mask want them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` RGB samples
    pub rgb: Vec<u8>,
    /// `width * height` alpha samples, when the source had an alpha channel
    pub alpha: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureImage {
    png: Vec<u8>,
    raster: RasterImage,
}

impl SignatureImage {
    pub fn from_png(png: Vec<u8>) -> Result<Self, WaiverError> {
        if png.len() < PNG_MAGIC.len() || !png.starts_with(&PNG_MAGIC) {
            return Err(WaiverError::InvalidSignature(
                "Invalid PNG magic bytes".to_string(),
            ));
        }
        let raster = decode_png(&png)?;
        Ok(Self { png, raster })
    }

    /// Parse the `data:image/png;base64,...` form produced by canvas export.
    pub fn from_data_url(url: &str) -> Result<Self, WaiverError> {
        let encoded = url.trim().strip_prefix(DATA_URL_PREFIX).ok_or_else(|| {
            WaiverError::InvalidSignature("expected a base64 PNG data URL".to_string())
        })?;
        let png = BASE64
            .decode(encoded)
            .map_err(|e| WaiverError::InvalidSignature(format!("Invalid base64: {}", e)))?;
        Self::from_png(png)
    }

    pub fn to_data_url(&self) -> String {
        format!("{}{}", DATA_URL_PREFIX, BASE64.encode(&self.png))
    }

    pub fn as_png(&self) -> &[u8] {
        &self.png
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }
}

fn decode_png(bytes: &[u8]) -> Result<RasterImage, WaiverError> {
    let mut decoder = png::Decoder::new(bytes);
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| WaiverError::InvalidSignature(e.to_string()))?;

    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e| WaiverError::InvalidSignature(e.to_string()))?;
    buf.truncate(info.buffer_size());

    if info.width == 0 || info.height == 0 {
        return Err(WaiverError::InvalidSignature("empty image".to_string()));
    }

    let pixels = (info.width as usize) * (info.height as usize);
    let (rgb, alpha) = match info.color_type {
        png::ColorType::Rgb => (buf, None),
        png::ColorType::Rgba => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in buf.chunks_exact(4) {
                rgb.extend_from_slice(&px[..3]);
                alpha.push(px[3]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Grayscale => {
            let rgb = buf.iter().flat_map(|&g| [g, g, g]).collect();
            (rgb, None)
        }
        png::ColorType::GrayscaleAlpha => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            let mut alpha = Vec::with_capacity(pixels);
            for px in buf.chunks_exact(2) {
                rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                alpha.push(px[1]);
            }
            (rgb, Some(alpha))
        }
        png::ColorType::Indexed => {
            // normalize_to_color8 expands palettes, so this only shows up for
            // a malformed file
            return Err(WaiverError::InvalidSignature(
                "unexpanded palette image".to_string(),
            ));
        }
    };

    if rgb.len() != pixels * 3 {
        return Err(WaiverError::InvalidSignature(
            "truncated image data".to_string(),
        ));
    }

    Ok(RasterImage {
        width: info.width,
        height: info.height,
        rgb,
        alpha,
    })
}

/// Black strokes on a transparent background, like a signature pad export.
#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; (width * height * 4) as usize];
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        if i % 7 == 0 {
            px[3] = 255;
        }
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&data).unwrap();
    }
    out
}
