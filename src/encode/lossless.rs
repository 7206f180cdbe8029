use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::encode::WebpEncoder;
use crate::foundation::error::{BackdropError, BackdropResult};

/// Lossless WebP through `image`'s built-in encoder.
///
/// Needs no external tools and is deterministic. Quality and effort do not apply.
#[derive(Clone, Copy, Debug, Default)]
pub struct LosslessEncoder;

impl LosslessEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl WebpEncoder for LosslessEncoder {
    fn name(&self) -> &'static str {
        "lossless"
    }

    fn encode(&self, input: &Path, output: &Path) -> BackdropResult<()> {
        let img = image::open(input)
            .map_err(|e| BackdropError::encode(format!("decode '{}': {e}", input.display())))?;
        let rgba = image::DynamicImage::ImageRgba8(img.to_rgba8());

        let f = File::create(output).map_err(|e| {
            BackdropError::encode(format!("create '{}': {e}", output.display()))
        })?;
        let encoder = image::codecs::webp::WebPEncoder::new_lossless(BufWriter::new(f));
        rgba.write_with_encoder(encoder).map_err(|e| {
            BackdropError::encode(format!("encode '{}': {e}", input.display()))
        })?;
        Ok(())
    }
}
