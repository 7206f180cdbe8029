use std::io::Cursor;

use anyhow::Context;

use crate::foundation::error::BackdropResult;

/// Pixel size of a fully decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedSize {
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` in full and report the resulting dimensions.
///
/// Header-only probing is not enough here: a client that can parse a header but not the
/// bitstream must still count as unable to decode.
pub fn decode_size(bytes: &[u8]) -> BackdropResult<DecodedSize> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("sniff image format")?
        .decode()
        .context("decode image from memory")?;
    Ok(DecodedSize {
        width: img.width(),
        height: img.height(),
    })
}
