//! WebP encoders.
//!
//! The converter talks to an encoder through [`WebpEncoder`] and never cares which backend
//! produced the bytes.

/// System `cwebp` encoder (lossy or lossless, honours quality and effort).
pub mod cwebp;
/// In-process lossless encoder built on the `image` crate.
pub mod lossless;

use std::path::Path;

use crate::foundation::error::{BackdropError, BackdropResult};

/// Settings handed to an encoder for every file in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeOpts {
    /// Lossy quality, 0..=100.
    pub quality: u8,
    /// Compression effort, 0 (fast) ..= 6 (smallest).
    pub effort: u8,
    /// Encode losslessly instead of at `quality`.
    pub lossless: bool,
}

impl Default for EncodeOpts {
    fn default() -> Self {
        Self {
            quality: 85,
            effort: 6,
            lossless: false,
        }
    }
}

impl EncodeOpts {
    pub fn validate(&self) -> BackdropResult<()> {
        if self.quality > 100 {
            return Err(BackdropError::validation(format!(
                "encode quality must be in 0..=100, got {}",
                self.quality
            )));
        }
        if self.effort > 6 {
            return Err(BackdropError::validation(format!(
                "encode effort must be in 0..=6, got {}",
                self.effort
            )));
        }
        Ok(())
    }
}

/// Encoder contract: read one raster file, write one WebP file.
///
/// Failures for a single file are reported as [`BackdropError::Encode`] so a batch can
/// carry on with the next file.
pub trait WebpEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, input: &Path, output: &Path) -> BackdropResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_quality_85_max_effort() {
        let opts = EncodeOpts::default();
        assert_eq!(opts.quality, 85);
        assert_eq!(opts.effort, 6);
        assert!(!opts.lossless);
        opts.validate().unwrap();
    }

    #[test]
    fn out_of_range_opts_are_rejected() {
        let hi_q = EncodeOpts {
            quality: 120,
            ..EncodeOpts::default()
        };
        assert!(hi_q.validate().is_err());

        let hi_e = EncodeOpts {
            effort: 9,
            ..EncodeOpts::default()
        };
        assert!(hi_e.validate().is_err());
    }
}
