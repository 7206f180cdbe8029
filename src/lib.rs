//! Random site backgrounds with WebP conversion and legacy fallbacks.
//!
//! Offline, [`optimize_site`] converts a directory of raster images to WebP and writes a
//! fallback stylesheet plus a capability-detection script; [`verify_site`] checks that every
//! WebP file still has a legacy counterpart. At page load, a [`BackgroundSelector`] picks one
//! configured [`FallbackPair`], probes WebP support and commits the matching path.
#![forbid(unsafe_code)]

pub mod artifacts;
pub mod assets;
pub mod client;
pub mod config;
pub mod encode;
mod foundation;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod verify;

pub use artifacts::{
    ArtifactPaths, css_class_name, render_detection_script, render_fallback_css, write_artifacts,
};
pub use assets::{SUPPORTED_EXTENSIONS, is_supported_image, list_images};
pub use client::probe::{CapabilityProbe, DecodeProbe, FixedProbe, TimeoutProbe};
pub use client::selector::{
    BACKGROUND_PROPERTY, BackgroundSelector, FsImageLoader, ImageLoader, SelectionOutcome,
    StyleTarget, StyleVars, apply_pair, pick_index,
};
pub use config::{BackgroundEntry, CONFIG_FILE_NAME, SiteConfig};
pub use encode::{
    EncodeOpts, WebpEncoder,
    cwebp::{CwebpEncoder, is_cwebp_on_path},
    lossless::LosslessEncoder,
};
pub use foundation::error::{BackdropError, BackdropResult};
pub use model::{
    ConversionFailure, ConversionResult, FallbackPair, ImageAsset, derive_legacy_path,
    savings_percent,
};
pub use pipeline::{
    BatchReport, BatchTotals, ConvertThreading, OptimizeOutcome, convert_batch, convert_one,
    optimize_site,
};
pub use verify::{VerifyReport, VerifyTargets, verify_site};
