use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    artifacts::{ArtifactPaths, write_artifacts},
    assets::list_images,
    config::SiteConfig,
    encode::WebpEncoder,
    foundation::error::{BackdropError, BackdropResult},
    model::{ConversionFailure, ConversionResult, ImageAsset, savings_percent},
};

/// How a batch is scheduled. Results come back in enumeration order either way.
#[derive(Clone, Debug, Default)]
pub struct ConvertThreading {
    pub parallel: bool,
    pub threads: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchTotals {
    pub converted: usize,
    pub failed: usize,
    pub original_bytes: u64,
    pub modern_bytes: u64,
    pub savings_percent: f64,
}

impl BatchTotals {
    /// Bytes saved across the batch; negative if the output grew.
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.modern_bytes as i64
    }
}

#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ConversionResult>,
    pub failures: Vec<ConversionFailure>,
}

impl BatchReport {
    pub fn totals(&self) -> BatchTotals {
        let original_bytes: u64 = self.results.iter().map(|r| r.original_size_bytes).sum();
        let modern_bytes: u64 = self.results.iter().map(|r| r.modern_size_bytes).sum();
        BatchTotals {
            converted: self.results.len(),
            failed: self.failures.len(),
            original_bytes,
            modern_bytes,
            savings_percent: savings_percent(original_bytes, modern_bytes),
        }
    }
}

/// Convert one asset into `out_dir/<stem>.webp`.
///
/// Every failure here is specific to this file and comes back as [`BackdropError::Encode`].
pub fn convert_one(
    asset: &ImageAsset,
    out_dir: &Path,
    encoder: &dyn WebpEncoder,
) -> BackdropResult<ConversionResult> {
    let original_name = asset.file_name();
    let modern_name = asset.modern_name();
    let out_path = output_path_for(asset, out_dir);

    let original_size = std::fs::metadata(&asset.source_path)
        .map_err(|e| BackdropError::encode(format!("stat '{original_name}': {e}")))?
        .len();

    if let Err(e) = encoder.encode(&asset.source_path, &out_path) {
        remove_partial(&out_path);
        return Err(e);
    }

    let modern_size = std::fs::metadata(&out_path)
        .map_err(|e| BackdropError::encode(format!("stat '{}': {e}", out_path.display())))?
        .len();

    Ok(ConversionResult::new(
        original_name,
        modern_name,
        original_size,
        modern_size,
    ))
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(e) = std::fs::remove_file(path)
    {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial output");
    }
}

/// For each asset, the earlier asset that already claims the same output name, if any.
fn output_owners(assets: &[ImageAsset]) -> Vec<Option<String>> {
    let mut owners: HashMap<String, String> = HashMap::with_capacity(assets.len());
    assets
        .iter()
        .map(|asset| match owners.get(&asset.modern_name()) {
            Some(owner) => Some(owner.clone()),
            None => {
                owners.insert(asset.modern_name(), asset.file_name());
                None
            }
        })
        .collect()
}

fn convert_unclaimed(
    asset: &ImageAsset,
    owner: Option<&str>,
    out_dir: &Path,
    encoder: &dyn WebpEncoder,
) -> BackdropResult<ConversionResult> {
    match owner {
        Some(owner) => Err(BackdropError::encode(format!(
            "output '{}' is already produced by '{owner}'",
            asset.modern_name()
        ))),
        None => convert_one(asset, out_dir, encoder),
    }
}

/// Convert every asset into `out_dir`, creating it if needed.
///
/// A per-file encode failure is logged and recorded in the report; the batch carries on.
/// Assets sharing a stem map to one output file: the first in enumeration order is converted
/// and the rest are recorded as failures. Any other error is fatal and returned.
#[tracing::instrument(skip(assets, encoder), fields(encoder = encoder.name(), files = assets.len()))]
pub fn convert_batch(
    assets: &[ImageAsset],
    out_dir: &Path,
    encoder: &dyn WebpEncoder,
    threading: &ConvertThreading,
) -> BackdropResult<BatchReport> {
    ensure_dir(out_dir)?;

    let owners = output_owners(assets);
    let outcomes: Vec<BackdropResult<ConversionResult>> = if threading.parallel {
        let pool = build_thread_pool(threading.threads)?;
        pool.install(|| {
            assets
                .par_iter()
                .zip(owners.par_iter())
                .map(|(asset, owner)| {
                    convert_unclaimed(asset, owner.as_deref(), out_dir, encoder)
                })
                .collect()
        })
    } else {
        assets
            .iter()
            .zip(&owners)
            .map(|(asset, owner)| convert_unclaimed(asset, owner.as_deref(), out_dir, encoder))
            .collect()
    };

    let mut report = BatchReport::default();
    for (asset, outcome) in assets.iter().zip(outcomes) {
        match outcome {
            Ok(result) => {
                tracing::info!(
                    file = %result.original_name,
                    webp = %result.modern_name,
                    original_bytes = result.original_size_bytes,
                    webp_bytes = result.modern_size_bytes,
                    savings = result.savings_percent,
                    "converted"
                );
                report.results.push(result);
            }
            Err(e) if !e.is_fatal() => {
                tracing::warn!(file = %asset.file_name(), error = %e, "conversion failed");
                report.failures.push(ConversionFailure {
                    original_name: asset.file_name(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

pub(crate) fn ensure_dir(dir: &Path) -> BackdropResult<()> {
    if dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| BackdropError::io(dir, e))?;
    tracing::info!(dir = %dir.display(), "created output directory");
    Ok(())
}

fn build_thread_pool(threads: Option<usize>) -> BackdropResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(BackdropError::validation(
            "convert threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BackdropError::validation(format!("failed to build rayon thread pool: {e}")))
}

/// Everything one `optimize` run produced.
#[derive(Debug)]
pub struct OptimizeOutcome {
    pub found: usize,
    pub report: BatchReport,
    /// `None` when there was nothing to convert.
    pub artifacts: Option<ArtifactPaths>,
}

/// Enumerate, convert and write the stylesheet and detection script for a site.
///
/// `cfg` must already be resolved against the site root.
pub fn optimize_site(
    cfg: &SiteConfig,
    encoder: &dyn WebpEncoder,
    threading: &ConvertThreading,
) -> BackdropResult<OptimizeOutcome> {
    let assets = list_images(&cfg.images_dir)?;
    tracing::info!(dir = %cfg.images_dir.display(), found = assets.len(), "enumerated images");

    if assets.is_empty() {
        return Ok(OptimizeOutcome {
            found: 0,
            report: BatchReport::default(),
            artifacts: None,
        });
    }

    let report = convert_batch(&assets, &cfg.webp_dir, encoder, threading)?;
    let artifacts = write_artifacts(&report.results, cfg)?;

    Ok(OptimizeOutcome {
        found: assets.len(),
        report,
        artifacts: Some(artifacts),
    })
}

/// Output path for `asset` under `out_dir`.
pub fn output_path_for(asset: &ImageAsset, out_dir: &Path) -> PathBuf {
    out_dir.join(asset.modern_name())
}
