use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::probe::DEFAULT_PROBE_TIMEOUT;
use crate::foundation::error::{BackdropError, BackdropResult};
use crate::model::{FallbackPair, derive_legacy_path};

/// Default file name looked up in the site root.
pub const CONFIG_FILE_NAME: &str = "backdrop.json";

/// One configured background. `legacy` may be omitted when it can be derived from `modern`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundEntry {
    pub modern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy: Option<String>,
}

/// Site layout, encoder settings and the single ordered list of backgrounds.
///
/// Relative paths resolve against the site root, see [`SiteConfig::resolve`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub images_dir: PathBuf,
    pub webp_dir: PathBuf,
    pub legacy_dir: PathBuf,
    pub css_path: PathBuf,
    pub script_path: PathBuf,
    pub selector_script: PathBuf,
    pub page_path: PathBuf,

    pub legacy_url_prefix: String,
    pub modern_url_prefix: String,

    pub quality: u8,
    pub effort: u8,
    pub lossless: bool,

    pub probe_timeout_ms: u64,
    /// WebP images the detection script preloads once support is confirmed.
    pub critical_images: Vec<String>,

    /// Directory segment swapped out when deriving a legacy path (`webp`).
    pub modern_segment: String,
    /// Replacement directory segment for derived legacy paths (`old`).
    pub legacy_segment: String,
    /// Extension given to derived legacy paths.
    pub legacy_extension: String,

    pub backgrounds: Vec<BackgroundEntry>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("assets/images"),
            webp_dir: PathBuf::from("assets/images/webp"),
            legacy_dir: PathBuf::from("assets/images/old"),
            css_path: PathBuf::from("css/webp-fallbacks.css"),
            script_path: PathBuf::from("js/webp-detection.js"),
            selector_script: PathBuf::from("js/background.js"),
            page_path: PathBuf::from("index.html"),
            legacy_url_prefix: "../images/".to_string(),
            modern_url_prefix: "../images/webp/".to_string(),
            quality: 85,
            effort: 6,
            lossless: false,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            critical_images: Vec::new(),
            modern_segment: "webp".to_string(),
            legacy_segment: "old".to_string(),
            legacy_extension: "png".to_string(),
            backgrounds: Vec::new(),
        }
    }
}

impl SiteConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> BackdropResult<Self> {
        let cfg: SiteConfig = serde_json::from_reader(r)
            .map_err(|e| BackdropError::validation(format!("parse site config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> BackdropResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| BackdropError::io(path, e))?;
        Self::from_reader(BufReader::new(f))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> BackdropResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_path(path)
        } else {
            tracing::debug!(path = %path.display(), "no site config, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> BackdropResult<()> {
        if self.quality > 100 {
            return Err(BackdropError::validation(format!(
                "quality must be in 0..=100, got {}",
                self.quality
            )));
        }
        if self.effort > 6 {
            return Err(BackdropError::validation(format!(
                "effort must be in 0..=6, got {}",
                self.effort
            )));
        }
        if self.probe_timeout_ms == 0 {
            return Err(BackdropError::validation(
                "probe_timeout_ms must be non-zero",
            ));
        }
        if self.legacy_extension.is_empty() || self.legacy_extension.contains('.') {
            return Err(BackdropError::validation(
                "legacy_extension must be a bare extension such as 'png'",
            ));
        }
        for (i, src) in self.critical_images.iter().enumerate() {
            if src.trim().is_empty() {
                return Err(BackdropError::validation(format!(
                    "critical_images[{i}] must not be empty"
                )));
            }
        }
        for (i, bg) in self.backgrounds.iter().enumerate() {
            if bg.modern.trim().is_empty() {
                return Err(BackdropError::validation(format!(
                    "backgrounds[{i}].modern must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Return a copy with every relative path joined onto `root`.
    pub fn resolve(&self, root: &Path) -> Self {
        let join = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                root.join(p)
            }
        };
        Self {
            images_dir: join(&self.images_dir),
            webp_dir: join(&self.webp_dir),
            legacy_dir: join(&self.legacy_dir),
            css_path: join(&self.css_path),
            script_path: join(&self.script_path),
            selector_script: join(&self.selector_script),
            page_path: join(&self.page_path),
            ..self.clone()
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Expand the configured backgrounds into explicit pairs, in declaration order.
    ///
    /// Entries without a `legacy` path get one derived from `modern`; an entry where that
    /// fails is a validation error.
    pub fn fallback_pairs(&self) -> BackdropResult<Vec<FallbackPair>> {
        self.backgrounds
            .iter()
            .enumerate()
            .map(|(i, bg)| {
                let legacy = match &bg.legacy {
                    Some(l) => l.clone(),
                    None => derive_legacy_path(
                        &bg.modern,
                        &self.modern_segment,
                        &self.legacy_segment,
                        &self.legacy_extension,
                    )
                    .ok_or_else(|| {
                        BackdropError::validation(format!(
                            "backgrounds[{i}]: cannot derive a legacy path from '{}'",
                            bg.modern
                        ))
                    })?,
                };
                Ok(FallbackPair::new(bg.modern.clone(), legacy))
            })
            .collect()
    }
}
