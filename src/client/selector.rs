use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use rand::Rng;

use crate::assets::decode::decode_size;
use crate::client::probe::CapabilityProbe;
use crate::config::SiteConfig;
use crate::foundation::error::{BackdropError, BackdropResult};
use crate::model::FallbackPair;

/// Style variable that holds the active background.
pub const BACKGROUND_PROPERTY: &str = "--random-background";

/// Loads an image ahead of use. `Ok` means the image is ready to display.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn preload(&self, path: &str) -> BackdropResult<()>;
}

/// Something that accepts style variables, such as the document root.
pub trait StyleTarget {
    fn set_property(&mut self, name: &str, value: String);
}

/// In-memory style variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StyleVars {
    vars: BTreeMap<String, String>,
}

impl StyleVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl StyleTarget for StyleVars {
    fn set_property(&mut self, name: &str, value: String) {
        self.vars.insert(name.to_string(), value);
    }
}

/// Loader that reads and decodes files from a site tree on disk.
///
/// Paths are taken relative to `root`; a leading `/` is ignored.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ImageLoader for FsImageLoader {
    async fn preload(&self, path: &str) -> BackdropResult<()> {
        let full = self.resolve(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| BackdropError::io(&full, e))?;
        decode_size(&bytes)?;
        Ok(())
    }
}

/// CSS value committed for `path`.
pub fn background_value(path: &str) -> String {
    format!("url('{path}')")
}

/// Uniform index into a list of `len` items: `floor(u * len)` for uniform `u` in `[0, 1)`.
pub fn pick_index<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let u: f64 = rng.random();
    let idx = (u * len as f64).floor() as usize;
    Some(idx.min(len - 1))
}

/// What one selection run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// `path` was preloaded and committed.
    Applied {
        path: String,
        modern: bool,
        retried: bool,
    },
    /// Every attempted path failed to load; nothing was committed.
    Unset { attempts: Vec<String> },
    /// The configured list is empty.
    NoBackgrounds,
}

impl SelectionOutcome {
    pub fn applied_path(&self) -> Option<&str> {
        match self {
            Self::Applied { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Picks one configured background per run and commits it to a [`StyleTarget`].
#[derive(Clone, Debug, Default)]
pub struct BackgroundSelector {
    pairs: Vec<FallbackPair>,
}

impl BackgroundSelector {
    pub fn new(pairs: Vec<FallbackPair>) -> Self {
        Self { pairs }
    }

    pub fn from_config(cfg: &SiteConfig) -> BackdropResult<Self> {
        Ok(Self::new(cfg.fallback_pairs()?))
    }

    pub fn pairs(&self) -> &[FallbackPair] {
        &self.pairs
    }

    /// Pick a pair at random, probe once, then preload and commit.
    pub async fn run<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        probe: &dyn CapabilityProbe,
        loader: &dyn ImageLoader,
        style: &mut dyn StyleTarget,
    ) -> SelectionOutcome {
        let Some(idx) = pick_index(rng, self.pairs.len()) else {
            tracing::warn!("no backgrounds configured");
            return SelectionOutcome::NoBackgrounds;
        };
        apply_pair(&self.pairs[idx], probe, loader, style).await
    }
}

/// Apply one pair: the modern path if supported, else the legacy path.
///
/// A failed modern path is retried once with the legacy path. A failed legacy path is final.
pub async fn apply_pair(
    pair: &FallbackPair,
    probe: &dyn CapabilityProbe,
    loader: &dyn ImageLoader,
    style: &mut dyn StyleTarget,
) -> SelectionOutcome {
    let supported = probe.supports_modern().await;
    let first = pair.path_for(supported);
    tracing::debug!(supported, path = first, "selected background");

    match loader.preload(first).await {
        Ok(()) => {
            style.set_property(BACKGROUND_PROPERTY, background_value(first));
            return SelectionOutcome::Applied {
                path: first.to_string(),
                modern: supported,
                retried: false,
            };
        }
        Err(e) => {
            tracing::warn!(path = first, error = %e, "failed to load background");
        }
    }

    if !supported {
        return SelectionOutcome::Unset {
            attempts: vec![first.to_string()],
        };
    }

    let fallback = pair.legacy.as_str();
    match loader.preload(fallback).await {
        Ok(()) => {
            style.set_property(BACKGROUND_PROPERTY, background_value(fallback));
            SelectionOutcome::Applied {
                path: fallback.to_string(),
                modern: false,
                retried: true,
            }
        }
        Err(e) => {
            tracing::warn!(path = fallback, error = %e, "failed to load fallback background");
            SelectionOutcome::Unset {
                attempts: vec![first.to_string(), fallback.to_string()],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn pick_index_empty_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(pick_index(&mut rng, 0), None);
    }

    #[test]
    fn pick_index_stays_in_range_and_covers_all() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = [0usize; 5];
        for _ in 0..5_000 {
            let idx = pick_index(&mut rng, 5).unwrap();
            seen[idx] += 1;
        }
        for (i, n) in seen.iter().enumerate() {
            assert!(*n > 800, "index {i} picked only {n} times");
        }
    }

    #[test]
    fn single_item_always_index_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(pick_index(&mut rng, 1), Some(0));
        }
    }

    #[test]
    fn background_value_wraps_in_url() {
        assert_eq!(
            background_value("../assets/images/background.png"),
            "url('../assets/images/background.png')"
        );
    }

    #[test]
    fn loader_ignores_leading_slash() {
        assert_eq!(
            FsImageLoader::new("/site").resolve("/assets/a.png"),
            PathBuf::from("/site/assets/a.png")
        );
    }
}
