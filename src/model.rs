use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A raster file picked up by enumeration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageAsset {
    pub source_path: PathBuf,
    pub size_bytes: u64,
}

impl ImageAsset {
    /// File name as it appears in the source directory.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Output name in the modern format (`<stem>.webp`).
    pub fn modern_name(&self) -> String {
        format!("{}.webp", self.stem())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub original_name: String,
    pub modern_name: String,
    pub original_size_bytes: u64,
    pub modern_size_bytes: u64,
    pub savings_percent: f64,
}

impl ConversionResult {
    pub fn new(
        original_name: impl Into<String>,
        modern_name: impl Into<String>,
        original_size_bytes: u64,
        modern_size_bytes: u64,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            modern_name: modern_name.into(),
            original_size_bytes,
            modern_size_bytes,
            savings_percent: savings_percent(original_size_bytes, modern_size_bytes),
        }
    }

    /// Stem of the original file, used for stylesheet class names.
    pub fn stem(&self) -> &str {
        match self.original_name.rfind('.') {
            Some(0) | None => &self.original_name,
            Some(i) => &self.original_name[..i],
        }
    }

    /// Capability-gated pair under the given URL prefixes.
    pub fn fallback_pair(&self, modern_prefix: &str, legacy_prefix: &str) -> FallbackPair {
        FallbackPair::new(
            format!("{modern_prefix}{}", self.modern_name),
            format!("{legacy_prefix}{}", self.original_name),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionFailure {
    pub original_name: String,
    pub reason: String,
}

/// Percentage saved going from `original` to `new` bytes, rounded to one decimal.
///
/// A zero-byte original has nothing to save and reports `0.0`. Growth is negative.
pub fn savings_percent(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let raw = (original as f64 - new as f64) / original as f64 * 100.0;
    round1(raw)
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// A modern-format asset and its legacy-format equivalent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FallbackPair {
    pub modern: String,
    pub legacy: String,
}

impl FallbackPair {
    pub fn new(modern: impl Into<String>, legacy: impl Into<String>) -> Self {
        Self {
            modern: modern.into(),
            legacy: legacy.into(),
        }
    }

    /// Path to use for a client with or without modern-format support.
    pub fn path_for(&self, supported: bool) -> &str {
        if supported { &self.modern } else { &self.legacy }
    }
}

/// Rewrite a modern-format URL path into its legacy counterpart.
///
/// The last directory segment equal to `modern_segment` becomes `legacy_segment` and the
/// `.webp` extension becomes `.{legacy_ext}`. Returns `None` when either part is absent.
pub fn derive_legacy_path(
    modern: &str,
    modern_segment: &str,
    legacy_segment: &str,
    legacy_ext: &str,
) -> Option<String> {
    let (dir, file) = match modern.rfind('/') {
        Some(i) => (&modern[..i], &modern[i + 1..]),
        None => return None,
    };

    let dot = file.rfind('.')?;
    if !file[dot + 1..].eq_ignore_ascii_case("webp") || dot == 0 {
        return None;
    }
    let stem = &file[..dot];

    let mut segments: Vec<&str> = dir.split('/').collect();
    let pos = segments.iter().rposition(|s| *s == modern_segment)?;
    segments[pos] = legacy_segment;

    Some(format!("{}/{stem}.{legacy_ext}", segments.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn savings_rounds_to_one_decimal() {
        assert_eq!(savings_percent(1000, 250), 75.0);
        assert_eq!(savings_percent(3, 2), 33.3);
        assert_eq!(savings_percent(3, 1), 66.7);
        assert_eq!(savings_percent(100, 100), 0.0);
    }

    #[test]
    fn savings_negative_when_output_grows() {
        assert_eq!(savings_percent(100, 150), -50.0);
    }

    #[test]
    fn savings_zero_original_is_zero() {
        assert_eq!(savings_percent(0, 10), 0.0);
    }

    #[test]
    fn savings_matches_formula_over_a_range() {
        for original in [1u64, 7, 99, 1024, 48_213, 2_000_000] {
            for new in [0u64, 1, original / 3, original / 2, original] {
                let expected =
                    ((original as f64 - new as f64) / original as f64 * 100.0 * 10.0).round()
                        / 10.0;
                assert_eq!(savings_percent(original, new), expected);
            }
        }
    }

    #[test]
    fn conversion_result_stem_and_pair() {
        let r = ConversionResult::new("background1 (2).jpeg", "background1 (2).webp", 10, 5);
        assert_eq!(r.stem(), "background1 (2)");
        assert_eq!(r.savings_percent, 50.0);
        let pair = r.fallback_pair("../images/webp/", "../images/");
        assert_eq!(pair.modern, "../images/webp/background1 (2).webp");
        assert_eq!(pair.legacy, "../images/background1 (2).jpeg");
    }

    #[test]
    fn pair_path_for_capability() {
        let pair = FallbackPair::new("a.webp", "a.png");
        assert_eq!(pair.path_for(true), "a.webp");
        assert_eq!(pair.path_for(false), "a.png");
    }

    #[test]
    fn derive_legacy_swaps_segment_and_extension() {
        assert_eq!(
            derive_legacy_path("../assets/images/webp/background2.webp", "webp", "old", "png")
                .as_deref(),
            Some("../assets/images/old/background2.png")
        );
        assert_eq!(
            derive_legacy_path("webp/a.WEBP", "webp", "old", "jpeg").as_deref(),
            Some("old/a.jpeg")
        );
    }

    #[test]
    fn derive_legacy_requires_segment_and_extension() {
        assert!(derive_legacy_path("images/a.webp", "webp", "old", "png").is_none());
        assert!(derive_legacy_path("images/webp/a.png", "webp", "old", "png").is_none());
        assert!(derive_legacy_path("a.webp", "webp", "old", "png").is_none());
    }
}
