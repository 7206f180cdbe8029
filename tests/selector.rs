use std::collections::HashSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::{SeedableRng, rngs::StdRng};

use backdrop::{
    BACKGROUND_PROPERTY, BackdropError, BackdropResult, BackgroundSelector, CapabilityProbe,
    DecodeProbe, FallbackPair, FixedProbe, FsImageLoader, ImageLoader, SelectionOutcome,
    StyleVars, TimeoutProbe, apply_pair,
};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "backdrop_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

/// Loader that fails for a fixed set of paths and records every call.
#[derive(Default)]
struct ScriptedLoader {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLoader {
    fn failing(paths: &[&str]) -> Self {
        Self {
            failing: paths.iter().map(|p| p.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageLoader for ScriptedLoader {
    async fn preload(&self, path: &str) -> BackdropResult<()> {
        self.calls.lock().unwrap().push(path.to_string());
        if self.failing.contains(path) {
            Err(BackdropError::validation(format!("scripted load failure: {path}")))
        } else {
            Ok(())
        }
    }
}

/// Probe that never answers.
struct HangingProbe;

#[async_trait]
impl CapabilityProbe for HangingProbe {
    async fn supports_modern(&self) -> bool {
        std::future::pending::<bool>().await
    }
}

/// Shared sink for formatted log lines.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn pair() -> FallbackPair {
    FallbackPair::new("a.webp", "a.png")
}

#[tokio::test]
async fn supported_client_gets_modern_path_without_retry() {
    let loader = ScriptedLoader::default();
    let mut style = StyleVars::new();

    let outcome = apply_pair(&pair(), &FixedProbe(true), &loader, &mut style).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Applied {
            path: "a.webp".to_string(),
            modern: true,
            retried: false,
        }
    );
    assert_eq!(style.get(BACKGROUND_PROPERTY), Some("url('a.webp')"));
    assert_eq!(loader.calls(), vec!["a.webp"]);
}

#[tokio::test]
async fn unsupported_client_gets_legacy_path_directly() {
    let loader = ScriptedLoader::default();
    let mut style = StyleVars::new();

    let outcome = apply_pair(&pair(), &FixedProbe(false), &loader, &mut style).await;

    assert_eq!(outcome.applied_path(), Some("a.png"));
    assert_eq!(style.get(BACKGROUND_PROPERTY), Some("url('a.png')"));
    assert_eq!(loader.calls(), vec!["a.png"]);
}

#[tokio::test]
async fn modern_load_failure_retries_with_legacy() {
    let loader = ScriptedLoader::failing(&["a.webp"]);
    let mut style = StyleVars::new();

    let outcome = apply_pair(&pair(), &FixedProbe(true), &loader, &mut style).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Applied {
            path: "a.png".to_string(),
            modern: false,
            retried: true,
        }
    );
    assert_eq!(style.get(BACKGROUND_PROPERTY), Some("url('a.png')"));
    assert_eq!(loader.calls(), vec!["a.webp", "a.png"]);
}

#[tokio::test]
async fn both_loads_failing_leaves_background_unset() {
    let loader = ScriptedLoader::failing(&["a.webp", "a.png"]);
    let mut style = StyleVars::new();

    let outcome = apply_pair(&pair(), &FixedProbe(true), &loader, &mut style).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Unset {
            attempts: vec!["a.webp".to_string(), "a.png".to_string()],
        }
    );
    assert!(style.is_empty());
    assert_eq!(loader.calls().len(), 2);
}

#[tokio::test]
async fn both_loads_failing_logs_two_warnings() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let loader = ScriptedLoader::failing(&["a.webp", "a.png"]);
    let mut style = StyleVars::new();
    apply_pair(&pair(), &FixedProbe(true), &loader, &mut style).await;

    let lines = logs.lines();
    assert_eq!(lines.len(), 2, "{lines:#?}");
    assert!(lines.iter().all(|l| l.contains("WARN")));
    assert!(lines[0].contains("failed to load background"));
    assert!(lines[0].contains("a.webp"));
    assert!(lines[1].contains("failed to load fallback background"));
    assert!(lines[1].contains("a.png"));
}

#[tokio::test]
async fn legacy_failure_is_not_retried() {
    let loader = ScriptedLoader::failing(&["a.png"]);
    let mut style = StyleVars::new();

    let outcome = apply_pair(&pair(), &FixedProbe(false), &loader, &mut style).await;

    assert_eq!(
        outcome,
        SelectionOutcome::Unset {
            attempts: vec!["a.png".to_string()],
        }
    );
    assert!(style.is_empty());
    assert_eq!(loader.calls(), vec!["a.png"]);
}

#[tokio::test]
async fn empty_selector_sets_nothing() {
    let selector = BackgroundSelector::new(Vec::new());
    let loader = ScriptedLoader::default();
    let mut style = StyleVars::new();
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = selector
        .run(&mut rng, &FixedProbe(true), &loader, &mut style)
        .await;

    assert_eq!(outcome, SelectionOutcome::NoBackgrounds);
    assert!(loader.calls().is_empty());
}

#[tokio::test]
async fn run_picks_from_the_configured_pairs() {
    let pairs = vec![
        FallbackPair::new("w/one.webp", "o/one.png"),
        FallbackPair::new("w/two.webp", "o/two.png"),
        FallbackPair::new("w/three.webp", "o/three.png"),
    ];
    let selector = BackgroundSelector::new(pairs.clone());
    let loader = ScriptedLoader::default();
    let mut rng = StdRng::seed_from_u64(11);

    let mut seen = HashSet::new();
    for _ in 0..60 {
        let mut style = StyleVars::new();
        let outcome = selector
            .run(&mut rng, &FixedProbe(true), &loader, &mut style)
            .await;
        let path = outcome.applied_path().unwrap().to_string();
        assert!(pairs.iter().any(|p| p.modern == path));
        seen.insert(path);
    }
    assert_eq!(seen.len(), 3);
}

#[tokio::test]
async fn hanging_probe_times_out_as_unsupported() {
    let probe = TimeoutProbe::new(HangingProbe, Duration::from_millis(20));
    assert!(!probe.supports_modern().await);

    let loader = ScriptedLoader::default();
    let mut style = StyleVars::new();
    let outcome = apply_pair(&pair(), &probe, &loader, &mut style).await;
    assert_eq!(outcome.applied_path(), Some("a.png"));
}

#[tokio::test]
async fn timeout_does_not_change_a_prompt_answer() {
    let probe = TimeoutProbe::new(FixedProbe(true), Duration::from_secs(5));
    assert!(probe.supports_modern().await);
}

#[tokio::test]
async fn embedded_webp_payload_decodes() {
    let probe = DecodeProbe::webp().unwrap();
    assert!(probe.supports_modern().await);
}

#[tokio::test]
async fn wrong_height_or_garbage_counts_as_unsupported() {
    let img = image::RgbaImage::from_raw(2, 1, vec![255u8; 2 * 4]).unwrap();
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    assert!(!DecodeProbe::with_payload(png, 2).supports_modern().await);
    assert!(
        !DecodeProbe::with_payload(b"RIFF....WEBPjunk".to_vec(), 2)
            .supports_modern()
            .await
    );
}

#[tokio::test]
async fn fs_loader_reads_real_files() {
    let tmp = temp_dir("fs_loader");
    std::fs::create_dir_all(tmp.join("img")).unwrap();
    let img = image::RgbaImage::from_raw(1, 1, vec![1u8, 2, 3, 255]).unwrap();
    img.save_with_format(tmp.join("img/a.png"), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(tmp.join("img/broken.png"), b"nope").unwrap();

    let loader = FsImageLoader::new(&tmp);
    loader.preload("img/a.png").await.unwrap();
    loader.preload("/img/a.png").await.unwrap();
    assert!(loader.preload("img/missing.webp").await.is_err());
    assert!(loader.preload("img/broken.png").await.is_err());

    let mut style = StyleVars::new();
    let outcome = apply_pair(
        &FallbackPair::new("img/missing.webp", "img/a.png"),
        &FixedProbe(true),
        &loader,
        &mut style,
    )
    .await;
    assert_eq!(outcome.applied_path(), Some("img/a.png"));

    std::fs::remove_dir_all(&tmp).ok();
}
