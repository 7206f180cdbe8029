use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    client::probe::{PROBE_EXPECTED_HEIGHT, WEBP_PROBE_PAYLOAD_B64},
    config::SiteConfig,
    foundation::error::{BackdropError, BackdropResult},
    model::ConversionResult,
};

/// Root-element class added by the detection script when WebP decodes.
pub const CAPABILITY_CLASS: &str = "webp";
/// Root-element class added when it does not.
pub const NO_CAPABILITY_CLASS: &str = "no-webp";

/// Stylesheet class for an image stem: whitespace runs become `-`, then lower-case.
pub fn css_class_name(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut in_ws = false;
    for ch in stem.chars() {
        if ch.is_whitespace() {
            if !in_ws {
                out.push('-');
            }
            in_ws = true;
        } else {
            out.extend(ch.to_lowercase());
            in_ws = false;
        }
    }
    out
}

/// Render the fallback stylesheet.
///
/// Per asset: an unconditional rule on the legacy file, then a rule scoped under the
/// capability class that points at the WebP file.
pub fn render_fallback_css(
    results: &[ConversionResult],
    legacy_prefix: &str,
    modern_prefix: &str,
) -> String {
    let mut css = String::from("/* WebP with fallback CSS */\n\n");
    for r in results {
        let pair = r.fallback_pair(modern_prefix, legacy_prefix);
        let class = css_class_name(r.stem());
        css.push_str(&format!(
            "/* {original} */\n\
             .bg-{class} {{\n  background-image: url('{legacy}');\n}}\n\n\
             .{cap} .bg-{class} {{\n  background-image: url('{modern}');\n}}\n\n",
            original = r.original_name,
            legacy = pair.legacy,
            cap = CAPABILITY_CLASS,
            modern = pair.modern,
        ));
    }
    css
}

/// Render the standalone detection script.
///
/// Same probe as the host-side detector: decode the embedded payload and expect a height of
/// two pixels. Resolves unsupported after `timeout` if neither handler fires. When
/// `critical_images` is non-empty, each one gets a `<link rel="preload" as="image">` once the
/// probe reports support.
pub fn render_detection_script(
    timeout: Duration,
    critical_images: &[String],
) -> BackdropResult<String> {
    let mut js = format!(
        r#"// WebP detection script
function supportsWebP(timeoutMs) {{
  return new Promise((resolve) => {{
    const webP = new Image();
    const timer = setTimeout(() => resolve(false), timeoutMs);
    webP.onload = webP.onerror = () => {{
      clearTimeout(timer);
      resolve(webP.height === {height});
    }};
    webP.src = 'data:image/webp;base64,{payload}';
  }});
}}

const webpSupport = supportsWebP({timeout_ms});

// Mark the root element so stylesheets can pick the right image
webpSupport.then((supported) => {{
  document.documentElement.classList.add(supported ? '{cap}' : '{no_cap}');
}});
"#,
        height = PROBE_EXPECTED_HEIGHT,
        payload = WEBP_PROBE_PAYLOAD_B64,
        timeout_ms = timeout.as_millis(),
        cap = CAPABILITY_CLASS,
        no_cap = NO_CAPABILITY_CLASS,
    );

    if critical_images.is_empty() {
        return Ok(js);
    }

    let list = serde_json::to_string(critical_images)
        .map_err(|e| BackdropError::validation(format!("encode critical image list: {e}")))?;
    js.push_str(&format!(
        r#"
// Preload critical WebP images, only when they can be decoded
function preloadCriticalImages() {{
  webpSupport.then((supported) => {{
    if (!supported) return;
    for (const src of {list}) {{
      const link = document.createElement('link');
      link.rel = 'preload';
      link.as = 'image';
      link.href = src;
      document.head.appendChild(link);
    }}
  }});
}}

if (document.readyState === 'loading') {{
  document.addEventListener('DOMContentLoaded', preloadCriticalImages);
}} else {{
  preloadCriticalImages();
}}
"#
    ));
    Ok(js)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub stylesheet: PathBuf,
    pub detection_script: PathBuf,
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_text(path: &Path, contents: &str) -> BackdropResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| BackdropError::io(parent, e))?;
    }
    std::fs::write(path, contents).map_err(|e| BackdropError::io(path, e))
}

/// Write the stylesheet, then the detection script. The first failure aborts.
pub fn write_artifacts(
    results: &[ConversionResult],
    cfg: &SiteConfig,
) -> BackdropResult<ArtifactPaths> {
    let css = render_fallback_css(results, &cfg.legacy_url_prefix, &cfg.modern_url_prefix);
    write_text(&cfg.css_path, &css)?;
    tracing::info!(path = %cfg.css_path.display(), rules = results.len() * 2, "wrote fallback stylesheet");

    let script = render_detection_script(cfg.probe_timeout(), &cfg.critical_images)?;
    write_text(&cfg.script_path, &script)?;
    tracing::info!(
        path = %cfg.script_path.display(),
        preloads = cfg.critical_images.len(),
        "wrote detection script"
    );

    Ok(ArtifactPaths {
        stylesheet: cfg.css_path.clone(),
        detection_script: cfg.script_path.clone(),
    })
}
