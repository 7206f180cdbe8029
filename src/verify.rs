use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::SiteConfig;

/// Legacy extensions tried, in order, for each WebP stem.
pub const LEGACY_CANDIDATE_EXTENSIONS: [&str; 3] = ["png", "jpeg", "jpg"];

/// Substrings a selector script carries once it lists explicit fallback pairs.
pub const SELECTOR_MARKERS: [&str; 2] = ["webp:", "fallback:"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub lines: Vec<String>,
}

impl CheckResult {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            passed: true,
            lines: Vec::new(),
        }
    }

    fn ok(&mut self, line: impl Into<String>) {
        self.lines.push(format!("ok    {}", line.into()));
    }

    fn fail(&mut self, line: impl Into<String>) {
        self.passed = false;
        self.lines.push(format!("FAIL  {}", line.into()));
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub checks: Vec<CheckResult>,
    /// `(webp file, legacy file)` for every match.
    pub matched: Vec<(String, String)>,
    /// WebP files with no legacy counterpart.
    pub missing: Vec<String>,
}

impl VerifyReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed() { 0 } else { 1 }
    }
}

/// Locations the verifier looks at.
#[derive(Clone, Debug)]
pub struct VerifyTargets {
    pub webp_dir: PathBuf,
    pub legacy_dir: PathBuf,
    pub selector_script: PathBuf,
    pub detection_script: PathBuf,
    pub page_path: PathBuf,
}

impl VerifyTargets {
    /// Targets from a config already resolved against the site root.
    pub fn from_config(cfg: &SiteConfig) -> Self {
        Self {
            webp_dir: cfg.webp_dir.clone(),
            legacy_dir: cfg.legacy_dir.clone(),
            selector_script: cfg.selector_script.clone(),
            detection_script: cfg.script_path.clone(),
            page_path: cfg.page_path.clone(),
        }
    }

    fn detection_script_name(&self) -> String {
        self.detection_script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// First legacy file named `<stem>.<ext>` over [`LEGACY_CANDIDATE_EXTENSIONS`].
pub fn find_fallback(stem: &str, legacy_files: &BTreeSet<String>) -> Option<String> {
    LEGACY_CANDIDATE_EXTENSIONS
        .iter()
        .map(|ext| format!("{stem}.{ext}"))
        .find(|name| legacy_files.contains(name))
}

fn file_names(dir: &Path) -> std::io::Result<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        out.insert(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(out)
}

pub fn check_directories(t: &VerifyTargets) -> CheckResult {
    let mut c = CheckResult::new("directories");
    for (label, dir) in [("webp", &t.webp_dir), ("legacy", &t.legacy_dir)] {
        if dir.is_dir() {
            c.ok(format!("{label} directory {}", dir.display()));
        } else {
            c.fail(format!("{label} directory not found: {}", dir.display()));
        }
    }
    c
}

/// Match every `*.webp` file against the legacy directory by stem.
pub fn check_pairs(t: &VerifyTargets, report: &mut VerifyReport) -> CheckResult {
    let mut c = CheckResult::new("image pairs");

    let (webp_files, legacy_files) = match (file_names(&t.webp_dir), file_names(&t.legacy_dir)) {
        (Ok(w), Ok(l)) => (w, l),
        (Err(e), _) => {
            c.fail(format!("read {}: {e}", t.webp_dir.display()));
            return c;
        }
        (_, Err(e)) => {
            c.fail(format!("read {}: {e}", t.legacy_dir.display()));
            return c;
        }
    };

    let webp_images: Vec<&String> = webp_files.iter().filter(|f| f.ends_with(".webp")).collect();
    c.lines.push(format!(
        "found {} webp images, {} fallback images",
        webp_images.len(),
        legacy_files.len()
    ));

    for webp in webp_images {
        let stem = &webp[..webp.len() - ".webp".len()];
        match find_fallback(stem, &legacy_files) {
            Some(legacy) => {
                c.ok(format!("{webp} <-> {legacy}"));
                report.matched.push((webp.clone(), legacy));
            }
            None => {
                c.fail(format!("{webp}: no fallback found"));
                report.missing.push(webp.clone());
            }
        }
    }

    if !report.missing.is_empty() {
        c.lines.push(format!(
            "{} webp images missing fallbacks",
            report.missing.len()
        ));
    }
    c
}

fn file_contains_all(
    c: &mut CheckResult,
    path: &Path,
    needles: &[&str],
    ok_line: &str,
    fail_line: &str,
) {
    match std::fs::read_to_string(path) {
        Ok(text) if needles.iter().all(|n| text.contains(n)) => c.ok(ok_line),
        Ok(_) => c.fail(fail_line),
        Err(e) => c.fail(format!("read {}: {e}", path.display())),
    }
}

pub fn check_script_integration(t: &VerifyTargets) -> CheckResult {
    let mut c = CheckResult::new("script integration");
    file_contains_all(
        &mut c,
        &t.selector_script,
        &SELECTOR_MARKERS,
        &format!("{} lists webp/fallback pairs", t.selector_script.display()),
        &format!("{} does not list webp/fallback pairs", t.selector_script.display()),
    );
    if t.detection_script.is_file() {
        c.ok(format!("{} found", t.detection_script.display()));
    } else {
        c.fail(format!("{} not found", t.detection_script.display()));
    }
    c
}

pub fn check_page_integration(t: &VerifyTargets) -> CheckResult {
    let mut c = CheckResult::new("page integration");
    let script = t.detection_script_name();
    file_contains_all(
        &mut c,
        &t.page_path,
        &[script.as_str()],
        &format!("{script} included in {}", t.page_path.display()),
        &format!("{script} not included in {}", t.page_path.display()),
    );
    c
}

/// Run every check. With `pairs_only`, stop after the directory and pair checks.
pub fn verify_site(t: &VerifyTargets, pairs_only: bool) -> VerifyReport {
    let mut report = VerifyReport::default();

    let dirs = check_directories(t);
    report.checks.push(dirs);

    let pairs = check_pairs(t, &mut report);
    report.checks.push(pairs);

    if !pairs_only {
        report.checks.push(check_script_integration(t));
        report.checks.push(check_page_integration(t));
    }

    for c in &report.checks {
        if c.passed {
            tracing::debug!(check = c.name, "check passed");
        } else {
            tracing::warn!(check = c.name, "check failed");
        }
    }
    report
}
