use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::encode::{EncodeOpts, WebpEncoder};
use crate::foundation::error::{BackdropError, BackdropResult};

const CWEBP: &str = "cwebp";

pub fn is_cwebp_on_path() -> bool {
    Command::new(CWEBP)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// `cwebp` reads PNG, JPEG and TIFF directly; anything else goes through a PNG first.
fn needs_transcode(input: &Path) -> bool {
    !input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            ["png", "jpg", "jpeg", "tiff", "tif"]
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Encoder that shells out to the system `cwebp` binary.
#[derive(Debug)]
pub struct CwebpEncoder {
    opts: EncodeOpts,
}

impl CwebpEncoder {
    /// Fails with [`BackdropError::MissingDependency`] if `cwebp` is not on `PATH`.
    pub fn new(opts: EncodeOpts) -> BackdropResult<Self> {
        opts.validate()?;
        if !is_cwebp_on_path() {
            return Err(BackdropError::missing_dependency(
                "cwebp is required for WebP encoding, but was not found on PATH \
                 (install libwebp, or use the lossless encoder)",
            ));
        }
        Ok(Self { opts })
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(CWEBP);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd.args([
            "-quiet",
            "-metadata",
            "none",
            "-q",
            &self.opts.quality.to_string(),
            "-m",
            &self.opts.effort.to_string(),
        ]);
        if self.opts.lossless {
            cmd.arg("-lossless");
        }
        cmd.arg(input).arg("-o").arg(output);
        cmd
    }

    fn run(&self, input: &Path, output: &Path) -> BackdropResult<()> {
        let out = self.command(input, output).output().map_err(|e| {
            BackdropError::encode(format!(
                "failed to spawn cwebp (is it installed and on PATH?): {e}"
            ))
        })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(BackdropError::encode(format!(
                "cwebp exited with status {} for '{}': {}",
                out.status,
                input.display(),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl WebpEncoder for CwebpEncoder {
    fn name(&self) -> &'static str {
        "cwebp"
    }

    fn encode(&self, input: &Path, output: &Path) -> BackdropResult<()> {
        if !needs_transcode(input) {
            return self.run(input, output);
        }

        let staging = staging_png_path(output);
        let img = image::open(input).map_err(|e| {
            BackdropError::encode(format!("decode '{}': {e}", input.display()))
        })?;
        img.save_with_format(&staging, image::ImageFormat::Png)
            .map_err(|e| {
                BackdropError::encode(format!("stage '{}' as png: {e}", input.display()))
            })?;

        let res = self.run(&staging, output);
        if let Err(e) = std::fs::remove_file(&staging) {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staging png");
        }
        res
    }
}

fn staging_png_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".staging.png");
    output.with_file_name(name)
}
