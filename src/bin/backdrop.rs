use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rand::{SeedableRng, rngs::StdRng};

use backdrop::{
    BACKGROUND_PROPERTY, BackdropError, BackgroundSelector, CONFIG_FILE_NAME, CapabilityProbe,
    ConvertThreading, CwebpEncoder, DecodeProbe, EncodeOpts, FixedProbe, FsImageLoader,
    LosslessEncoder, SelectionOutcome, SiteConfig, StyleVars, TimeoutProbe, VerifyTargets,
    WebpEncoder,
};

#[derive(Parser, Debug)]
#[command(name = "backdrop", version)]
struct Cli {
    /// Site root. Defaults to the config file's directory, or the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Site config JSON. Defaults to `<root>/backdrop.json`; missing means defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert source images to WebP and write the fallback stylesheet and detection script.
    Optimize(OptimizeArgs),
    /// Check that every WebP image has a fallback and that the site includes the artifacts.
    Verify(VerifyArgs),
    /// Pick a random background the way a page load would, against the files on disk.
    Pick(PickArgs),
}

#[derive(Parser, Debug)]
struct OptimizeArgs {
    /// Encoder to use.
    #[arg(long, value_enum, default_value_t = EncoderChoice::Cwebp)]
    encoder: EncoderChoice,

    /// Override the configured quality (0-100).
    #[arg(long)]
    quality: Option<u8>,

    /// Override the configured effort (0-6).
    #[arg(long)]
    effort: Option<u8>,

    /// Convert files in parallel.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct VerifyArgs {
    /// Only check directories and image pairs.
    #[arg(long, default_value_t = false)]
    pairs_only: bool,
}

#[derive(Parser, Debug)]
struct PickArgs {
    /// Seed the random pick for a reproducible choice.
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the probe and behave like a client without WebP support.
    #[arg(long, default_value_t = false)]
    no_webp: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderChoice {
    /// System `cwebp` (lossy by default).
    Cwebp,
    /// Built-in lossless encoder, no external tools.
    Lossless,
}

fn main() -> ExitCode {
    backdrop::logging::init_tracing("info");

    let cli = Cli::parse();
    let res = match cli.cmd {
        Command::Optimize(ref args) => cmd_optimize(&cli, args),
        Command::Verify(ref args) => cmd_verify(&cli, args),
        Command::Pick(ref args) => cmd_pick(&cli, args),
    };

    match res {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn site_root(cli: &Cli) -> PathBuf {
    match (&cli.root, &cli.config) {
        (Some(root), _) => root.clone(),
        (None, Some(cfg)) => cfg
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
        (None, None) => PathBuf::from("."),
    }
}

fn load_site(cli: &Cli) -> anyhow::Result<SiteConfig> {
    let root = site_root(cli);
    let cfg_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join(CONFIG_FILE_NAME));

    let cfg = SiteConfig::load_or_default(&cfg_path)
        .with_context(|| format!("load site config '{}'", cfg_path.display()))?;
    Ok(cfg.resolve(&root))
}

fn kb(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}

fn cmd_optimize(cli: &Cli, args: &OptimizeArgs) -> anyhow::Result<ExitCode> {
    let mut cfg = load_site(cli)?;
    if let Some(q) = args.quality {
        cfg.quality = q;
    }
    if let Some(e) = args.effort {
        cfg.effort = e;
    }
    cfg.validate()?;

    let opts = EncodeOpts {
        quality: cfg.quality,
        effort: cfg.effort,
        lossless: cfg.lossless,
    };
    let encoder: Box<dyn WebpEncoder> = match args.encoder {
        EncoderChoice::Cwebp => match CwebpEncoder::new(opts) {
            Ok(enc) => Box::new(enc),
            Err(e @ BackdropError::MissingDependency(_)) => {
                eprintln!("error: {e}");
                return Ok(ExitCode::from(1));
            }
            Err(e) => return Err(e.into()),
        },
        EncoderChoice::Lossless => Box::new(LosslessEncoder::new()),
    };

    let threading = ConvertThreading {
        parallel: args.parallel,
        threads: args.threads,
    };
    let outcome = backdrop::optimize_site(&cfg, encoder.as_ref(), &threading)?;

    if outcome.found == 0 {
        println!("No images found to convert in {}", cfg.images_dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    println!("Found {} images to convert\n", outcome.found);
    for r in &outcome.report.results {
        println!("{} -> {}", r.original_name, r.modern_name);
        println!(
            "   Original: {} -> WebP: {} ({}% smaller)",
            kb(r.original_size_bytes),
            kb(r.modern_size_bytes),
            r.savings_percent
        );
    }
    for f in &outcome.report.failures {
        println!("failed: {}: {}", f.original_name, f.reason);
    }

    let totals = outcome.report.totals();
    println!("\nSUMMARY:");
    println!("   Total images converted: {}", totals.converted);
    println!("   Original total size: {}", kb(totals.original_bytes));
    println!("   WebP total size: {}", kb(totals.modern_bytes));
    println!(
        "   Total savings: {}% ({:.1}KB)",
        totals.savings_percent,
        totals.saved_bytes() as f64 / 1024.0
    );

    if let Some(paths) = &outcome.artifacts {
        println!("\nwrote {}", paths.stylesheet.display());
        println!("wrote {}", paths.detection_script.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_verify(cli: &Cli, args: &VerifyArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_site(cli)?;
    let targets = VerifyTargets::from_config(&cfg);
    let report = backdrop::verify_site(&targets, args.pairs_only);

    for check in &report.checks {
        println!("[{}]", check.name);
        for line in &check.lines {
            println!("  {line}");
        }
    }

    if report.passed() {
        println!("\nAll checks passed.");
    } else {
        println!("\nSome checks failed.");
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn cmd_pick(cli: &Cli, args: &PickArgs) -> anyhow::Result<ExitCode> {
    let cfg = load_site(cli)?;
    let selector = BackgroundSelector::from_config(&cfg)?;

    let probe: Box<dyn CapabilityProbe> = if args.no_webp {
        Box::new(FixedProbe(false))
    } else {
        Box::new(TimeoutProbe::new(DecodeProbe::webp()?, cfg.probe_timeout()))
    };
    let loader = FsImageLoader::new(site_root(cli));
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut style = StyleVars::new();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("build tokio runtime")?;
    let outcome = rt.block_on(selector.run(&mut rng, probe.as_ref(), &loader, &mut style));

    match outcome {
        SelectionOutcome::Applied { .. } => {
            let value = style.get(BACKGROUND_PROPERTY).unwrap_or_default();
            println!("{BACKGROUND_PROPERTY}: {value}");
            Ok(ExitCode::SUCCESS)
        }
        SelectionOutcome::Unset { attempts } => {
            println!("no background set (tried: {})", attempts.join(", "));
            Ok(ExitCode::from(1))
        }
        SelectionOutcome::NoBackgrounds => {
            println!("no backgrounds configured");
            Ok(ExitCode::from(1))
        }
    }
}
