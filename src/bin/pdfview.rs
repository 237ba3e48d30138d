//! CLI binary for pdfview.
//!
//! A thin shim over the library crate: it plays the role of the file
//! picker and the page display — everything between (validation, upload,
//! stale-result handling, rendering) lives in the library.

use anyhow::{Context, Result};
use clap::Parser;
use pdfview::{
    probe, HttpUploadTransport, PdfiumBackend, SelectedFile, StatusProbe, SurfaceState,
    UploadController, ViewerConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Upload a PDF to a backend and rasterise every page to PNG files.
#[derive(Parser, Debug)]
#[command(name = "pdfview", version, about)]
struct Cli {
    /// The PDF file to upload and render.
    file: PathBuf,

    /// Base URL of the backend.
    #[arg(long, env = "PDFVIEW_API", default_value = "http://localhost:8000")]
    api: String,

    /// Directory for the rendered page PNGs.
    #[arg(long, short, default_value = "pages")]
    out: PathBuf,

    /// Longest edge of a rendered page, in pixels.
    #[arg(long, default_value_t = 2000)]
    max_pixels: u32,

    /// Page draws in flight at once.
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Skip the backend liveness probe.
    #[arg(long)]
    no_probe: bool,
}

/// Declared MIME type for the picked file, from its extension.
///
/// The CLI stands in for the browser file picker: the declared type is
/// advisory and the controller re-validates it either way.
fn declared_mime(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        Some(ext) if ext.eq_ignore_ascii_case("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ViewerConfig::builder()
        .api_base(&cli.api)
        .max_render_pixels(cli.max_pixels)
        .render_concurrency(cli.concurrency)
        .build()
        .context("invalid configuration")?;

    // ── Liveness probe (peripheral, one-shot) ───────────────────────────
    if !cli.no_probe {
        let state = StatusProbe::new(&config)?.check().await;
        let line = probe::status_line(&state);
        if state.is_error() {
            eprintln!("{}", red(&line));
        } else {
            eprintln!("{}", dim(&line));
        }
    }

    // ── Selection → upload → render ─────────────────────────────────────
    let bytes = std::fs::read(&cli.file)
        .with_context(|| format!("reading {}", cli.file.display()))?;
    let name = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    let file = SelectedFile::new(name, declared_mime(&cli.file), bytes);

    let controller = UploadController::new(
        Arc::new(HttpUploadTransport::new(&config)?),
        Arc::new(PdfiumBackend::new(config.download_timeout_secs)),
        config,
    );

    let state = controller.on_file_selected(Some(file)).await;
    match state.success() {
        Some(receipt) => println!("{}", green(&receipt.to_string())),
        None => {
            anyhow::bail!("{state}");
        }
    }

    // ── Write surfaces to disk ──────────────────────────────────────────
    let renderer = controller
        .renderer()
        .context("no renderer mounted after a successful upload")?;
    std::fs::create_dir_all(&cli.out)
        .with_context(|| format!("creating {}", cli.out.display()))?;

    let mut failed = 0usize;
    let surfaces = renderer.surfaces();
    let total = surfaces.len();
    for surface in &surfaces {
        match &surface.state {
            SurfaceState::Drawn(image) => {
                let path = cli.out.join(format!("page-{:03}.png", surface.index + 1));
                image
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!(
                    "  {} page {:>3}/{:<3} {}",
                    green("✓"),
                    surface.index + 1,
                    total,
                    dim(&format!("{}x{}  {}", surface.width, surface.height, path.display())),
                );
            }
            SurfaceState::Failed(e) => {
                failed += 1;
                println!("  {} page {:>3}/{:<3} {}", red("✗"), surface.index + 1, total, red(&e.to_string()));
            }
            SurfaceState::Blank => {
                failed += 1;
                println!("  {} page {:>3}/{:<3} never drawn", red("✗"), surface.index + 1, total);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed}/{total} pages failed to render");
    }
    Ok(())
}
