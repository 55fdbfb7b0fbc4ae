use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use url::Url;

use stage_export::{Document, ExportConfig, ExportFormat, ExportOptions, Exporter, EXPORT_TARGET_ID};

/// stage-export: render a Stage scene file to PNG or JPEG
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the HTML scene file
    pub scene: PathBuf,

    /// Output image path (defaults to the scene name with the format's extension)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Output format, png or jpg
    #[clap(short, long, default_value = "png")]
    pub format: String,

    /// Encoder quality in [0, 1]; only JPEG uses it
    #[clap(short, long, default_value_t = 1.0)]
    pub quality: f32,

    /// Device pixels per CSS pixel
    #[clap(short, long, default_value_t = 2.0)]
    pub scale: f32,

    /// Export width in CSS pixels
    #[clap(long, default_value_t = 1920)]
    pub width: u32,

    /// Export height in CSS pixels
    #[clap(long, default_value_t = 1080)]
    pub height: u32,

    /// Id of the element to export
    #[clap(long, default_value = EXPORT_TARGET_ID)]
    pub element_id: String,

    /// JSON file with pipeline settings (delays, timeouts, watermark)
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Print the data URL to stdout instead of writing a file
    #[clap(long)]
    pub data_url: bool,
}

fn base_url_for(scene: &Path) -> anyhow::Result<String> {
    let absolute = std::fs::canonicalize(scene)
        .with_context(|| format!("Failed to resolve scene path {}", scene.display()))?;
    match Url::from_file_path(&absolute) {
        Ok(url) => Ok(url.to_string()),
        Err(()) => bail!("Scene path {} cannot be expressed as a URL", absolute.display()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();

    let format: ExportFormat = args.format.parse()?;
    let config = match &args.config {
        Some(path) => ExportConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    let options = ExportOptions {
        format,
        quality: args.quality,
        scale: args.scale,
        export_width: args.width,
        export_height: args.height,
    };

    let markup = std::fs::read_to_string(&args.scene)
        .with_context(|| format!("Failed to read scene file {}", args.scene.display()))?;
    let base = base_url_for(&args.scene)?;
    let mut document = Document::parse_html(&markup, Some(base.as_str()))?;

    let result = Exporter::new(config)
        .export_element(&mut document, &args.element_id, &options)
        .await
        .context("Export failed")?;

    if args.data_url {
        println!("{}", result.data_url);
        return Ok(());
    }
    let output = args
        .output
        .unwrap_or_else(|| args.scene.with_extension(format.extension()));
    let size = result.blob.size();
    std::fs::write(&output, result.blob.into_bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("wrote {} ({size} bytes)", output.display());
    Ok(())
}
