//! xlsxpdf - スプレッドシート（xlsx / xls / ods）をPDFに変換するコマンド

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use xlsxpdf::{
    ConversionSettings, ConverterBuilder, JobEvent, Orchestrator, Orientation, PaperSize,
    SheetSelector, SourceFile,
};

/// Convert spreadsheets (xlsx, xls, ods) to paginated PDF.
#[derive(Parser, Debug)]
#[command(name = "xlsxpdf", version, arg_required_else_help = true)]
struct Cli {
    /// Spreadsheet to convert.
    input: PathBuf,

    /// Output file. Defaults to the input name with a .pdf extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Load page settings from a JSON file (fields as in the web form).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Landscape orientation.
    #[arg(long)]
    landscape: bool,

    /// Paper size: a4, letter, legal, a3.
    #[arg(long)]
    paper: Option<PaperSize>,

    /// Do not shrink content to fit the page.
    #[arg(long)]
    no_fit: bool,

    /// One page per sheet sized to its content, without page numbers.
    #[arg(long)]
    no_pagination: bool,

    /// Do not repeat the first row on every page.
    #[arg(long)]
    no_header_row: bool,

    /// Do not draw cell borders.
    #[arg(long)]
    no_gridlines: bool,

    /// Convert only the sheet at this index (0-based).
    #[arg(long)]
    sheet: Option<usize>,

    /// Include hidden sheets, rows and columns.
    #[arg(long)]
    include_hidden: bool,

    /// Skip empty sheets instead of failing.
    #[arg(long)]
    skip_empty: bool,

    /// Base font size in points.
    #[arg(long, default_value_t = 10.0)]
    font_size: f32,

    /// Document title (defaults to the input file name).
    #[arg(long)]
    title: Option<String>,

    /// Write uncompressed content streams.
    #[arg(long)]
    no_compress: bool,

    /// Hide the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn conversion_settings(&self) -> Result<ConversionSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ConversionSettings::from_json(&json)
                    .with_context(|| format!("Invalid settings in {}", path.display()))?
            }
            None => ConversionSettings::default(),
        };
        if self.landscape {
            settings.orientation = Orientation::Landscape;
        }
        if let Some(paper) = self.paper {
            settings.paper_size = paper;
        }
        settings.fit_to_page &= !self.no_fit;
        settings.include_pagination &= !self.no_pagination;
        settings.include_header_row &= !self.no_header_row;
        settings.show_gridlines &= !self.no_gridlines;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let show_progress = !cli.no_progress && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let settings = cli.conversion_settings()?;
    let mut builder = ConverterBuilder::new()
        .with_settings(settings)
        .include_hidden(cli.include_hidden)
        .skip_empty_sheets(cli.skip_empty)
        .with_font_size(cli.font_size)
        .compress_streams(!cli.no_compress);
    if let Some(index) = cli.sheet {
        builder = builder.with_sheet_selector(SheetSelector::Index(index));
    }
    if let Some(title) = &cli.title {
        builder = builder.with_title(title.clone());
    }
    let converter = builder.build()?;

    let source = SourceFile::from_path(&cli.input)
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_file_name(source.output_file_name()));

    let orchestrator = Orchestrator::new(converter);
    let mut handle = orchestrator.submit(source, settings)?;

    let bar = if show_progress {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{prefix:.bold} [{bar:40.green/238}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix("Converting");
        bar
    } else {
        ProgressBar::hidden()
    };

    while let Some(event) = handle.next_event().await {
        match event {
            JobEvent::Progress(percent) => bar.set_position(u64::from(percent)),
            JobEvent::Succeeded(output) => {
                bar.finish_and_clear();
                std::fs::write(&output_path, &output.pdf)
                    .with_context(|| format!("Failed to write {}", output_path.display()))?;
                eprintln!(
                    "Wrote {} ({} page(s) from {} sheet(s), {} bytes, {:.2}s)",
                    output_path.display(),
                    output.page_count,
                    output.sheet_count,
                    output.pdf.len(),
                    output.elapsed.as_secs_f64()
                );
                return Ok(());
            }
            JobEvent::Failed(failure) => {
                bar.abandon();
                bail!("Conversion failed: {}", failure);
            }
        }
    }

    bail!("Conversion ended without a result")
}
