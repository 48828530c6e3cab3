//! `paytjek` CLI: reconstruct, analyze and validate payslips from the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use paytjek_lib::config::Settings;
use paytjek_lib::pipeline::extraction::{OcrDocument, TesseractCli};
use paytjek_lib::pipeline::processor::PayslipProcessor;
use paytjek_lib::pipeline::structuring::{normalize_record, PayslipStructurer};
use paytjek_lib::pipeline_config::{LayoutConfig, ValidationRules};
use paytjek_lib::{sanitize_and_parse, validate, LayoutReconstructor};

#[derive(Parser)]
#[command(name = "paytjek")]
#[command(about = "Check Danish payslips: OCR layout reconstruction, extraction and validation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild document text from an OCR export (JSON)
    Reconstruct {
        /// OCR export file
        ocr_json: PathBuf,

        /// Layout thresholds (JSON), defaults when omitted
        #[arg(long)]
        layout: Option<PathBuf>,
    },

    /// Run the full pipeline on a payslip and print the analysis as JSON
    Analyze {
        /// Payslip image (png/jpg) or, with --ocr-json, an OCR export.
        /// PDFs are not OCRed here; export their OCR first
        file: PathBuf,

        /// Treat FILE as an OCR export and skip OCR
        #[arg(long)]
        ocr_json: bool,

        /// Layout thresholds (JSON)
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Validation rules (JSON)
        #[arg(long)]
        rules: Option<PathBuf>,
    },

    /// Normalize and validate an extracted record (JSON or near-JSON)
    Validate {
        /// Record file
        record: PathBuf,

        /// Validation rules (JSON)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    paytjek_lib::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Reconstruct { ocr_json, layout } => cmd_reconstruct(&ocr_json, layout.as_deref()),
        Commands::Analyze {
            file,
            ocr_json,
            layout,
            rules,
        } => cmd_analyze(&file, ocr_json, layout.as_deref(), rules.as_deref()),
        Commands::Validate { record, rules } => cmd_validate(&record, rules.as_deref()),
    }
}

fn load_json<T: serde::de::DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_reconstruct(ocr_json: &Path, layout: Option<&Path>) -> Result<()> {
    let config: LayoutConfig = load_json(layout)?;
    let document = OcrDocument::load(ocr_json)?;
    print!("{}", LayoutReconstructor::new(config).reconstruct(&document));
    Ok(())
}

fn cmd_analyze(
    file: &Path,
    ocr_json: bool,
    layout: Option<&Path>,
    rules: Option<&Path>,
) -> Result<()> {
    let settings = Settings::from_env();
    let structurer = PayslipStructurer::from_settings(&settings)?;
    let ocr = TesseractCli::locate();

    // The OCR export path never touches the engine, so a missing binary only
    // matters for images.
    let ocr = match (ocr, ocr_json) {
        (Ok(engine), _) => engine,
        (Err(_), true) => TesseractCli::with_binary(PathBuf::from("tesseract")),
        (Err(e), false) => return Err(e.into()),
    };

    let processor = PayslipProcessor::new(Arc::new(ocr), structurer, settings)
        .with_layout_config(load_json(layout)?)
        .with_rules(load_json(rules)?);

    let analysis = if ocr_json {
        processor.process_ocr_export(&OcrDocument::load(file)?)?
    } else {
        processor.process_file(file)?
    };
    print_json(&analysis)
}

fn cmd_validate(record: &Path, rules: Option<&Path>) -> Result<()> {
    let rules: ValidationRules = load_json(rules)?;
    let raw = std::fs::read_to_string(record)
        .with_context(|| format!("reading {}", record.display()))?;

    let mut record = sanitize_and_parse(&raw)?;
    let report = normalize_record(&mut record);
    for warning in &report.coercion_warnings {
        eprintln!("warning: {warning}");
    }
    print_json(&validate(&record, &rules))
}
