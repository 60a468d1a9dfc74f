// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk command-line interface.
//
// Entry point. Initialises logging, loads the optional JSON config, and runs
// one document operation per invocation. Errors are printed in plain English
// with a suggestion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use blattwerk_core::human_errors::humanize_error;
use blattwerk_core::{
    AnnotationReport, AppConfig, BlattwerkError, NumberPosition, OfficeFormat, Rgb, StampPosition,
    TextChange,
};
use blattwerk_document::pdf::parse_page_order;
use blattwerk_document::{FakeScanOptions, PageNumberOptions, PiiPatterns, StampOptions, ops};

#[derive(Parser)]
#[command(name = "blattwerk")]
#[command(version)]
#[command(about = "Single-shot PDF operations: merge, split, redact, stamp, impose, and more", long_about = None)]
struct Cli {
    /// JSON config file (tool paths, font sizes, scan parameters)
    #[arg(long, global = true, value_name = "FILE", env = "BLATTWERK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Input file and output file shared by most subcommands.
#[derive(clap::Args, Debug)]
struct InOut {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Concatenate PDFs in order
    Merge {
        /// Input PDF files
        #[arg(value_name = "FILE", required = true, num_args = 1..)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Write each page to its own PDF
    Split {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Flate-compress every stream
    Compress(InOut),

    /// One PDF page per image
    ImagesToPdf {
        #[arg(value_name = "IMAGE", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Export every page as page_N.jpg
    PdfToImages {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,
    },

    /// Convert to DOCX or PPTX through LibreOffice
    ConvertToOffice {
        #[command(flatten)]
        io: InOut,

        #[arg(long, value_enum, default_value = "docx")]
        format: Office,
    },

    /// Rotate every page by a multiple of 90 degrees
    Rotate {
        #[command(flatten)]
        io: InOut,

        #[arg(long, default_value = "90", allow_hyphen_values = true)]
        degrees: i32,
    },

    /// Diagonal semi-transparent text on every page
    Watermark {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        text: String,
    },

    /// Apply a JSON list of text, rect, and image annotations
    Annotate {
        #[command(flatten)]
        io: InOut,

        /// JSON file holding the annotation list
        #[arg(long, value_name = "FILE")]
        annotations: PathBuf,
    },

    /// Permanently remove every occurrence of a string
    Redact {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        text: String,
    },

    /// Redact a string and write a replacement at its first occurrence
    Replace {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        old: String,

        #[arg(long)]
        new: String,
    },

    /// Highlight every occurrence of a string
    Highlight {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        text: String,

        #[arg(long, value_parser = parse_color, default_value = "#FFFF00")]
        color: Rgb,
    },

    /// Apply a JSON list of page-targeted text replacements
    EditText {
        #[command(flatten)]
        io: InOut,

        /// JSON file holding `[{"page", "old_text", "new_text"}]`
        #[arg(long, value_name = "FILE")]
        changes: PathBuf,
    },

    /// Stamp text at an anchor position
    Stamp {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        text: String,

        /// center, top, bottom, top-left, top-right, bottom-left, bottom-right
        #[arg(long, default_value = "center")]
        position: String,

        #[arg(long, default_value = "20")]
        font_size: f32,

        #[arg(long, value_parser = parse_color, default_value = "#000000")]
        color: Rgb,

        /// Only stamp this 1-based page
        #[arg(long)]
        page: Option<u32>,
    },

    /// Number every page
    PageNumbers {
        #[command(flatten)]
        io: InOut,

        /// Label of the first page
        #[arg(long, default_value = "1")]
        start: u32,

        /// bottom-left, bottom-center, bottom-right, top-left, top-center, top-right
        #[arg(long, default_value = "bottom-right")]
        position: String,

        #[arg(long, default_value = "12")]
        font_size: f32,

        #[arg(long, value_parser = parse_color, default_value = "#000000")]
        color: Rgb,
    },

    /// Set the visible area of every page (top-left coordinates, points)
    Crop {
        #[command(flatten)]
        io: InOut,

        #[arg(long, default_value = "0")]
        left: f32,

        #[arg(long, default_value = "0")]
        top: f32,

        #[arg(long)]
        right: Option<f32>,

        #[arg(long)]
        bottom: Option<f32>,
    },

    /// Keep pages in the given order, e.g. "3,1,2"
    Reorder {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        order: String,
    },

    /// Keep the pages in a range spec, e.g. "1-3,5"
    ExtractPages {
        #[command(flatten)]
        io: InOut,

        #[arg(long)]
        pages: String,
    },

    /// Highlight lines added in NEWER relative to BASELINE
    Compare {
        #[arg(value_name = "BASELINE")]
        baseline: PathBuf,

        #[arg(value_name = "NEWER")]
        newer: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Redact PII by pattern name (email, credit_card, phone) or regex
    SmartRedact {
        #[command(flatten)]
        io: InOut,

        #[arg(long, value_delimiter = ',', default_value = "email,credit_card,phone")]
        patterns: Vec<String>,

        /// Extra named pattern as NAME=REGEX (repeatable)
        #[arg(long, value_name = "NAME=REGEX")]
        register: Vec<String>,
    },

    /// Re-render pages to look scanned
    FakeScan {
        #[command(flatten)]
        io: InOut,

        /// Fixed seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Impose pages for saddle-stitch binding
    Booklet(InOut),

    /// Remove every annotation except form widgets and links
    StripAnnotations(InOut),

    /// Write the plain text of every page to a file
    ExtractText(InOut),

    /// Encrypt with a password
    AddPassword {
        #[command(flatten)]
        io: InOut,

        #[arg(long, env = "BLATTWERK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Decrypt and save without a password
    RemovePassword {
        #[command(flatten)]
        io: InOut,

        #[arg(long, env = "BLATTWERK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Fill form fields by full name
    FillForm {
        #[command(flatten)]
        io: InOut,

        /// Field value as NAME=VALUE (repeatable)
        #[arg(long, value_name = "NAME=VALUE")]
        field: Vec<String>,

        /// JSON object of field values
        #[arg(long, value_name = "FILE")]
        values: Option<PathBuf>,
    },

    /// Render a web page to PDF through wkhtmltopdf
    UrlToPdf {
        url: String,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Office {
    Docx,
    Pptx,
}

impl From<Office> for OfficeFormat {
    fn from(value: Office) -> Self {
        match value {
            Office::Docx => OfficeFormat::Docx,
            Office::Pptx => OfficeFormat::Pptx,
        }
    }
}

fn parse_color(value: &str) -> Result<Rgb, String> {
    Rgb::from_hex(value).map_err(|err| err.to_string())
}

/// Split `NAME=VALUE`.
fn key_value(pair: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got {pair:?}"))?;
    Ok((key.trim().to_owned(), value.to_owned()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let data = std::fs::read_to_string(path)
        .map_err(BlattwerkError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let value = serde_json::from_str(&data)
        .map_err(BlattwerkError::from)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(value)
}

fn print_report(report: &AnnotationReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Merge { inputs, output } => {
            ops::merge(&inputs, &output)?;
            println!("{}", output.display());
        }
        Commands::Split { input, out_dir } => {
            for path in ops::split(&input, &out_dir)? {
                println!("{}", path.display());
            }
        }
        Commands::Compress(io) => {
            ops::compress(&io.input, &io.output)?;
        }
        Commands::ImagesToPdf { images, output } => {
            ops::images_to_pdf(&images, &output)?;
        }
        Commands::PdfToImages { input, out_dir } => {
            for path in ops::pdf_to_images(&input, &out_dir, &config)? {
                println!("{}", path.display());
            }
        }
        Commands::ConvertToOffice { io, format } => {
            ops::convert_to_office(&io.input, &io.output, format.into(), &config)?;
        }
        Commands::Rotate { io, degrees } => {
            ops::rotate(&io.input, &io.output, degrees)?;
        }
        Commands::Watermark { io, text } => {
            ops::watermark(&io.input, &io.output, &text, &config)?;
        }
        Commands::Annotate { io, annotations } => {
            let annotations: Vec<blattwerk_core::Annotation> = read_json(&annotations)?;
            let report = ops::annotate(&io.input, &io.output, &annotations)?;
            print_report(&report)?;
        }
        Commands::Redact { io, text } => {
            let count = ops::redact(&io.input, &io.output, &text)?;
            println!("redacted {count} area(s)");
        }
        Commands::Replace { io, old, new } => {
            let count = ops::replace(&io.input, &io.output, &old, &new, &config)?;
            println!("replaced {count} occurrence(s)");
        }
        Commands::Highlight { io, text, color } => {
            let count = ops::highlight(&io.input, &io.output, &text, color)?;
            println!("highlighted {count} occurrence(s)");
        }
        Commands::EditText { io, changes } => {
            let changes: Vec<TextChange> = read_json(&changes)?;
            let count = ops::edit_text(&io.input, &io.output, &changes, &config)?;
            println!("edited {count} occurrence(s)");
        }
        Commands::Stamp {
            io,
            text,
            position,
            font_size,
            color,
            page,
        } => {
            let options = StampOptions {
                position: StampPosition::from_name(&position),
                font_size,
                color,
                page,
                ..StampOptions::new(text)
            };
            ops::stamp(&io.input, &io.output, &options)?;
        }
        Commands::PageNumbers {
            io,
            start,
            position,
            font_size,
            color,
        } => {
            let options = PageNumberOptions {
                start_page: start,
                position: NumberPosition::from_name(&position),
                font_size,
                color,
            };
            ops::page_numbers(&io.input, &io.output, &options)?;
        }
        Commands::Crop {
            io,
            left,
            top,
            right,
            bottom,
        } => {
            ops::crop(&io.input, &io.output, left, top, right, bottom)?;
        }
        Commands::Reorder { io, order } => {
            let order = parse_page_order(&order)?;
            ops::reorder(&io.input, &io.output, &order)?;
        }
        Commands::ExtractPages { io, pages } => {
            ops::extract_pages(&io.input, &io.output, &pages)?;
        }
        Commands::Compare {
            baseline,
            newer,
            output,
        } => {
            let count = ops::compare(&baseline, &newer, &output)?;
            println!("highlighted {count} difference(s)");
        }
        Commands::SmartRedact {
            io,
            patterns,
            register,
        } => {
            let mut registry = PiiPatterns::default();
            for pair in &register {
                let (name, pattern) = key_value(pair)?;
                registry.register(name, &pattern)?;
            }
            let count = ops::smart_redact(&io.input, &io.output, &patterns, &registry)?;
            println!("redacted {count} area(s)");
        }
        Commands::FakeScan { io, seed } => {
            let options = FakeScanOptions {
                config: config.scan.clone(),
                seed,
            };
            ops::fake_scan(&io.input, &io.output, &options)?;
        }
        Commands::Booklet(io) => {
            ops::booklet(&io.input, &io.output)?;
        }
        Commands::StripAnnotations(io) => {
            let count = ops::strip_annotations(&io.input, &io.output)?;
            println!("removed {count} annotation(s)");
        }
        Commands::ExtractText(io) => {
            ops::extract_text(&io.input, &io.output)?;
        }
        Commands::AddPassword { io, password } => {
            ops::add_password(&io.input, &io.output, &password)?;
        }
        Commands::RemovePassword { io, password } => {
            ops::remove_password(&io.input, &io.output, &password)?;
        }
        Commands::FillForm { io, field, values } => {
            let mut map: HashMap<String, String> = match values {
                Some(path) => read_json(&path)?,
                None => HashMap::new(),
            };
            for pair in &field {
                let (name, value) = key_value(pair)?;
                map.insert(name, value);
            }
            let count = ops::fill_form(&io.input, &io.output, &map)?;
            println!("filled {count} field(s)");
        }
        Commands::UrlToPdf { url, output } => {
            ops::url_to_pdf(&url, &output, &config)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<BlattwerkError>() {
                Some(inner) => {
                    let human = humanize_error(inner);
                    eprintln!("error: {}", human.message);
                    eprintln!("  {}", human.suggestion);
                    tracing::debug!(error = %format!("{err:#}"), severity = ?human.severity, "Operation failed");
                }
                None => eprintln!("error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
