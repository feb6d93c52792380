mod display;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use slotwise_ai::gemini::{self, GeminiConfig, GeminiExtractor};
use slotwise_ai::{TesseractOcr, decode_image_payload, looks_like_image_payload, tesseract};
use slotwise_core::confidence::thresholds;
use slotwise_core::{
    Decision, ExtractedEntities, FixedClock, PipelineConfig, RawText, StageConfidences, Thresholds,
};
use slotwise_pipeline::{Normalized, Pipeline, PipelineInput};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "slotwise=info";

#[derive(Parser)]
#[command(
    name = "slotwise",
    version,
    about = "Turn free-text or scanned appointment requests into structured bookings"
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Settings {
    /// Minimum text/OCR confidence
    #[arg(long, global = true, env = "SLOTWISE_OCR_MIN_CONFIDENCE", default_value_t = thresholds::OCR_MIN)]
    ocr_min_confidence: f32,

    /// Minimum entity extraction confidence
    #[arg(long, global = true, env = "SLOTWISE_EXTRACTION_MIN_CONFIDENCE", default_value_t = thresholds::EXTRACTION_MIN)]
    extraction_min_confidence: f32,

    /// Minimum date/time normalization confidence
    #[arg(long, global = true, env = "SLOTWISE_NORMALIZATION_MIN_CONFIDENCE", default_value_t = thresholds::NORMALIZATION_MIN)]
    normalization_min_confidence: f32,

    /// Gemini API key
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    gemini_api_key: Option<String>,

    /// Gemini model used for entity extraction
    #[arg(long, global = true, env = "GEMINI_MODEL_NAME", default_value = gemini::DEFAULT_MODEL)]
    gemini_model: String,

    #[arg(long, global = true, env = "GEMINI_BASE_URL", default_value = gemini::DEFAULT_BASE_URL)]
    gemini_base_url: String,

    #[arg(long, global = true, env = "SLOTWISE_LLM_TIMEOUT_SECS", default_value_t = gemini::DEFAULT_TIMEOUT_SECS)]
    llm_timeout_secs: u64,

    /// Path to the tesseract binary
    #[arg(long, global = true, env = "SLOTWISE_TESSERACT_BIN", default_value = tesseract::DEFAULT_BINARY)]
    tesseract_bin: PathBuf,

    #[arg(long, global = true, env = "SLOTWISE_OCR_TIMEOUT_SECS", default_value_t = tesseract::DEFAULT_TIMEOUT_SECS)]
    ocr_timeout_secs: u64,

    /// Pin the reference instant (RFC 3339) instead of reading the clock
    #[arg(long, global = true, value_name = "RFC3339", value_parser = parse_instant)]
    now: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Command {
    /// Recover raw text from typed input or an image
    Parse(InputArgs),
    /// Extract date, time, and department phrases from text
    Extract {
        #[arg(long)]
        text: String,
    },
    /// Resolve date/time phrases and map a department
    Normalize {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        department: Option<String>,
        /// Extraction confidence to gate against
        #[arg(long, default_value_t = 1.0)]
        extraction_confidence: f32,
    },
    /// Run the whole pipeline and decide
    Appointment {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Typed request text (base64 image payloads are detected and decoded)
    #[arg(long)]
    text: Option<String>,
    /// Image file to OCR
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,
    /// Base64 image, optionally as a data URI
    #[arg(long, value_name = "DATA")]
    image_base64: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Serialize)]
struct NormalizeReport<'a> {
    #[serde(flatten)]
    normalized: &'a Normalized,
    decision: &'a Decision,
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected RFC 3339 timestamp: {e}"))
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline> {
    let mut config = PipelineConfig::default().with_thresholds(Thresholds {
        ocr: settings.ocr_min_confidence,
        extraction: settings.extraction_min_confidence,
        normalization: settings.normalization_min_confidence,
    });
    if let Some(now) = settings.now {
        config = config.with_clock(FixedClock(now));
    }

    let recognizer = TesseractOcr::new(&settings.tesseract_bin, settings.ocr_timeout_secs);
    let extractor = GeminiExtractor::new(GeminiConfig {
        api_key: settings.gemini_api_key.clone(),
        model: settings.gemini_model.clone(),
        base_url: settings.gemini_base_url.clone(),
        timeout_secs: settings.llm_timeout_secs,
    })
    .context("building Gemini client")?;

    Pipeline::new(config, Arc::new(recognizer), Arc::new(extractor))
        .context("invalid pipeline configuration")
}

async fn read_input(args: &InputArgs) -> anyhow::Result<PipelineInput> {
    if let Some(path) = &args.image {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading image {}", path.display()))?;
        return Ok(PipelineInput::Image(bytes));
    }
    if let Some(data) = &args.image_base64 {
        let bytes = decode_image_payload(data).context("decoding --image-base64")?;
        return Ok(PipelineInput::Image(bytes));
    }
    match &args.text {
        Some(text) if looks_like_image_payload(text) => {
            let bytes = decode_image_payload(text).context("decoding image payload in --text")?;
            Ok(PipelineInput::Image(bytes))
        }
        Some(text) => Ok(PipelineInput::Text(text.clone())),
        None => bail!("one of --text, --image or --image-base64 is required"),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("serializing output")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("slotwise v{}", env!("CARGO_PKG_VERSION"));
    let pipeline = build_pipeline(&cli.settings)?;

    match cli.command {
        Command::Parse(args) => {
            let input = read_input(&args).await?;
            let raw: RawText = pipeline.parse(&input).await;
            print_json(&raw)?;
        }
        Command::Extract { text } => {
            let raw = RawText::new(text, 1.0);
            let entities: ExtractedEntities = pipeline.extract(&raw).await;
            print_json(&entities)?;
        }
        Command::Normalize {
            date,
            time,
            department,
            extraction_confidence,
        } => {
            let entities = ExtractedEntities {
                date_phrase: date,
                time_phrase: time,
                department,
                confidence: extraction_confidence,
            };
            let normalized = pipeline.normalize(&entities);
            let decision = pipeline.decide(
                &normalized,
                &StageConfidences {
                    ocr: 1.0,
                    extraction: extraction_confidence,
                    normalization: normalized.confidence,
                },
            );
            print_json(&NormalizeReport {
                normalized: &normalized,
                decision: &decision,
            })?;
        }
        Command::Appointment { input, format } => {
            let input = read_input(&input).await?;
            let outcome = pipeline.run(input).await;
            match format {
                Format::Json => print_json(&outcome)?,
                Format::Text => print!("{}", display::render_outcome(&outcome)),
            }
        }
    }

    Ok(())
}
