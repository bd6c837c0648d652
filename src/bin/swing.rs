//! Swing CLI - Command-line interface for the swing analysis engine
//!
//! Commands:
//! - analyze: Score swings in a pose stream (batch mode)
//! - validate: Validate a pose stream against the input schema
//! - doctor: Diagnose engine health and configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use swingscore::schema::{adapt_frame, PoseStream, SCHEMA_VERSION};
use swingscore::{
    analyze_pose_stream, AnalysisConfig, Handedness, QualityInferenceEngine, SwingAnalysis,
    ENGINE_NAME, ENGINE_VERSION,
};

/// Swing - On-device tennis swing quality analysis from pose keypoints
#[derive(Parser)]
#[command(name = "swing")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score tennis swings from 2D pose streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score swings in a pose stream (batch mode)
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// ONNX quality model path (heuristic fallback when omitted)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Player handedness
        #[arg(long, default_value = "right")]
        handedness: HandednessArg,

        /// Model sequence length in frames
        #[arg(long, default_value = "90")]
        sequence_length: usize,

        /// Minimum keypoint confidence
        #[arg(long, default_value = "0.2")]
        confidence_threshold: f32,
    },

    /// Validate a pose stream against the input schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose engine health and configuration
    Doctor {
        /// Check an ONNX model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// JSON array of swing analyses
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Newline-delimited JSON (one analysis per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum HandednessArg {
    Left,
    Right,
}

impl From<HandednessArg> for Handedness {
    fn from(arg: HandednessArg) -> Self {
        match arg {
            HandednessArg::Left => Handedness::Left,
            HandednessArg::Right => Handedness::Right,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SwingCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            output,
            output_format,
            model,
            handedness,
            sequence_length,
            confidence_threshold,
        } => cmd_analyze(
            &input,
            &output,
            output_format,
            model,
            handedness,
            sequence_length,
            confidence_threshold,
        ),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { model, json } => cmd_doctor(model.as_deref(), json),
    }
}

fn cmd_analyze(
    input: &PathBuf,
    output: &PathBuf,
    output_format: OutputFormat,
    model: Option<PathBuf>,
    handedness: HandednessArg,
    sequence_length: usize,
    confidence_threshold: f32,
) -> Result<(), SwingCliError> {
    let input_data = read_input(input)?;
    let stream = PoseStream::from_json(&input_data)?;

    if stream.frames.is_empty() {
        return Err(SwingCliError::NoFrames);
    }

    let config = AnalysisConfig {
        model_path: model,
        handedness: handedness.into(),
        sequence_length,
        confidence_threshold,
        ..Default::default()
    };

    let analyses = analyze_pose_stream(&stream, config)?;
    let output_data = format_output(&analyses, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &PathBuf, json: bool) -> Result<(), SwingCliError> {
    let input_data = read_input(input)?;
    let stream = PoseStream::from_json(&input_data)?;

    let errors: Vec<ValidationErrorDetail> = stream
        .frames
        .iter()
        .enumerate()
        .filter_map(|(index, frame)| {
            adapt_frame(frame).err().map(|e| ValidationErrorDetail {
                index,
                frame_index: frame.frame_index,
                error: e.to_string(),
            })
        })
        .collect();

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_frames: stream.frames.len(),
        valid_frames: stream.frames.len() - errors.len(),
        invalid_frames: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:         {}", report.schema_version);
        println!("Total frames:   {}", report.total_frames);
        println!("Valid frames:   {}", report.valid_frames);
        println!("Invalid frames: {}", report.invalid_frames);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Frame {} (index {}): {}", err.frame_index, err.index, err.error);
            }
        }
    }

    if report.invalid_frames > 0 {
        Err(SwingCliError::ValidationFailed(report.invalid_frames))
    } else {
        Ok(())
    }
}

fn cmd_doctor(model: Option<&std::path::Path>, json: bool) -> Result<(), SwingCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", ENGINE_NAME, ENGINE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    match model {
        Some(model_path) if model_path.exists() => {
            let config = AnalysisConfig {
                model_path: Some(model_path.to_path_buf()),
                ..Default::default()
            };
            let engine = QualityInferenceEngine::new(&config);
            if engine.is_model_loaded() {
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Ok,
                    message: format!("Model loaded from {}", model_path.display()),
                });
            } else {
                checks.push(DoctorCheck {
                    name: "model".to_string(),
                    status: CheckStatus::Error,
                    message: format!(
                        "Model at {} failed to load; engine would run heuristic",
                        model_path.display()
                    ),
                });
            }
        }
        Some(model_path) => {
            checks.push(DoctorCheck {
                name: "model".to_string(),
                status: CheckStatus::Warning,
                message: format!("Model file {} does not exist", model_path.display()),
            });
        }
        None => {
            checks.push(DoctorCheck {
                name: "model".to_string(),
                status: CheckStatus::Warning,
                message: "No model configured; scores will use the heuristic".to_string(),
            });
        }
    }

    let report = DoctorReport {
        producer: ENGINE_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Swing Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(SwingCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &PathBuf) -> Result<String, SwingCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(
    analyses: &[SwingAnalysis],
    format: &OutputFormat,
) -> Result<String, SwingCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(analyses)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(analyses)?),
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for analysis in analyses {
                lines.push(serde_json::to_string(analysis)?);
            }
            Ok(lines.join("\n") + "\n")
        }
    }
}

// Error types

#[derive(Debug)]
enum SwingCliError {
    Io(io::Error),
    Analysis(swingscore::AnalysisError),
    Json(serde_json::Error),
    NoFrames,
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for SwingCliError {
    fn from(e: io::Error) -> Self {
        SwingCliError::Io(e)
    }
}

impl From<swingscore::AnalysisError> for SwingCliError {
    fn from(e: swingscore::AnalysisError) -> Self {
        SwingCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for SwingCliError {
    fn from(e: serde_json::Error) -> Self {
        SwingCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SwingCliError> for CliError {
    fn from(e: SwingCliError) -> Self {
        match e {
            SwingCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SwingCliError::Analysis(e) => CliError {
                code: "ANALYSIS_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches the pose stream schema".to_string()),
            },
            SwingCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SwingCliError::NoFrames => CliError {
                code: "NO_FRAMES".to_string(),
                message: "No frames found in input".to_string(),
                hint: Some("Ensure the pose stream is not empty".to_string()),
            },
            SwingCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} frames failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            SwingCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_frames: usize,
    valid_frames: usize,
    invalid_frames: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_index: u64,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
