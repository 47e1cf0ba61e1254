//! Asym CLI - Command-line interface for Asymmetry Screen
//!
//! Commands:
//! - score: Screen recorded frames as one capture window (batch mode)
//! - run: Screen streaming frames from stdin in consecutive windows (streaming mode)
//! - validate: Validate frame record schema
//! - config: Print the effective configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use asymmetry_screen::encoder::{render_text, REPORT_FILE_NAME};
use asymmetry_screen::landmarks::{FACE_MESH_LANDMARKS, FACE_MESH_REFINED_LANDMARKS};
use asymmetry_screen::pipeline::{FrameDisposition, ScreeningProcessor};
use asymmetry_screen::schema::{FrameRecord, FrameRecordAdapter, SCHEMA_VERSION};
use asymmetry_screen::types::{ScreeningOutcome, SessionOutcome};
use asymmetry_screen::{ScreenConfig, ScreenError, PRODUCER_NAME, SCREEN_VERSION};

/// Asym - facial-asymmetry screening from facial landmarks (demo, not a medical device)
#[derive(Parser)]
#[command(name = "asym")]
#[command(version = SCREEN_VERSION)]
#[command(about = "Score facial asymmetry from per-frame landmarks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen recorded frames as one capture window (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also save the plain-text report into this directory
        #[arg(long)]
        save_report: Option<PathBuf>,
    },

    /// Screen streaming frames from stdin in consecutive windows (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush output after each window
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Validate frame record schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Configuration file (JSON), used for the landmark topology
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as JSON
    Config {
        /// Configuration file to validate and print (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one frame record per line)
    Ndjson,
    /// JSON array of frame records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One report payload per line
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
    /// Plain-text report
    Text,
}

fn main() -> ExitCode {
    init_logging();
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

/// Log to stderr so stdout stays machine-readable. Filtered by RUST_LOG.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), AsymCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            config,
            save_report,
        } => cmd_score(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            save_report.as_deref(),
        ),

        Commands::Run {
            output_format,
            config,
            flush,
        } => cmd_run(output_format, config.as_deref(), flush),

        Commands::Validate {
            input,
            input_format,
            config,
            json,
        } => cmd_validate(&input, input_format, config.as_deref(), json),

        Commands::Config { config } => cmd_config(config.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    save_report: Option<&Path>,
) -> Result<(), AsymCliError> {
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;

    if records.is_empty() {
        return Err(AsymCliError::NoRecords);
    }

    let mut processor = load_processor(config)?;
    let outcome = processor.screen_records(&records)?;
    info!(frames = records.len(), "screened recorded frames");

    let output_data = format_outcome(&processor, &outcome, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    // Text report is only offered for a scored window
    if let (Some(dir), Some(report)) = (save_report, outcome.outcome.report()) {
        let path = dir.join(REPORT_FILE_NAME);
        fs::write(&path, render_text(report)?)?;
        info!(path = %path.display(), "saved text report");
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    config: Option<&Path>,
    flush: bool,
) -> Result<(), AsymCliError> {
    let mut processor = load_processor(config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_seen = None;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: FrameRecord = serde_json::from_str(trimmed).map_err(|e| {
            AsymCliError::ParseError(format!("Failed to parse frame record: {}", e))
        })?;

        // The first frame opens a window; each closed window is followed by the next
        if !processor.is_collecting() {
            let started = processor.start(record.timestamp);
            debug!(session_id = %started.session_id, "window opened");
        }
        last_seen = Some(record.timestamp);

        if let FrameDisposition::WindowClosed(outcome) = processor.observe_record(&record) {
            write!(stdout, "{}", format_outcome(&processor, &outcome, &output_format)?)?;
            if flush {
                stdout.flush()?;
            }

            // The frame that closed the window belongs to the next one
            processor.start(record.timestamp);
            processor.observe_record(&record);
        }
    }

    // End of input stops the window in flight
    if let Some(outcome) = last_seen.and_then(|at| processor.stop(at)) {
        write!(stdout, "{}", format_outcome(&processor, &outcome, &output_format)?)?;
        stdout.flush()?;
    }

    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    json: bool,
) -> Result<(), AsymCliError> {
    let config = load_config(config)?;
    let required_landmarks = config.landmarks.required_len();

    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;

    let mut errors: Vec<ValidationErrorDetail> = FrameRecordAdapter::validate_records(&records)
        .iter()
        .map(|r| ValidationErrorDetail {
            index: r.index,
            frame_id: r.frame_id.clone(),
            error: r.error.to_string(),
        })
        .collect();

    // Schema-valid records whose face cannot be screened with this topology
    for (index, record) in records.iter().enumerate() {
        if errors.iter().any(|e| e.index == index) {
            continue;
        }
        if let Some(face) = record.primary_face() {
            if face.len() < required_landmarks {
                errors.push(ValidationErrorDetail {
                    index,
                    frame_id: record.frame_id.clone(),
                    error: ScreenError::IncompleteLandmarkSet {
                        len: face.len(),
                        required: required_landmarks,
                    }
                    .to_string(),
                });
            }
        }
    }
    errors.sort_by_key(|e| e.index);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - errors.len(),
        invalid_records: errors.len(),
        records_with_face: records.iter().filter(|r| r.primary_face().is_some()).count(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:     {}", report.total_records);
        println!("Valid records:     {}", report.valid_records);
        println!("Invalid records:   {}", report.invalid_records);
        println!("Records with face: {}", report.records_with_face);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Frame {} (index {}): {}",
                    err.frame_id.as_deref().unwrap_or("unknown"),
                    err.index,
                    err.error
                );
            }
        }
    }

    if report.invalid_records > 0 {
        Err(AsymCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), AsymCliError> {
    let config = load_config(config)?;
    println!("{}", config.to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), AsymCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} version {}", PRODUCER_NAME, SCREEN_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // Check configuration file if provided
    let effective = match config {
        Some(config_path) if !config_path.exists() => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; using defaults".to_string(),
            });
            ScreenConfig::default()
        }
        Some(config_path) => match load_config(Some(config_path)) {
            Ok(loaded) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config file valid ({} ms capture window)",
                        loaded.capture_window_ms
                    ),
                });
                loaded
            }
            Err(e) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", CliError::from(e).message),
                });
                ScreenConfig::default()
            }
        },
        None => ScreenConfig::default(),
    };

    // The landmark map must fit inside what FaceMesh emits
    let topology_check = match effective.landmarks.validate_for(FACE_MESH_LANDMARKS) {
        Ok(()) => DoctorCheck {
            name: "landmark_topology".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Landmark map needs {} points (FaceMesh emits {} or {} refined)",
                effective.landmarks.required_len(),
                FACE_MESH_LANDMARKS,
                FACE_MESH_REFINED_LANDMARKS
            ),
        },
        Err(e) => DoctorCheck {
            name: "landmark_topology".to_string(),
            status: CheckStatus::Warning,
            message: e.to_string(),
        },
    };
    checks.push(topology_check);

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: SCREEN_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Asym Doctor Report");
        println!("==================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(AsymCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, AsymCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(input: &str, format: &InputFormat) -> Result<Vec<FrameRecord>, AsymCliError> {
    let records = match format {
        InputFormat::Ndjson => FrameRecordAdapter::parse_ndjson(input)?,
        InputFormat::Json => FrameRecordAdapter::parse_array(input)?,
    };
    Ok(records)
}

fn load_config(path: Option<&Path>) -> Result<ScreenConfig, AsymCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(ScreenConfig::from_json(&json)?)
        }
        None => Ok(ScreenConfig::default()),
    }
}

fn load_processor(path: Option<&Path>) -> Result<ScreeningProcessor, AsymCliError> {
    Ok(ScreeningProcessor::with_config(load_config(path)?)?)
}

fn format_outcome(
    processor: &ScreeningProcessor,
    outcome: &SessionOutcome,
    format: &OutputFormat,
) -> Result<String, AsymCliError> {
    match format {
        OutputFormat::Ndjson => {
            let payload = processor.encode(outcome);
            Ok(serde_json::to_string(&payload)? + "\n")
        }
        OutputFormat::JsonPretty => Ok(processor.encode_to_json(outcome)? + "\n"),
        OutputFormat::Text => match &outcome.outcome {
            ScreeningOutcome::Scored(report) => Ok(render_text(report)?),
            ScreeningOutcome::InsufficientData => Ok(format!("{}\n", outcome.outcome.message())),
        },
    }
}

// Error types

#[derive(Debug)]
enum AsymCliError {
    Io(io::Error),
    Screen(ScreenError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for AsymCliError {
    fn from(e: io::Error) -> Self {
        AsymCliError::Io(e)
    }
}

impl From<ScreenError> for AsymCliError {
    fn from(e: ScreenError) -> Self {
        AsymCliError::Screen(e)
    }
}

impl From<serde_json::Error> for AsymCliError {
    fn from(e: serde_json::Error) -> Self {
        AsymCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AsymCliError> for CliError {
    fn from(e: AsymCliError) -> Self {
        match e {
            AsymCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AsymCliError::Screen(ScreenError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'asym config' to see a valid configuration".to_string()),
            },
            AsymCliError::Screen(e @ ScreenError::IncompleteLandmarkSet { .. }) => CliError {
                code: "LANDMARK_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Landmarks must come from MediaPipe FaceMesh or match the configured map"
                        .to_string(),
                ),
            },
            AsymCliError::Screen(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches {} schema", SCHEMA_VERSION)),
            },
            AsymCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AsymCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No frame records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            AsymCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            AsymCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            AsymCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    records_with_face: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    frame_id: Option<String>,
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
