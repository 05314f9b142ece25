//! CLI binary for med-relevance.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints the JSON report.

use anyhow::{Context, Result};
use clap::Parser;
use med_relevance::{
    inspect_text, write_report, AnalysisConfig, AnalysisProgressCallback, Analyzer,
    ProgressCallback, Report,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
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
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start of the chunk currently in flight; chunks run one at a time.
    chunk_started: std::sync::Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_analysis_start` tells us the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting text…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            chunk_started: std::sync::Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Classifying");
        self.bar.reset_eta();
    }

    fn take_elapsed(&self) -> f64 {
        self.chunk_started
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_analysis_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Classifying {total_chunks} chunks…"))
        ));
    }

    fn on_chunk_start(&self, chunk_idx: usize, _total: usize) {
        if let Ok(mut g) = self.chunk_started.lock() {
            *g = Some(Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk_idx}"));
    }

    fn on_chunk_complete(&self, chunk_idx: usize, total: usize, relevant: usize, irrelevant: usize) {
        let secs = self.take_elapsed();
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            green("✓"),
            chunk_idx,
            total,
            dim(&format!("{relevant:>3} relevant {irrelevant:>3} irrelevant")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_idx: usize, total: usize, error: &str) {
        let secs = self.take_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            let mut s: String = error.chars().take(79).collect();
            s.push('\u{2026}');
            s
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_idx,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_chunks: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} chunks classified",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} chunks classified  ({} failed)",
                if failed == total_chunks {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_chunks,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify medicines for a disease (JSON on stdout)
  medrel prescriptions.pdf --disease "Type 2 Diabetes"

  # Write the report to a file, pretty-printed
  medrel prescriptions.pdf --disease asthma -o report.json --pretty

  # Use the direct Gemini REST gateway
  medrel prescriptions.pdf --disease gout --provider gemini-rest

  # Local model through Ollama, no pause between calls
  medrel notes.pdf --disease hypertension --provider ollama --model llama3.2 --rate-delay 0

  # Show the normalized text that would be chunked (no API key needed)
  medrel --text-only prescriptions.pdf --disease any

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (gemini-rest and gemini)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model used with EDGEQUAKE_LLM_PROVIDER
  PDFIUM_LIB_PATH         Path to libpdfium
  RUST_LOG                Log filter, overrides -v / -q
"#;

/// Classify the medicines in a PDF as relevant or irrelevant to a disease.
#[derive(Parser, Debug)]
#[command(
    name = "medrel",
    version,
    about = "Classify the medicines in a PDF as relevant or irrelevant to a disease",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Target disease or condition.
    #[arg(short, long, env = "MEDREL_DISEASE")]
    disease: String,

    /// Write the JSON report to this file instead of stdout.
    #[arg(short, long, env = "MEDREL_OUTPUT")]
    output: Option<PathBuf>,

    /// Significant lines per chunk.
    #[arg(long, env = "MEDREL_CHUNK_LINES", default_value_t = 50,
          value_parser = clap::value_parser!(u64).range(1..))]
    chunk_lines: u64,

    /// Pause between model calls, in seconds.
    #[arg(long, env = "MEDREL_RATE_DELAY", default_value_t = 1.25)]
    rate_delay: f64,

    /// Per-call model timeout, in seconds.
    #[arg(long, env = "MEDREL_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Provider: gemini-rest, openai, anthropic, gemini, ollama, lmstudio, …
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Model ID (e.g. gemini-1.5-flash-latest, gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "MEDREL_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max model output tokens per chunk.
    #[arg(long, env = "MEDREL_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// Text file with a prompt template containing {block} (and optionally {disease}).
    #[arg(long, env = "MEDREL_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "MEDREL_PASSWORD")]
    password: Option<String>,

    /// Print the normalized document text and exit; no model calls.
    #[arg(long)]
    text_only: bool,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,

    /// Disable progress bar.
    #[arg(long, env = "MEDREL_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MEDREL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MEDREL_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MEDREL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them all back.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.text_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Text-only mode ───────────────────────────────────────────────────
    if cli.text_only {
        let text = inspect_text(&cli.input, &config)
            .await
            .context("Failed to extract text")?;
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(text.as_bytes())
            .context("Failed to write to stdout")?;
        if !text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        return Ok(());
    }

    // ── Run analysis ─────────────────────────────────────────────────────
    let analyzer = Analyzer::from_config(config).context("No usable model gateway")?;
    let report = analyzer
        .analyse_input(&cli.input, &cli.disease)
        .await
        .context("Analysis failed")?;

    if let Some(ref output_path) = cli.output {
        write_report(&report, output_path, cli.pretty)
            .await
            .context("Failed to write report")?;
        if !cli.quiet {
            print_summary(&report);
            eprintln!("   →  {}", bold(&output_path.display().to_string()));
        }
    } else {
        let json = if cli.pretty {
            serde_json::to_string_pretty(&report)
        } else {
            serde_json::to_string(&report)
        }
        .context("Failed to serialise report")?;
        println!("{json}");
        if !cli.quiet {
            print_summary(&report);
        }
    }

    Ok(())
}

fn print_summary(report: &Report) {
    let s = &report.summary;
    eprintln!(
        "{}  {} relevant  /  {} irrelevant  {}ms",
        if s.failed_calls == 0 { green("✔") } else { cyan("⚠") },
        bold(&report.relevant.len().to_string()),
        bold(&report.irrelevant.len().to_string()),
        s.duration_ms,
    );
    eprintln!(
        "   {} calls  {} tokens in  /  {} tokens out",
        s.calls,
        dim(&s.tokens_in.to_string()),
        dim(&s.tokens_out.to_string()),
    );
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let rate_delay = Duration::try_from_secs_f64(cli.rate_delay)
        .with_context(|| format!("Invalid --rate-delay {}", cli.rate_delay))?;

    let mut builder = AnalysisConfig::builder()
        .chunk_lines(cli.chunk_lines as usize)
        .rate_delay(rate_delay)
        .request_timeout(Duration::from_secs(cli.timeout))
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
