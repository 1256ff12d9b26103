//! CLI binary for patrika.
//!
//! A thin shim over the library crate: `serve` starts the HTTP server,
//! `process` digests one page and prints the result.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use patrika::{
    digest_input, resolve_model, serve, DigestOutput, DigestProgressCallback, ExtractionMethod,
    PipelineConfig, ProgressCallback, ServerConfig, Stage,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner with one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    epoch: Instant,
    /// Milliseconds since `epoch` at which the current stage started.
    stage_started_ms: AtomicU64,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Digesting");
        bar.set_message("starting…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            epoch: Instant::now(),
            stage_started_ms: AtomicU64::new(0),
        })
    }

    fn stage_elapsed(&self) -> String {
        let now = self.epoch.elapsed().as_millis() as u64;
        let start = self.stage_started_ms.load(Ordering::SeqCst);
        format!("{:.1}s", now.saturating_sub(start) as f64 / 1000.0)
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        self.stage_started_ms
            .store(self.epoch.elapsed().as_millis() as u64, Ordering::SeqCst);
        self.bar.set_message(format!("{stage}…"));
    }

    fn on_stage_complete(&self, stage: Stage, output_len: usize) {
        let size = if output_len > 0 {
            format!("{output_len:>6} chars")
        } else {
            String::new()
        };
        self.bar.println(format!(
            "  {} {:<10} {}  {}",
            green("✓"),
            stage.to_string(),
            dim(&size),
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        let reason: String = if reason.chars().count() > 80 {
            format!("{}…", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {:<10} {}  {}",
            yellow("⚠"),
            stage.to_string(),
            yellow(&format!("fallback: {reason}")),
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_digest_complete(&self, method: ExtractionMethod) {
        self.bar.finish_and_clear();
        eprintln!("{} Page digested ({})", green("✔"), bold(&method.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Start the HTTP server on port 5000
  patrika serve

  # Custom port and upload directory
  patrika serve --port 8080 --upload-dir /var/lib/patrika/uploads

  # Digest one photographed page
  patrika process front-page.jpg

  # Digest a page from a URL and save the document as JSON
  patrika process https://example.com/epaper/p1.jpg --json -o p1.json

  # Use a different model
  patrika --model gemini-2.5-pro process front-page.jpg

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  PATRIKA_PROVIDER        Override provider (gemini, openai, anthropic, ollama)
  PATRIKA_MODEL           Override model ID (default gemini-2.0-flash)
  PATRIKA_HOST            Server bind address (default 0.0.0.0)
  PORT                    Server port (default 5000)
  PATRIKA_UPLOAD_DIR      Upload directory (default ./uploads)
  PATRIKA_MAX_UPLOAD_MB   Upload size limit in MB (default 10)
  RUST_LOG                Overrides the log filter

A .env file in the working directory is loaded on start-up.
"#;

/// Digest photographed Bengali newspaper pages with Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "patrika",
    version,
    about = "Digest photographed Bengali newspaper pages with Vision LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    model: ModelArgs,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PATRIKA_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PATRIKA_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server.
    Serve(ServeArgs),
    /// Digest one image and print the result.
    Process(ProcessArgs),
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gemini-2.0-flash, gemini-2.5-pro).
    #[arg(long, global = true, env = "PATRIKA_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama.
    #[arg(long, global = true, env = "PATRIKA_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, global = true, env = "PATRIKA_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, global = true, env = "PATRIKA_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds (no timeout when unset).
    #[arg(long, global = true, env = "PATRIKA_API_TIMEOUT")]
    api_timeout: Option<u64>,

    /// Maximum width of the processed image in pixels.
    #[arg(long, global = true, env = "PATRIKA_MAX_WIDTH", default_value_t = 2000)]
    max_width: u32,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "PATRIKA_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = patrika::server::DEFAULT_PORT)]
    port: u16,

    /// Directory uploads are stored in and served from.
    #[arg(long, env = "PATRIKA_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Upload size limit in megabytes.
    #[arg(long, env = "PATRIKA_MAX_UPLOAD_MB", default_value_t = patrika::server::DEFAULT_MAX_UPLOAD_MB)]
    max_upload_mb: usize,
}

#[derive(Args, Debug)]
struct ProcessArgs {
    /// Local image path or HTTP/HTTPS URL.
    input: String,

    /// Write the output to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output the Document as JSON instead of a readable digest.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PATRIKA_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PATRIKA_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers per-stage feedback for `process`, so INFO logs
    // are only shown for the server or when progress is off.
    let show_progress = match &cli.command {
        Command::Process(p) => !cli.quiet && !p.no_progress && !p.json,
        Command::Serve(_) => false,
    };
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

    match cli.command {
        Command::Serve(ref args) => run_serve(&cli.model, args).await,
        Command::Process(ref args) => run_process(&cli.model, args, show_progress, cli.quiet).await,
    }
}

async fn run_serve(model_args: &ModelArgs, args: &ServeArgs) -> Result<()> {
    let pipeline = build_config(model_args, None)?;
    let model = resolve_model(&pipeline).context("No LLM provider available")?;

    let server = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        upload_dir: args.upload_dir.clone(),
        max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
    };
    serve(server, model, pipeline)
        .await
        .context("Server failed")
}

async fn run_process(
    model_args: &ModelArgs,
    args: &ProcessArgs,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(model_args, progress)?;
    let model = resolve_model(&config).context("No LLM provider available")?;

    let output = digest_input(&args.input, args.download_timeout, model.as_ref(), &config)
        .await
        .with_context(|| format!("Failed to digest '{}'", args.input))?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&output.document).context("Failed to serialise document")?
    } else {
        render_digest(&output)
    };

    if let Some(ref path) = args.output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !quiet && !args.json {
        eprintln!(
            "   {}",
            dim(&format!(
                "preprocess {}ms  /  model {}ms  /  total {}ms",
                output.stats.preprocess_ms, output.stats.model_ms, output.stats.total_ms
            ))
        );
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_width(args.max_width);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Human-readable digest of one page.
fn render_digest(output: &DigestOutput) -> String {
    let doc = &output.document;
    let data = &doc.extracted_data;
    let summary = &doc.summary_data;
    let mut out = String::new();

    out.push_str(&format!("{}\n", bold(&doc.original_name)));
    if !data.date.is_empty() {
        out.push_str(&format!("{}\n", dim(&data.date)));
    }
    out.push_str(&format!(
        "{}\n\n",
        dim(&format!(
            "extraction: {}  ·  {} headlines  ·  {} articles",
            data.extraction_method,
            doc.headlines_count(),
            doc.articles_count()
        ))
    ));

    if !data.headlines.is_empty() {
        out.push_str(&format!("{}\n", cyan("Headlines")));
        for h in &data.headlines {
            out.push_str(&format!("  • {h}\n"));
        }
        out.push('\n');
    }

    out.push_str(&format!("{}\n", cyan("Summary")));
    out.push_str(&format!("  {}\n", summary.overall_summary));
    if !output.summary_generated() {
        out.push_str(&format!("  {}\n", yellow("(model summary unavailable)")));
    }

    for a in &summary.article_summaries {
        out.push_str(&format!("\n{}\n  {}\n", bold(&a.headline), a.summary));
        for point in &a.key_points {
            out.push_str(&format!("    – {point}\n"));
        }
    }

    if !summary.important_topics.is_empty() {
        out.push_str(&format!(
            "\n{} {}\n",
            cyan("Topics:"),
            summary.important_topics.join(", ")
        ));
    }
    out
}
